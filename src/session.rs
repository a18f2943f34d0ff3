// 👤 Session/Plan Provider - Who is signed in and which plan they hold
//
// One SessionProvider per running client. Views get a cloned handle and
// read snapshots; only the transitions below mutate the state.
//
//   SignedOut ──authenticated──▶ Resolving ──plan read──▶ SignedIn(plan)
//       ▲                            │                        │
//       └──────── logout / provider reports no identity ──────┘

use crate::access::Route;
use crate::plans::DEFAULT_PLAN;
use crate::store::{PlanStore, UserDocument};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

// ============================================================================
// IDENTITY
// ============================================================================

/// Opaque reference to an authenticated user, as reported by the identity
/// provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(uid: &str) -> Self {
        Identity {
            uid: uid.to_string(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = Some(name.to_string());
        self
    }
}

/// Split "Ada King Lovelace" into ("Ada", "King Lovelace")
pub fn split_display_name(full: &str) -> (String, String) {
    let mut parts = full.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let rest: Vec<&str> = parts.collect();
    (first, rest.join(" "))
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct UserProfile {
    pub name: String,
    pub last_name: String,
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    SignedOut,
    /// Identity known, plan document read in flight
    Resolving { identity: Identity },
    SignedIn {
        identity: Identity,
        plan: String,
        profile: UserProfile,
    },
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::SignedOut => None,
            SessionState::Resolving { identity } | SessionState::SignedIn { identity, .. } => Some(identity),
        }
    }

    pub fn plan(&self) -> Option<&str> {
        match self {
            SessionState::SignedIn { plan, .. } => Some(plan),
            _ => None,
        }
    }
}

// ============================================================================
// PROVIDER
// ============================================================================

/// Shared handle to the process-wide session
#[derive(Debug, Clone)]
pub struct SessionProvider {
    state: Arc<RwLock<SessionState>>,
    default_plan: String,
}

impl SessionProvider {
    pub fn new() -> Self {
        Self::with_default_plan(DEFAULT_PLAN)
    }

    pub fn with_default_plan(default_plan: &str) -> Self {
        SessionProvider {
            state: Arc::new(RwLock::new(SessionState::SignedOut)),
            default_plan: default_plan.to_string(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionState {
        self.read().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.read().identity().cloned()
    }

    pub fn plan(&self) -> Option<String> {
        self.read().plan().map(str::to_string)
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(*self.read(), SessionState::SignedIn { .. })
    }

    /// Badge text for the account view, e.g. "PRO Plan"
    pub fn plan_badge(&self) -> Option<String> {
        self.plan().map(|p| format!("{} Plan", p.to_uppercase()))
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// External authentication succeeded: SignedOut/SignedIn -> Resolving
    pub fn on_authenticated(&self, identity: Identity) {
        info!(uid = %identity.uid, "authenticated, resolving plan");
        *self.write() = SessionState::Resolving { identity };
    }

    /// Resolving -> SignedIn(plan).
    ///
    /// Creates a default-plan user document when none exists. Returns the
    /// committed plan, or `None` if there was nothing to resolve or the
    /// identity changed while the read was in flight. On a store error the
    /// session stays `Resolving`.
    pub fn resolve_plan<S: PlanStore + ?Sized>(&self, store: &S) -> Result<Option<String>> {
        let identity = match &*self.read() {
            SessionState::Resolving { identity } => identity.clone(),
            _ => return Ok(None),
        };

        let doc = match store
            .get_user(&identity.uid)
            .with_context(|| format!("Failed to read user document for {}", identity.uid))?
        {
            Some(doc) => doc,
            None => {
                let doc = self.default_document(&identity);
                store
                    .create_user(&identity.uid, &doc)
                    .with_context(|| format!("Failed to create user document for {}", identity.uid))?;
                info!(uid = %identity.uid, plan = %doc.plan, "created default plan document");
                doc
            }
        };

        let mut state = self.write();
        let still_current = matches!(
            &*state,
            SessionState::Resolving { identity: current } if current.uid == identity.uid
        );
        if !still_current {
            debug!(uid = %identity.uid, "session changed during plan read, discarding");
            return Ok(None);
        }

        info!(uid = %identity.uid, plan = %doc.plan, "signed in");
        let plan = doc.plan.clone();
        *state = SessionState::SignedIn {
            identity,
            plan: doc.plan,
            profile: UserProfile {
                name: doc.name,
                last_name: doc.last_name,
            },
        };
        Ok(Some(plan))
    }

    /// Identity-state subscription callback
    pub fn on_identity_changed<S: PlanStore + ?Sized>(&self, identity: Option<Identity>, store: &S) -> Result<()> {
        match identity {
            Some(identity) => {
                self.on_authenticated(identity);
                self.resolve_plan(store)?;
            }
            None => self.sign_out(),
        }
        Ok(())
    }

    /// Federated sign-in (e.g. Google): first-time users get a document
    /// built from their display name
    pub fn sign_in_with_provider<S: PlanStore + ?Sized>(&self, identity: Identity, store: &S) -> Result<Option<String>> {
        self.on_authenticated(identity);
        self.resolve_plan(store)
    }

    /// Email sign-up: writes a default-plan document. If the identity
    /// already has one, the stored document wins and its plan is committed.
    pub fn sign_up_with_email<S: PlanStore + ?Sized>(&self, identity: Identity, store: &S) -> Result<String> {
        let fresh = UserDocument::new(
            &self.default_plan,
            identity.display_name.as_deref().unwrap_or_default(),
            "",
            identity.email.as_deref().unwrap_or_default(),
        );
        let created = store
            .create_user(&identity.uid, &fresh)
            .with_context(|| format!("Failed to create user document for {}", identity.uid))?;

        let doc = if created {
            info!(uid = %identity.uid, plan = %fresh.plan, "signed up");
            fresh
        } else {
            let stored = store
                .get_user(&identity.uid)
                .with_context(|| format!("Failed to read user document for {}", identity.uid))?
                .with_context(|| format!("User document for {} vanished during sign-up", identity.uid))?;
            info!(uid = %identity.uid, plan = %stored.plan, "already registered, keeping stored plan");
            stored
        };

        *self.write() = SessionState::SignedIn {
            identity,
            plan: doc.plan.clone(),
            profile: UserProfile {
                name: doc.name,
                last_name: doc.last_name,
            },
        };
        Ok(doc.plan)
    }

    /// Explicit logout. Returns where the view should navigate.
    pub fn logout(&self) -> Route {
        self.sign_out();
        Route::Auth
    }

    fn sign_out(&self) {
        let mut state = self.write();
        if let Some(identity) = state.identity() {
            info!(uid = %identity.uid, "signed out");
        }
        *state = SessionState::SignedOut;
    }

    fn default_document(&self, identity: &Identity) -> UserDocument {
        let (name, last_name) = split_display_name(identity.display_name.as_deref().unwrap_or_default());
        UserDocument::new(
            &self.default_plan,
            &name,
            &last_name,
            identity.email.as_deref().unwrap_or_default(),
        )
    }
}

impl Default for SessionProvider {
    fn default() -> Self {
        SessionProvider::new()
    }
}

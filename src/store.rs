// 🗂️ Document Store - Seam to the external identity/plan store
//
// The store is an external collaborator. It owns two collections:
//   users/{uid}  -> { plan, name, lastName, email }
//   plans/{id}   -> { features: [..] }
// Everything in this crate reads through the PlanStore trait.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

// ============================================================================
// DOCUMENTS
// ============================================================================

/// Per-user document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDocument {
    pub plan: String,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "lastName", default)]
    pub last_name: String,

    #[serde(default)]
    pub email: String,
}

impl UserDocument {
    pub fn new(plan: &str, name: &str, last_name: &str, email: &str) -> Self {
        UserDocument {
            plan: plan.to_string(),
            name: name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
        }
    }

    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.last_name)
        }
    }
}

/// Per-plan document. Feature names are raw strings as stored; they are
/// parsed into `Feature` by the access evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanDocument {
    #[serde(default)]
    pub features: Vec<String>,
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Read/write access to the external document store.
///
/// `Ok(None)` means the document does not exist; `Err` means the lookup
/// itself failed. Access checks treat both as a denial.
pub trait PlanStore {
    fn get_user(&self, uid: &str) -> Result<Option<UserDocument>>;

    /// Create the user document. Returns false if one already existed.
    fn create_user(&self, uid: &str, doc: &UserDocument) -> Result<bool>;

    fn set_user_plan(&self, uid: &str, plan: &str) -> Result<()>;

    fn get_plan(&self, plan_id: &str) -> Result<Option<PlanDocument>>;

    fn put_plan(&self, plan_id: &str, doc: &PlanDocument) -> Result<()>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Store held entirely in memory. Reads can be made to fail on demand.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserDocument>>,
    plans: RwLock<HashMap<String, PlanDocument>>,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Make every subsequent read return an error (simulates an outage)
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn user_count(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(anyhow!("document store unavailable"))
        } else {
            Ok(())
        }
    }
}

impl PlanStore for MemoryStore {
    fn get_user(&self, uid: &str) -> Result<Option<UserDocument>> {
        self.check_reads()?;
        let users = self.users.read().map_err(|_| anyhow!("user map poisoned"))?;
        Ok(users.get(uid).cloned())
    }

    fn create_user(&self, uid: &str, doc: &UserDocument) -> Result<bool> {
        let mut users = self.users.write().map_err(|_| anyhow!("user map poisoned"))?;
        if users.contains_key(uid) {
            return Ok(false);
        }
        users.insert(uid.to_string(), doc.clone());
        Ok(true)
    }

    fn set_user_plan(&self, uid: &str, plan: &str) -> Result<()> {
        let mut users = self.users.write().map_err(|_| anyhow!("user map poisoned"))?;
        let user = users
            .get_mut(uid)
            .ok_or_else(|| anyhow!("no user document for {}", uid))?;
        user.plan = plan.to_string();
        Ok(())
    }

    fn get_plan(&self, plan_id: &str) -> Result<Option<PlanDocument>> {
        self.check_reads()?;
        let plans = self.plans.read().map_err(|_| anyhow!("plan map poisoned"))?;
        Ok(plans.get(plan_id).cloned())
    }

    fn put_plan(&self, plan_id: &str, doc: &PlanDocument) -> Result<()> {
        let mut plans = self.plans.write().map_err(|_| anyhow!("plan map poisoned"))?;
        plans.insert(plan_id.to_string(), doc.clone());
        Ok(())
    }
}

/// Write one plan document per catalog tier, listing its features
pub fn seed_plans<S: PlanStore + ?Sized>(store: &S, catalog: &crate::plans::PlanCatalog) -> Result<usize> {
    for plan in catalog.plans() {
        let doc = PlanDocument {
            features: plan.features.iter().map(|f| f.as_str().to_string()).collect(),
        };
        store.put_plan(&plan.id, &doc)?;
    }
    Ok(catalog.plans().len())
}

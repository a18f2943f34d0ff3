// 🔒 Access Evaluator - Plan-gated feature access
//
// Two layers:
//   has_access()   - pure decision over the static catalog
//   FeatureGuard   - re-reads the user's plan from the store on every
//                    activation and owns the pending/granted/denied state
//
// Every lookup failure resolves to DENIED. Nothing here fails open.

use crate::plans::{Feature, PlanCatalog};
use crate::session::Identity;
use crate::store::PlanStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

// ============================================================================
// PURE DECISION
// ============================================================================

/// Does `plan` grant `feature` according to the catalog?
///
/// An absent or unrecognized plan identifier never grants anything.
pub fn has_access(catalog: &PlanCatalog, plan: Option<&str>, feature: Feature) -> bool {
    match plan.and_then(|id| catalog.get(id)) {
        Some(plan) => plan.grants(feature),
        None => false,
    }
}

// ============================================================================
// ROUTES
// ============================================================================

/// Navigation targets the access layer can send a view to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Authentication entry point
    Auth,
    RestrictedAccess,
    Pricing,
    /// Previous view in history
    Back,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Auth => "/auth",
            Route::RestrictedAccess => "/restricted-access",
            Route::Pricing => "/pricing-plans",
            Route::Back => "..",
        }
    }
}

// ============================================================================
// DECISION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenialReason {
    /// Nobody is signed in
    NoIdentity,
    /// Signed in, but no user document exists
    ProfileMissing,
    /// User document could not be read
    ProfileUnavailable,
    /// The stored plan name is not in the catalog
    UnknownPlan { plan: String },
    /// No feature document for the user's plan
    PlanDocumentMissing { plan: String },
    /// Feature document could not be read
    PlanUnavailable { plan: String },
    /// The plan does not include the feature
    FeatureNotIncluded { plan: String, feature: Feature },
}

impl DenialReason {
    /// How a guarded view reacts to this denial
    pub fn outcome(&self) -> GuardOutcome {
        match self {
            DenialReason::NoIdentity => GuardOutcome::Redirect(Route::Auth),
            DenialReason::FeatureNotIncluded { .. } => GuardOutcome::RestrictedInPlace,
            DenialReason::ProfileMissing
            | DenialReason::ProfileUnavailable
            | DenialReason::UnknownPlan { .. }
            | DenialReason::PlanDocumentMissing { .. }
            | DenialReason::PlanUnavailable { .. } => GuardOutcome::Redirect(Route::RestrictedAccess),
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::NoIdentity => write!(f, "not signed in"),
            DenialReason::ProfileMissing => write!(f, "no user profile"),
            DenialReason::ProfileUnavailable => write!(f, "user profile unavailable"),
            DenialReason::UnknownPlan { plan } => write!(f, "unknown plan '{}'", plan),
            DenialReason::PlanDocumentMissing { plan } => write!(f, "no feature list for plan '{}'", plan),
            DenialReason::PlanUnavailable { plan } => write!(f, "feature list for plan '{}' unavailable", plan),
            DenialReason::FeatureNotIncluded { plan, feature } => {
                write!(f, "plan '{}' does not include {}", plan, feature)
            }
        }
    }
}

impl std::error::Error for DenialReason {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    Granted { plan: String },
    Denied { denial: DenialReason },
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted { .. })
    }

    pub fn outcome(&self) -> GuardOutcome {
        match self {
            AccessDecision::Granted { .. } => GuardOutcome::Render,
            AccessDecision::Denied { denial } => denial.outcome(),
        }
    }

    fn denied(denial: DenialReason) -> Self {
        AccessDecision::Denied { denial }
    }
}

/// Resolve access for `uid` from the authoritative store.
///
/// Reads the user document, then the plan's feature document. The feature
/// must be granted by BOTH the static catalog and the stored plan document.
pub fn resolve_access<S: PlanStore + ?Sized>(
    catalog: &PlanCatalog,
    uid: Option<&str>,
    store: &S,
    feature: Feature,
) -> AccessDecision {
    let uid = match uid {
        Some(uid) => uid,
        None => return AccessDecision::denied(DenialReason::NoIdentity),
    };

    let user = match store.get_user(uid) {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!(uid, "no user document");
            return AccessDecision::denied(DenialReason::ProfileMissing);
        }
        Err(e) => {
            warn!(uid, error = %e, "user lookup failed, denying");
            return AccessDecision::denied(DenialReason::ProfileUnavailable);
        }
    };

    let plan = user.plan;
    if !catalog.contains(&plan) {
        warn!(uid, plan = %plan, "stored plan not in catalog, denying");
        return AccessDecision::denied(DenialReason::UnknownPlan { plan });
    }

    let plan_doc = match store.get_plan(&plan) {
        Ok(Some(doc)) => doc,
        Ok(None) => {
            debug!(plan = %plan, "no plan document");
            return AccessDecision::denied(DenialReason::PlanDocumentMissing { plan });
        }
        Err(e) => {
            warn!(plan = %plan, error = %e, "plan lookup failed, denying");
            return AccessDecision::denied(DenialReason::PlanUnavailable { plan });
        }
    };

    let mut stored = BTreeSet::new();
    for name in &plan_doc.features {
        match name.parse::<Feature>() {
            Ok(f) => {
                stored.insert(f);
            }
            Err(_) => warn!(plan = %plan, feature = %name, "ignoring unknown feature in plan document"),
        }
    }

    if has_access(catalog, Some(&plan), feature) && stored.contains(&feature) {
        debug!(uid, plan = %plan, %feature, "access granted");
        AccessDecision::Granted { plan }
    } else {
        debug!(uid, plan = %plan, %feature, "feature not included");
        AccessDecision::denied(DenialReason::FeatureNotIncluded { plan, feature })
    }
}

// ============================================================================
// GUARD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// Not resolved yet - render a placeholder
    Pending,
    Resolved(AccessDecision),
}

/// What the wrapping view should do right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "route", rename_all = "snake_case")]
pub enum GuardOutcome {
    Loading,
    Render,
    RestrictedInPlace,
    Redirect(Route),
}

/// Wraps one guarded view.
///
/// A new guard starts `Pending`. `check` always re-reads the store; a
/// granted decision is never reused for a later activation.
#[derive(Debug, Clone)]
pub struct FeatureGuard {
    required: Feature,
    state: GuardState,
}

impl FeatureGuard {
    pub fn new(required: Feature) -> Self {
        FeatureGuard {
            required,
            state: GuardState::Pending,
        }
    }

    pub fn required(&self) -> Feature {
        self.required
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn outcome(&self) -> GuardOutcome {
        match &self.state {
            GuardState::Pending => GuardOutcome::Loading,
            GuardState::Resolved(decision) => decision.outcome(),
        }
    }

    /// Run the access check for the current identity
    pub fn check<S: PlanStore + ?Sized>(
        &mut self,
        catalog: &PlanCatalog,
        identity: Option<&Identity>,
        store: &S,
    ) -> GuardOutcome {
        self.state = GuardState::Pending;
        let decision = resolve_access(catalog, identity.map(|i| i.uid.as_str()), store, self.required);
        self.state = GuardState::Resolved(decision);
        self.outcome()
    }

    /// Back to pending, e.g. when the view is re-entered
    pub fn reset(&mut self) {
        self.state = GuardState::Pending;
    }
}

// ============================================================================
// RESTRICTED ACCESS VIEW
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictedAction {
    GoBack,
    UpgradePlan,
}

impl RestrictedAction {
    pub fn label(&self) -> &'static str {
        match self {
            RestrictedAction::GoBack => "Go Back",
            RestrictedAction::UpgradePlan => "Upgrade Plan",
        }
    }

    pub fn route(&self) -> Route {
        match self {
            RestrictedAction::GoBack => Route::Back,
            RestrictedAction::UpgradePlan => Route::Pricing,
        }
    }
}

/// Fixed view shown instead of guarded content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestrictedAccessView {
    pub title: &'static str,
    pub message: &'static str,
    pub feature: Feature,
    /// Cheapest plan that would unlock the feature
    pub suggested_plan: Option<String>,
}

impl RestrictedAccessView {
    pub const TITLE: &'static str = "Feature Locked";
    pub const MESSAGE: &'static str =
        "Your current plan doesn't include access to this premium feature. Upgrade your plan to unlock it.";

    pub fn new(catalog: &PlanCatalog, feature: Feature) -> Self {
        RestrictedAccessView {
            title: Self::TITLE,
            message: Self::MESSAGE,
            feature,
            suggested_plan: catalog.cheapest_with(feature).map(|p| p.name.clone()),
        }
    }

    /// Exactly two ways out: back, or to pricing
    pub fn actions(&self) -> [RestrictedAction; 2] {
        [RestrictedAction::GoBack, RestrictedAction::UpgradePlan]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::Plan;
    use crate::store::{seed_plans, MemoryStore, PlanDocument, UserDocument};
    use rust_decimal_macros::dec;

    fn two_tier_catalog() -> PlanCatalog {
        PlanCatalog::from_plans(vec![
            Plan::new("free", "Free", 0, dec!(0), dec!(0)),
            Plan::new("pro", "Pro", 1, dec!(19.99), dec!(199)).with_features([Feature::DataExport]),
        ])
        .unwrap()
    }

    fn store_with_user(plan: &str) -> MemoryStore {
        let store = MemoryStore::new();
        seed_plans(&store, &PlanCatalog::standard()).unwrap();
        store
            .create_user("u1", &UserDocument::new(plan, "Ada", "Lovelace", "ada@example.com"))
            .unwrap();
        store
    }

    #[test]
    fn test_has_access_two_tier_scenario() {
        let catalog = two_tier_catalog();

        assert!(!has_access(&catalog, Some("free"), Feature::DataExport));
        assert!(has_access(&catalog, Some("pro"), Feature::DataExport));
        assert!(!has_access(&catalog, Some("enterprise"), Feature::DataExport));
    }

    #[test]
    fn test_unknown_plan_never_grants() {
        let catalog = PlanCatalog::standard();

        for plan in ["enterprise", "", "PRO", "pro ", "free\0"] {
            for feature in Feature::ALL {
                assert!(!has_access(&catalog, Some(plan), feature), "{} / {}", plan, feature);
            }
        }
    }

    #[test]
    fn test_absent_plan_never_grants() {
        let catalog = PlanCatalog::standard();
        for feature in Feature::ALL {
            assert!(!has_access(&catalog, None, feature));
        }
    }

    #[test]
    fn test_catalog_plans_grant_exactly_their_features() {
        let catalog = PlanCatalog::standard();

        for plan in catalog.plans() {
            for feature in Feature::ALL {
                assert_eq!(
                    has_access(&catalog, Some(&plan.id), feature),
                    plan.features.contains(&feature)
                );
            }
        }
    }

    #[test]
    fn test_resolve_granted() {
        let store = store_with_user("pro");
        let decision = resolve_access(&PlanCatalog::standard(), Some("u1"), &store, Feature::DataExport);

        assert_eq!(decision, AccessDecision::Granted { plan: "pro".to_string() });
        assert_eq!(decision.outcome(), GuardOutcome::Render);
    }

    #[test]
    fn test_resolve_feature_not_included_renders_in_place() {
        let store = store_with_user("free");
        let decision = resolve_access(&PlanCatalog::standard(), Some("u1"), &store, Feature::InvestmentTracking);

        assert!(!decision.is_granted());
        assert_eq!(decision.outcome(), GuardOutcome::RestrictedInPlace);
    }

    #[test]
    fn test_resolve_no_identity_redirects_to_auth() {
        let store = store_with_user("pro");
        let decision = resolve_access(&PlanCatalog::standard(), None, &store, Feature::Budgets);

        assert_eq!(decision.outcome(), GuardOutcome::Redirect(Route::Auth));
    }

    #[test]
    fn test_resolve_missing_profile_redirects_to_restricted() {
        let store = store_with_user("pro");
        let decision = resolve_access(&PlanCatalog::standard(), Some("nobody"), &store, Feature::Budgets);

        assert_eq!(
            decision,
            AccessDecision::Denied { denial: DenialReason::ProfileMissing }
        );
        assert_eq!(decision.outcome(), GuardOutcome::Redirect(Route::RestrictedAccess));
    }

    #[test]
    fn test_resolve_unknown_plan_fails_closed() {
        let store = store_with_user("enterprise");
        store.put_plan("enterprise", &PlanDocument { features: vec!["budgets".into()] }).unwrap();

        let decision = resolve_access(&PlanCatalog::standard(), Some("u1"), &store, Feature::Budgets);

        assert_eq!(
            decision,
            AccessDecision::Denied {
                denial: DenialReason::UnknownPlan { plan: "enterprise".to_string() }
            }
        );
        assert_eq!(decision.outcome(), GuardOutcome::Redirect(Route::RestrictedAccess));
    }

    #[test]
    fn test_resolve_missing_plan_document() {
        let store = MemoryStore::new();
        store.create_user("u1", &UserDocument::new("pro", "", "", "")).unwrap();

        let decision = resolve_access(&PlanCatalog::standard(), Some("u1"), &store, Feature::DataExport);

        assert_eq!(
            decision,
            AccessDecision::Denied {
                denial: DenialReason::PlanDocumentMissing { plan: "pro".to_string() }
            }
        );
    }

    #[test]
    fn test_resolve_store_outage_fails_closed() {
        let store = store_with_user("professional");
        store.set_fail_reads(true);

        let decision = resolve_access(&PlanCatalog::standard(), Some("u1"), &store, Feature::Budgets);

        assert_eq!(
            decision,
            AccessDecision::Denied { denial: DenialReason::ProfileUnavailable }
        );
    }

    #[test]
    fn test_resolve_denies_when_store_and_catalog_disagree() {
        let store = store_with_user("pro");
        // Store says pro has no export; catalog says it does
        store.put_plan("pro", &PlanDocument { features: vec!["budgets".into()] }).unwrap();

        let decision = resolve_access(&PlanCatalog::standard(), Some("u1"), &store, Feature::DataExport);
        assert!(!decision.is_granted());

        // Store grants api_access to pro; catalog does not
        store
            .put_plan("pro", &PlanDocument { features: vec!["api_access".into()] })
            .unwrap();
        let decision = resolve_access(&PlanCatalog::standard(), Some("u1"), &store, Feature::ApiAccess);
        assert!(!decision.is_granted());
    }

    #[test]
    fn test_resolve_ignores_unknown_feature_strings() {
        let store = store_with_user("free");
        store
            .put_plan("free", &PlanDocument { features: vec!["budgets".into(), "pro".into()] })
            .unwrap();

        let decision = resolve_access(&PlanCatalog::standard(), Some("u1"), &store, Feature::Budgets);
        assert!(decision.is_granted());
    }

    #[test]
    fn test_guard_starts_pending() {
        let guard = FeatureGuard::new(Feature::BillReminders);

        assert_eq!(guard.state(), &GuardState::Pending);
        assert_eq!(guard.outcome(), GuardOutcome::Loading);
    }

    #[test]
    fn test_guard_rechecks_on_every_activation() {
        let catalog = PlanCatalog::standard();
        let store = store_with_user("starter");
        let identity = Identity::new("u1");
        let mut guard = FeatureGuard::new(Feature::BillReminders);

        assert_eq!(guard.check(&catalog, Some(&identity), &store), GuardOutcome::Render);

        // Downgrade happens elsewhere; the next activation must see it
        store.set_user_plan("u1", "free").unwrap();
        guard.reset();
        assert_eq!(guard.outcome(), GuardOutcome::Loading);
        assert_eq!(
            guard.check(&catalog, Some(&identity), &store),
            GuardOutcome::RestrictedInPlace
        );
    }

    #[test]
    fn test_guard_outage_after_grant_denies() {
        let catalog = PlanCatalog::standard();
        let store = store_with_user("pro");
        let identity = Identity::new("u1");
        let mut guard = FeatureGuard::new(Feature::DataExport);

        assert_eq!(guard.check(&catalog, Some(&identity), &store), GuardOutcome::Render);

        store.set_fail_reads(true);
        assert_eq!(
            guard.check(&catalog, Some(&identity), &store),
            GuardOutcome::Redirect(Route::RestrictedAccess)
        );
    }

    #[test]
    fn test_restricted_view_has_two_actions() {
        let view = RestrictedAccessView::new(&PlanCatalog::standard(), Feature::InvestmentTracking);
        let actions = view.actions();

        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].route(), Route::Back);
        assert_eq!(actions[1].route(), Route::Pricing);
        assert_eq!(view.suggested_plan.as_deref(), Some("Starter"));
    }

    #[test]
    fn test_guard_outcome_serializes_with_route() {
        let json = serde_json::to_value(GuardOutcome::Redirect(Route::Auth)).unwrap();
        assert_eq!(json, serde_json::json!({"action": "redirect", "route": "auth"}));
    }
}

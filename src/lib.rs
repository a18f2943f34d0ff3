// Finance Dashboard - Core Library
// Plan gating, budgets and session state shared by the CLI, TUI and API server

pub mod plans;      // Plan Catalog - static tiers and features
pub mod access;     // Access Evaluator + FeatureGuard
pub mod pricing;    // Plan comparison and pricing cards
pub mod budget;     // Budget Allocator
pub mod session;    // Session/Plan Provider
pub mod store;      // Document store seam
pub mod db;         // SQLite-backed store
pub mod config;
pub mod format;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use plans::{Feature, Plan, PlanCatalog, CatalogError, DEFAULT_PLAN};
pub use access::{
    has_access, resolve_access,
    AccessDecision, DenialReason, FeatureGuard, GuardOutcome, GuardState,
    RestrictedAccessView, RestrictedAction, Route,
};
pub use pricing::{
    compare, action_for, pricing_cards, price_per_month,
    BillingCycle, PlanAction, PlanOrdering, PricingCard,
};
pub use budget::{
    adjust_category, default_categories, validate_categories,
    Budget, BudgetCategory, BudgetError, BudgetPeriod, BudgetSummary,
};
pub use session::{Identity, SessionProvider, SessionState, UserProfile};
pub use store::{seed_plans, MemoryStore, PlanDocument, PlanStore, UserDocument};
pub use db::{SqliteStore, Event, setup_database, insert_event, get_events_for_entity};
pub use config::AppConfig;
pub use format::{format_currency, separate_thousands};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 📦 Plan Catalog - Static subscription tiers and the features they grant
//
// The catalog is configuration, not data: the document store only tells us
// WHICH plan a user holds. What that plan grants is decided here.

use anyhow::{Context as AnyhowContext, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Plan assigned to every new identity
pub const DEFAULT_PLAN: &str = "free";

// ============================================================================
// FEATURE
// ============================================================================

/// Closed set of gated capabilities.
///
/// Guards and catalog entries both name features through this enum, so a
/// typo in either place is a compile error rather than a silent denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Transaction history and categorization
    Transactions,
    /// Budget planning
    Budgets,
    /// More than two linked accounts
    UnlimitedAccounts,
    /// AI-powered insights on the dashboard
    AiInsights,
    /// Investment portfolio view
    InvestmentTracking,
    /// Bills calendar and reminders
    BillReminders,
    /// CSV/JSON export
    DataExport,
    /// Priority support channel
    PrioritySupport,
    /// API access and data integration
    ApiAccess,
}

impl Feature {
    /// Every feature, in pricing-page order
    pub const ALL: [Feature; 9] = [
        Feature::Transactions,
        Feature::Budgets,
        Feature::UnlimitedAccounts,
        Feature::AiInsights,
        Feature::InvestmentTracking,
        Feature::BillReminders,
        Feature::DataExport,
        Feature::PrioritySupport,
        Feature::ApiAccess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Transactions => "transactions",
            Feature::Budgets => "budgets",
            Feature::UnlimitedAccounts => "unlimited_accounts",
            Feature::AiInsights => "ai_insights",
            Feature::InvestmentTracking => "investment_tracking",
            Feature::BillReminders => "bill_reminders",
            Feature::DataExport => "data_export",
            Feature::PrioritySupport => "priority_support",
            Feature::ApiAccess => "api_access",
        }
    }

    /// Human-readable name for feature lists
    pub fn display_name(&self) -> &'static str {
        match self {
            Feature::Transactions => "Expense tracking and categorization",
            Feature::Budgets => "Budget planning",
            Feature::UnlimitedAccounts => "Track unlimited accounts",
            Feature::AiInsights => "AI-powered insights",
            Feature::InvestmentTracking => "Investment tracking",
            Feature::BillReminders => "Bill reminders",
            Feature::DataExport => "Data export",
            Feature::PrioritySupport => "Priority support",
            Feature::ApiAccess => "API access and data integration",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFeature(pub String);

impl fmt::Display for UnknownFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown feature: {}", self.0)
    }
}

impl std::error::Error for UnknownFeature {}

impl FromStr for Feature {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownFeature(s.to_string()))
    }
}

// ============================================================================
// PLAN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Stable identifier stored on user documents ("free", "pro", ...)
    pub id: String,

    /// Display name ("Free", "Pro", ...)
    pub name: String,

    /// Position in the tier ordering (lower = cheaper)
    pub rank: u32,

    pub monthly_price: Decimal,
    pub annual_price: Decimal,

    #[serde(default)]
    pub description: String,

    pub features: BTreeSet<Feature>,

    /// Emphasized on the pricing page
    #[serde(default)]
    pub highlighted: bool,
}

impl Plan {
    pub fn new(id: &str, name: &str, rank: u32, monthly_price: Decimal, annual_price: Decimal) -> Self {
        Plan {
            id: id.to_string(),
            name: name.to_string(),
            rank,
            monthly_price,
            annual_price,
            description: String::new(),
            features: BTreeSet::new(),
            highlighted: false,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_features<I: IntoIterator<Item = Feature>>(mut self, features: I) -> Self {
        self.features.extend(features);
        self
    }

    pub fn highlighted(mut self) -> Self {
        self.highlighted = true;
        self
    }

    pub fn grants(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn is_free(&self) -> bool {
        self.monthly_price.is_zero() && self.annual_price.is_zero()
    }
}

// ============================================================================
// CATALOG ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    Empty,
    DuplicateId(String),
    RankNotIncreasing { previous: String, plan: String },
    /// A higher tier is missing features a lower tier grants
    CoverageShrinks { lower: String, higher: String, missing: Vec<Feature> },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Empty => write!(f, "plan catalog is empty"),
            CatalogError::DuplicateId(id) => write!(f, "duplicate plan id: {}", id),
            CatalogError::RankNotIncreasing { previous, plan } => {
                write!(f, "plan '{}' does not rank above '{}'", plan, previous)
            }
            CatalogError::CoverageShrinks { lower, higher, missing } => {
                let names: Vec<&str> = missing.iter().map(|m| m.as_str()).collect();
                write!(
                    f,
                    "plan '{}' lacks features granted by '{}': {}",
                    higher,
                    lower,
                    names.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for CatalogError {}

// ============================================================================
// PLAN CATALOG
// ============================================================================

/// Ordered, validated list of plan tiers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    /// Build a catalog, enforcing unique ids, strictly increasing rank and
    /// non-shrinking feature coverage.
    pub fn from_plans(plans: Vec<Plan>) -> Result<Self, CatalogError> {
        if plans.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = BTreeSet::new();
        for plan in &plans {
            if !seen.insert(plan.id.as_str()) {
                return Err(CatalogError::DuplicateId(plan.id.clone()));
            }
        }

        for pair in plans.windows(2) {
            let (lower, higher) = (&pair[0], &pair[1]);

            if higher.rank <= lower.rank {
                return Err(CatalogError::RankNotIncreasing {
                    previous: lower.id.clone(),
                    plan: higher.id.clone(),
                });
            }

            let missing: Vec<Feature> = lower.features.difference(&higher.features).copied().collect();
            if !missing.is_empty() {
                return Err(CatalogError::CoverageShrinks {
                    lower: lower.id.clone(),
                    higher: higher.id.clone(),
                    missing,
                });
            }
        }

        Ok(PlanCatalog { plans })
    }

    /// The canonical four-tier catalog used by pricing and access checks
    pub fn standard() -> Self {
        let free = Plan::new("free", "Free", 0, dec!(0), dec!(0))
            .with_description("Basic tracking for personal finances")
            .with_features([Feature::Transactions, Feature::Budgets]);

        let starter = Plan::new("starter", "Starter", 1, dec!(9.99), dec!(99))
            .with_description("Ideal for individuals starting their financial journey")
            .with_features(free.features.iter().copied())
            .with_features([
                Feature::UnlimitedAccounts,
                Feature::AiInsights,
                Feature::InvestmentTracking,
                Feature::BillReminders,
            ]);

        let pro = Plan::new("pro", "Pro", 2, dec!(19.99), dec!(199))
            .with_description("Perfect for serious budgeters and investors")
            .with_features(starter.features.iter().copied())
            .with_features([Feature::DataExport, Feature::PrioritySupport])
            .highlighted();

        let professional = Plan::new("professional", "Professional", 3, dec!(39.99), dec!(399))
            .with_description("For financial professionals and power users")
            .with_features(pro.features.iter().copied())
            .with_features([Feature::ApiAccess]);

        PlanCatalog {
            plans: vec![free, starter, pro, professional],
        }
    }

    /// Load a catalog from a JSON array of plans
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read plan catalog: {:?}", path.as_ref()))?;

        let plans: Vec<Plan> = serde_json::from_str(&content).context("Failed to parse plan catalog JSON")?;

        Ok(PlanCatalog::from_plans(plans)?)
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    pub fn get(&self, id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.plans.iter().map(|p| p.id.as_str()).collect()
    }

    /// Cheapest tier
    pub fn entry_plan(&self) -> &Plan {
        &self.plans[0]
    }

    /// Lowest-ranked plan granting `feature`
    pub fn cheapest_with(&self, feature: Feature) -> Option<&Plan> {
        self.plans.iter().find(|p| p.grants(feature))
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        PlanCatalog::standard()
    }
}

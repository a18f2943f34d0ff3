// 💳 Pricing - Plan comparison and pricing-page cards
//
// Display only. Nothing in this module is consulted for access control.

use crate::plans::{Feature, Plan, PlanCatalog};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Annual,
}

impl BillingCycle {
    pub fn toggle(&self) -> Self {
        match self {
            BillingCycle::Monthly => BillingCycle::Annual,
            BillingCycle::Annual => BillingCycle::Monthly,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "Monthly",
            BillingCycle::Annual => "Annual",
        }
    }
}

/// Price shown per month: the monthly price, or annual / 12 in cents
pub fn price_per_month(plan: &Plan, cycle: BillingCycle) -> Decimal {
    match cycle {
        BillingCycle::Monthly => plan.monthly_price,
        BillingCycle::Annual => (plan.annual_price / dec!(12))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
    }
}

/// Whole-percent saving of annual billing over twelve monthly payments
pub fn annual_savings_pct(plan: &Plan) -> Decimal {
    let yearly_at_monthly = plan.monthly_price * dec!(12);
    if yearly_at_monthly.is_zero() {
        return Decimal::ZERO;
    }
    ((yearly_at_monthly - plan.annual_price) / yearly_at_monthly * dec!(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

// ============================================================================
// COMPARATOR
// ============================================================================

/// Where a candidate plan sits relative to the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOrdering {
    Lower,
    Same,
    Higher,
}

/// Compare by catalog rank. `None` when either side is absent or unknown.
pub fn compare(catalog: &PlanCatalog, current: Option<&str>, candidate: &str) -> Option<PlanOrdering> {
    let current = catalog.get(current?)?;
    let candidate = catalog.get(candidate)?;

    Some(match candidate.rank.cmp(&current.rank) {
        Ordering::Less => PlanOrdering::Lower,
        Ordering::Equal => PlanOrdering::Same,
        Ordering::Greater => PlanOrdering::Higher,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    CurrentPlan,
    Upgrade,
    Downgrade,
    SignUp,
    GetStarted,
}

impl PlanAction {
    pub fn label(&self) -> &'static str {
        match self {
            PlanAction::CurrentPlan => "Current Plan",
            PlanAction::Upgrade => "Upgrade",
            PlanAction::Downgrade => "Downgrade",
            PlanAction::SignUp => "Sign Up",
            PlanAction::GetStarted => "Get Started",
        }
    }
}

/// Button label for `candidate` given the viewer's current plan
pub fn action_for(catalog: &PlanCatalog, current: Option<&str>, candidate: &Plan) -> PlanAction {
    match compare(catalog, current, &candidate.id) {
        Some(PlanOrdering::Same) => PlanAction::CurrentPlan,
        Some(PlanOrdering::Higher) => PlanAction::Upgrade,
        Some(PlanOrdering::Lower) => PlanAction::Downgrade,
        None if candidate.is_free() => PlanAction::SignUp,
        None => PlanAction::GetStarted,
    }
}

// ============================================================================
// PRICING CARDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureLine {
    pub feature: Feature,
    pub name: &'static str,
    pub included: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingCard {
    pub plan_id: String,
    pub name: String,
    pub description: String,
    pub price_per_month: Decimal,
    pub cycle: BillingCycle,
    pub savings_pct: Decimal,
    pub features: Vec<FeatureLine>,
    pub highlighted: bool,
    pub action: PlanAction,
    pub action_label: &'static str,
}

pub fn pricing_cards(catalog: &PlanCatalog, current: Option<&str>, cycle: BillingCycle) -> Vec<PricingCard> {
    catalog
        .plans()
        .iter()
        .map(|plan| {
            let action = action_for(catalog, current, plan);
            PricingCard {
                plan_id: plan.id.clone(),
                name: plan.name.clone(),
                description: plan.description.clone(),
                price_per_month: price_per_month(plan, cycle),
                cycle,
                savings_pct: annual_savings_pct(plan),
                features: Feature::ALL
                    .iter()
                    .map(|f| FeatureLine {
                        feature: *f,
                        name: f.display_name(),
                        included: plan.grants(*f),
                    })
                    .collect(),
                highlighted: plan.highlighted,
                action,
                action_label: action.label(),
            }
        })
        .collect()
}

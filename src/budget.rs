// 💰 Budget Allocator - Category limits with proportional auto-adjust
//
// Soft budgeting: limits can be exceeded, totals can drift. The only hard
// rules are that labels are unique and no limit goes below zero.

use chrono::{Datelike, Duration, Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ============================================================================
// CATEGORY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCategory {
    pub label: String,
    pub limit: Decimal,
    #[serde(default)]
    pub spent: Decimal,
}

impl BudgetCategory {
    pub fn new(label: &str, limit: Decimal) -> Self {
        BudgetCategory {
            label: label.to_string(),
            limit: limit.max(Decimal::ZERO),
            spent: Decimal::ZERO,
        }
    }

    pub fn with_spent(mut self, spent: Decimal) -> Self {
        self.spent = spent;
        self
    }

    pub fn is_over_budget(&self) -> bool {
        self.spent > self.limit
    }
}

/// Starting allocation for a new budget
pub fn default_categories() -> Vec<BudgetCategory> {
    vec![
        BudgetCategory::new("food", dec!(500)),
        BudgetCategory::new("housing", dec!(1000)),
        BudgetCategory::new("transportation", dec!(200)),
        BudgetCategory::new("utilities", dec!(300)),
        BudgetCategory::new("entertainment", dec!(200)),
        BudgetCategory::new("healthcare", dec!(100)),
        BudgetCategory::new("personal", dec!(150)),
        BudgetCategory::new("other", dec!(100)),
    ]
}

/// Sum of limits, saturating at `Decimal::MAX`
pub fn total_limit(categories: &[BudgetCategory]) -> Decimal {
    categories.iter().fold(Decimal::ZERO, |acc, c| acc.saturating_add(c.limit))
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Category lists arriving from outside (API bodies) break one of the
/// budget rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetError {
    NegativeLimit { label: String },
    DuplicateLabel { label: String },
}

impl fmt::Display for BudgetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetError::NegativeLimit { label } => write!(f, "category '{}' has a negative limit", label),
            BudgetError::DuplicateLabel { label } => write!(f, "category '{}' appears more than once", label),
        }
    }
}

impl std::error::Error for BudgetError {}

/// Labels unique, limits >= 0
pub fn validate_categories(categories: &[BudgetCategory]) -> Result<(), BudgetError> {
    let mut seen = HashSet::new();
    for category in categories {
        if category.limit.is_sign_negative() && !category.limit.is_zero() {
            return Err(BudgetError::NegativeLimit {
                label: category.label.clone(),
            });
        }
        if !seen.insert(category.label.as_str()) {
            return Err(BudgetError::DuplicateLabel {
                label: category.label.clone(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// ALLOCATOR
// ============================================================================

/// Set `target`'s limit and, with `auto_adjust`, spread the change in total
/// across the other categories in proportion to their current limits.
///
/// - `new_limit` is clamped at zero
/// - other limits are clamped at zero
/// - if the others already sum to zero they stay at zero
/// - an unknown `target` returns the categories unchanged
/// - amounts too large to rebalance return the categories unchanged
pub fn adjust_category(
    categories: &[BudgetCategory],
    target: &str,
    new_limit: Decimal,
    auto_adjust: bool,
) -> Vec<BudgetCategory> {
    rebalance(categories, target, new_limit, auto_adjust).unwrap_or_else(|| categories.to_vec())
}

/// `None` when any step overflows
fn rebalance(
    categories: &[BudgetCategory],
    target: &str,
    new_limit: Decimal,
    auto_adjust: bool,
) -> Option<Vec<BudgetCategory>> {
    let mut updated = categories.to_vec();

    let Some(index) = updated.iter().position(|c| c.label == target) else {
        return Some(updated);
    };

    let old_limit = categories[index].limit;
    updated[index].limit = new_limit.max(Decimal::ZERO);

    if !auto_adjust {
        return Some(updated);
    }

    let delta = updated[index].limit.checked_sub(old_limit)?;
    if delta.is_zero() {
        return Some(updated);
    }

    let others_total = categories
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .try_fold(Decimal::ZERO, |acc, (_, c)| acc.checked_add(c.limit))?;

    // Nothing left to take from (or to scale up)
    if others_total.is_zero() {
        return Some(updated);
    }

    // Shares in cents; the rounding remainder lands on the largest other limit
    let mut shares = Vec::with_capacity(categories.len());
    let mut allocated = Decimal::ZERO;
    for (i, c) in categories.iter().enumerate().filter(|(i, _)| *i != index) {
        let ratio = c.limit.checked_div(others_total)?;
        let share = delta.checked_mul(ratio)?.round_dp(2);
        allocated = allocated.checked_add(share)?;
        shares.push((i, share));
    }

    let remainder = delta.checked_sub(allocated)?;
    if let Some(largest) = shares
        .iter_mut()
        .max_by(|a, b| categories[a.0].limit.cmp(&categories[b.0].limit).then(b.0.cmp(&a.0)))
    {
        largest.1 = largest.1.checked_add(remainder)?;
    }

    for (i, share) in shares {
        updated[i].limit = categories[i].limit.checked_sub(share)?.max(Decimal::ZERO);
    }

    Some(updated)
}

// ============================================================================
// BUDGET PERIOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    Weekly,
    #[default]
    Monthly,
}

impl BudgetPeriod {
    pub fn label(&self) -> &'static str {
        match self {
            BudgetPeriod::Weekly => "Weekly",
            BudgetPeriod::Monthly => "Monthly",
        }
    }

    /// Snap `date` to the start of its week (Sunday) or month
    pub fn normalize_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            BudgetPeriod::Weekly => start_of_week(date),
            BudgetPeriod::Monthly => start_of_month(date),
        }
    }

    /// End of the following week or month
    pub fn end_date(&self, start: NaiveDate) -> NaiveDate {
        match self {
            BudgetPeriod::Weekly => start_of_week(start + Duration::weeks(1)) + Duration::days(6),
            BudgetPeriod::Monthly => end_of_month(start.checked_add_months(Months::new(1)).unwrap_or(start)),
        }
    }
}

fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn end_of_month(date: NaiveDate) -> NaiveDate {
    start_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

// ============================================================================
// BUDGET
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub categories: Vec<BudgetCategory>,
    pub auto_adjust: bool,
}

impl Budget {
    /// New budget with the default categories and auto-adjust on
    pub fn new(period: BudgetPeriod, start: NaiveDate) -> Self {
        let start_date = period.normalize_start(start);
        Budget {
            id: uuid::Uuid::new_v4().to_string(),
            period,
            start_date,
            end_date: period.end_date(start_date),
            categories: default_categories(),
            auto_adjust: true,
        }
    }

    pub fn total_budget(&self) -> Decimal {
        total_limit(&self.categories)
    }

    pub fn total_spent(&self) -> Decimal {
        self.categories.iter().fold(Decimal::ZERO, |acc, c| acc.saturating_add(c.spent))
    }

    pub fn category(&self, label: &str) -> Option<&BudgetCategory> {
        self.categories.iter().find(|c| c.label == label)
    }

    pub fn set_period(&mut self, period: BudgetPeriod) {
        self.period = period;
        self.set_start_date(self.start_date);
    }

    pub fn set_start_date(&mut self, date: NaiveDate) {
        self.start_date = self.period.normalize_start(date);
        self.end_date = self.period.end_date(self.start_date);
    }

    pub fn toggle_auto_adjust(&mut self) {
        self.auto_adjust = !self.auto_adjust;
    }

    /// Change one category's limit using this budget's auto-adjust setting
    pub fn set_limit(&mut self, label: &str, new_limit: Decimal) {
        self.categories = adjust_category(&self.categories, label, new_limit, self.auto_adjust);
    }

    /// Add an empty category. Blank or duplicate labels are ignored.
    pub fn add_category(&mut self, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() || self.category(label).is_some() {
            return false;
        }
        self.categories.push(BudgetCategory::new(label, Decimal::ZERO));
        true
    }

    pub fn remove_category(&mut self, label: &str) -> bool {
        let before = self.categories.len();
        self.categories.retain(|c| c.label != label);
        self.categories.len() != before
    }

    pub fn record_spending(&mut self, label: &str, amount: Decimal) -> bool {
        match self.categories.iter_mut().find(|c| c.label == label) {
            Some(category) => {
                category.spent = category.spent.saturating_add(amount);
                true
            }
            None => false,
        }
    }

    pub fn summary(&self) -> BudgetSummary {
        let total_budget = self.total_budget();
        let total_spent = self.total_spent();

        BudgetSummary {
            total_budget,
            total_spent,
            remaining: total_budget.saturating_sub(total_spent),
            progress_pct: percent(total_spent, total_budget),
            categories: self
                .categories
                .iter()
                .map(|c| CategoryProgress {
                    label: c.label.clone(),
                    limit: c.limit,
                    spent: c.spent,
                    progress_pct: percent(c.spent, c.limit),
                    over_budget: c.is_over_budget(),
                })
                .collect(),
        }
    }
}

fn percent(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        part.checked_div(whole)
            .and_then(|ratio| ratio.checked_mul(dec!(100)))
            .map(|pct| pct.round_dp(1))
            .unwrap_or(Decimal::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryProgress {
    pub label: String,
    pub limit: Decimal,
    pub spent: Decimal,
    pub progress_pct: Decimal,
    pub over_budget: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub total_budget: Decimal,
    pub total_spent: Decimal,
    pub remaining: Decimal,
    pub progress_pct: Decimal,
    pub categories: Vec<CategoryProgress>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats(pairs: &[(&str, Decimal)]) -> Vec<BudgetCategory> {
        pairs.iter().map(|(l, v)| BudgetCategory::new(l, *v)).collect()
    }

    fn limit_of(categories: &[BudgetCategory], label: &str) -> Decimal {
        categories.iter().find(|c| c.label == label).unwrap().limit
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_food_housing_scenario() {
        let categories = cats(&[("food", dec!(500)), ("housing", dec!(1000))]);
        let updated = adjust_category(&categories, "food", dec!(600), true);

        assert_eq!(limit_of(&updated, "food"), dec!(600));
        assert_eq!(limit_of(&updated, "housing"), dec!(900));
    }

    #[test]
    fn test_degenerate_zero_others() {
        let categories = cats(&[("a", dec!(100)), ("b", dec!(0)), ("c", dec!(0))]);
        let updated = adjust_category(&categories, "a", dec!(50), true);

        assert_eq!(limit_of(&updated, "a"), dec!(50));
        assert_eq!(limit_of(&updated, "b"), Decimal::ZERO);
        assert_eq!(limit_of(&updated, "c"), Decimal::ZERO);
    }

    #[test]
    fn test_zero_others_with_increase() {
        let categories = cats(&[("a", dec!(100)), ("b", dec!(0))]);
        let updated = adjust_category(&categories, "a", dec!(250), true);

        assert_eq!(limit_of(&updated, "a"), dec!(250));
        assert_eq!(limit_of(&updated, "b"), Decimal::ZERO);
    }

    #[test]
    fn test_proportional_split() {
        let categories = cats(&[("food", dec!(100)), ("rent", dec!(300)), ("fun", dec!(100))]);
        let updated = adjust_category(&categories, "food", dec!(180), true);

        // +80 taken 3:1 from rent and fun
        assert_eq!(limit_of(&updated, "rent"), dec!(240));
        assert_eq!(limit_of(&updated, "fun"), dec!(80));
        assert_eq!(total_limit(&updated), total_limit(&categories));
    }

    #[test]
    fn test_uneven_split_keeps_total_exact() {
        let categories = default_categories();
        let updated = adjust_category(&categories, "food", dec!(700), true);

        assert_eq!(total_limit(&updated), dec!(2550));
        // 200 * 300 / 2050 = 29.268...
        assert_eq!(limit_of(&updated, "utilities"), dec!(270.73));
        assert!(updated.iter().all(|c| c.limit.scale() <= 2));
    }

    #[test]
    fn test_quadrillion_limits_rebalance() {
        let categories = cats(&[("a", dec!(1000000000000000)), ("b", dec!(1000000000000000))]);
        let updated = adjust_category(&categories, "a", dec!(3000000000000000), true);

        assert_eq!(limit_of(&updated, "a"), dec!(3000000000000000));
        assert_eq!(limit_of(&updated, "b"), Decimal::ZERO);

        let updated = adjust_category(&categories, "a", dec!(1500000000000000), true);
        assert_eq!(limit_of(&updated, "b"), dec!(500000000000000));
        assert_eq!(total_limit(&updated), dec!(2000000000000000));
    }

    #[test]
    fn test_extreme_limits_never_panic() {
        let categories = cats(&[("a", dec!(1000000000000000)), ("b", dec!(1000000000000000))]);
        let updated = adjust_category(&categories, "a", Decimal::MAX, true);
        assert_eq!(limit_of(&updated, "a"), Decimal::MAX);
        assert_eq!(limit_of(&updated, "b"), Decimal::ZERO);

        // Growing b by MAX overflows: the input comes back unchanged
        let maxed = cats(&[("a", Decimal::MAX), ("b", Decimal::MAX)]);
        assert_eq!(adjust_category(&maxed, "a", Decimal::ZERO, true), maxed);
        assert_eq!(total_limit(&maxed), Decimal::MAX);
    }

    #[test]
    fn test_validate_categories() {
        assert!(validate_categories(&default_categories()).is_ok());

        let negative = vec![BudgetCategory {
            label: "c".to_string(),
            limit: dec!(-100),
            spent: Decimal::ZERO,
        }];
        assert_eq!(
            validate_categories(&negative),
            Err(BudgetError::NegativeLimit { label: "c".to_string() })
        );

        let duplicate = cats(&[("food", dec!(1)), ("food", dec!(2))]);
        assert_eq!(
            validate_categories(&duplicate),
            Err(BudgetError::DuplicateLabel { label: "food".to_string() })
        );
    }

    #[test]
    fn test_decrease_grows_others() {
        let categories = cats(&[("food", dec!(500)), ("housing", dec!(1000))]);
        let updated = adjust_category(&categories, "food", dec!(400), true);

        assert_eq!(limit_of(&updated, "housing"), dec!(1100));
    }

    #[test]
    fn test_others_clamped_at_zero() {
        let categories = cats(&[("food", dec!(100)), ("fun", dec!(50))]);
        let updated = adjust_category(&categories, "food", dec!(1000), true);

        assert_eq!(limit_of(&updated, "food"), dec!(1000));
        assert_eq!(limit_of(&updated, "fun"), Decimal::ZERO);
    }

    #[test]
    fn test_negative_limit_clamped() {
        let categories = cats(&[("food", dec!(100)), ("fun", dec!(50))]);
        let updated = adjust_category(&categories, "food", dec!(-20), false);

        assert_eq!(limit_of(&updated, "food"), Decimal::ZERO);
        assert_eq!(limit_of(&updated, "fun"), dec!(50));
    }

    #[test]
    fn test_auto_adjust_off_lets_total_drift() {
        let categories = cats(&[("food", dec!(500)), ("housing", dec!(1000))]);
        let updated = adjust_category(&categories, "food", dec!(800), false);

        assert_eq!(limit_of(&updated, "housing"), dec!(1000));
        assert_eq!(total_limit(&updated), dec!(1800));
    }

    #[test]
    fn test_unknown_target_is_noop() {
        let categories = default_categories();
        assert_eq!(adjust_category(&categories, "yachts", dec!(9000), true), categories);
    }

    #[test]
    fn test_adjust_is_idempotent() {
        let categories = default_categories();

        let first = adjust_category(&categories, "housing", dec!(1234.56), true);
        let second = adjust_category(&categories, "housing", dec!(1234.56), true);
        assert_eq!(first, second);
    }

    #[test]
    fn test_sum_invariant_and_no_negatives() {
        let categories = default_categories();

        for new_limit in [dec!(0), dec!(1), dec!(333.33), dec!(1500), dec!(2550), dec!(99999)] {
            let updated = adjust_category(&categories, "utilities", new_limit, true);
            let others: Decimal = updated.iter().filter(|c| c.label != "utilities").map(|c| c.limit).sum();

            assert_eq!(total_limit(&updated), limit_of(&updated, "utilities") + others);
            assert!(updated.iter().all(|c| c.limit >= Decimal::ZERO));
        }
    }

    #[test]
    fn test_weekly_period_dates() {
        // 2024-05-15 is a Wednesday
        let budget = Budget::new(BudgetPeriod::Weekly, date(2024, 5, 15));

        assert_eq!(budget.start_date, date(2024, 5, 12));
        assert_eq!(budget.end_date, date(2024, 5, 25));
    }

    #[test]
    fn test_monthly_period_dates() {
        let budget = Budget::new(BudgetPeriod::Monthly, date(2024, 1, 20));

        assert_eq!(budget.start_date, date(2024, 1, 1));
        assert_eq!(budget.end_date, date(2024, 2, 29));
    }

    #[test]
    fn test_set_period_renormalizes() {
        let mut budget = Budget::new(BudgetPeriod::Monthly, date(2024, 5, 15));
        budget.set_period(BudgetPeriod::Weekly);

        // May 1st 2024 is a Wednesday
        assert_eq!(budget.start_date, date(2024, 4, 28));
    }

    #[test]
    fn test_budget_defaults_total() {
        let budget = Budget::new(BudgetPeriod::Monthly, date(2024, 5, 1));

        assert_eq!(budget.total_budget(), dec!(2550));
        assert!(budget.auto_adjust);
    }

    #[test]
    fn test_budget_set_limit_uses_toggle() {
        let mut budget = Budget::new(BudgetPeriod::Monthly, date(2024, 5, 1));

        budget.set_limit("food", dec!(700));
        assert_eq!(budget.total_budget(), dec!(2550));

        budget.toggle_auto_adjust();
        budget.set_limit("food", dec!(800));
        assert_eq!(budget.total_budget(), dec!(2650));
    }

    #[test]
    fn test_add_and_remove_categories() {
        let mut budget = Budget::new(BudgetPeriod::Monthly, date(2024, 5, 1));

        assert!(budget.add_category("pets"));
        assert!(!budget.add_category("pets"));
        assert!(!budget.add_category("   "));
        assert_eq!(budget.category("pets").unwrap().limit, Decimal::ZERO);

        assert!(budget.remove_category("pets"));
        assert!(!budget.remove_category("pets"));
    }

    #[test]
    fn test_summary_progress() {
        let mut budget = Budget::new(BudgetPeriod::Monthly, date(2024, 5, 1));
        budget.record_spending("food", dec!(350));
        budget.record_spending("housing", dec!(1000));
        budget.record_spending("healthcare", dec!(150));

        let summary = budget.summary();
        assert_eq!(summary.total_spent, dec!(1500));
        assert_eq!(summary.remaining, dec!(1050));
        assert_eq!(summary.progress_pct, dec!(58.8));

        let healthcare = summary.categories.iter().find(|c| c.label == "healthcare").unwrap();
        assert!(healthcare.over_budget);
        assert_eq!(healthcare.progress_pct, dec!(150));
    }

    #[test]
    fn test_summary_zero_budget() {
        let mut budget = Budget::new(BudgetPeriod::Monthly, date(2024, 5, 1));
        budget.categories = vec![BudgetCategory::new("food", Decimal::ZERO).with_spent(dec!(10))];

        let summary = budget.summary();
        assert_eq!(summary.progress_pct, Decimal::ZERO);
        assert!(summary.categories[0].over_budget);
    }
}

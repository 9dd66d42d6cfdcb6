//! Dashboard aggregation.
//!
//! Pure functions that turn an owner's expenses, production records and
//! sales into summary metrics, a per-day trend and a cost breakdown.
//! Nothing here keeps state between calls; callers recompute from a fresh
//! snapshot whenever the records change.
//!
//! Every function is total. Sums saturate at `Decimal::MAX` / `u64::MAX`,
//! and a percentage too large to represent saturates at `Decimal::MIN` or
//! `Decimal::MAX` following its sign.

use crate::models::{
    CategoryShare, Dashboard, Expense, ExpenseCategory, ProductionRecord, RecordSet, Sale,
    SummaryMetrics, TrendPoint,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Number of most recent days shown in the trend unless configured otherwise.
pub const DEFAULT_TREND_WINDOW: usize = 14;

/// Calendar-day bucket key for a timestamp (its UTC day).
pub fn day_key(date: &DateTime<Utc>) -> NaiveDate {
    date.date_naive()
}

/// Compute the scalar dashboard metrics.
pub fn compute_summary(
    expenses: &[Expense],
    production: &[ProductionRecord],
    sales: &[Sale],
) -> SummaryMetrics {
    let total_expenses = expenses
        .iter()
        .fold(Decimal::ZERO, |acc, e| acc.saturating_add(e.cost));
    let total_revenue = sales
        .iter()
        .fold(Decimal::ZERO, |acc, s| acc.saturating_add(s.value));
    let total_eggs = production
        .iter()
        .fold(0u64, |acc, p| acc.saturating_add(p.eggs_produced));
    let net_profit = total_revenue.saturating_sub(total_expenses);
    let margin_percent = percent_of(net_profit, total_revenue);

    SummaryMetrics {
        total_expenses,
        total_revenue,
        total_eggs,
        net_profit,
        margin_percent,
    }
}

/// Build the per-day production/revenue trend.
///
/// Days with any production or sale get one point; the result is sorted
/// ascending and limited to the most recent `window` days.
pub fn compute_trend(production: &[ProductionRecord], sales: &[Sale], window: usize) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<NaiveDate, TrendPoint> = BTreeMap::new();

    for record in production {
        let key = day_key(&record.date);
        let point = buckets.entry(key).or_insert_with(|| TrendPoint::empty(key));
        point.eggs_produced = point.eggs_produced.saturating_add(record.eggs_produced);
    }

    for sale in sales {
        let key = day_key(&sale.date);
        let point = buckets.entry(key).or_insert_with(|| TrendPoint::empty(key));
        point.revenue = point.revenue.saturating_add(sale.value);
    }

    let skip = buckets.len().saturating_sub(window);
    buckets.into_values().skip(skip).collect()
}

/// Total cost per expense category, in first-seen order.
pub fn compute_category_distribution(expenses: &[Expense]) -> Vec<CategoryShare> {
    let mut shares: Vec<CategoryShare> = Vec::new();
    let mut index: HashMap<ExpenseCategory, usize> = HashMap::new();

    for expense in expenses {
        let slot = *index.entry(expense.category).or_insert_with(|| {
            shares.push(CategoryShare {
                category: expense.category,
                total_cost: Decimal::ZERO,
            });
            shares.len() - 1
        });
        shares[slot].total_cost = shares[slot].total_cost.saturating_add(expense.cost);
    }

    shares
}

/// Run every aggregation over one snapshot.
pub fn compute_dashboard(records: &RecordSet, trend_window: usize) -> Dashboard {
    debug!(
        "Aggregating {} expenses, {} production records, {} sales (window {})",
        records.expenses.len(),
        records.production.len(),
        records.sales.len(),
        trend_window
    );

    let trend = compute_trend(&records.production, &records.sales, trend_window);
    if let (Some(first), Some(last)) = (trend.first(), trend.last()) {
        debug!("Trend covers {} to {}", first.date_key(), last.date_key());
    }

    Dashboard {
        summary: compute_summary(&records.expenses, &records.production, &records.sales),
        trend,
        categories: compute_category_distribution(&records.expenses),
    }
}

/// Share of total expenses spent on a category, as a percentage.
pub fn category_share_percent(share: &CategoryShare, total_expenses: Decimal) -> Decimal {
    percent_of(share.total_cost, total_expenses)
}

/// `part / whole * 100`; zero when `whole` is not positive.
fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(if part.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_date, Owner};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn at(date: &str) -> DateTime<Utc> {
        parse_date(date).unwrap()
    }

    fn expense(category: ExpenseCategory, cost: Decimal) -> Expense {
        Expense {
            id: format!("e-{}", cost),
            owner: Owner::from("demo"),
            category,
            description: "Test expense".to_string(),
            cost,
            date: at("2023-10-01"),
        }
    }

    fn production(date: &str, eggs: u64) -> ProductionRecord {
        ProductionRecord {
            id: format!("p-{}-{}", date, eggs),
            owner: Owner::from("demo"),
            date: at(date),
            eggs_produced: eggs,
            feed_consumed_kg: dec!(15),
        }
    }

    fn sale(date: &str, value: Decimal) -> Sale {
        Sale {
            id: format!("s-{}", date),
            owner: Owner::from("demo"),
            date: at(date),
            quantity: 100,
            value,
            client: None,
        }
    }

    fn demo_expenses() -> Vec<Expense> {
        vec![
            expense(ExpenseCategory::Feed, dec!(150.00)),
            expense(ExpenseCategory::Medicine, dec!(45.50)),
            expense(ExpenseCategory::Other, dec!(80.00)),
        ]
    }

    fn demo_sales() -> Vec<Sale> {
        vec![
            sale("2023-10-01", dec!(80.00)),
            sale("2023-10-02", dec!(72.00)),
            sale("2023-10-03", dec!(96.00)),
        ]
    }

    #[test]
    fn test_summary_empty() {
        let summary = compute_summary(&[], &[], &[]);
        assert_eq!(summary, SummaryMetrics::default());
        assert_eq!(summary.margin_percent, Decimal::ZERO);
    }

    #[test]
    fn test_summary_demo_data() {
        let production = vec![production("2023-10-01", 120), production("2023-10-02", 115)];
        let summary = compute_summary(&demo_expenses(), &production, &demo_sales());

        assert_eq!(summary.total_expenses, dec!(275.50));
        assert_eq!(summary.total_revenue, dec!(248.00));
        assert_eq!(summary.total_eggs, 235);
        assert_eq!(summary.net_profit, dec!(-27.50));
        assert_eq!(summary.margin_percent.round_dp(2), dec!(-11.09));
        assert_eq!(
            summary.net_profit,
            summary.total_revenue - summary.total_expenses
        );
    }

    #[test]
    fn test_summary_no_revenue_margin_is_zero() {
        let summary = compute_summary(&demo_expenses(), &[], &[sale("2023-10-01", dec!(0))]);
        assert_eq!(summary.total_revenue, Decimal::ZERO);
        assert_eq!(summary.net_profit, dec!(-275.50));
        assert_eq!(summary.margin_percent, Decimal::ZERO);
    }

    #[test]
    fn test_summary_huge_loss_saturates_margin() {
        let cost = Decimal::from_i128_with_scale(10i128.pow(27), 0);
        let summary = compute_summary(
            &[expense(ExpenseCategory::Feed, cost)],
            &[],
            &[sale("2023-10-01", dec!(0.01))],
        );

        assert_eq!(summary.net_profit, dec!(0.01) - cost);
        assert_eq!(summary.margin_percent, Decimal::MIN);
    }

    #[test]
    fn test_summary_sums_saturate() {
        let expenses = vec![
            expense(ExpenseCategory::Feed, Decimal::MAX),
            expense(ExpenseCategory::Feed, Decimal::MAX),
        ];
        let production = vec![production("2023-10-01", u64::MAX), production("2023-10-02", 1)];
        let summary = compute_summary(&expenses, &production, &[]);

        assert_eq!(summary.total_expenses, Decimal::MAX);
        assert_eq!(summary.total_eggs, u64::MAX);
        assert_eq!(summary.net_profit, Decimal::MIN);
        assert_eq!(summary.margin_percent, Decimal::ZERO);

        let categories = compute_category_distribution(&expenses);
        assert_eq!(categories[0].total_cost, Decimal::MAX);
        assert_eq!(category_share_percent(&categories[0], Decimal::MAX), dec!(100));
    }

    #[test]
    fn test_trend_same_day_merges() {
        let records = vec![production("2023-10-01", 120), production("2023-10-01", 30)];
        let trend = compute_trend(&records, &[], DEFAULT_TREND_WINDOW);

        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0].date_key(), "2023-10-01");
        assert_eq!(trend[0].eggs_produced, 150);
        assert_eq!(trend[0].revenue, Decimal::ZERO);
    }

    #[test]
    fn test_trend_same_day_different_times() {
        let records = vec![
            production("2023-10-01T06:00:00Z", 60),
            production("2023-10-01T18:45:00Z", 40),
        ];
        let trend = compute_trend(&records, &[sale("2023-10-01T12:00:00Z", dec!(9.5))], 14);

        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0].eggs_produced, 100);
        assert_eq!(trend[0].revenue, dec!(9.5));
    }

    #[test]
    fn test_trend_joins_production_and_sales() {
        let records = vec![production("2023-10-02", 115), production("2023-10-04", 125)];
        let trend = compute_trend(&records, &demo_sales(), 14);

        let keys: Vec<_> = trend.iter().map(|p| p.date_key()).collect();
        assert_eq!(keys, vec!["2023-10-01", "2023-10-02", "2023-10-03", "2023-10-04"]);

        assert_eq!(trend[0].eggs_produced, 0);
        assert_eq!(trend[0].revenue, dec!(80.00));
        assert_eq!(trend[1].eggs_produced, 115);
        assert_eq!(trend[1].revenue, dec!(72.00));
        assert_eq!(trend[3].eggs_produced, 125);
        assert_eq!(trend[3].revenue, Decimal::ZERO);
    }

    #[test]
    fn test_trend_keeps_most_recent_window() {
        let start = at("2023-10-01");
        let records: Vec<_> = (0..20)
            .rev()
            .map(|offset| {
                let date = (start + Duration::days(offset)).format("%Y-%m-%d").to_string();
                production(&date, 10 + offset as u64)
            })
            .collect();

        let trend = compute_trend(&records, &[], 14);

        assert_eq!(trend.len(), 14);
        assert_eq!(trend.first().unwrap().date_key(), "2023-10-07");
        assert_eq!(trend.last().unwrap().date_key(), "2023-10-20");
        assert!(trend.windows(2).all(|w| w[0].date < w[1].date));

        let retained: u64 = trend.iter().map(|p| p.eggs_produced).sum();
        let expected: u64 = (6..20).map(|offset| 10 + offset).sum();
        assert_eq!(retained, expected);
    }

    #[test]
    fn test_trend_short_series_keeps_all_eggs() {
        let records = vec![
            production("2023-10-03", 130),
            production("2023-10-01", 120),
            production("2023-10-02", 115),
        ];
        let trend = compute_trend(&records, &[], 14);
        let summary = compute_summary(&[], &records, &[]);

        assert_eq!(trend.len(), 3);
        let total: u64 = trend.iter().map(|p| p.eggs_produced).sum();
        assert_eq!(total, summary.total_eggs);
    }

    #[test]
    fn test_trend_input_order_independent() {
        let mut records = vec![
            production("2023-10-01", 1),
            production("2023-10-02", 2),
            production("2023-10-01", 3),
        ];
        let forward = compute_trend(&records, &demo_sales(), 14);
        records.reverse();
        let backward = compute_trend(&records, &demo_sales(), 14);

        assert_eq!(forward, backward);
    }

    #[test]
    fn test_trend_zero_window() {
        let records = vec![production("2023-10-01", 120)];
        assert!(compute_trend(&records, &[], 0).is_empty());
        assert!(compute_trend(&[], &[], 14).is_empty());
    }

    #[test]
    fn test_category_distribution() {
        let shares = compute_category_distribution(&demo_expenses());

        assert_eq!(shares.len(), 3);
        assert_eq!(shares[0].category, ExpenseCategory::Feed);
        assert_eq!(shares[0].total_cost, dec!(150.00));
        assert_eq!(shares[1].category, ExpenseCategory::Medicine);
        assert_eq!(shares[2].category, ExpenseCategory::Other);

        let total: Decimal = shares.iter().map(|s| s.total_cost).sum();
        assert_eq!(total, dec!(275.50));
    }

    #[test]
    fn test_category_distribution_first_seen_order() {
        let expenses = vec![
            expense(ExpenseCategory::Other, dec!(10)),
            expense(ExpenseCategory::Feed, dec!(20)),
            expense(ExpenseCategory::Other, dec!(5.25)),
        ];
        let shares = compute_category_distribution(&expenses);

        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].category, ExpenseCategory::Other);
        assert_eq!(shares[0].total_cost, dec!(15.25));
        assert_eq!(shares[1].category, ExpenseCategory::Feed);

        let total: Decimal = shares.iter().map(|s| s.total_cost).sum();
        assert_eq!(total, compute_summary(&expenses, &[], &[]).total_expenses);
    }

    #[test]
    fn test_dashboard_is_idempotent() {
        let records = RecordSet {
            expenses: demo_expenses(),
            production: vec![production("2023-10-01", 120), production("2023-10-01", 30)],
            sales: demo_sales(),
        };
        let before = records.clone();

        let first = compute_dashboard(&records, DEFAULT_TREND_WINDOW);
        let second = compute_dashboard(&records, DEFAULT_TREND_WINDOW);

        assert_eq!(first, second);
        assert_eq!(records, before);
        assert_eq!(first.trend[0].eggs_produced, 150);
    }

    #[test]
    fn test_category_share_percent() {
        let share = CategoryShare {
            category: ExpenseCategory::Feed,
            total_cost: dec!(150),
        };
        assert_eq!(category_share_percent(&share, dec!(300)), dec!(50));
        assert_eq!(category_share_percent(&share, Decimal::ZERO), Decimal::ZERO);
    }
}

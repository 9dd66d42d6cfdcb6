//! Data models for the dashboard.
//!
//! This module contains the record types supplied by the data layer
//! (expenses, production, sales), the values derived from them by the
//! aggregator, and the report envelope written by the CLI.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of the user or session that owns a record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Owner {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Category of an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum ExpenseCategory {
    /// Feed purchases
    Feed,
    /// Vaccines, vitamins, treatments
    Medicine,
    /// Anything else (repairs, packaging, ...)
    Other,
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpenseCategory::Feed => write!(f, "Feed"),
            ExpenseCategory::Medicine => write!(f, "Medicine"),
            ExpenseCategory::Other => write!(f, "Other"),
        }
    }
}

impl FromStr for ExpenseCategory {
    type Err = String;

    /// Accepts the English names (any case) and the Portuguese labels
    /// found in older data exports.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "feed" | "ração" | "racao" => Ok(ExpenseCategory::Feed),
            "medicine" | "medicamento" => Ok(ExpenseCategory::Medicine),
            "other" | "outro" => Ok(ExpenseCategory::Other),
            other => Err(format!(
                "Unknown expense category '{}' (expected feed, medicine or other)",
                other
            )),
        }
    }
}

impl TryFrom<String> for ExpenseCategory {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The three kinds of records kept per owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Expense,
    Production,
    Sale,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Expense => write!(f, "expense"),
            RecordKind::Production => write!(f, "production"),
            RecordKind::Sale => write!(f, "sale"),
        }
    }
}

/// A single expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub owner: Owner,
    pub category: ExpenseCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub cost: Decimal,
    #[serde(deserialize_with = "lenient::date")]
    pub date: DateTime<Utc>,
}

/// Eggs collected and feed consumed on a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub id: String,
    pub owner: Owner,
    #[serde(deserialize_with = "lenient::date")]
    pub date: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub eggs_produced: u64,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub feed_consumed_kg: Decimal,
}

/// A sale of eggs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub owner: Owner,
    #[serde(deserialize_with = "lenient::date")]
    pub date: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub quantity: u64,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
}

/// A stored record of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Expense(Expense),
    Production(ProductionRecord),
    Sale(Sale),
}

/// All records of one owner: the snapshot handed to the aggregator.
///
/// Collections are kept newest-first by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub production: Vec<ProductionRecord>,
    #[serde(default)]
    pub sales: Vec<Sale>,
}

impl RecordSet {
    /// Total number of records across all kinds.
    pub fn len(&self) -> usize {
        self.expenses.len() + self.production.len() + self.sales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a record, keeping its collection ordered newest-first.
    pub fn insert(&mut self, record: Record) {
        match record {
            Record::Expense(expense) => self.expenses.push(expense),
            Record::Production(production) => self.production.push(production),
            Record::Sale(sale) => self.sales.push(sale),
        }
        self.sort_newest_first();
    }

    /// Remove the record of the given kind with the given id.
    ///
    /// Returns `false` if no such record exists.
    pub fn remove(&mut self, kind: RecordKind, id: &str) -> bool {
        fn remove_by_id<T>(items: &mut Vec<T>, id: &str, key: impl Fn(&T) -> &str) -> bool {
            let before = items.len();
            items.retain(|item| key(item) != id);
            items.len() != before
        }

        match kind {
            RecordKind::Expense => remove_by_id(&mut self.expenses, id, |e| e.id.as_str()),
            RecordKind::Production => remove_by_id(&mut self.production, id, |p| p.id.as_str()),
            RecordKind::Sale => remove_by_id(&mut self.sales, id, |s| s.id.as_str()),
        }
    }

    /// Order every collection by date, most recent first. Ties keep insertion order.
    pub fn sort_newest_first(&mut self) {
        self.expenses.sort_by(|a, b| b.date.cmp(&a.date));
        self.production.sort_by(|a, b| b.date.cmp(&a.date));
        self.sales.sort_by(|a, b| b.date.cmp(&a.date));
    }
}

/// Payload for a new expense; the store assigns `id` and `owner`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub category: ExpenseCategory,
    pub description: String,
    pub cost: Decimal,
    pub date: DateTime<Utc>,
}

/// Payload for a new production record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduction {
    pub date: DateTime<Utc>,
    pub eggs_produced: u64,
    pub feed_consumed_kg: Decimal,
}

/// Payload for a new sale.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSale {
    pub date: DateTime<Utc>,
    pub quantity: u64,
    pub value: Decimal,
    pub client: Option<String>,
}

/// A record about to be added to a store.
#[derive(Debug, Clone, PartialEq)]
pub enum NewRecord {
    Expense(NewExpense),
    Production(NewProduction),
    Sale(NewSale),
}

impl NewRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            NewRecord::Expense(_) => RecordKind::Expense,
            NewRecord::Production(_) => RecordKind::Production,
            NewRecord::Sale(_) => RecordKind::Sale,
        }
    }

    /// Check the payload before it reaches storage.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            NewRecord::Expense(expense) => {
                if expense.description.trim().is_empty() {
                    return Err("Expense description must not be empty".to_string());
                }
                if expense.cost.is_sign_negative() && !expense.cost.is_zero() {
                    return Err(format!("Expense cost must not be negative: {}", expense.cost));
                }
            }
            NewRecord::Production(production) => {
                if production.feed_consumed_kg.is_sign_negative()
                    && !production.feed_consumed_kg.is_zero()
                {
                    return Err(format!(
                        "Feed consumed must not be negative: {}",
                        production.feed_consumed_kg
                    ));
                }
            }
            NewRecord::Sale(sale) => {
                if sale.value.is_sign_negative() && !sale.value.is_zero() {
                    return Err(format!("Sale value must not be negative: {}", sale.value));
                }
            }
        }
        Ok(())
    }

    /// Turn the payload into a stored record.
    pub fn into_record(self, id: String, owner: Owner) -> Record {
        match self {
            NewRecord::Expense(e) => Record::Expense(Expense {
                id,
                owner,
                category: e.category,
                description: e.description.trim().to_string(),
                cost: e.cost,
                date: e.date,
            }),
            NewRecord::Production(p) => Record::Production(ProductionRecord {
                id,
                owner,
                date: p.date,
                eggs_produced: p.eggs_produced,
                feed_consumed_kg: p.feed_consumed_kg,
            }),
            NewRecord::Sale(s) => Record::Sale(Sale {
                id,
                owner,
                date: s.date,
                quantity: s.quantity,
                value: s.value,
                client: s
                    .client
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty()),
            }),
        }
    }
}

/// Scalar dashboard metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub total_expenses: Decimal,
    pub total_revenue: Decimal,
    pub total_eggs: u64,
    /// `total_revenue - total_expenses`; negative on a loss.
    pub net_profit: Decimal,
    /// Net profit as a percentage of revenue; zero when there is no revenue.
    pub margin_percent: Decimal,
}

/// One calendar day of the production/sales trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Calendar day, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub eggs_produced: u64,
    pub revenue: Decimal,
}

impl TrendPoint {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            eggs_produced: 0,
            revenue: Decimal::ZERO,
        }
    }

    /// Canonical bucket key, `YYYY-MM-DD`.
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Short chart label, `DD/MM`.
    pub fn day_label(&self) -> String {
        self.date.format("%d/%m").to_string()
    }
}

/// Total cost spent on one expense category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: ExpenseCategory,
    pub total_cost: Decimal,
}

/// Everything the dashboard shows, derived from one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub summary: SummaryMetrics,
    pub trend: Vec<TrendPoint>,
    pub categories: Vec<CategoryShare>,
}

/// Metadata about a rendered dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Owner the records belong to.
    pub owner: Owner,
    /// When the dashboard was generated.
    pub generated_at: DateTime<Utc>,
    /// Store backend the records came from.
    pub backend: String,
    pub expense_count: usize,
    pub production_count: usize,
    pub sale_count: usize,
    /// Number of most recent days kept in the trend.
    pub trend_window: usize,
}

/// The complete dashboard report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    pub metadata: ReportMetadata,
    pub dashboard: Dashboard,
}

/// Parse a user-entered amount. Accepts `.` or `,` as decimal separator.
///
/// When both appear, the last one is the decimal separator and the other
/// groups thousands: `1.234,56` and `1,234.56` are both 1234.56. A lone
/// separator is always decimal, so `1.234` is 1.234.
pub fn parse_decimal(input: &str) -> Option<Decimal> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = match (trimmed.rfind(','), trimmed.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => trimmed.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => trimmed.replace(',', ""),
        _ => trimmed.replace(',', "."),
    };
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()
}

/// Parse a date given as RFC 3339, `YYYY-MM-DDTHH:MM:SS` or plain `YYYY-MM-DD`.
///
/// Values without an offset are taken as UTC; plain dates are midnight UTC.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Lenient field deserializers used when reading persisted records.
///
/// Numeric fields never fail: unparseable or negative values become zero
/// and a warning is logged. Dates that cannot be understood fail the
/// record, which the store then skips.
pub mod lenient {
    use super::{parse_date, parse_decimal};
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use tracing::warn;

    pub fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(coerce_amount(&value))
    }

    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(coerce_count(&value))
    }

    pub fn date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        coerce_date(&value).ok_or_else(|| D::Error::custom(format!("invalid date: {}", value)))
    }

    /// Coerce a JSON value into a non-negative decimal.
    pub fn coerce_amount(value: &Value) -> Decimal {
        let parsed = match value {
            Value::Number(n) => parse_decimal(&n.to_string()),
            Value::String(s) => parse_decimal(s),
            _ => None,
        };

        match parsed {
            Some(amount) if amount.is_sign_negative() && !amount.is_zero() => {
                warn!("Negative amount {} coerced to 0", amount);
                Decimal::ZERO
            }
            Some(amount) => amount,
            None => {
                warn!("Unparseable amount {} coerced to 0", value);
                Decimal::ZERO
            }
        }
    }

    /// Coerce a JSON value into a non-negative whole count.
    pub fn coerce_count(value: &Value) -> u64 {
        let parsed = match value {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f.trunc() as u64)
            }),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };

        parsed.unwrap_or_else(|| {
            warn!("Unparseable count {} coerced to 0", value);
            0
        })
    }

    /// Coerce a JSON value into a timestamp.
    ///
    /// Accepts date strings, epoch milliseconds, and `{seconds, nanoseconds}`
    /// timestamp objects.
    pub fn coerce_date(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => parse_date(s),
            Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
            Value::Object(map) => {
                let seconds = map.get("seconds")?.as_i64()?;
                let nanos = map
                    .get("nanoseconds")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
            }
            _ => None,
        }
    }
}

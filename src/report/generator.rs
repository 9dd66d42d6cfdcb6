//! Markdown dashboard generation.
//!
//! This module renders a [`DashboardReport`] as Markdown (stat cards, trend
//! table, cost distribution) or JSON, and renders plain record listings.

use super::format::NumberFormatter;
use crate::analysis::category_share_percent;
use crate::models::{
    CategoryShare, DashboardReport, RecordKind, RecordSet, ReportMetadata, SummaryMetrics,
    TrendPoint,
};
use anyhow::Result;
use rust_decimal::Decimal;

/// Colors assigned to cost categories, cycling by index.
pub const EXPENSE_PALETTE: [&str; 3] = ["#10B981", "#F59E0B", "#EF4444"];

/// Palette color for the category at `index`.
pub fn palette_color(index: usize) -> &'static str {
    EXPENSE_PALETTE[index % EXPENSE_PALETTE.len()]
}

/// Generate a complete Markdown dashboard.
pub fn generate_markdown_report(report: &DashboardReport, fmt: &NumberFormatter) -> String {
    let mut output = String::new();

    output.push_str("# OvoLedger Dashboard\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_stat_cards(&report.dashboard.summary, fmt));
    output.push_str(&generate_trend_section(&report.dashboard.trend, fmt));
    output.push_str(&generate_distribution_section(
        &report.dashboard.categories,
        report.dashboard.summary.total_expenses,
        fmt,
    ));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Owner:** {}\n", metadata.owner));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Store:** `{}`\n", metadata.backend));
    section.push_str(&format!(
        "- **Records:** {} expenses, {} production, {} sales\n",
        metadata.expense_count, metadata.production_count, metadata.sale_count
    ));
    section.push_str(&format!(
        "- **Trend Window:** last {} days with data\n",
        metadata.trend_window
    ));
    section.push('\n');

    section
}

/// Generate the stat card table.
fn generate_stat_cards(summary: &SummaryMetrics, fmt: &NumberFormatter) -> String {
    let mut section = String::new();

    let trend_marker = if summary.net_profit >= Decimal::ZERO {
        "▲"
    } else {
        "▼"
    };

    section.push_str("## Summary\n\n");
    section.push_str("| Metric | Value | Note |\n");
    section.push_str("|:---|---:|:---|\n");
    section.push_str(&format!(
        "| Net Profit | {} | {} {} margin |\n",
        fmt.currency(summary.net_profit),
        trend_marker,
        fmt.percent(summary.margin_percent)
    ));
    section.push_str(&format!(
        "| Revenue | {} | |\n",
        fmt.currency(summary.total_revenue)
    ));
    section.push_str(&format!(
        "| Expenses | {} | |\n",
        fmt.currency(summary.total_expenses)
    ));
    section.push_str(&format!(
        "| Eggs Produced | {} | |\n\n",
        fmt.count(summary.total_eggs)
    ));

    section
}

/// Generate the production vs. sales trend table.
fn generate_trend_section(trend: &[TrendPoint], fmt: &NumberFormatter) -> String {
    let mut section = String::new();

    section.push_str("## Trend: Production vs Sales\n\n");

    if trend.is_empty() {
        section.push_str("Not enough data.\n\n");
        return section;
    }

    section.push_str("| Day | Eggs | Revenue |\n");
    section.push_str("|:---|---:|---:|\n");

    for point in trend {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            point.day_label(),
            fmt.count(point.eggs_produced),
            fmt.currency(point.revenue)
        ));
    }
    section.push('\n');

    section
}

/// Generate the cost distribution table.
fn generate_distribution_section(
    categories: &[CategoryShare],
    total_expenses: Decimal,
    fmt: &NumberFormatter,
) -> String {
    let mut section = String::new();

    section.push_str("## Cost Distribution\n\n");

    if categories.is_empty() {
        section.push_str("No expense data.\n\n");
        return section;
    }

    section.push_str("| Category | Color | Total | Share |\n");
    section.push_str("|:---|:---:|---:|---:|\n");

    for (index, share) in categories.iter().enumerate() {
        section.push_str(&format!(
            "| {} | `{}` | {} | {} |\n",
            share.category,
            palette_color(index),
            fmt.currency(share.total_cost),
            fmt.percent(category_share_percent(share, total_expenses))
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Dashboard generated by OvoLedger*\n".to_string()
}

/// Generate a JSON dashboard.
pub fn generate_json_report(report: &DashboardReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Render one kind of record as a Markdown table, newest first.
pub fn generate_record_table(records: &RecordSet, kind: RecordKind, fmt: &NumberFormatter) -> String {
    let mut table = String::new();

    match kind {
        RecordKind::Expense => {
            if records.expenses.is_empty() {
                return "No expenses recorded.\n".to_string();
            }
            table.push_str("| Id | Date | Category | Description | Cost |\n");
            table.push_str("|:---|:---|:---|:---|---:|\n");
            for e in &records.expenses {
                table.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    e.id,
                    e.date.format("%d/%m/%Y"),
                    e.category,
                    escape_cell(&e.description),
                    fmt.currency(e.cost)
                ));
            }
        }
        RecordKind::Production => {
            if records.production.is_empty() {
                return "No production recorded.\n".to_string();
            }
            table.push_str("| Id | Date | Eggs | Feed (kg) |\n");
            table.push_str("|:---|:---|---:|---:|\n");
            for p in &records.production {
                table.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    p.id,
                    p.date.format("%d/%m/%Y"),
                    fmt.count(p.eggs_produced),
                    fmt.quantity(p.feed_consumed_kg, 2)
                ));
            }
        }
        RecordKind::Sale => {
            if records.sales.is_empty() {
                return "No sales recorded.\n".to_string();
            }
            table.push_str("| Id | Date | Client | Quantity | Value |\n");
            table.push_str("|:---|:---|:---|---:|---:|\n");
            for s in &records.sales {
                table.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    s.id,
                    s.date.format("%d/%m/%Y"),
                    s.client.as_deref().map(escape_cell).unwrap_or_else(|| "-".to_string()),
                    fmt.count(s.quantity),
                    fmt.currency(s.value)
                ));
            }
        }
    }

    table
}

/// Escape text placed inside a Markdown table cell.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::compute_dashboard;
    use crate::config::Locale;
    use crate::models::{parse_date, Expense, ExpenseCategory, Owner, ProductionRecord, Sale};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn fmt() -> NumberFormatter {
        NumberFormatter::new(Locale::PtBr, "R$")
    }

    fn demo_records() -> RecordSet {
        let owner = Owner::from("demo");
        let expense = |id: &str, category, description: &str, cost, date: &str| Expense {
            id: id.to_string(),
            owner: owner.clone(),
            category,
            description: description.to_string(),
            cost,
            date: parse_date(date).unwrap(),
        };
        let production = |id: &str, date: &str, eggs| ProductionRecord {
            id: id.to_string(),
            owner: owner.clone(),
            date: parse_date(date).unwrap(),
            eggs_produced: eggs,
            feed_consumed_kg: dec!(15),
        };
        let sale = |id: &str, date: &str, value, client: &str| Sale {
            id: id.to_string(),
            owner: owner.clone(),
            date: parse_date(date).unwrap(),
            quantity: 100,
            value,
            client: Some(client.to_string()),
        };

        RecordSet {
            expenses: vec![
                expense("1", ExpenseCategory::Feed, "Ração Postura Premium", dec!(150.00), "2023-10-01"),
                expense("2", ExpenseCategory::Medicine, "Vitaminas", dec!(45.50), "2023-10-05"),
                expense("3", ExpenseCategory::Other, "Reparo Cerca", dec!(80.00), "2023-10-10"),
            ],
            production: vec![
                production("1", "2023-10-01", 120),
                production("2", "2023-10-02", 115),
                production("3", "2023-10-03", 130),
                production("4", "2023-10-04", 125),
            ],
            sales: vec![
                sale("1", "2023-10-01", dec!(80.00), "Mercado A"),
                sale("2", "2023-10-02", dec!(72.00), "Cliente Balcão"),
                sale("3", "2023-10-03", dec!(96.00), "Mercado B"),
            ],
        }
    }

    fn create_test_report(records: &RecordSet) -> DashboardReport {
        DashboardReport {
            metadata: ReportMetadata {
                owner: Owner::from("demo"),
                generated_at: Utc::now(),
                backend: "memory".to_string(),
                expense_count: records.expenses.len(),
                production_count: records.production.len(),
                sale_count: records.sales.len(),
                trend_window: 14,
            },
            dashboard: compute_dashboard(records, 14),
        }
    }

    #[test]
    fn test_palette_cycles() {
        assert_eq!(palette_color(0), "#10B981");
        assert_eq!(palette_color(2), "#EF4444");
        assert_eq!(palette_color(3), "#10B981");
    }

    #[test]
    fn test_generate_markdown_report() {
        let records = demo_records();
        let markdown = generate_markdown_report(&create_test_report(&records), &fmt());

        assert!(markdown.contains("# OvoLedger Dashboard"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("- **Owner:** demo"));
        assert!(markdown.contains("| Net Profit | -R$ 27,50 | ▼ -11,1% margin |"));
        assert!(markdown.contains("| Revenue | R$ 248,00 | |"));
        assert!(markdown.contains("| Expenses | R$ 275,50 | |"));
        assert!(markdown.contains("| Eggs Produced | 490 | |"));
        assert!(markdown.contains("| 01/10 | 120 | R$ 80,00 |"));
        assert!(markdown.contains("| 04/10 | 125 | R$ 0,00 |"));
        assert!(markdown.contains("| Feed | `#10B981` | R$ 150,00 | 54,4% |"));
        assert!(markdown.contains("| Other | `#EF4444` | R$ 80,00 | 29,0% |"));
    }

    #[test]
    fn test_generate_markdown_report_empty() {
        let records = RecordSet::default();
        let markdown = generate_markdown_report(&create_test_report(&records), &fmt());

        assert!(markdown.contains("| Net Profit | R$ 0,00 | ▲ 0,0% margin |"));
        assert!(markdown.contains("Not enough data."));
        assert!(markdown.contains("No expense data."));
    }

    #[test]
    fn test_generate_json_report() {
        let records = demo_records();
        let json = generate_json_report(&create_test_report(&records)).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"summary\""));
        assert!(json.contains("\"trend\""));
        assert!(json.contains("\"2023-10-01\""));
        assert!(json.contains("\"categories\""));
        assert!(json.contains("\"Medicine\""));
    }

    #[test]
    fn test_generate_record_table() {
        let records = demo_records();

        let sales = generate_record_table(&records, RecordKind::Sale, &fmt());
        assert!(sales.contains("| 2 | 02/10/2023 | Cliente Balcão | 100 | R$ 72,00 |"));

        let production = generate_record_table(&records, RecordKind::Production, &fmt());
        assert!(production.contains("| 3 | 03/10/2023 | 130 | 15,00 |"));

        let empty = generate_record_table(&RecordSet::default(), RecordKind::Expense, &fmt());
        assert_eq!(empty, "No expenses recorded.\n");
    }

    #[test]
    fn test_record_table_escapes_pipes() {
        let mut records = demo_records();
        records.expenses[0].description = "Milho | soja".to_string();
        records.sales[0].client = Some("A|B".to_string());

        let expenses = generate_record_table(&records, RecordKind::Expense, &fmt());
        assert!(expenses.contains("| Feed | Milho \\| soja | R$ 150,00 |"));

        let sales = generate_record_table(&records, RecordKind::Sale, &fmt());
        assert!(sales.contains("| 01/10/2023 | A\\|B | 100 | R$ 80,00 |"));
        for line in sales.lines().skip(2) {
            assert_eq!(line.matches(" | ").count(), 4);
        }
    }
}

//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::Backend;
use crate::models::{
    parse_date, parse_decimal, ExpenseCategory, NewExpense, NewProduction, NewRecord, NewSale,
    RecordKind,
};
use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// OvoLedger - expense, production and sales dashboard for egg farms
///
/// Record what the flock costs, lays and sells, then get a dashboard
/// with profit, margin, a daily trend and a cost breakdown.
///
/// Examples:
///   ovoledger add-expense --category feed --description "Layer feed" --cost 150,00
///   ovoledger add-production --eggs 120 --feed-kg 15 --date 2023-10-01
///   ovoledger add-sale --quantity 100 --value 80 --client "Mercado A"
///   ovoledger dashboard --format json --output -
///   ovoledger dashboard --follow
///   ovoledger --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Owner whose records are used
    ///
    /// Can also be set via OVOLEDGER_OWNER env var or .ovoledger.toml config.
    #[arg(long, global = true, value_name = "ID", env = "OVOLEDGER_OWNER")]
    pub owner: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .ovoledger.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Storage backend (memory, json)
    #[arg(long, global = true, value_name = "BACKEND")]
    pub backend: Option<Backend>,

    /// Directory for the JSON backend
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .ovoledger.toml configuration file
    #[arg(long, conflicts_with = "reset_config")]
    pub init_config: bool,

    /// Remove the local .ovoledger.toml so defaults apply again
    #[arg(long)]
    pub reset_config: bool,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render the dashboard (default)
    Dashboard(DashboardArgs),

    /// Record an expense
    AddExpense(AddExpenseArgs),

    /// Record a day's production
    AddProduction(AddProductionArgs),

    /// Record a sale
    AddSale(AddSaleArgs),

    /// Delete a record
    Delete {
        /// Kind of record
        kind: RecordKindArg,
        /// Record id
        id: String,
    },

    /// List records of one kind, newest first
    List {
        /// Kind of record
        kind: RecordKindArg,
    },
}

/// Options for `dashboard`.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct DashboardArgs {
    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Output file path for the dashboard (`-` for stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Number of most recent days to show in the trend
    #[arg(long, value_name = "DAYS")]
    pub trend_window: Option<usize>,

    /// Keep running and re-render whenever the records change
    #[arg(long)]
    pub follow: bool,

    /// Polling interval in seconds for --follow
    #[arg(long, default_value = "5", value_name = "SECS")]
    pub interval: u64,
}

/// Options for `add-expense`.
#[derive(ClapArgs, Debug, Clone)]
pub struct AddExpenseArgs {
    /// Category (feed, medicine, other)
    #[arg(long)]
    pub category: ExpenseCategory,

    /// What was bought
    #[arg(long)]
    pub description: String,

    /// Amount paid (accepts 45.50 or 45,50)
    #[arg(long, value_parser = parse_amount)]
    pub cost: Decimal,

    /// Date (YYYY-MM-DD); defaults to today
    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<DateTime<Utc>>,
}

/// Options for `add-production`.
#[derive(ClapArgs, Debug, Clone)]
pub struct AddProductionArgs {
    /// Eggs collected
    #[arg(long)]
    pub eggs: u64,

    /// Feed consumed in kilograms
    #[arg(long, value_parser = parse_amount)]
    pub feed_kg: Decimal,

    /// Date (YYYY-MM-DD); defaults to today
    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<DateTime<Utc>>,
}

/// Options for `add-sale`.
#[derive(ClapArgs, Debug, Clone)]
pub struct AddSaleArgs {
    /// Eggs sold
    #[arg(long)]
    pub quantity: u64,

    /// Amount received
    #[arg(long, value_parser = parse_amount)]
    pub value: Decimal,

    /// Buyer name
    #[arg(long)]
    pub client: Option<String>,

    /// Date (YYYY-MM-DD); defaults to today
    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<DateTime<Utc>>,
}

/// Output format for the dashboard.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Record kind for `delete` and `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RecordKindArg {
    Expense,
    Production,
    Sale,
}

impl From<RecordKindArg> for RecordKind {
    fn from(kind: RecordKindArg) -> Self {
        match kind {
            RecordKindArg::Expense => RecordKind::Expense,
            RecordKindArg::Production => RecordKind::Production,
            RecordKindArg::Sale => RecordKind::Sale,
        }
    }
}

fn parse_amount(s: &str) -> Result<Decimal, String> {
    parse_decimal(s).ok_or_else(|| format!("'{}' is not a valid amount", s))
}

fn parse_date_arg(s: &str) -> Result<DateTime<Utc>, String> {
    parse_date(s).ok_or_else(|| format!("'{}' is not a valid date (expected YYYY-MM-DD)", s))
}

impl AddExpenseArgs {
    pub fn into_record(self, today: DateTime<Utc>) -> NewRecord {
        NewRecord::Expense(NewExpense {
            category: self.category,
            description: self.description,
            cost: self.cost,
            date: self.date.unwrap_or(today),
        })
    }
}

impl AddProductionArgs {
    pub fn into_record(self, today: DateTime<Utc>) -> NewRecord {
        NewRecord::Production(NewProduction {
            date: self.date.unwrap_or(today),
            eggs_produced: self.eggs,
            feed_consumed_kg: self.feed_kg,
        })
    }
}

impl AddSaleArgs {
    pub fn into_record(self, today: DateTime<Utc>) -> NewRecord {
        NewRecord::Sale(NewSale {
            date: self.date.unwrap_or(today),
            quantity: self.quantity,
            value: self.value,
            client: self.client,
        })
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The command to run; `dashboard` when none was given.
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Dashboard(DashboardArgs {
                interval: 5,
                ..DashboardArgs::default()
            }))
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for config lifecycle flags
        if self.init_config || self.reset_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref owner) = self.owner {
            if owner.trim().is_empty() {
                return Err("Owner must not be empty".to_string());
            }
        }

        match &self.command {
            Some(Command::Dashboard(dashboard)) => {
                if dashboard.follow && dashboard.interval == 0 {
                    return Err("Interval must be at least 1 second".to_string());
                }
            }
            Some(Command::AddExpense(expense)) => {
                if expense.description.trim().is_empty() {
                    return Err("Description must not be empty".to_string());
                }
            }
            Some(Command::Delete { id, .. }) => {
                if id.trim().is_empty() {
                    return Err("Record id must not be empty".to_string());
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

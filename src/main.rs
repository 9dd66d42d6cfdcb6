//! OvoLedger - poultry-egg business dashboard
//!
//! A CLI tool that records expenses, egg production and sales per owner
//! and renders a dashboard with profit, margin, a daily trend and a cost
//! breakdown.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, store, validation, record not found, etc.)

mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod store;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Command, DashboardArgs, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use futures::StreamExt;
use models::{DashboardReport, Owner, RecordKind, RecordSet, ReportMetadata};
use report::NumberFormatter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use store::DataStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Config lifecycle flags run before anything else (no logging needed)
    if args.init_config {
        return handle_init_config(&args);
    }
    if args.reset_config {
        return handle_reset_config(&args);
    }

    // Initialize logging
    init_logging(&args);

    info!("OvoLedger v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Config file targeted by the lifecycle flags.
fn config_path(args: &Args) -> PathBuf {
    args.config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Handle --init-config: generate a default .ovoledger.toml.
fn handle_init_config(args: &Args) -> Result<()> {
    let path = config_path(args);

    if let Err(e) = Config::init(&path) {
        eprintln!("⚠️  {:#}", e);
        std::process::exit(1);
    }

    println!("✅ Created {} with default settings.", path.display());
    println!("   Edit it to choose the owner, store backend, locale and trend window.");
    Ok(())
}

/// Handle --reset-config: remove the config file so defaults apply.
fn handle_reset_config(args: &Args) -> Result<()> {
    let path = config_path(args);

    if Config::reset(&path)? {
        println!("✅ Removed {}. Defaults apply from now on.", path.display());
    } else {
        println!("ℹ️  No {} to remove.", path.display());
    }
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the selected command. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let owner = Owner::new(config.general.owner.trim());
    let store = store::open(&config.store).context("Failed to open record store")?;
    info!("Owner: {} ({} store)", owner, store.backend_name());

    let fmt = NumberFormatter::from_config(&config.dashboard);
    let today = Utc::now();

    match args.command() {
        Command::Dashboard(dashboard) => {
            run_dashboard(store.as_ref(), &owner, &config, &dashboard, &fmt).await
        }
        Command::AddExpense(expense) => {
            let id = store.add(&owner, expense.into_record(today))?;
            println!("✅ Added expense {}", id);
            Ok(0)
        }
        Command::AddProduction(production) => {
            let id = store.add(&owner, production.into_record(today))?;
            println!("✅ Added production record {}", id);
            Ok(0)
        }
        Command::AddSale(sale) => {
            let id = store.add(&owner, sale.into_record(today))?;
            println!("✅ Added sale {}", id);
            Ok(0)
        }
        Command::Delete { kind, id } => {
            let kind = RecordKind::from(kind);
            store.delete(&owner, kind, &id)?;
            println!("🗑️  Deleted {} {}", kind, id);
            Ok(0)
        }
        Command::List { kind } => {
            let records = store.snapshot(&owner)?;
            print!(
                "{}",
                report::generate_record_table(&records, RecordKind::from(kind), &fmt)
            );
            Ok(0)
        }
    }
}

/// Render the dashboard once, or keep re-rendering with --follow.
async fn run_dashboard(
    store: &dyn DataStore,
    owner: &Owner,
    config: &Config,
    args: &DashboardArgs,
    fmt: &NumberFormatter,
) -> Result<i32> {
    let target = DashboardTarget {
        format: args.format.unwrap_or(config.report.format),
        output: args
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.report.output)),
        trend_window: args.trend_window.unwrap_or(config.dashboard.trend_window),
    };

    if !args.follow {
        let records = store.snapshot(owner)?;
        write_dashboard(&records, owner, store.backend_name(), &target, fmt)?;
        return Ok(0);
    }

    println!(
        "👀 Watching records of {} (refresh every {}s, Ctrl+C to stop)",
        owner, args.interval
    );

    let mut snapshots = store.subscribe(owner)?;
    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            snapshot = snapshots.next() => match snapshot {
                Some(records) => write_dashboard(&records, owner, store.backend_name(), &target, fmt)?,
                None => {
                    warn!("Record stream closed");
                    break;
                }
            },
            _ = ticker.tick() => {
                if let Err(e) = store.refresh(owner) {
                    warn!("Failed to refresh records: {}", e);
                }
            }
            _ = &mut shutdown => {
                info!("Stopping dashboard watch");
                break;
            }
        }
    }

    Ok(0)
}

/// Where and how a dashboard is written.
struct DashboardTarget {
    format: OutputFormat,
    output: PathBuf,
    trend_window: usize,
}

/// Aggregate one snapshot and write the rendered dashboard.
fn write_dashboard(
    records: &RecordSet,
    owner: &Owner,
    backend: &str,
    target: &DashboardTarget,
    fmt: &NumberFormatter,
) -> Result<()> {
    if records.is_empty() {
        info!("No records yet for {}", owner);
    }

    let dashboard = analysis::compute_dashboard(records, target.trend_window);

    let report = DashboardReport {
        metadata: ReportMetadata {
            owner: owner.clone(),
            generated_at: Utc::now(),
            backend: backend.to_string(),
            expense_count: records.expenses.len(),
            production_count: records.production.len(),
            sale_count: records.sales.len(),
            trend_window: target.trend_window,
        },
        dashboard,
    };

    let output = match target.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, fmt),
    };

    if target.output == Path::new("-") {
        println!("{}", output);
        return Ok(());
    }

    std::fs::write(&target.output, &output)
        .with_context(|| format!("Failed to write dashboard to {}", target.output.display()))?;

    let summary = &report.dashboard.summary;
    println!("\n📊 Dashboard Summary:");
    println!(
        "   Net profit: {} ({} margin)",
        fmt.currency(summary.net_profit),
        fmt.percent(summary.margin_percent)
    );
    println!(
        "   Revenue: {} | Expenses: {} | Eggs: {}",
        fmt.currency(summary.total_revenue),
        fmt.currency(summary.total_expenses),
        fmt.count(summary.total_eggs)
    );
    println!("\n✅ Dashboard saved to: {}", target.output.display());

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

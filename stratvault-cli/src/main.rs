//! StratVault CLI — ingest, inspect, and migrate a result store.
//!
//! Commands:
//! - `save` — store one universe's results from a JSON array of strategy results
//! - `metrics` — list the metrics tier, or export it as CSV
//! - `detail` — print one strategy's detail artifact
//! - `universes` — list saved universes and their selections
//! - `migrate` — convert legacy per-universe files into the two-tier layout

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use stratvault_core::domain::{MetricsRecord, StrategyResult};
use stratvault_store::{
    export_metrics_csv, save_detail_csv, StorageCoordinator, StoreConfig, StoreError,
};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stratvault",
    about = "StratVault CLI — two-tier backtest result store"
)]
struct Cli {
    /// Store root directory. Ignored when --config is given.
    #[arg(long, global = true, default_value = "results/store")]
    root: PathBuf,

    /// Path to a TOML store config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save one universe's results into both tiers.
    Save {
        /// Universe identifier (e.g., sp500_daily).
        #[arg(long)]
        universe: String,

        /// JSON file holding an array of strategy results.
        #[arg(long)]
        input: PathBuf,

        /// Strategies that receive detail artifacts. Defaults to the configured top_n.
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// List the metrics tier, optionally filtered by universe.
    Metrics {
        /// Only show records of this universe.
        #[arg(long)]
        universe: Option<String>,

        /// Write CSV to this path instead of printing a table.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Print one strategy's detail artifact as JSON.
    Detail {
        /// Strategy name.
        name: String,

        /// Also write trades.csv and curves.csv under this directory.
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
    /// List saved universes.
    Universes,
    /// Convert legacy `<universe>.results.json` files into the two-tier layout.
    Migrate,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.root, cli.config.as_deref())?;
    let store = StorageCoordinator::open(config)?;

    match cli.command {
        Commands::Save {
            universe,
            input,
            top_n,
        } => run_save(&store, &universe, &input, top_n),
        Commands::Metrics { universe, csv } => run_metrics(&store, universe.as_deref(), csv),
        Commands::Detail { name, csv_dir } => run_detail(&store, &name, csv_dir),
        Commands::Universes => run_universes(&store),
        Commands::Migrate => run_migrate(&store),
    }
}

fn load_config(root: &Path, config_path: Option<&Path>) -> Result<StoreConfig> {
    debug!(root = %root.display(), config = ?config_path, "resolving store config");
    match config_path {
        Some(path) => StoreConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(StoreConfig::new(root)),
    }
}

fn run_save(
    store: &StorageCoordinator,
    universe: &str,
    input: &Path,
    top_n: Option<usize>,
) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let results: Vec<StrategyResult> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of strategy results", input.display()))?;

    let top_n = top_n.unwrap_or(store.config().top_n);
    let report = store.save_universe_results(universe, &results, top_n)?;

    println!("Universe:   {}", report.universe);
    println!(
        "Metrics:    {} inserted, {} replaced",
        report.metrics_inserted, report.metrics_replaced
    );
    println!(
        "Details:    {} written, {} removed",
        report.details_written, report.details_removed
    );
    Ok(())
}

fn run_metrics(
    store: &StorageCoordinator,
    universe: Option<&str>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let collection = store.load_all_metrics()?;
    let records: Vec<&MetricsRecord> = match universe {
        Some(u) => collection.for_universe(u).collect(),
        None => collection.strategies.iter().collect(),
    };

    if let Some(path) = csv {
        let data = export_metrics_csv(records.iter().copied())?;
        std::fs::write(&path, data)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote {} records to {}", records.len(), path.display());
        return Ok(());
    }

    if records.is_empty() {
        println!("No metrics stored under {}", store.config().root.display());
        return Ok(());
    }

    let metric = store.ranking_key().to_string();
    let metric_name = metric.split_whitespace().next().unwrap_or_default();
    println!("{:<32} {:<20} {:>12}", "Strategy", "Universe", metric_name);
    println!("{}", "-".repeat(66));
    for r in &records {
        let value = r
            .metrics
            .get(metric_name)
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "-".into());
        println!("{:<32} {:<20} {:>12}", r.strategy_name, r.universe, value);
    }
    println!();
    println!("{} records", records.len());
    Ok(())
}

fn run_detail(store: &StorageCoordinator, name: &str, csv_dir: Option<PathBuf>) -> Result<()> {
    let artifact = match store.load_detail(name) {
        Ok(artifact) => artifact,
        Err(StoreError::NotFound { .. }) => {
            bail!("'{name}' has no detail artifact (not in its universe's top-N selection)")
        }
        Err(e) => return Err(e.into()),
    };
    println!("{}", serde_json::to_string_pretty(&artifact)?);

    if let Some(dir) = csv_dir {
        let out = save_detail_csv(&artifact, &dir)?;
        eprintln!("CSV written to: {}", out.display());
    }
    Ok(())
}

fn run_universes(store: &StorageCoordinator) -> Result<()> {
    let universes = store.list_universes()?;
    if universes.is_empty() {
        println!("No universes saved under {}", store.config().root.display());
        return Ok(());
    }
    for universe in &universes {
        let details = store.load_universe_details(universe)?;
        let names: Vec<&str> = details.iter().map(|a| a.strategy_name.as_str()).collect();
        println!("{universe:<24} {:>3} selected  {}", names.len(), names.join(", "));
    }
    Ok(())
}

fn run_migrate(store: &StorageCoordinator) -> Result<()> {
    let reports = store.migrate_legacy()?;
    if reports.is_empty() {
        println!("No legacy files under {}", store.config().root.display());
        return Ok(());
    }
    for report in &reports {
        println!(
            "{:<24} {} metrics, {} details",
            report.universe,
            report.metrics_inserted + report.metrics_replaced,
            report.details_written
        );
    }
    Ok(())
}

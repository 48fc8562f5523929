//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use olist_core::{OrderFeatures, TrainingOptions};
use olist_loader::{LoadProgress, LoaderConfig, load_tables};
use olist_shared::{AppConfig, init_config, init_config_at, load_config, load_config_from};
use serde::Serialize;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// olist: per-order features from the Olist e-commerce CSV tables.
#[derive(Parser)]
#[command(
    name = "olist",
    version,
    about = "Derive per-order features and a training table from the Olist CSV files.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Root directory holding `data/csv` (defaults to the config value, then the working directory).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Config file to use instead of `~/.olist/olist.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Table output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Csv,
    Json,
}

/// Single feature tables.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum FeatureKind {
    WaitTime,
    ReviewScore,
    Products,
    Sellers,
    PriceFreight,
    Distance,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Check that the tool runs.
    Ping,

    /// List the loaded tables with row counts and column types.
    Tables,

    /// Print one feature table.
    Features {
        /// Which table to derive.
        kind: FeatureKind,

        /// Keep orders of every status in the wait-time table.
        #[arg(long)]
        all_statuses: bool,

        /// Output format.
        #[arg(short, long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Print the joined training table.
    Training {
        /// Keep orders of every status.
        #[arg(long)]
        all_statuses: bool,

        /// Join the mean seller-customer distance.
        #[arg(long)]
        with_distance: bool,

        /// Output format.
        #[arg(short, long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "olist=info",
        1 => "olist=debug",
        _ => "olist=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so table output on stdout stays clean.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Ping => {
            println!("{}", olist_loader::ping());
            Ok(())
        }
        Command::Tables => cmd_tables(config_path, cli.root.as_deref()),
        Command::Features {
            kind,
            all_statuses,
            format,
        } => cmd_features(config_path, cli.root.as_deref(), kind, all_statuses, format),
        Command::Training {
            all_statuses,
            with_distance,
            format,
        } => cmd_training(
            config_path,
            cli.root.as_deref(),
            all_statuses,
            with_distance,
            format,
        ),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Config resolution
// ---------------------------------------------------------------------------

fn resolve_config(config_path: Option<&Path>) -> Result<AppConfig> {
    Ok(match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Build the loader config; the root is anchored to the working directory once, here.
fn loader_config(config: &AppConfig, root: Option<&Path>) -> Result<LoaderConfig> {
    let mut loader = LoaderConfig::from(config);
    if let Some(root) = root {
        loader = loader.with_root(root);
    }
    if loader.root_dir.is_relative() {
        let cwd = std::env::current_dir()
            .map_err(|e| eyre!("cannot determine working directory: {e}"))?;
        loader.root_dir = cwd.join(&loader.root_dir);
    }
    Ok(loader)
}

fn load_features(config: &AppConfig, root: Option<&Path>) -> Result<OrderFeatures> {
    let loader = loader_config(config, root)?;
    info!(dir = %loader.csv_dir().display(), "loading dataset");

    let progress = CliProgress::new();
    let features = OrderFeatures::load(&loader, &progress);
    progress.finish();
    Ok(features?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_tables(config_path: Option<&Path>, root: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let loader = loader_config(&config, root)?;

    let progress = CliProgress::new();
    let tables = load_tables(&loader, &progress);
    progress.finish();
    let tables = tables?;

    println!();
    println!("  Tables in {}", loader.csv_dir().display());
    for (name, table) in &tables {
        println!();
        println!("  {name} ({} rows)", table.row_count());
        for column in table.columns() {
            println!("    {:<40} {}", column.name(), column.kind());
        }
    }
    println!();

    Ok(())
}

fn cmd_features(
    config_path: Option<&Path>,
    root: Option<&Path>,
    kind: FeatureKind,
    all_statuses: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let features = load_features(&config, root)?;
    let is_delivered = !all_statuses && config.features.is_delivered;

    info!(?kind, is_delivered, "deriving feature table");

    match kind {
        FeatureKind::WaitTime => emit(&features.wait_time(is_delivered), format),
        FeatureKind::ReviewScore => emit(&features.review_score(), format),
        FeatureKind::Products => emit(&features.number_products(), format),
        FeatureKind::Sellers => emit(&features.number_sellers(), format),
        FeatureKind::PriceFreight => emit(&features.price_and_freight(), format),
        FeatureKind::Distance => emit(&features.distance_seller_customer(), format),
    }
}

fn cmd_training(
    config_path: Option<&Path>,
    root: Option<&Path>,
    all_statuses: bool,
    with_distance: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let features = load_features(&config, root)?;

    let mut options = TrainingOptions::from(&config);
    if all_statuses {
        options.is_delivered = false;
    }
    if with_distance {
        options.with_distance_seller_customer = true;
    }

    info!(?options, "assembling training set");
    emit(&features.training_data(options), format)
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => init_config_at(path)?,
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Write rows to stdout as CSV (header from field names) or a JSON array.
fn emit<T: Serialize>(rows: &[T], format: OutputFormat) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match format {
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(&mut out);
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, rows)?;
            writeln!(out)?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.set_message("Loading tables");
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl LoadProgress for CliProgress {
    fn table_loaded(&self, name: &str, rows: usize, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Loaded [{current}/{total}] {name} ({rows} rows)"));
    }
}

//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use pokefetch_core::{CancellationToken, ProgressReporter, Service};
use pokefetch_remote::PokeApiClient;
use pokefetch_shared::{
    AppConfig, EnrichConfig, EnrichPolicy, FetchConfig, PokefetchError, Record, init_config,
    load_config, load_config_from,
};
use pokefetch_storage::{Cache, CsvStore};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// pokefetch: bulk fetch, enrich and cache records from a remote API.
#[derive(Parser)]
#[command(
    name = "pokefetch",
    version,
    about = "Fetch an ID range from a remote API, enrich it, and cache the results.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.pokefetch/pokefetch.toml.
    #[arg(long, global = true, env = "POKEFETCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the record store path.
    #[arg(long, global = true)]
    pub records: Option<PathBuf>,

    /// Override the cache database path.
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch an inclusive ID range and replace the record store.
    Fetch {
        /// First ID to fetch.
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        from: i64,

        /// Last ID to fetch (inclusive).
        #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
        to: i64,

        /// Concurrent lookups (overrides pipeline.fetch_workers).
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Enrich every stored record and save it to the cache.
    Refresh {
        /// Enrichment workers (overrides pipeline.enrich_workers).
        #[arg(short, long)]
        workers: Option<usize>,

        /// Failure policy: isolate-record or abort-batch.
        #[arg(long)]
        policy: Option<EnrichPolicy>,
    },

    /// List the enriched records in the cache.
    List {
        /// Print records as JSON.
        #[arg(long)]
        json: bool,
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
    /// Create a default config file.
    Init,
    /// Show the current config.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pokefetch=info",
        1 => "pokefetch=debug",
        _ => "pokefetch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Fetch { from, to, workers } => cmd_fetch(&cli, *from, *to, *workers).await,
        Command::Refresh { workers, policy } => cmd_refresh(&cli, *workers, *policy).await,
        Command::List { json } => cmd_list(&cli, *json).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&cli).await,
        },
    }
}

type CliService = Service<PokeApiClient, CsvStore, Cache>;

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(records) = &cli.records {
        config.storage.records_path = records.to_string_lossy().into_owned();
    }
    if let Some(cache) = &cli.cache {
        config.storage.cache_path = cache.to_string_lossy().into_owned();
    }
    Ok(config)
}

async fn build_service(config: &AppConfig) -> Result<CliService> {
    let client = PokeApiClient::new(&config.remote)?;
    let store = CsvStore::new(&config.storage.records_path);
    let cache = Cache::open(Path::new(&config.storage.cache_path)).await?;

    Ok(Service::new(
        client,
        store,
        cache,
        FetchConfig::from(config),
        EnrichConfig::from(config),
    ))
}

/// Token that trips on Ctrl-C so workers stop and the run unwinds cleanly.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            trigger.cancel();
        }
    });
    token
}

async fn cmd_fetch(cli: &Cli, from: i64, to: i64, workers: Option<usize>) -> Result<()> {
    let mut config = resolve_config(cli)?;
    if let Some(workers) = workers {
        config.pipeline.fetch_workers = workers;
    }
    let service = build_service(&config).await?;

    info!(from, to, records = %config.storage.records_path, "fetching range");

    let reporter = CliProgress::new();
    let result = service
        .trigger_fetch_with_cancel(from, to, &interrupt_token(), &reporter)
        .await;
    reporter.finish();
    let summary = result?;

    println!();
    println!("  Fetched {} records ({})", summary.written, summary.range);
    println!("  Store:  {}", config.storage.records_path);
    println!("  Time:   {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_refresh(
    cli: &Cli,
    workers: Option<usize>,
    policy: Option<EnrichPolicy>,
) -> Result<()> {
    let mut config = resolve_config(cli)?;
    if let Some(workers) = workers {
        config.pipeline.enrich_workers = workers;
    }
    if let Some(policy) = policy {
        config.pipeline.failure_policy = policy;
    }
    let service = build_service(&config).await?;

    let reporter = CliProgress::new();
    let result = service
        .trigger_refresh_with_cancel(&interrupt_token(), &reporter)
        .await;
    reporter.finish();

    match result {
        Ok(summary) => {
            println!();
            println!("  Enriched {} of {} records", summary.saved, summary.read);
            println!("  Cache:  {}", config.storage.cache_path);
            println!("  Time:   {:.1}s", summary.elapsed.as_secs_f64());
            println!();
            Ok(())
        }
        Err(e @ PokefetchError::UpstreamLookup { .. }) => {
            // Every other record was still saved.
            Err(eyre!("refresh completed with failures: {e}"))
        }
        Err(e) => Err(e.into()),
    }
}

async fn cmd_list(cli: &Cli, json: bool) -> Result<()> {
    let config = resolve_config(cli)?;
    let service = build_service(&config).await?;
    let records = service.list_records().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records cached. Run `pokefetch fetch` then `pokefetch refresh`.");
        return Ok(());
    }

    println!("{:<6} {:<20} {:>7} {:>7} {:>8}", "ID", "NAME", "HEIGHT", "WEIGHT", "EFFECTS");
    for record in &records {
        print_row(record);
    }

    Ok(())
}

fn print_row(record: &Record) {
    println!(
        "{:<6} {:<20} {:>7} {:>7} {:>8}",
        record.id,
        record.name,
        record.height,
        record.weight,
        record.effect_entries.len()
    );
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn record_fetched(&self, id: i64, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching [{current}/{total}] #{id}"));
    }

    fn record_enriched(&self, id: i64, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Enriching [{current}/{total}] #{id}"));
    }

    fn record_failed(&self, id: i64, error: &str) {
        self.spinner.println(format!("  failed #{id}: {error}"));
    }
}

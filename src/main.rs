//! Trawl main entry point
//!
//! Command-line interface for the Trawl keyword-to-corpus harvester.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use trawl::config::{compute_file_hash, load_config_with_hash};
use trawl::ledger::SqliteLedger;
use trawl::notify::{LogNotifier, Notifier};
use trawl::pipeline::{run_job, JobPaths, JobSpec};
use trawl::report::JobReport;
use trawl::sync::NoopSync;

/// Trawl: a resumable keyword-to-corpus harvester
///
/// Trawl searches a list of keywords, discovers sitemaps on the resulting
/// domains, crawls their pages, and enriches the content into chunked
/// documents. Progress is tracked per unit of work in a durable ledger;
/// an interrupted job resumes exactly where it stopped.
#[derive(Parser, Debug)]
#[command(name = "trawl")]
#[command(version)]
#[command(about = "A resumable keyword-to-corpus harvester", long_about = None)]
struct Cli {
    /// Job name; namespaces the ledger and output paths
    #[arg(value_name = "JOB")]
    job: String,

    /// Path to the keywords file (one keyword per line)
    #[arg(short, long, value_name = "FILE")]
    keywords: PathBuf,

    /// Path to the TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "trawl.toml")]
    config: PathBuf,

    /// Route all traffic through the configured proxy endpoints
    #[arg(short, long)]
    proxy: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start the job from scratch, archiving any previous state
    #[arg(long)]
    fresh: bool,

    /// Show ledger statistics for the job and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Validate config and show what would run without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)?;
    tracing::info!("Configuration loaded (hash: {})", &config_hash[..12]);

    if !cli.proxy {
        // Proxy use is opt-in; without the flag traffic goes direct and
        // backoff applies to the single direct slot
        config.proxy.endpoints.clear();
    }

    if cli.stats {
        return handle_stats(&config, &cli.job);
    }

    let keywords = read_keywords(&cli.keywords)?;
    if keywords.is_empty() {
        anyhow::bail!("keywords file '{}' has no keywords", cli.keywords.display());
    }

    if cli.dry_run {
        handle_dry_run(&config, &cli.job, &keywords);
        return Ok(());
    }

    let keywords_hash = compute_file_hash(&cli.keywords)?;

    tracing::info!("Starting job with parameters:");
    tracing::info!("  Job name: {}", cli.job);
    tracing::info!("  Keywords file: {} ({} keyword(s))", cli.keywords.display(), keywords.len());
    tracing::info!("  Proxy enabled: {}", cli.proxy);

    let spec = JobSpec {
        name: cli.job.clone(),
        keywords,
        keywords_hash,
        config_hash,
        fresh: cli.fresh,
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Cancellation requested; letting in-flight work wind down");
            let _ = cancel_tx.send(true);
        }
    });

    let tolerance = config.limits.failure_tolerance;
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let report = run_job(
        spec,
        Arc::new(config),
        cancel_rx,
        notifier,
        Arc::new(NoopSync),
    )
    .await?;

    print!("{}", report.render());

    if !report.is_settled() {
        tracing::warn!("Job is not finished; rerun to resume");
        std::process::exit(1);
    }

    if report.exceeds_tolerance(tolerance) {
        tracing::error!(
            "{} terminal failure(s) exceed the tolerance of {}",
            report.total_failed(),
            tolerance
        );
        std::process::exit(1);
    }

    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("trawl=info,warn"),
            1 => EnvFilter::new("trawl=debug,info"),
            2 => EnvFilter::new("trawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Reads keywords, one per line, skipping blanks
fn read_keywords(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read keywords file '{}': {}", path.display(), e))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Handles --stats: prints the ledger report for the job and exits
fn handle_stats(config: &trawl::Config, job: &str) -> anyhow::Result<()> {
    let paths = JobPaths::new(&config.output.root, job);
    let db_path = paths.ledger_db();

    if !db_path.exists() {
        anyhow::bail!("no ledger found for job '{}' at {}", job, db_path.display());
    }

    let mut ledger = SqliteLedger::open(&db_path)?;
    ledger.attach_job(job)?;

    let report = JobReport::from_ledger(job, &ledger)?;
    print!("{}", report.render());
    Ok(())
}

/// Handles --dry-run: validates config and shows what would run
fn handle_dry_run(config: &trawl::Config, job: &str, keywords: &[String]) {
    println!("=== Trawl Dry Run ===\n");

    println!("Job: {}", job);
    println!("Output root: {}", config.output.root);

    println!("\nSearch:");
    println!("  Endpoint: {}", config.search.endpoint);
    println!("  Result limit: {}", config.search.result_limit);

    println!("\nProxy pool:");
    if config.proxy.endpoints.is_empty() {
        println!("  (direct connections)");
    } else {
        println!("  {} endpoint(s)", config.proxy.endpoints.len());
    }
    println!("  Backoff base: {}ms", config.proxy.backoff_base_ms);
    println!("  Backoff cap: {}ms", config.proxy.backoff_cap_ms);
    println!("  Retry ceiling: {}", config.proxy.retry_ceiling);

    println!("\nWorker pools:");
    println!("  Discovery: {}", config.pools.discovery);
    println!("  Expansion: {}", config.pools.expansion);
    println!("  Crawl: {}", config.pools.crawl);

    println!("\nChunking:");
    println!("  Size: {} chars", config.chunking.chunk_size);
    println!("  Overlap: {} chars", config.chunking.chunk_overlap);

    println!("\nKeywords ({}):", keywords.len());
    for keyword in keywords {
        println!("  - {}", keyword);
    }

    println!("\n✓ Configuration is valid");
}

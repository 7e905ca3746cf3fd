//! Strata-Crawl main entry point
//!
//! This is the command-line interface for the Strata-Crawl jurisdiction crawler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use strata_crawl::checkpoint::{open_checkpoint, quarantine_corrupt};
use strata_crawl::config::{load_config_with_overrides, Config, ConfigOverrides};
use strata_crawl::crawler::run_crawl;
use strata_crawl::output::{print_checkpoint_summary, print_crawl_report};
use strata_crawl::StrataError;
use tracing_subscriber::EnvFilter;

/// Strata-Crawl: a resumable jurisdiction crawler
///
/// Strata-Crawl walks states, areas and name-prefix buckets of a listing
/// site, writes one CSV per area and checkpoints its progress so an
/// interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "strata-crawl")]
#[command(version)]
#[command(about = "A resumable jurisdiction crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the output directory from the configuration
    #[arg(long, value_name = "DIR")]
    base_dir: Option<PathBuf>,

    /// Discard the checkpoint and start over
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    fresh: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show what the checkpoint contains and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let overrides = ConfigOverrides {
        base_dir: cli.base_dir.clone(),
    };
    let (config, hash) = load_config_with_overrides(&cli.config, &overrides)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("strata_crawl=info,warn"),
            1 => EnvFilter::new("strata_crawl=debug,info"),
            2 => EnvFilter::new("strata_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Strata-Crawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Root URL: {}", config.crawler.root_url);
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!(
        "  Retries: {} ({}ms apart)",
        config.crawler.max_retries, config.crawler.retry_delay_ms
    );
    println!("  Prefixes: {}", config.crawler.prefixes);
    println!("  Download images: {}", config.crawler.download_images);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Base directory: {}", config.output.base_dir);
    println!(
        "  Checkpoint: {} ({:?})",
        config.checkpoint_path().display(),
        config.output.checkpoint_backend
    );

    // Opening the checkpoint surfaces corruption before a real run would
    let checkpoint = open_checkpoint(config).context("Checkpoint is unreadable")?;
    let summary = checkpoint.summary();

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would resume with {} states, {} areas and {} prefixes already done",
        summary.done_states, summary.done_areas, summary.done_prefixes
    );

    Ok(())
}

/// Handles the --stats mode: shows what the checkpoint contains
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let checkpoint = open_checkpoint(config).context("Checkpoint is unreadable")?;
    print_checkpoint_summary(&checkpoint.location(), &checkpoint.summary());
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (discarding previous progress)");
        reset_checkpoint(&config).context("Failed to reset checkpoint")?;
    } else {
        tracing::info!("Starting crawl (will resume from the checkpoint if present)");
    }

    tracing::info!(
        "Root: {}, prefixes: {}",
        config.crawler.root_url,
        config.crawler.prefixes
    );

    match run_crawl(config).await {
        Ok(report) => {
            tracing::info!("Crawl completed");
            print_crawl_report(&report);
            Ok(())
        }
        Err(e) if e.is_corrupt_state() => {
            tracing::error!("{}", e);
            tracing::error!("Re-run with --fresh to move the unreadable checkpoint aside");
            Err(e.into())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Clears the checkpoint, moving an unreadable one aside
fn reset_checkpoint(config: &Config) -> Result<(), StrataError> {
    match open_checkpoint(config) {
        Ok(mut checkpoint) => {
            checkpoint.reset()?;
            Ok(())
        }
        Err(e) => {
            tracing::warn!("Existing checkpoint is unreadable: {}", e);
            quarantine_corrupt(&config.checkpoint_path())?;
            Ok(())
        }
    }
}

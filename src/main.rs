//! Kumo command-line interface

use clap::Parser;
use kumo::config::{load_config_with_hash, Config};
use kumo::engine::Engine;
use kumo::storage::{JsonLinesStorage, JsonStorage, Storage};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Kumo: a polite, concurrent web crawler
#[derive(Parser, Debug)]
#[command(name = "kumo")]
#[command(version)]
#[command(about = "A polite, concurrent web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Additional seed URLs (appended to the config's seeds)
    #[arg(short, long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume from an existing checkpoint if one is present
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start fresh, discarding any existing checkpoint
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("loading configuration from {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)?;
    tracing::debug!(hash = %config_hash, "configuration loaded");

    if cli.dry_run {
        print_dry_run(&config, &cli.seeds);
        return Ok(());
    }

    run_crawl(config, cli).await
}

fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("kumo=info,warn"),
            1 => EnvFilter::new("kumo=debug,info"),
            2 => EnvFilter::new("kumo=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_dry_run(config: &Config, extra_seeds: &[String]) {
    println!("=== Kumo Dry Run ===\n");

    println!("Engine:");
    println!("  Concurrency: {}", config.engine.concurrency);
    println!("  Max depth: {}", config.engine.max_depth);
    println!("  Request timeout: {:?}", config.engine.request_timeout());
    println!("  Politeness delay: {:?}", config.engine.politeness_delay());
    println!("  Respect robots.txt: {}", config.engine.respect_robots);
    println!("  Max retries: {}", config.engine.max_retries);
    println!("  Max requests: {}", config.engine.max_requests);
    match config.engine.checkpoint_interval() {
        Some(interval) => println!("  Checkpoint interval: {:?}", interval),
        None => println!("  Checkpointing: disabled"),
    }

    if !config.engine.allowed_domains.is_empty() {
        println!("\nAllowed domains ({}):", config.engine.allowed_domains.len());
        for domain in &config.engine.allowed_domains {
            println!("  - {}", domain);
        }
    }
    if !config.engine.disallowed_domains.is_empty() {
        println!(
            "\nDisallowed domains ({}):",
            config.engine.disallowed_domains.len()
        );
        for domain in &config.engine.disallowed_domains {
            println!("  - {}", domain);
        }
    }

    println!("\nStorage:");
    println!("  Format: {}", config.storage.format);
    println!("  Output: {}", config.storage.output_path);
    println!("  Batch size: {}", config.storage.batch_size);

    let seed_count = config.engine.seeds.len() + extra_seeds.len();
    println!("\nSeeds ({}):", seed_count);
    for seed in config.engine.seeds.iter().chain(extra_seeds) {
        println!("  - {}", seed);
    }

    println!("\nConfiguration is valid.");
}

async fn run_crawl(config: Config, cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let storage = build_storage(&config)?;
    let mut seeds = config.engine.seeds.clone();
    seeds.extend(cli.seeds.iter().cloned());

    let engine = Engine::new(config)?;
    engine.set_storage(storage);

    if cli.fresh {
        engine.clean_checkpoint()?;
    } else if cli.resume && engine.has_checkpoint() {
        engine.restore_checkpoint()?;
    }

    // Seeds pass through normal admission; rejects are logged and skipped
    for seed in &seeds {
        if let Err(err) = engine.add_seed(seed).await {
            tracing::warn!(seed = %seed, reason = err.kind(), "seed skipped");
        }
    }

    engine.start()?;

    // First Ctrl-C stops gracefully, second aborts
    let handle = engine.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping crawl");
            handle.stop();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("second interrupt, aborting");
            std::process::exit(130);
        }
    });

    let stats = engine.wait().await;

    println!("\n=== Crawl Complete ===");
    println!("Requests sent:     {}", stats.requests_sent);
    println!("Responses OK:      {}", stats.responses_ok);
    println!("Responses error:   {}", stats.responses_error);
    println!("Requests failed:   {}", stats.requests_failed);
    println!("Items scraped:     {}", stats.items_scraped);
    println!("Items dropped:     {}", stats.items_dropped);
    println!("URLs enqueued:     {}", stats.urls_enqueued);
    println!("URLs filtered:     {}", stats.urls_filtered);
    println!("Bytes downloaded:  {}", stats.bytes_downloaded);

    Ok(())
}

fn build_storage(config: &Config) -> Result<Box<dyn Storage>, Box<dyn std::error::Error>> {
    let path = &config.storage.output_path;
    let storage: Box<dyn Storage> = match config.storage.format.as_str() {
        "json" => Box::new(JsonStorage::create(path)),
        _ => Box::new(JsonLinesStorage::create(path)?),
    };
    Ok(storage)
}

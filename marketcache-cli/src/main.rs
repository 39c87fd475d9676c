use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use marketcache::{CacheConfig, LoggingConfig, MarketCache};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "marketcache-cli")]
#[command(about = "marketcache CLI - inspect and purge a market data cache", long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store URL (overrides the config file)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a cache stats snapshot as JSON
    Stats,
    /// Print the cached value of a key
    Get { key: String },
    /// Remaining TTL of a key in seconds
    Ttl { key: String },
    /// Delete a key
    Del { key: String },
    /// Delete every key matching a glob pattern
    Purge { pattern: String },
    /// Check store connectivity
    Ping,
}

fn load_config(args: &Args) -> Result<CacheConfig> {
    let config = match &args.config {
        Some(path) => CacheConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => CacheConfig::default(),
    };

    Ok(match &args.url {
        Some(url) => config.with_store_url(url.clone()),
        None => config,
    })
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn execute(cache: &MarketCache, command: &Command) -> Result<String> {
    let store = cache.store();

    let output = match command {
        Command::Stats => {
            let stats = cache.monitor().get_cache_stats().await;
            serde_json::to_string_pretty(&stats)?
        }
        Command::Get { key } => match store.get::<serde_json::Value>(key).await {
            Some(value) => serde_json::to_string_pretty(&value)?,
            None => "(nil)".dimmed().to_string(),
        },
        Command::Ttl { key } => format!("(integer) {}", store.ttl(key).await),
        Command::Del { key } => format!("(integer) {}", u8::from(store.del(key).await)),
        Command::Purge { pattern } => {
            let removed = store.del_pattern(pattern).await;
            format!("{} {}", format!("(integer) {removed}").green(), "deleted".dimmed())
        }
        Command::Ping => {
            if store.ping().await {
                "PONG".green().to_string()
            } else {
                anyhow::bail!("store unreachable at {}", cache.config().store.url);
            }
        }
    };

    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.logging, args.verbose);

    let cache = MarketCache::connect(config).context("Invalid store configuration")?;

    let start = Instant::now();
    match execute(&cache, &args.command).await {
        Ok(output) => {
            println!("{output}");
            debug!("completed in {:.2?}", start.elapsed());
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "{}", format!("Error: {}", e).red());
            std::process::exit(1);
        }
    }
}

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use quake_feed::clock::{Clock, SystemClock};
use quake_feed::config::Config;
use quake_feed::feed::FeedService;
use quake_feed::pipeline::ScrapeCycle;
use quake_feed::source::{DocumentSource, FileSource, HttpSource};
use quake_feed::storage::{InMemoryStorage, SqliteStorage, Storage};
use quake_feed::{logging, observability, server};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "quake_feed")]
#[command(about = "Earthquake bulletin scraper and 24-hour event feed")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scrape cycle and print its report
    Scrape {
        /// Read the bulletin from a saved HTML file instead of the network
        #[arg(long)]
        from_file: Option<PathBuf>,
    },
    /// Delete events past the retention horizon
    Sweep,
    /// Print the recent window as JSON, refreshing first if stale
    List,
    /// Serve the read API over HTTP
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn open_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    if config.storage.is_in_memory() {
        info!("Using in-memory storage");
        return Ok(Arc::new(InMemoryStorage::new()));
    }
    let storage = SqliteStorage::open(&config.storage.db_path)
        .with_context(|| format!("opening database {}", config.storage.db_path))?;
    info!("Using SQLite storage at {}", config.storage.db_path);
    Ok(Arc::new(storage))
}

fn build_feed(config: &Config, source: Arc<dyn DocumentSource>) -> Result<Arc<FeedService>> {
    let storage = open_storage(config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cycle = Arc::new(ScrapeCycle::new(
        source,
        storage,
        clock.clone(),
        config.cycle_settings(),
    ));
    Ok(Arc::new(FeedService::new(cycle, clock, config.feed_settings())))
}

fn http_source(config: &Config) -> Result<Arc<dyn DocumentSource>> {
    Ok(Arc::new(HttpSource::new(
        config.source.url.clone(),
        config.source_timeout(),
    )?))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_from(cli.config.as_deref())?;

    observability::init(config.server.metrics_addr)
        .map_err(|e| anyhow!("metrics setup failed: {}", e))?;

    match cli.command {
        Commands::Scrape { from_file } => {
            let source: Arc<dyn DocumentSource> = match from_file {
                Some(path) => Arc::new(FileSource::new(path)),
                None => http_source(&config)?,
            };
            let feed = build_feed(&config, source)?;
            match feed.trigger().await {
                Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                Err(e) => {
                    error!("Scrape failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Sweep => {
            let storage = open_storage(&config)?;
            let clock = SystemClock;
            let settings = config.cycle_settings();
            let deleted =
                quake_feed::pipeline::sweep_expired(storage.as_ref(), clock.now(), settings.retention)
                    .await?;
            println!("Deleted {} expired events", deleted);
        }
        Commands::List => {
            let feed = build_feed(&config, http_source(&config)?)?;
            let recent = feed.list_recent().await?;
            println!("{}", serde_json::to_string_pretty(&recent)?);
        }
        Commands::Serve { port } => {
            let feed = build_feed(&config, http_source(&config)?)?;
            let port = port.unwrap_or(config.server.port);
            let every = config.server.refresh_interval_secs.map(Duration::from_secs);
            server::start_server(feed, port, every)
                .await
                .map_err(|e| anyhow!("server error: {}", e))?;
        }
    }

    Ok(())
}

use anyhow::{Context, Result, bail};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use sondewatch_lib::device::DeviceState;
use sondewatch_lib::feed::{FeedSource, FileFeed, HttpFeed};
use sondewatch_lib::observer::StoreObserver;
use sondewatch_lib::scheduler::{CycleStatus, Poller};
use sondewatch_lib::{DeviceStore, EngineConfig, SharedStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[path = "../logging.rs"]
mod logging;

/// Poll a radiosonde feed and print live updates until Ctrl+C.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Proxy endpoint answering `mode=all` / `mode=single&id=..`.
    #[arg(short, long, conflicts_with = "file")]
    url: Option<String>,
    /// Export file re-read on every cycle.
    #[arg(short = 'F', long)]
    file: Option<PathBuf>,
    /// Follow only sondes whose identifier contains this text.
    #[arg(short, long)]
    filter: Option<String>,
    /// TOML configuration file (merged with SONDEWATCH_* variables).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Polling interval in milliseconds.
    #[arg(short, long)]
    interval_ms: Option<u64>,
    /// Print the full summary of every sonde on exit.
    #[arg(long)]
    summary: bool,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

/// Prints one line per updated sonde
struct TerminalObserver;

fn fmt(v: Option<f64>, digits: usize) -> String {
    v.map(|v| format!("{v:.digits$}")).unwrap_or_else(|| "-".to_string())
}

impl StoreObserver for TerminalObserver {
    fn device_updated(&self, device: &DeviceState) {
        let s = &device.snapshot;
        let k = &device.derived.kinematics;
        let time = s
            .time
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let burst = if device.events.burst.is_some() { " BURST" } else { "" };
        println!(
            "[{time}] {:<12} {:<8} {:>8} alt={:>7} m  vz={:>6} m/s  vh={:>6} m/s  rx={:>8} m{burst}",
            device.id,
            device.type_label.as_deref().unwrap_or("-"),
            device.status.to_string(),
            fmt(s.alt, 0),
            fmt(k.vertical_speed, 1),
            fmt(k.horizontal_speed, 1),
            fmt(device.derived.distance_to_rx, 0),
        );
    }

    fn device_removed(&self, id: &str) {
        println!("** {id} left the visibility window **");
    }

    fn cycle_finished(&self, status: &CycleStatus) {
        match status {
            CycleStatus::Fresh { .. } => {}
            CycleStatus::Stale { error, .. } => warn!("Feed unavailable ({error}), showing cached data"),
            CycleStatus::Failed { error } => warn!("Feed unavailable ({error}), no data yet"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::setup_logging(cli.log_file.clone(), &cli.verbose)?;

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from(path).with_context(|| format!("Failed to load config {:?}", path))?,
        None => EngineConfig::load().context("Failed to load config from environment")?,
    };
    if let Some(url) = &cli.url {
        config.feed.url = Some(url.clone());
    }
    if cli.filter.is_some() {
        config.feed.filter = cli.filter.clone();
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.poll.interval_ms = interval_ms;
    }
    config.validate().context("Invalid configuration")?;

    let source: Arc<dyn FeedSource> = match (&cli.file, &config.feed.url) {
        (Some(path), _) => Arc::new(FileFeed::new(path)),
        (None, Some(url)) => Arc::new(HttpFeed::new(url, config.poll.fetch_timeout()).context("Failed to build HTTP client")?),
        (None, None) => bail!("No feed source: pass --url, --file or set feed.url in the config"),
    };
    info!(
        source = %source.describe(),
        receiver = %config.receiver.name,
        interval_ms = config.poll.interval_ms,
        "Starting sonde monitor"
    );

    let store = SharedStore::new(DeviceStore::from_config(&config));
    let poller = Poller::new(source, store.clone(), &config, Arc::new(TerminalObserver));
    poller.start(config.feed.filter.as_deref());

    signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    println!("\nInterrupted by user");
    if !poller.shutdown_within(SHUTDOWN_GRACE).await {
        warn!("Last poll cycle was cut short");
    }

    if cli.summary {
        for device in store.snapshot_all().await {
            println!("{device}");
            println!("--------------------------------------------------------------------------------");
        }
    }
    Ok(())
}

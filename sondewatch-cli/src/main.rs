use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use sondewatch_lib::{DeviceStore, EngineConfig, Normalizer};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

mod logging;

/// Parse a radiosonde telemetry export and print per-sonde summaries.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Export file to read; stdin when omitted or `-`.
    input: Option<PathBuf>,
    /// TOML configuration file (merged with SONDEWATCH_* variables).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Keep only sondes whose identifier contains this text.
    #[arg(short, long)]
    filter: Option<String>,
    /// Reference time for ages (RFC 3339); defaults to the newest fix.
    #[arg(long, value_parser = parse_time)]
    now: Option<DateTime<Utc>>,
    /// Print JSON instead of text summaries.
    #[arg(long)]
    json: bool,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 time: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::setup_logging(cli.log_file.clone(), &cli.verbose)?;

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from(path).with_context(|| format!("Failed to load config {:?}", path))?,
        None => EngineConfig::load().context("Failed to load config from environment")?,
    };
    if cli.filter.is_some() {
        config.feed.filter = cli.filter.clone();
    }

    let text = read_input(cli.input.as_ref()).await?;
    let normalizer =
        Normalizer::new(config.parse.fallback.clone(), config.parse.naive_zone).with_filter(config.feed.filter.as_deref());
    let batch = normalizer.normalize(&text).context("Failed to parse telemetry export")?;
    if batch.stats.rejected() > 0 {
        warn!(
            bad_timestamp = batch.stats.bad_timestamp,
            bad_coordinates = batch.stats.bad_coordinates,
            filtered_out = batch.stats.filtered_out,
            "some rows were skipped"
        );
    }

    let now = cli
        .now
        .or_else(|| batch.observations.iter().map(|o| o.point.time).max())
        .unwrap_or_else(Utc::now);
    let mut store = DeviceStore::from_config(&config);
    let report = store.merge_batch(batch, now);
    info!(sondes = store.len(), removed = report.removed.len(), %now, "export merged");

    let devices = store.list();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else {
        for device in devices {
            println!("{device}");
            println!("--------------------------------------------------------------------------------");
        }
    }
    Ok(())
}

async fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path.filter(|p| p.as_os_str() != "-") {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path)),
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

//! ReliefNet — disaster-event ingestion and triage service
//!
//! Runs the ingestion orchestrator (five feed loops), the anomaly
//! detection loop, and the daily situation-report task until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Run with mock feeds (no API keys required)
//! cargo run --release
//!
//! # Live feeds
//! OPENWEATHERMAP_API_KEY=... FIRMS_API_KEY=... cargo run --release
//!
//! # One-shot poll of a single source
//! cargo run --release -- --poll-once usgs_earthquakes
//! ```
//!
//! # Environment Variables
//!
//! - `RELIEFNET_CONFIG`: path to a TOML config file
//! - `RELIEFNET_DATA_DIR`: store directory (default: ./data)
//! - `RUST_LOG`: logging filter (default: info)
//! - Per-option overrides, e.g. `USGS_POLL_INTERVAL_S`, `INGESTION_ENABLED`

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reliefnet::anomaly::AnomalyDetector;
use reliefnet::background::SitrepTask;
use reliefnet::config::{self, AppConfig};
use reliefnet::ingestion::IngestionOrchestrator;
use reliefnet::store::StoreGateway;
use reliefnet::types::SourceName;

#[derive(Parser, Debug)]
#[command(name = "reliefnet")]
#[command(about = "Disaster-event ingestion and triage service")]
#[command(version)]
struct CliArgs {
    /// Poll one source once, print the row count, and exit.
    /// Sources: openweathermap, gdacs, usgs_earthquakes, nasa_firms, social_media
    #[arg(long, value_name = "SOURCE")]
    poll_once: Option<String>,

    /// Override the store directory
    #[arg(long, value_name = "DIR")]
    data_dir: Option<String>,

    /// Generate a situation report immediately and exit
    #[arg(long)]
    sitrep_now: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = CliArgs::parse();
    config::init(AppConfig::load());

    let data_dir = args
        .data_dir
        .unwrap_or_else(|| config::get().store.data_dir.clone());
    let store = StoreGateway::open(&data_dir)
        .with_context(|| format!("failed to open store at {data_dir}"))?;
    info!(data_dir = %data_dir, "Store opened");

    // One-shot modes
    if let Some(source) = args.poll_once {
        return poll_once(&store, &source).await;
    }
    if args.sitrep_now {
        let report = SitrepTask::new(store).generate_report("manual", "cli").await?;
        info!(report_id = %report.id, "Situation report generated");
        println!("{}", report.content_markdown);
        return Ok(());
    }

    // Long-running service
    let cancel = CancellationToken::new();

    let orchestrator = IngestionOrchestrator::new(store.clone(), cancel.clone());
    orchestrator.start();

    let anomaly_handle = tokio::spawn(
        AnomalyDetector::new(store.clone()).run_periodic(cancel.clone()),
    );
    let sitrep_handle = tokio::spawn(SitrepTask::new(store.clone()).run_daily(cancel.clone()));

    info!("ReliefNet running — press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    orchestrator.stop().await;
    cancel.cancel();
    for handle in [anomaly_handle, sitrep_handle] {
        if let Err(e) = handle.await {
            warn!(error = %e, "Background task did not shut down cleanly");
        }
    }

    store.flush().context("final store flush failed")?;
    info!("Shutdown complete");
    Ok(())
}

async fn poll_once(store: &StoreGateway, source: &str) -> Result<()> {
    let name = SourceName::parse(source)
        .with_context(|| format!("unknown source '{source}'"))?;
    let cancel = CancellationToken::new();
    let orchestrator = IngestionOrchestrator::new(store.clone(), cancel);

    let output = orchestrator.poll_source(name).await?;
    info!(source = %name, rows = output.len(), "One-shot poll complete");
    println!("{}: {} new rows", name, output.len());
    Ok(())
}

//! Energy Agent - per-pod energy and resource rollup
//!
//! Replays recorded per-interval readings through the rollup engine and
//! writes the exported feature vectors and exposition rows as JSON lines.

use anyhow::{Context, Result};
use energy_lib::export::text_row_labels;
use energy_lib::{EntityRegistry, RollupMetrics, StructuredLogger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod exporter;
mod replay;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");
const SNAPSHOT_BUFFER: usize = 16;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, exports own stdout
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!("Starting energy-agent");

    let config = config::AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        replay_path = %config.replay_path.display(),
        interval_ms = config.interval_ms,
        "Agent configured"
    );

    let metrics = RollupMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(AGENT_VERSION, config.metrics.feature_vector_len());
    debug!(labels = ?text_row_labels(&config.metrics), "Exposition labels");

    let replay = replay::ReplayFile::load(&config.replay_path).await?;
    let registry = EntityRegistry::new(Arc::new(config.metrics.clone()), metrics.clone(), logger.clone());

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let (replay_loop, snapshot_rx) = replay::ReplayLoop::new(
        registry,
        replay,
        Duration::from_millis(config.interval_ms),
        SNAPSHOT_BUFFER,
    );

    let replay_handle = tokio::spawn(replay_loop.run(shutdown_rx));
    let export_handle = tokio::spawn(exporter::run(snapshot_rx, config.output, tokio::io::stdout()));

    let signal_logger = logger.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_logger.log_shutdown("SIGINT received");
            let _ = shutdown_tx.send(());
        }
    });

    let registry = replay_handle.await.context("Replay task failed")?;
    let lines = export_handle.await.context("Export task failed")??;

    info!(
        intervals = registry.sequence(),
        pods = registry.len(),
        lines,
        "Replay complete"
    );
    debug!(metrics = %metrics.encode_text(), "Rollup metrics");
    logger.log_shutdown("replay finished");

    Ok(())
}

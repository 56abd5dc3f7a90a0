//! Replay loop
//!
//! Drives the rollup engine from a recorded stream of readings: one
//! recorded interval per tick. Each tick runs a single collection pass and
//! hands the resulting snapshot to the exporter over a channel, so export
//! never overlaps with the next pass's writes.

use anyhow::{Context, Result};
use energy_lib::{EntityRegistry, IntervalSnapshot, Reading};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Recorded readings, one entry per sampling interval
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayFile {
    pub intervals: Vec<ReplayInterval>,
}

/// Readings collected during one interval
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayInterval {
    #[serde(default)]
    pub readings: Vec<Reading>,
    /// Pods confirmed gone before this interval
    #[serde(default)]
    pub removed: Vec<PodRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRef {
    pub namespace: String,
    pub pod_name: String,
}

impl ReplayFile {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse replay file {}", path.display()))
    }
}

/// Replays recorded intervals against the registry
pub struct ReplayLoop {
    registry: EntityRegistry,
    replay: ReplayFile,
    interval: Duration,
    snapshot_tx: mpsc::Sender<IntervalSnapshot>,
}

impl ReplayLoop {
    /// Create a new replay loop and the receiving end of its snapshots
    pub fn new(
        registry: EntityRegistry,
        replay: ReplayFile,
        interval: Duration,
        buffer_size: usize,
    ) -> (Self, mpsc::Receiver<IntervalSnapshot>) {
        let (snapshot_tx, snapshot_rx) = mpsc::channel(buffer_size);

        let loop_instance = Self {
            registry,
            replay,
            interval,
            snapshot_tx,
        };

        (loop_instance, snapshot_rx)
    }

    /// Run until the replay is exhausted, the exporter goes away or a
    /// shutdown signal arrives. Returns the registry for inspection.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> EntityRegistry {
        let intervals = std::mem::take(&mut self.replay.intervals);
        info!(
            intervals = intervals.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Starting replay loop"
        );

        let mut ticker = interval(self.interval);
        let mut pending = intervals.into_iter();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(recorded) = pending.next() else {
                        info!("Replay exhausted");
                        break;
                    };

                    let snapshot = self.collect(&recorded);
                    debug!(
                        sequence = snapshot.sequence(),
                        pods = snapshot.len(),
                        overflows = snapshot.overflows(),
                        "Interval collected"
                    );

                    if self.snapshot_tx.send(snapshot).await.is_err() {
                        warn!("Exporter channel closed, stopping replay");
                        break;
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down replay loop");
                    break;
                }
            }
        }

        self.registry
    }

    /// Run one collection pass over a recorded interval
    fn collect(&mut self, recorded: &ReplayInterval) -> IntervalSnapshot {
        for pod in &recorded.removed {
            if self.registry.remove(&pod.namespace, &pod.pod_name).is_none() {
                debug!(pod_name = %pod.pod_name, namespace = %pod.namespace, "Removed pod was not tracked");
            }
        }

        let mut pass = self.registry.begin_pass();
        pass.apply_all(&recorded.readings);
        pass.finish()
    }
}

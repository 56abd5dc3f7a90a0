//! JSON lines exporter
//!
//! Writes one line per pod per interval. Exporters only ever see an
//! [`IntervalSnapshot`], never the live registry.

use crate::config::OutputMode;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use energy_lib::export::{lookup_energy_value, to_feature_vector, to_text_row};
use energy_lib::{EnergyDomain, IntervalSnapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One exported pod for one interval
#[derive(Debug, Serialize)]
pub struct ExportLine<'a> {
    pub sequence: u64,
    pub taken_at: DateTime<Utc>,
    pub pod_name: &'a str,
    pub namespace: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<Vec<String>>,
    /// Current interval energy per domain
    pub energy: BTreeMap<&'static str, f64>,
}

/// Render every record of a snapshot as JSON lines
pub fn render(snapshot: &IntervalSnapshot, mode: OutputMode) -> Result<String> {
    let mut out = String::new();

    for record in snapshot.records() {
        let mut energy = BTreeMap::new();
        for domain in EnergyDomain::ALL {
            match lookup_energy_value(record, domain.as_str(), true) {
                Ok(value) => {
                    energy.insert(domain.as_str(), value);
                }
                Err(e) => warn!(error = %e, "Skipping energy domain"),
            }
        }

        let line = ExportLine {
            sequence: snapshot.sequence(),
            taken_at: snapshot.taken_at(),
            pod_name: record.pod_name(),
            namespace: record.namespace(),
            features: mode.includes_features().then(|| to_feature_vector(record)),
            row: mode.includes_text().then(|| to_text_row(record)),
            energy,
        };

        let json = serde_json::to_string(&line).context("Failed to serialize export line")?;
        out.push_str(&json);
        out.push('\n');
    }

    Ok(out)
}

/// Write snapshots until the channel closes. Returns the number of lines
/// written.
pub async fn run<W>(mut rx: mpsc::Receiver<IntervalSnapshot>, mode: OutputMode, mut out: W) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut lines = 0;

    while let Some(snapshot) = rx.recv().await {
        let rendered = render(&snapshot, mode)?;
        out.write_all(rendered.as_bytes())
            .await
            .context("Failed to write export")?;
        out.flush().await.context("Failed to flush export")?;

        lines += snapshot.len();
        debug!(sequence = snapshot.sequence(), pods = snapshot.len(), "Snapshot exported");
    }

    Ok(lines)
}

//! Export adapters
//!
//! Pure functions that flatten an [`EntityRecord`] for its two consumers:
//! the power model, which reads a positional feature vector, and the
//! exposition layer, which reads an ordered row of string label values.
//! Both orders come from the shared [`MetricConfig`].

use crate::config::MetricConfig;
use crate::error::ExportError;
use crate::observability::RollupMetrics;
use crate::record::{EnergyDomain, EntityRecord};
use tracing::trace;

/// Longest command prefix carried in the exposition row
pub const MAX_COMMAND_LEN: usize = 10;

/// Value of a floating point feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatValue {
    /// Current and aggregate values
    Value(f64, f64),
    /// No extraction is defined for this metric yet; exported as zero
    NotYetSupported,
}

impl FloatValue {
    /// Current/aggregate pair as exported
    pub fn pair(&self) -> (f64, f64) {
        match self {
            FloatValue::Value(curr, aggr) => (*curr, *aggr),
            FloatValue::NotYetSupported => (0.0, 0.0),
        }
    }
}

/// Floating point extraction for a metric
///
/// No floating point metrics are tracked by a record, so every name is
/// reported as [`FloatValue::NotYetSupported`].
pub fn extract_float(_record: &EntityRecord, _metric: &str) -> FloatValue {
    FloatValue::NotYetSupported
}

/// Positional feature vector for the power model
///
/// Float features come first, then the unsigned features, then the disk
/// count. Every value is the metric's interval delta.
pub fn to_feature_vector(record: &EntityRecord) -> Vec<f32> {
    let config = record.config();
    let mut values = Vec::with_capacity(config.feature_vector_len());

    for metric in &config.float_features {
        let value = extract_float(record, metric);
        if value == FloatValue::NotYetSupported {
            trace!(metric = %metric, "Float feature not supported, exporting zero");
        }
        values.push(value.pair().0 as f32);
    }

    for metric in config.uint_features() {
        let (curr, _) = record.lookup_current_and_aggregate(metric);
        values.push(curr as f32);
    }

    values.push(record.disks() as f32);
    values
}

/// Label values for the exposition layer, in [`text_row_labels`] order
pub fn to_text_row(record: &EntityRecord) -> Vec<String> {
    let config = record.config();
    let mut row = Vec::with_capacity(3 + 2 * (config.feature_vector_len() - 1) + 2);

    row.push(record.pod_name().to_string());
    row.push(record.namespace().to_string());
    row.push(truncate_command(record.command()).to_string());

    for metric in &config.float_features {
        let (curr, aggr) = extract_float(record, metric).pair();
        row.push(format!("{:.6}", curr));
        row.push(format!("{:.6}", aggr));
    }

    for metric in config.uint_features() {
        let (curr, aggr) = record.lookup_current_and_aggregate(metric);
        row.push(curr.to_string());
        row.push(aggr.to_string());
    }

    if config.enable_cpu_freq {
        row.push(format!("{:.6}", record.avg_cpu_freq()));
    }

    row.push(record.disks().to_string());
    row
}

/// Label names matching [`to_text_row`] for a configuration
pub fn text_row_labels(config: &MetricConfig) -> Vec<String> {
    let mut labels = vec![
        "pod_name".to_string(),
        "pod_namespace".to_string(),
        "command".to_string(),
    ];

    let metrics = config
        .float_features
        .iter()
        .map(String::as_str)
        .chain(config.uint_features());
    for metric in metrics {
        labels.push(format!("curr_{}", metric));
        labels.push(format!("total_{}", metric));
    }

    if config.enable_cpu_freq {
        labels.push("avg_cpu_frequency".to_string());
    }

    labels.push("block_devices_used".to_string());
    labels
}

/// Current or aggregate energy for a domain name
///
/// Unknown domain names are counted in `energy_rollup_unknown_domain_total`.
pub fn lookup_energy_value(
    record: &EntityRecord,
    domain: &str,
    want_current: bool,
) -> Result<f64, ExportError> {
    let domain = match domain.parse::<EnergyDomain>() {
        Ok(domain) => domain,
        Err(e) => {
            RollupMetrics::new().inc_unknown_domain();
            return Err(e);
        }
    };
    let stat = record.energy(domain);
    let value = if want_current {
        stat.current()
    } else {
        stat.aggregate()
    };
    Ok(value as f64)
}

/// First [`MAX_COMMAND_LEN`] characters of a command
fn truncate_command(command: &str) -> &str {
    match command.char_indices().nth(MAX_COMMAND_LEN) {
        Some((idx, _)) => &command[..idx],
        None => command,
    }
}

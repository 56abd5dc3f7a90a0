//! Observability for the rollup engine
//!
//! Provides:
//! - Prometheus metrics (overflows, unknown energy domains, tracked pods, snapshot latency)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for snapshot latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RollupMetricsInner> = OnceLock::new();

struct RollupMetricsInner {
    overflows: IntCounterVec,
    unknown_domains: IntCounter,
    entities_tracked: IntGauge,
    intervals: IntCounter,
    snapshot_latency_seconds: Histogram,
}

impl RollupMetricsInner {
    fn new() -> Self {
        Self {
            overflows: register_int_counter_vec!(
                "energy_rollup_overflows_total",
                "Counter readings that wrapped the aggregate, by reading source",
                &["source"]
            )
            .expect("Failed to register overflows_total"),

            unknown_domains: register_int_counter!(
                "energy_rollup_unknown_domain_total",
                "Energy lookups for a domain outside the known set"
            )
            .expect("Failed to register unknown_domain_total"),

            entities_tracked: register_int_gauge!(
                "energy_rollup_entities_tracked",
                "Number of pods currently tracked"
            )
            .expect("Failed to register entities_tracked"),

            intervals: register_int_counter!(
                "energy_rollup_intervals_total",
                "Completed sampling intervals"
            )
            .expect("Failed to register intervals_total"),

            snapshot_latency_seconds: register_histogram!(
                "energy_rollup_snapshot_latency_seconds",
                "Time spent snapshotting and resetting all records at interval end",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register snapshot_latency_seconds"),
        }
    }
}

/// Rollup metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance. Clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct RollupMetrics {
    _private: (),
}

impl Default for RollupMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RollupMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollupMetrics").finish_non_exhaustive()
    }
}

impl RollupMetrics {
    /// Create a new metrics handle (registers global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RollupMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RollupMetricsInner {
        GLOBAL_METRICS.get_or_init(RollupMetricsInner::new)
    }

    /// Count an aggregate overflow for a reading source
    pub fn inc_overflow(&self, source: &str) {
        self.inner().overflows.with_label_values(&[source]).inc();
    }

    pub fn inc_unknown_domain(&self) {
        self.inner().unknown_domains.inc();
    }

    pub fn set_entities_tracked(&self, count: i64) {
        self.inner().entities_tracked.set(count);
    }

    pub fn inc_intervals(&self) {
        self.inner().intervals.inc();
    }

    pub fn observe_snapshot_latency(&self, duration_secs: f64) {
        self.inner().snapshot_latency_seconds.observe(duration_secs);
    }

    /// Overflows counted so far for a reading source
    pub fn overflow_count(&self, source: &str) -> u64 {
        self.inner().overflows.with_label_values(&[source]).get()
    }

    /// Unknown energy domain lookups counted so far
    pub fn unknown_domain_count(&self) -> u64 {
        self.inner().unknown_domains.get()
    }

    /// Render the default registry in the Prometheus text format
    pub fn encode_text(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for rollup events
///
/// Emits event-tagged JSON log lines for interval completion, overflows,
/// and lifecycle events.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Log a counter overflow; accumulation restarted
    pub fn log_overflow(
        &self,
        pod_name: &str,
        namespace: &str,
        source: &str,
        previous: u64,
        incoming: u64,
    ) {
        warn!(
            event = "counter_overflow",
            node = %self.node_name,
            pod_name = %pod_name,
            namespace = %namespace,
            source = %source,
            previous = previous,
            incoming = incoming,
            "Aggregate overflow, accumulation restarted"
        );
    }

    /// Log the end of a sampling interval
    pub fn log_interval_complete(&self, sequence: u64, entities: usize, readings: usize) {
        info!(
            event = "interval_complete",
            node = %self.node_name,
            sequence = sequence,
            entities = entities,
            readings = readings,
            "Sampling interval complete"
        );
    }

    /// Log removal of a pod confirmed gone
    pub fn log_entity_removed(&self, pod_name: &str, namespace: &str) {
        info!(
            event = "entity_removed",
            node = %self.node_name,
            pod_name = %pod_name,
            namespace = %namespace,
            "Stopped tracking pod"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, features: usize) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            features = features,
            "Energy agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Energy agent shutting down"
        );
    }
}

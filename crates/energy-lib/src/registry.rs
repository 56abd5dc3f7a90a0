//! Pod registry and the per-interval write discipline
//!
//! Records are mutated by exactly one collection pass per interval and read
//! by exporters only through an immutable snapshot:
//!
//! 1. [`EntityRegistry::begin_pass`] borrows the registry mutably, so only
//!    one pass can exist at a time.
//! 2. Readings are applied through the [`CollectionPass`].
//! 3. [`CollectionPass::finish`] clones every record into an
//!    [`IntervalSnapshot`], then resets all records for the next interval.
//!
//! The snapshot is owned and `Send`, so it can be handed to an exporter on
//! another thread or task while the next pass runs.

use crate::config::MetricConfig;
use crate::error::{ExportError, StatError};
use crate::export;
use crate::models::Reading;
use crate::observability::{RollupMetrics, StructuredLogger};
use crate::record::EntityRecord;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

fn pod_key(namespace: &str, pod_name: &str) -> String {
    format!("{}/{}", namespace, pod_name)
}

/// All pods tracked on this node
#[derive(Debug)]
pub struct EntityRegistry {
    /// Map of "namespace/pod" -> record
    records: HashMap<String, EntityRecord>,
    config: Arc<MetricConfig>,
    metrics: RollupMetrics,
    logger: StructuredLogger,
    /// Number of completed intervals
    sequence: u64,
}

impl EntityRegistry {
    pub fn new(config: Arc<MetricConfig>, metrics: RollupMetrics, logger: StructuredLogger) -> Self {
        Self {
            records: HashMap::new(),
            config,
            metrics,
            logger,
            sequence: 0,
        }
    }

    pub fn config(&self) -> &Arc<MetricConfig> {
        &self.config
    }

    /// Number of completed intervals
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn get(&self, namespace: &str, pod_name: &str) -> Option<&EntityRecord> {
        self.records.get(&pod_key(namespace, pod_name))
    }

    /// Tracked pods as "namespace/pod", sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stop tracking a pod that has been confirmed gone
    pub fn remove(&mut self, namespace: &str, pod_name: &str) -> Option<EntityRecord> {
        let removed = self.records.remove(&pod_key(namespace, pod_name));
        if removed.is_some() {
            self.logger.log_entity_removed(pod_name, namespace);
            self.metrics.set_entities_tracked(self.records.len() as i64);
        }
        removed
    }

    /// Start the collection pass for the next interval
    pub fn begin_pass(&mut self) -> CollectionPass<'_> {
        CollectionPass {
            registry: self,
            readings: 0,
            overflows: 0,
        }
    }
}

/// Exclusive write access to the registry for one interval
///
/// Must be closed with [`CollectionPass::finish`]; dropping it leaves the
/// interval's values in place for the next pass.
#[must_use = "a collection pass must be finished to reset the interval"]
pub struct CollectionPass<'a> {
    registry: &'a mut EntityRegistry,
    readings: usize,
    overflows: usize,
}

impl<'a> CollectionPass<'a> {
    /// Record for a pod, created on first observation
    pub fn record_mut(&mut self, pod_name: &str, namespace: &str) -> &mut EntityRecord {
        let key = pod_key(namespace, pod_name);
        let registry = &mut *self.registry;

        if !registry.records.contains_key(&key) {
            registry
                .metrics
                .set_entities_tracked(registry.records.len() as i64 + 1);
        }

        let config = Arc::clone(&registry.config);
        registry.records.entry(key).or_insert_with(|| {
            debug!(pod_name = %pod_name, namespace = %namespace, "Tracking new pod");
            EntityRecord::new(pod_name, namespace, config)
        })
    }

    /// Apply a reading, logging and counting overflows
    ///
    /// An overflow leaves the stat in its restarted state, so the pass
    /// carries on with the next reading.
    pub fn apply(&mut self, reading: &Reading) {
        self.readings += 1;
        let result = self
            .record_mut(&reading.pod_name, &reading.namespace)
            .apply_reading(&reading.value);

        if let Err(StatError::AggregateOverflow { previous, incoming }) = result {
            self.overflows += 1;
            let source = reading.value.kind();
            self.registry.metrics.inc_overflow(source);
            self.registry.logger.log_overflow(
                &reading.pod_name,
                &reading.namespace,
                source,
                previous,
                incoming,
            );
        }
    }

    pub fn apply_all<'r>(&mut self, readings: impl IntoIterator<Item = &'r Reading>) {
        for reading in readings {
            self.apply(reading);
        }
    }

    /// Readings applied so far in this pass
    pub fn readings(&self) -> usize {
        self.readings
    }

    /// Overflows seen so far in this pass
    pub fn overflows(&self) -> usize {
        self.overflows
    }

    /// Snapshot every record, then reset all of them for the next interval
    pub fn finish(self) -> IntervalSnapshot {
        let start = Instant::now();
        let registry = self.registry;
        registry.sequence += 1;

        let mut records: Vec<EntityRecord> = registry.records.values().cloned().collect();
        records.sort_by(|a, b| {
            (a.namespace(), a.pod_name()).cmp(&(b.namespace(), b.pod_name()))
        });

        for record in registry.records.values_mut() {
            record.reset_for_next_interval();
        }

        registry
            .metrics
            .observe_snapshot_latency(start.elapsed().as_secs_f64());
        registry.metrics.inc_intervals();
        registry
            .logger
            .log_interval_complete(registry.sequence, records.len(), self.readings);

        IntervalSnapshot {
            sequence: registry.sequence,
            taken_at: Utc::now(),
            overflows: self.overflows,
            records,
        }
    }
}

/// Immutable view of every record at the end of an interval
#[derive(Debug, Clone)]
pub struct IntervalSnapshot {
    sequence: u64,
    taken_at: DateTime<Utc>,
    overflows: usize,
    records: Vec<EntityRecord>,
}

impl IntervalSnapshot {
    /// Interval number, starting at 1
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Overflows seen while collecting this interval
    pub fn overflows(&self) -> usize {
        self.overflows
    }

    /// Records sorted by namespace, then pod name
    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    pub fn get(&self, namespace: &str, pod_name: &str) -> Option<&EntityRecord> {
        self.records
            .iter()
            .find(|r| r.namespace() == namespace && r.pod_name() == pod_name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn feature_vectors(&self) -> Vec<Vec<f32>> {
        self.records.iter().map(export::to_feature_vector).collect()
    }

    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.records.iter().map(export::to_text_row).collect()
    }

    /// Energy value for one pod, `None` if the pod is not in the snapshot
    pub fn energy_value(
        &self,
        namespace: &str,
        pod_name: &str,
        domain: &str,
        want_current: bool,
    ) -> Result<Option<f64>, ExportError> {
        self.get(namespace, pod_name)
            .map(|record| export::lookup_energy_value(record, domain, want_current))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReadingValue;
    use crate::record::EnergyDomain;

    fn test_registry() -> EntityRegistry {
        let config = MetricConfig {
            counters: vec!["cpu_cycles".to_string()],
            cgroup_metrics: vec!["cgroupfs_cpu_usage_us".to_string()],
            kubelet_metrics: Vec::new(),
            ..MetricConfig::empty()
        };
        EntityRegistry::new(
            Arc::new(config),
            RollupMetrics::new(),
            StructuredLogger::new("test-node"),
        )
    }

    fn counter(pod: &str, delta: u64) -> Reading {
        Reading::new(
            pod,
            "default",
            ReadingValue::Counter {
                metric: "cpu_cycles".to_string(),
                delta,
            },
        )
    }

    #[test]
    fn test_pass_creates_records_lazily() {
        let mut registry = test_registry();
        assert!(registry.is_empty());

        let mut pass = registry.begin_pass();
        pass.apply(&counter("a", 10));
        pass.apply(&counter("b", 20));
        pass.apply(&counter("a", 5));
        assert_eq!(pass.readings(), 3);
        let snapshot = pass.finish();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["default/a", "default/b"]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.sequence(), 1);
        assert_eq!(registry.sequence(), 1);
    }

    #[test]
    fn test_snapshot_keeps_interval_values_while_registry_resets() {
        let mut registry = test_registry();

        let mut pass = registry.begin_pass();
        pass.apply(&counter("a", 10));
        pass.apply(&Reading::new(
            "a",
            "default",
            ReadingValue::Energy {
                domain: EnergyDomain::Core,
                delta: 4,
            },
        ));
        let first = pass.finish();

        let mut pass = registry.begin_pass();
        pass.apply(&counter("a", 7));
        let second = pass.finish();

        let record = first.get("default", "a").unwrap();
        assert_eq!(record.lookup_current_and_aggregate("cpu_cycles"), (10, 10));
        assert_eq!(first.energy_value("default", "a", "core", true), Ok(Some(4.0)));

        let record = second.get("default", "a").unwrap();
        assert_eq!(record.lookup_current_and_aggregate("cpu_cycles"), (7, 17));
        assert_eq!(second.energy_value("default", "a", "core", true), Ok(Some(0.0)));
        assert_eq!(second.energy_value("default", "a", "core", false), Ok(Some(4.0)));

        let live = registry.get("default", "a").unwrap();
        assert_eq!(live.lookup_current_and_aggregate("cpu_cycles"), (0, 17));
    }

    #[test]
    fn test_overflow_is_counted_and_pass_continues() {
        let mut registry = test_registry();

        let mut pass = registry.begin_pass();
        pass.apply(&counter("a", u64::MAX - 5));
        pass.apply(&counter("a", 10));
        pass.apply(&counter("b", 1));
        assert_eq!(pass.overflows(), 1);
        let snapshot = pass.finish();

        assert_eq!(snapshot.overflows(), 1);
        let record = snapshot.get("default", "a").unwrap();
        assert_eq!(record.lookup_current_and_aggregate("cpu_cycles"), (10, 10));
        assert!(snapshot.get("default", "b").is_some());
    }

    #[test]
    fn test_same_pod_name_in_different_namespaces() {
        let mut registry = test_registry();

        let mut pass = registry.begin_pass();
        pass.apply(&counter("web", 1));
        pass.apply(&Reading::new(
            "web",
            "staging",
            ReadingValue::Counter {
                metric: "cpu_cycles".to_string(),
                delta: 2,
            },
        ));
        let snapshot = pass.finish();

        assert_eq!(snapshot.len(), 2);
        // Sorted by namespace first
        assert_eq!(snapshot.records()[0].namespace(), "default");
        assert_eq!(snapshot.records()[1].namespace(), "staging");
    }

    #[test]
    fn test_remove_pod() {
        let mut registry = test_registry();
        let mut pass = registry.begin_pass();
        pass.apply(&counter("a", 1));
        let _ = pass.finish();

        assert!(registry.remove("default", "a").is_some());
        assert!(registry.remove("default", "a").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_exports() {
        let mut registry = test_registry();
        let mut pass = registry.begin_pass();
        pass.apply(&counter("a", 3));
        let snapshot = pass.finish();

        let vectors = snapshot.feature_vectors();
        let rows = snapshot.text_rows();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].len(), registry.config().feature_vector_len());
        // cpu_time, then cpu_cycles
        assert_eq!(vectors[0][1], 3.0);
        assert_eq!(rows[0][0], "a");
        assert_eq!(
            snapshot.energy_value("default", "a", "bogus", true),
            Err(ExportError::UnknownDomain("bogus".to_string()))
        );
        assert_eq!(snapshot.energy_value("default", "missing", "pkg", true), Ok(None));
    }

    #[test]
    fn test_snapshot_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<IntervalSnapshot>();
    }
}

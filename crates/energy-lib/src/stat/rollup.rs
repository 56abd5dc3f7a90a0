//! Per-sub-entity statistics rolled up to the parent workload

use super::ScalarStat;
use crate::error::StatError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One [`ScalarStat`] per sub-entity, summed on demand
///
/// Entries are created on first observation and never removed. A container
/// that goes away keeps contributing its last aggregate, and contributes a
/// zero delta once the interval is reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolledUpStat {
    by_entity: HashMap<String, ScalarStat>,
}

impl RolledUpStat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a running total for `sub_entity`
    ///
    /// Rollups always use the cumulative policy since their sources (cgroup
    /// files, per-container I/O counters) report running totals.
    pub fn record(&mut self, sub_entity: &str, total: u64) -> Result<(), StatError> {
        if let Some(stat) = self.by_entity.get_mut(sub_entity) {
            return stat.record_cumulative(total);
        }
        self.by_entity
            .entry(sub_entity.to_string())
            .or_default()
            .record_cumulative(total)
    }

    /// Sum of interval deltas across all sub-entities
    pub fn current(&self) -> u64 {
        self.by_entity
            .values()
            .fold(0u64, |sum, stat| sum.wrapping_add(stat.current()))
    }

    /// Sum of aggregates across all sub-entities
    pub fn aggregate(&self) -> u64 {
        self.by_entity
            .values()
            .fold(0u64, |sum, stat| sum.wrapping_add(stat.aggregate()))
    }

    /// Zero every sub-entity's interval delta, keeping aggregates
    pub fn reset_current(&mut self) {
        for stat in self.by_entity.values_mut() {
            stat.reset_current();
        }
    }

    pub fn get(&self, sub_entity: &str) -> Option<&ScalarStat> {
        self.by_entity.get(sub_entity)
    }

    /// Number of sub-entities seen so far
    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }
}

impl fmt::Display for RolledUpStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.current(), self.aggregate())
    }
}

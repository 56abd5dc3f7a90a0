//! Static metric configuration
//!
//! Ordered metric name lists shared read-only by every record. The order of
//! the feature lists is positional: the power model indexes the feature
//! vector by position, not by name.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// CPU time composite metric
pub const CPU_TIME_LABEL: &str = "cpu_time";
/// Bytes read composite metric, summed across containers
pub const BYTE_READ_LABEL: &str = "bytes_read";
/// Bytes written composite metric, summed across containers
pub const BYTE_WRITE_LABEL: &str = "bytes_writes";

/// Hardware performance counters collected per pod by default
pub const DEFAULT_COUNTERS: &[&str] = &["cpu_cycles", "cpu_instr", "cache_miss"];

/// cgroup filesystem metrics collected per container by default
pub const DEFAULT_CGROUP_METRICS: &[&str] = &[
    "cgroupfs_memory_usage_bytes",
    "cgroupfs_kernel_memory_usage_bytes",
    "cgroupfs_tcp_memory_usage_bytes",
    "cgroupfs_cpu_usage_us",
    "cgroupfs_system_cpu_usage_us",
    "cgroupfs_user_cpu_usage_us",
    "cgroupfs_ioread_bytes",
    "cgroupfs_iowrite_bytes",
];

/// Metrics reported by the kubelet per pod by default
pub const DEFAULT_KUBELET_METRICS: &[&str] = &[
    "container_cpu_usage_seconds_total",
    "container_memory_working_set_bytes",
];

/// Metric name lists fixed at process start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// Floating point features, exported before the unsigned ones
    pub float_features: Vec<String>,
    /// Hardware performance counters (delta policy)
    pub counters: Vec<String>,
    /// cgroup filesystem metrics rolled up across containers
    pub cgroup_metrics: Vec<String>,
    /// Kubelet-reported metrics (cumulative policy)
    pub kubelet_metrics: Vec<String>,
    /// Whether the exposition schema carries the average CPU frequency
    pub enable_cpu_freq: bool,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            float_features: Vec::new(),
            counters: to_owned(DEFAULT_COUNTERS),
            cgroup_metrics: to_owned(DEFAULT_CGROUP_METRICS),
            kubelet_metrics: to_owned(DEFAULT_KUBELET_METRICS),
            enable_cpu_freq: false,
        }
    }
}

impl MetricConfig {
    /// Configuration with no counter, cgroup or kubelet metrics.
    /// The composite metrics are always present.
    pub fn empty() -> Self {
        Self {
            float_features: Vec::new(),
            counters: Vec::new(),
            cgroup_metrics: Vec::new(),
            kubelet_metrics: Vec::new(),
            enable_cpu_freq: false,
        }
    }

    /// Unsigned features in export order: CPU time, counters, cgroup
    /// metrics, kubelet metrics, then bytes read and written.
    pub fn uint_features(&self) -> Vec<&str> {
        let mut features = Vec::with_capacity(
            3 + self.counters.len() + self.cgroup_metrics.len() + self.kubelet_metrics.len(),
        );
        features.push(CPU_TIME_LABEL);
        features.extend(self.counters.iter().map(String::as_str));
        features.extend(self.cgroup_metrics.iter().map(String::as_str));
        features.extend(self.kubelet_metrics.iter().map(String::as_str));
        features.push(BYTE_READ_LABEL);
        features.push(BYTE_WRITE_LABEL);
        features
    }

    /// Length of the feature vector, including the trailing disk count
    pub fn feature_vector_len(&self) -> usize {
        self.float_features.len() + self.uint_features().len() + 1
    }

    /// Reject empty and duplicate names across all lists.
    ///
    /// A duplicate would make two positional features resolve to the same
    /// stat.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: HashSet<&str> = [CPU_TIME_LABEL, BYTE_READ_LABEL, BYTE_WRITE_LABEL]
            .into_iter()
            .collect();

        let lists: [(&'static str, &Vec<String>); 4] = [
            ("float_features", &self.float_features),
            ("counters", &self.counters),
            ("cgroup_metrics", &self.cgroup_metrics),
            ("kubelet_metrics", &self.kubelet_metrics),
        ];

        for (list, names) in lists {
            for name in names {
                if name.trim().is_empty() {
                    return Err(ConfigError::EmptyMetricName { list });
                }
                if !seen.insert(name.as_str()) {
                    return Err(ConfigError::DuplicateMetric { name: name.clone() });
                }
            }
        }

        Ok(())
    }
}

fn to_owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

//! Reading models handed over by counter sources

use crate::record::EnergyDomain;
use serde::{Deserialize, Serialize};

/// A single raw reading for one pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub pod_name: String,
    pub namespace: String,
    #[serde(flatten)]
    pub value: ReadingValue,
}

impl Reading {
    pub fn new(
        pod_name: impl Into<String>,
        namespace: impl Into<String>,
        value: ReadingValue,
    ) -> Self {
        Self {
            pod_name: pod_name.into(),
            namespace: namespace.into(),
            value,
        }
    }
}

/// The payload of a reading, tagged by source
///
/// Fields named `delta` are recorded with the delta policy, fields named
/// `total` with the cumulative policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadingValue {
    /// A process observed running inside the pod
    Process {
        cgroup_pid: u64,
        pid: u64,
        command: String,
    },
    /// Hardware performance counter increment
    Counter { metric: String, delta: u64 },
    /// Kubelet-reported running total
    Kubelet { metric: String, total: u64 },
    /// cgroup filesystem running total for one container
    Cgroup {
        metric: String,
        container_id: String,
        total: u64,
    },
    /// CPU time increment for the pod
    CpuTime { delta: u64 },
    /// CPU time increment on a single CPU
    CpuTimePerCpu { cpu: u32, delta: u64 },
    /// Bytes read running total for one container
    BytesRead { container_id: String, total: u64 },
    /// Bytes written running total for one container
    BytesWritten { container_id: String, total: u64 },
    /// Energy increment attributed to the pod in one domain
    Energy { domain: EnergyDomain, delta: u64 },
    /// Dynamic energy increment
    DynamicEnergy { delta: u64 },
    /// Average CPU frequency over the interval
    CpuFrequency { avg_khz: f64 },
    /// Number of block devices used by the pod
    Disks { count: u32 },
}

impl ReadingValue {
    /// Short source tag for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ReadingValue::Process { .. } => "process",
            ReadingValue::Counter { .. } => "counter",
            ReadingValue::Kubelet { .. } => "kubelet",
            ReadingValue::Cgroup { .. } => "cgroup",
            ReadingValue::CpuTime { .. } => "cpu_time",
            ReadingValue::CpuTimePerCpu { .. } => "cpu_time_per_cpu",
            ReadingValue::BytesRead { .. } => "bytes_read",
            ReadingValue::BytesWritten { .. } => "bytes_written",
            ReadingValue::Energy { .. } => "energy",
            ReadingValue::DynamicEnergy { .. } => "dynamic_energy",
            ReadingValue::CpuFrequency { .. } => "cpu_frequency",
            ReadingValue::Disks { .. } => "disks",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_tagged_reading() {
        let json = r#"{
            "pod_name": "web-0",
            "namespace": "prod",
            "kind": "cgroup",
            "metric": "cgroupfs_cpu_usage_us",
            "container_id": "abc123",
            "total": 5000000
        }"#;

        let reading: Reading = serde_json::from_str(json).unwrap();

        assert_eq!(reading.pod_name, "web-0");
        assert_eq!(reading.namespace, "prod");
        assert_eq!(
            reading.value,
            ReadingValue::Cgroup {
                metric: "cgroupfs_cpu_usage_us".to_string(),
                container_id: "abc123".to_string(),
                total: 5_000_000,
            }
        );
        assert_eq!(reading.value.kind(), "cgroup");
    }

    #[test]
    fn test_deserialize_energy_domain() {
        let json = r#"{"pod_name": "p", "namespace": "n", "kind": "energy", "domain": "dram", "delta": 12}"#;
        let reading: Reading = serde_json::from_str(json).unwrap();
        assert_eq!(
            reading.value,
            ReadingValue::Energy {
                domain: EnergyDomain::Dram,
                delta: 12
            }
        );
    }

    #[test]
    fn test_unknown_energy_domain_fails_to_parse() {
        let json = r#"{"pod_name": "p", "namespace": "n", "kind": "energy", "domain": "socket", "delta": 1}"#;
        assert!(serde_json::from_str::<Reading>(json).is_err());
    }
}

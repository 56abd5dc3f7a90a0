//! Metric keys resolved against a record's families

use crate::config::{BYTE_READ_LABEL, BYTE_WRITE_LABEL, CPU_TIME_LABEL};
use crate::error::ExportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Families of configured metrics held by a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFamily {
    /// Hardware performance counters, delta policy
    Counter,
    /// cgroup filesystem metrics, cumulative per container
    Cgroup,
    /// Kubelet metrics, cumulative per pod
    Kubelet,
}

impl MetricFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricFamily::Counter => "counter",
            MetricFamily::Cgroup => "cgroup",
            MetricFamily::Kubelet => "kubelet",
        }
    }
}

/// Metrics with a dedicated field on every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeMetric {
    CpuTime,
    BytesRead,
    BytesWritten,
}

impl CompositeMetric {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            CPU_TIME_LABEL => Some(CompositeMetric::CpuTime),
            BYTE_READ_LABEL => Some(CompositeMetric::BytesRead),
            BYTE_WRITE_LABEL => Some(CompositeMetric::BytesWritten),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompositeMetric::CpuTime => CPU_TIME_LABEL,
            CompositeMetric::BytesRead => BYTE_READ_LABEL,
            CompositeMetric::BytesWritten => BYTE_WRITE_LABEL,
        }
    }
}

/// A metric name resolved to the stat that holds it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKey<'a> {
    Family(MetricFamily, &'a str),
    Composite(CompositeMetric),
}

/// Energy measurement domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyDomain {
    Core,
    Dram,
    Uncore,
    Pkg,
    Gpu,
    Other,
}

impl EnergyDomain {
    pub const COUNT: usize = 6;

    pub const ALL: [EnergyDomain; Self::COUNT] = [
        EnergyDomain::Core,
        EnergyDomain::Dram,
        EnergyDomain::Uncore,
        EnergyDomain::Pkg,
        EnergyDomain::Gpu,
        EnergyDomain::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyDomain::Core => "core",
            EnergyDomain::Dram => "dram",
            EnergyDomain::Uncore => "uncore",
            EnergyDomain::Pkg => "pkg",
            EnergyDomain::Gpu => "gpu",
            EnergyDomain::Other => "other",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl FromStr for EnergyDomain {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EnergyDomain::ALL
            .into_iter()
            .find(|domain| domain.as_str() == s)
            .ok_or_else(|| ExportError::UnknownDomain(s.to_string()))
    }
}

impl fmt::Display for EnergyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

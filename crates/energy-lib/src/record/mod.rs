//! Per-pod energy and resource record
//!
//! An [`EntityRecord`] owns every statistic tracked for one pod: hardware
//! counters, kubelet metrics, cgroup metrics rolled up across containers,
//! CPU time, block I/O and energy per domain. Its metric families are built
//! once from the shared [`MetricConfig`] and never change shape afterwards.
//!
//! A record goes through the same cycle every sampling interval: readings
//! are recorded, the record is exported, then
//! [`EntityRecord::reset_for_next_interval`] clears every `current` value
//! while keeping aggregates.

mod metric;

#[cfg(test)]
mod tests;

pub use metric::{CompositeMetric, EnergyDomain, MetricFamily, MetricKey};

use crate::config::MetricConfig;
use crate::error::StatError;
use crate::models::ReadingValue;
use crate::stat::{RolledUpStat, ScalarStat};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Everything tracked for one pod
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pod_name: String,
    namespace: String,

    // Identity of the last observed process. Multi-container pods keep only
    // the most recent one.
    cgroup_pid: u64,
    pid: u64,
    command: String,

    avg_cpu_freq: f64,
    curr_processes: u32,
    disks: u32,

    cpu_time: ScalarStat,
    curr_cpu_time_per_cpu: HashMap<u32, u64>,

    counter_stats: BTreeMap<String, ScalarStat>,
    cgroup_stats: BTreeMap<String, RolledUpStat>,
    kubelet_stats: BTreeMap<String, ScalarStat>,

    bytes_read: RolledUpStat,
    bytes_written: RolledUpStat,

    energy: [ScalarStat; EnergyDomain::COUNT],
    dynamic_energy: ScalarStat,

    config: Arc<MetricConfig>,
}

impl EntityRecord {
    /// Create an empty record with one stat per configured metric
    pub fn new(
        pod_name: impl Into<String>,
        namespace: impl Into<String>,
        config: Arc<MetricConfig>,
    ) -> Self {
        let counter_stats = config
            .counters
            .iter()
            .map(|name| (name.clone(), ScalarStat::new()))
            .collect();
        let cgroup_stats = config
            .cgroup_metrics
            .iter()
            .map(|name| (name.clone(), RolledUpStat::new()))
            .collect();
        let kubelet_stats = config
            .kubelet_metrics
            .iter()
            .map(|name| (name.clone(), ScalarStat::new()))
            .collect();

        Self {
            pod_name: pod_name.into(),
            namespace: namespace.into(),
            cgroup_pid: 0,
            pid: 0,
            command: String::new(),
            avg_cpu_freq: 0.0,
            curr_processes: 0,
            disks: 0,
            cpu_time: ScalarStat::new(),
            curr_cpu_time_per_cpu: HashMap::new(),
            counter_stats,
            cgroup_stats,
            kubelet_stats,
            bytes_read: RolledUpStat::new(),
            bytes_written: RolledUpStat::new(),
            energy: [ScalarStat::new(); EnergyDomain::COUNT],
            dynamic_energy: ScalarStat::new(),
            config,
        }
    }

    pub fn pod_name(&self) -> &str {
        &self.pod_name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn cgroup_pid(&self) -> u64 {
        self.cgroup_pid
    }

    pub fn pid(&self) -> u64 {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Average CPU frequency in kHz over the interval
    pub fn avg_cpu_freq(&self) -> f64 {
        self.avg_cpu_freq
    }

    /// Processes observed during the current interval
    pub fn curr_processes(&self) -> u32 {
        self.curr_processes
    }

    pub fn disks(&self) -> u32 {
        self.disks
    }

    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    pub fn cpu_time(&self) -> &ScalarStat {
        &self.cpu_time
    }

    /// CPU time accumulated per CPU during the current interval
    pub fn curr_cpu_time_per_cpu(&self) -> &HashMap<u32, u64> {
        &self.curr_cpu_time_per_cpu
    }

    pub fn bytes_read(&self) -> &RolledUpStat {
        &self.bytes_read
    }

    pub fn bytes_written(&self) -> &RolledUpStat {
        &self.bytes_written
    }

    pub fn energy(&self, domain: EnergyDomain) -> &ScalarStat {
        &self.energy[domain.index()]
    }

    pub fn dynamic_energy(&self) -> &ScalarStat {
        &self.dynamic_energy
    }

    pub fn counter(&self, name: &str) -> Option<&ScalarStat> {
        self.counter_stats.get(name)
    }

    pub fn kubelet(&self, name: &str) -> Option<&ScalarStat> {
        self.kubelet_stats.get(name)
    }

    pub fn cgroup(&self, name: &str) -> Option<&RolledUpStat> {
        self.cgroup_stats.get(name)
    }

    /// Overwrite the identity fields with the latest observed process.
    ///
    /// Only the last process seen is kept, so a multi-container pod may
    /// report a sidecar instead of its main container.
    pub fn record_observed_process(&mut self, cgroup_pid: u64, pid: u64, command: &str) {
        self.cgroup_pid = cgroup_pid;
        self.pid = pid;
        self.command.clear();
        self.command.push_str(command);
        self.curr_processes = self.curr_processes.saturating_add(1);
    }

    pub fn set_avg_cpu_freq(&mut self, avg_khz: f64) {
        self.avg_cpu_freq = avg_khz;
    }

    pub fn set_disks(&mut self, disks: u32) {
        self.disks = disks;
    }

    /// Record a hardware counter increment. Unconfigured names are ignored.
    pub fn record_counter_delta(&mut self, metric: &str, delta: u64) -> Result<(), StatError> {
        match self.counter_stats.get_mut(metric) {
            Some(stat) => stat.record_delta(delta),
            None => {
                self.ignore_unconfigured(MetricFamily::Counter, metric);
                Ok(())
            }
        }
    }

    /// Record a kubelet running total. Unconfigured names are ignored.
    pub fn record_kubelet_total(&mut self, metric: &str, total: u64) -> Result<(), StatError> {
        match self.kubelet_stats.get_mut(metric) {
            Some(stat) => stat.record_cumulative(total),
            None => {
                self.ignore_unconfigured(MetricFamily::Kubelet, metric);
                Ok(())
            }
        }
    }

    /// Record a cgroup running total for one container. Unconfigured names
    /// are ignored.
    pub fn record_cgroup_total(
        &mut self,
        metric: &str,
        container_id: &str,
        total: u64,
    ) -> Result<(), StatError> {
        match self.cgroup_stats.get_mut(metric) {
            Some(rollup) => rollup.record(container_id, total),
            None => {
                self.ignore_unconfigured(MetricFamily::Cgroup, metric);
                Ok(())
            }
        }
    }

    fn ignore_unconfigured(&self, family: MetricFamily, metric: &str) {
        debug!(
            pod_name = %self.pod_name,
            family = family.as_str(),
            metric = %metric,
            "Ignoring unconfigured metric"
        );
    }

    pub fn record_cpu_time_delta(&mut self, delta: u64) -> Result<(), StatError> {
        self.cpu_time.record_delta(delta)
    }

    /// Add CPU time spent on `cpu` during the current interval
    pub fn record_cpu_time_per_cpu(&mut self, cpu: u32, delta: u64) {
        let entry = self.curr_cpu_time_per_cpu.entry(cpu).or_insert(0);
        *entry = entry.wrapping_add(delta);
    }

    pub fn record_bytes_read(&mut self, container_id: &str, total: u64) -> Result<(), StatError> {
        self.bytes_read.record(container_id, total)
    }

    pub fn record_bytes_written(
        &mut self,
        container_id: &str,
        total: u64,
    ) -> Result<(), StatError> {
        self.bytes_written.record(container_id, total)
    }

    pub fn record_energy_delta(
        &mut self,
        domain: EnergyDomain,
        delta: u64,
    ) -> Result<(), StatError> {
        self.energy[domain.index()].record_delta(delta)
    }

    pub fn record_dynamic_energy_delta(&mut self, delta: u64) -> Result<(), StatError> {
        self.dynamic_energy.record_delta(delta)
    }

    /// Dispatch a reading to the matching recording operation
    pub fn apply_reading(&mut self, value: &ReadingValue) -> Result<(), StatError> {
        match value {
            ReadingValue::Process {
                cgroup_pid,
                pid,
                command,
            } => {
                self.record_observed_process(*cgroup_pid, *pid, command);
                Ok(())
            }
            ReadingValue::Counter { metric, delta } => self.record_counter_delta(metric, *delta),
            ReadingValue::Kubelet { metric, total } => self.record_kubelet_total(metric, *total),
            ReadingValue::Cgroup {
                metric,
                container_id,
                total,
            } => self.record_cgroup_total(metric, container_id, *total),
            ReadingValue::CpuTime { delta } => self.record_cpu_time_delta(*delta),
            ReadingValue::CpuTimePerCpu { cpu, delta } => {
                self.record_cpu_time_per_cpu(*cpu, *delta);
                Ok(())
            }
            ReadingValue::BytesRead {
                container_id,
                total,
            } => self.record_bytes_read(container_id, *total),
            ReadingValue::BytesWritten {
                container_id,
                total,
            } => self.record_bytes_written(container_id, *total),
            ReadingValue::Energy { domain, delta } => self.record_energy_delta(*domain, *delta),
            ReadingValue::DynamicEnergy { delta } => self.record_dynamic_energy_delta(*delta),
            ReadingValue::CpuFrequency { avg_khz } => {
                self.set_avg_cpu_freq(*avg_khz);
                Ok(())
            }
            ReadingValue::Disks { count } => {
                self.set_disks(*count);
                Ok(())
            }
        }
    }

    /// Zero every interval value, keeping all aggregates.
    ///
    /// Call once per interval, after the interval has been exported.
    pub fn reset_for_next_interval(&mut self) {
        self.curr_processes = 0;
        self.cpu_time.reset_current();
        self.curr_cpu_time_per_cpu.clear();

        for stat in self.counter_stats.values_mut() {
            stat.reset_current();
        }
        for rollup in self.cgroup_stats.values_mut() {
            rollup.reset_current();
        }
        for stat in self.kubelet_stats.values_mut() {
            stat.reset_current();
        }

        self.bytes_read.reset_current();
        self.bytes_written.reset_current();

        for stat in self.energy.iter_mut() {
            stat.reset_current();
        }
        self.dynamic_energy.reset_current();
    }

    /// Resolve a metric name. Families are searched before composites.
    pub fn resolve<'a>(&self, metric: &'a str) -> Option<MetricKey<'a>> {
        if self.counter_stats.contains_key(metric) {
            return Some(MetricKey::Family(MetricFamily::Counter, metric));
        }
        if self.cgroup_stats.contains_key(metric) {
            return Some(MetricKey::Family(MetricFamily::Cgroup, metric));
        }
        if self.kubelet_stats.contains_key(metric) {
            return Some(MetricKey::Family(MetricFamily::Kubelet, metric));
        }
        CompositeMetric::from_name(metric).map(MetricKey::Composite)
    }

    /// Current and aggregate values for a resolved key
    pub fn values(&self, key: MetricKey<'_>) -> (u64, u64) {
        match key {
            MetricKey::Family(MetricFamily::Counter, name) => {
                scalar_pair(self.counter_stats.get(name))
            }
            MetricKey::Family(MetricFamily::Kubelet, name) => {
                scalar_pair(self.kubelet_stats.get(name))
            }
            MetricKey::Family(MetricFamily::Cgroup, name) => self
                .cgroup_stats
                .get(name)
                .map(|rollup| (rollup.current(), rollup.aggregate()))
                .unwrap_or((0, 0)),
            MetricKey::Composite(CompositeMetric::CpuTime) => scalar_pair(Some(&self.cpu_time)),
            MetricKey::Composite(CompositeMetric::BytesRead) => {
                (self.bytes_read.current(), self.bytes_read.aggregate())
            }
            MetricKey::Composite(CompositeMetric::BytesWritten) => {
                (self.bytes_written.current(), self.bytes_written.aggregate())
            }
        }
    }

    /// Current and aggregate for a metric name, `(0, 0)` when unknown
    pub fn lookup_current_and_aggregate(&self, metric: &str) -> (u64, u64) {
        self.resolve(metric)
            .map(|key| self.values(key))
            .unwrap_or((0, 0))
    }
}

fn scalar_pair(stat: Option<&ScalarStat>) -> (u64, u64) {
    stat.map(|s| (s.current(), s.aggregate())).unwrap_or((0, 0))
}

struct StatMap<'a, T>(&'a BTreeMap<String, T>);

impl<T: fmt::Display> fmt::Display for StatMap<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("map[")?;
        for (i, (name, stat)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:{}", name, stat)?;
        }
        f.write_str("]")
    }
}

impl fmt::Display for EntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "energy from pod ({} processes): name: {} namespace: {}",
            self.curr_processes, self.pod_name, self.namespace
        )?;
        writeln!(
            f,
            "\tcgrouppid: {} pid: {} comm: {}",
            self.cgroup_pid, self.pid, self.command
        )?;
        writeln!(
            f,
            "\tePkg (mJ): {} (eCore: {} eDram: {} eUncore: {}) eGPU (mJ): {} eOther (mJ): {}",
            self.energy(EnergyDomain::Pkg),
            self.energy(EnergyDomain::Core),
            self.energy(EnergyDomain::Dram),
            self.energy(EnergyDomain::Uncore),
            self.energy(EnergyDomain::Gpu),
            self.energy(EnergyDomain::Other),
        )?;
        writeln!(f, "\teDyn (mJ): {}", self.dynamic_energy)?;
        writeln!(f, "\tavgFreq: {:.2}", self.avg_cpu_freq / 1000.0)?;
        writeln!(f, "\tCPUTime: {}", self.cpu_time)?;
        writeln!(f, "\tcounters: {}", StatMap(&self.counter_stats))?;
        writeln!(f, "\tcgroupfs: {}", StatMap(&self.cgroup_stats))?;
        writeln!(f, "\tkubelets: {}", StatMap(&self.kubelet_stats))
    }
}

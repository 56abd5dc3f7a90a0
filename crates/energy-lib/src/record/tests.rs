//! Tests for the pod record lifecycle

#[cfg(test)]
mod record_tests {
    use crate::config::{MetricConfig, BYTE_READ_LABEL, BYTE_WRITE_LABEL, CPU_TIME_LABEL};
    use crate::error::StatError;
    use crate::models::ReadingValue;
    use crate::record::{CompositeMetric, EnergyDomain, EntityRecord, MetricFamily, MetricKey};
    use std::sync::Arc;

    fn test_config() -> Arc<MetricConfig> {
        Arc::new(MetricConfig {
            float_features: Vec::new(),
            counters: vec!["cpu_cycles".to_string(), "cache_miss".to_string()],
            cgroup_metrics: vec!["cgroupfs_cpu_usage_us".to_string()],
            kubelet_metrics: vec!["container_memory_working_set_bytes".to_string()],
            enable_cpu_freq: false,
        })
    }

    /// Record with every family populated over two intervals so that both
    /// current and aggregate values are non-zero
    fn populated_record() -> EntityRecord {
        let mut record = EntityRecord::new("web-0", "prod", test_config());

        for (round, scale) in [(0u64, 1u64), (1, 2)] {
            record.record_observed_process(10, 100 + round, "nginx");
            record.record_counter_delta("cpu_cycles", 1_000 * scale).unwrap();
            record.record_counter_delta("cache_miss", 10 * scale).unwrap();
            record
                .record_kubelet_total("container_memory_working_set_bytes", 4_096 * scale)
                .unwrap();
            record
                .record_cgroup_total("cgroupfs_cpu_usage_us", "c1", 500 * scale)
                .unwrap();
            record
                .record_cgroup_total("cgroupfs_cpu_usage_us", "c2", 300 * scale)
                .unwrap();
            record.record_cpu_time_delta(20 * scale).unwrap();
            record.record_cpu_time_per_cpu(0, 15 * scale);
            record.record_cpu_time_per_cpu(1, 5 * scale);
            record.record_bytes_read("c1", 64 * scale).unwrap();
            record.record_bytes_written("c1", 32 * scale).unwrap();
            for domain in EnergyDomain::ALL {
                record.record_energy_delta(domain, 7 * scale).unwrap();
            }
            record.record_dynamic_energy_delta(3 * scale).unwrap();
            if round == 0 {
                record.reset_for_next_interval();
            }
        }

        record
    }

    fn all_pairs(record: &EntityRecord) -> Vec<(u64, u64)> {
        let mut pairs: Vec<(u64, u64)> = record
            .config()
            .uint_features()
            .into_iter()
            .map(|m| record.lookup_current_and_aggregate(m))
            .collect();
        for domain in EnergyDomain::ALL {
            let stat = record.energy(domain);
            pairs.push((stat.current(), stat.aggregate()));
        }
        let dynamic = record.dynamic_energy();
        pairs.push((dynamic.current(), dynamic.aggregate()));
        pairs
    }

    #[test]
    fn test_new_record_has_configured_families() {
        let record = EntityRecord::new("web-0", "prod", test_config());

        assert_eq!(record.pod_name(), "web-0");
        assert_eq!(record.namespace(), "prod");
        assert!(record.counter("cpu_cycles").is_some());
        assert!(record.counter("cpu_instr").is_none());
        assert!(record.cgroup("cgroupfs_cpu_usage_us").unwrap().is_empty());
        assert!(record.kubelet("container_memory_working_set_bytes").is_some());
        assert_eq!(record.curr_processes(), 0);
    }

    #[test]
    fn test_lookup_resolves_each_family() {
        let record = populated_record();

        assert_eq!(record.lookup_current_and_aggregate("cpu_cycles"), (2_000, 3_000));
        assert_eq!(
            record.lookup_current_and_aggregate("container_memory_working_set_bytes"),
            (4_096, 8_192)
        );
        assert_eq!(
            record.lookup_current_and_aggregate("cgroupfs_cpu_usage_us"),
            (500 + 300, 1_000 + 600)
        );
        assert_eq!(record.lookup_current_and_aggregate(CPU_TIME_LABEL), (40, 60));
        assert_eq!(record.lookup_current_and_aggregate(BYTE_READ_LABEL), (64, 128));
        assert_eq!(record.lookup_current_and_aggregate(BYTE_WRITE_LABEL), (32, 64));
    }

    #[test]
    fn test_lookup_unknown_metric_is_zero() {
        let record = populated_record();
        assert_eq!(record.lookup_current_and_aggregate("cpu_instr"), (0, 0));
        assert_eq!(record.lookup_current_and_aggregate(""), (0, 0));
    }

    #[test]
    fn test_resolve_returns_typed_keys() {
        let record = EntityRecord::new("p", "n", test_config());

        assert_eq!(
            record.resolve("cache_miss"),
            Some(MetricKey::Family(MetricFamily::Counter, "cache_miss"))
        );
        assert_eq!(
            record.resolve("cgroupfs_cpu_usage_us"),
            Some(MetricKey::Family(MetricFamily::Cgroup, "cgroupfs_cpu_usage_us"))
        );
        assert_eq!(
            record.resolve(BYTE_WRITE_LABEL),
            Some(MetricKey::Composite(CompositeMetric::BytesWritten))
        );
        assert_eq!(record.resolve("unknown"), None);
    }

    #[test]
    fn test_reset_zeroes_current_and_keeps_aggregates() {
        let mut record = populated_record();
        let before = all_pairs(&record);
        assert!(before.iter().all(|(curr, aggr)| *curr > 0 && *aggr > 0));
        assert_eq!(record.curr_processes(), 1);
        assert_eq!(record.curr_cpu_time_per_cpu().len(), 2);

        record.reset_for_next_interval();

        let after = all_pairs(&record);
        for ((_, aggr_before), (curr_after, aggr_after)) in before.iter().zip(after.iter()) {
            assert_eq!(*curr_after, 0);
            assert_eq!(aggr_after, aggr_before);
        }
        assert_eq!(record.curr_processes(), 0);
        assert!(record.curr_cpu_time_per_cpu().is_empty());
    }

    #[test]
    fn test_observed_process_overwrites_identity() {
        let mut record = EntityRecord::new("multi", "default", test_config());
        record.record_observed_process(1, 11, "app");
        record.record_observed_process(2, 22, "sidecar");

        assert_eq!(record.cgroup_pid(), 2);
        assert_eq!(record.pid(), 22);
        assert_eq!(record.command(), "sidecar");
        assert_eq!(record.curr_processes(), 2);

        // Identity survives the interval reset, only the count is cleared
        record.reset_for_next_interval();
        assert_eq!(record.command(), "sidecar");
        assert_eq!(record.curr_processes(), 0);
    }

    #[test]
    fn test_unconfigured_names_are_ignored() {
        let mut record = EntityRecord::new("p", "n", test_config());

        assert!(record.record_counter_delta("cpu_instr", 5).is_ok());
        assert!(record.record_kubelet_total("nope", 5).is_ok());
        assert!(record.record_cgroup_total("nope", "c1", 5).is_ok());
        assert!(record.counter("cpu_instr").is_none());
        assert_eq!(record.lookup_current_and_aggregate("nope"), (0, 0));
    }

    #[test]
    fn test_overflow_is_recoverable() {
        let mut record = EntityRecord::new("p", "n", test_config());
        record.record_counter_delta("cpu_cycles", u64::MAX - 5).unwrap();

        let err = record.record_counter_delta("cpu_cycles", 10).unwrap_err();

        assert!(matches!(err, StatError::AggregateOverflow { .. }));
        assert_eq!(record.lookup_current_and_aggregate("cpu_cycles"), (10, 10));
        record.record_counter_delta("cpu_cycles", 1).unwrap();
        assert_eq!(record.lookup_current_and_aggregate("cpu_cycles"), (1, 11));
    }

    #[test]
    fn test_cpu_time_per_cpu_accumulates_within_interval() {
        let mut record = EntityRecord::new("p", "n", test_config());
        record.record_cpu_time_per_cpu(3, 10);
        record.record_cpu_time_per_cpu(3, 5);
        record.record_cpu_time_per_cpu(0, 1);

        assert_eq!(record.curr_cpu_time_per_cpu().get(&3), Some(&15));
        assert_eq!(record.curr_cpu_time_per_cpu().get(&0), Some(&1));
    }

    #[test]
    fn test_apply_reading_dispatch() {
        let mut record = EntityRecord::new("p", "n", test_config());
        let readings = vec![
            ReadingValue::Process {
                cgroup_pid: 7,
                pid: 70,
                command: "redis-server".to_string(),
            },
            ReadingValue::Counter {
                metric: "cpu_cycles".to_string(),
                delta: 900,
            },
            ReadingValue::Cgroup {
                metric: "cgroupfs_cpu_usage_us".to_string(),
                container_id: "c1".to_string(),
                total: 100,
            },
            ReadingValue::Energy {
                domain: EnergyDomain::Pkg,
                delta: 45,
            },
            ReadingValue::CpuFrequency { avg_khz: 2_400_000.0 },
            ReadingValue::Disks { count: 2 },
        ];

        for reading in &readings {
            record.apply_reading(reading).unwrap();
        }

        assert_eq!(record.pid(), 70);
        assert_eq!(record.lookup_current_and_aggregate("cpu_cycles"), (900, 900));
        assert_eq!(
            record.cgroup("cgroupfs_cpu_usage_us").unwrap().aggregate(),
            100
        );
        assert_eq!(record.energy(EnergyDomain::Pkg).current(), 45);
        assert_eq!(record.energy(EnergyDomain::Core).current(), 0);
        assert_eq!(record.avg_cpu_freq(), 2_400_000.0);
        assert_eq!(record.disks(), 2);
    }

    #[test]
    fn test_display_dump() {
        let record = populated_record();
        let dump = record.to_string();

        assert!(dump.starts_with("energy from pod (1 processes): name: web-0 namespace: prod"));
        assert!(dump.contains("comm: nginx"));
        assert!(dump.contains("ePkg (mJ): 14 (21)"));
        assert!(dump.contains("counters: map[cache_miss:20 (30) cpu_cycles:2000 (3000)]"));
        assert!(dump.contains("cgroupfs: map[cgroupfs_cpu_usage_us:800 (1600)]"));
    }
}

//! Counter rollup engine for per-pod energy and resource accounting
//!
//! This crate provides:
//! - Overflow-safe counter statistics with delta and cumulative update policies
//! - Per-container rollup of cgroup and I/O counters into pod totals
//! - Per-pod records with an interval reset that keeps aggregates
//! - Export adapters for the power model feature vector and exposition rows
//! - A registry enforcing one writer per interval with immutable snapshots

pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod observability;
pub mod record;
pub mod registry;
pub mod stat;

pub use config::MetricConfig;
pub use error::{ConfigError, ExportError, StatError};
pub use models::{Reading, ReadingValue};
pub use observability::{RollupMetrics, StructuredLogger};
pub use record::{EnergyDomain, EntityRecord};
pub use registry::{CollectionPass, EntityRegistry, IntervalSnapshot};
pub use stat::{RolledUpStat, ScalarStat};

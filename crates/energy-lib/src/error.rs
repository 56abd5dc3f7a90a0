//! Error types for the rollup engine
//!
//! Every error here is recoverable. Stat and record state is already
//! consistent when one of these is returned.

use thiserror::Error;

/// Errors raised while recording a counter reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatError {
    /// The aggregate wrapped past `u64::MAX`; accumulation was restarted
    #[error("aggregate overflow: previous aggregate {previous}, incoming value {incoming}")]
    AggregateOverflow { previous: u64, incoming: u64 },
}

/// Errors raised by the export adapters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// Energy domain name outside the fixed set
    #[error("unknown energy domain: {0}")]
    UnknownDomain(String),
}

/// Errors raised when validating a metric configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("metric name is empty in {list} list")]
    EmptyMetricName { list: &'static str },

    #[error("metric {name} is configured more than once")]
    DuplicateMetric { name: String },
}

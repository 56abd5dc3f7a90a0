//! Counter statistics
//!
//! A [`ScalarStat`] tracks one counter as a pair of values: the delta for the
//! interval that just completed (`current`) and the running total since the
//! stat was created (`aggregate`). A [`RolledUpStat`] keeps one scalar per
//! sub-entity (container) and sums them on demand.
//!
//! Counters arrive from sources with different reset behavior, so each use
//! site picks one of two update policies:
//!
//! - [`ScalarStat::record_delta`] for sources that hand over an increment
//!   (a BPF map cleared after every read, a computed energy delta)
//! - [`ScalarStat::record_cumulative`] for sources that report a running
//!   total (cgroup files, RAPL energy files)

mod rollup;


pub use rollup::RolledUpStat;

use crate::error::StatError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current/aggregate pair for a single unsigned counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarStat {
    current: u64,
    aggregate: u64,
}

impl ScalarStat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta attributed to the most recent interval
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Running total since creation, restarted on overflow
    pub fn aggregate(&self) -> u64 {
        self.aggregate
    }

    /// Record an increment from a source that resets itself between reads.
    ///
    /// `current` is replaced with `delta`. If adding `delta` to the
    /// aggregate would exceed `u64::MAX`, the aggregate restarts from
    /// `delta` and [`StatError::AggregateOverflow`] is returned.
    pub fn record_delta(&mut self, delta: u64) -> Result<(), StatError> {
        let previous = self.aggregate;
        self.current = delta;
        match previous.checked_add(delta) {
            Some(sum) => {
                self.aggregate = sum;
                Ok(())
            }
            None => {
                self.aggregate = self.current;
                Err(StatError::AggregateOverflow {
                    previous,
                    incoming: delta,
                })
            }
        }
    }

    /// Record a running total from a source that only resets when the
    /// underlying counter wraps or its owner restarts.
    ///
    /// The first observation yields a zero delta. A total lower than the
    /// previous one is treated as a wrap through `u64::MAX` and reported as
    /// [`StatError::AggregateOverflow`]. The aggregate always becomes
    /// `total`.
    pub fn record_cumulative(&mut self, total: u64) -> Result<(), StatError> {
        let previous = self.aggregate;
        self.aggregate = total;

        if total < previous {
            // total < previous, so this cannot exceed u64::MAX
            self.current = total + (u64::MAX - previous);
            return Err(StatError::AggregateOverflow {
                previous,
                incoming: total,
            });
        }

        self.current = if previous == 0 { 0 } else { total - previous };
        Ok(())
    }

    /// Zero the interval delta, keeping the aggregate
    pub fn reset_current(&mut self) {
        self.current = 0;
    }
}

impl fmt::Display for ScalarStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.current, self.aggregate)
    }
}

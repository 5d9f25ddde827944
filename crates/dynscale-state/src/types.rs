//! Records persisted by the dynscale state store.

use serde::{Deserialize, Serialize};

use dynscale_core::{Direction, TableStatus};

// ── Capacity ──────────────────────────────────────────────────────

/// Provisioned throughput and status of a managed table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableCapacity {
    pub table_name: String,
    pub read_units: u64,
    pub write_units: u64,
    pub status: TableStatus,
    /// Unix timestamp (seconds) of the last change.
    pub updated_at: u64,
}

impl TableCapacity {
    pub fn units(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Read => self.read_units,
            Direction::Write => self.write_units,
        }
    }
}

// ── Metrics ───────────────────────────────────────────────────────

/// One observation of a table's load in one direction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSample {
    pub table_name: String,
    pub direction: Direction,
    /// Unix timestamp (seconds) the sample covers.
    pub epoch: u64,
    pub consumed_percent: f64,
    pub throttled_count: u64,
    pub throttled_by_provisioned_percent: f64,
    pub throttled_by_consumed_percent: f64,
}

impl MetricsSample {
    /// Build the composite key for the metrics table.
    pub fn table_key(&self) -> String {
        metrics_key(&self.table_name, self.direction, self.epoch)
    }
}

/// Zero-padded so lexicographic key order matches time order.
pub(crate) fn metrics_key(table_name: &str, direction: Direction, epoch: u64) -> String {
    format!("{}{epoch:020}", metrics_prefix(table_name, direction))
}

pub(crate) fn metrics_prefix(table_name: &str, direction: Direction) -> String {
    format!("{table_name}:{direction}:")
}

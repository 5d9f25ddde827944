//! Shared types used across dynscale crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which side of a table's provisioned throughput is being scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    /// Both directions in evaluation order.
    pub const ALL: [Direction; 2] = [Direction::Read, Direction::Write];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Read => "read",
            Direction::Write => "write",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational status of a table as reported by the capacity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    Active,
    Updating,
    Creating,
    Deleting,
    Other,
}

impl TableStatus {
    /// Only an active table accepts a throughput change.
    pub fn is_actionable(&self) -> bool {
        matches!(self, TableStatus::Active)
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TableStatus::Active => "ACTIVE",
            TableStatus::Updating => "UPDATING",
            TableStatus::Creating => "CREATING",
            TableStatus::Deleting => "DELETING",
            TableStatus::Other => "OTHER",
        };
        f.write_str(label)
    }
}

/// The lookback window metrics are aggregated over, in minutes.
///
/// The window opens `start_minutes` ago and spans `period_minutes`, so
/// `start = 15, period = 5` covers the interval from 15 to 10 minutes ago.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookbackWindow {
    pub start_minutes: u64,
    pub period_minutes: u64,
}

impl LookbackWindow {
    /// Inclusive `(from, to)` bounds in epoch seconds relative to `now`.
    pub fn bounds(&self, now: u64) -> (u64, u64) {
        let from = now.saturating_sub(self.start_minutes * 60);
        let to = from.saturating_add(self.period_minutes * 60).min(now);
        (from, to)
    }
}

impl Default for LookbackWindow {
    fn default() -> Self {
        Self {
            start_minutes: 15,
            period_minutes: 5,
        }
    }
}

/// Observed load for one direction of one table over a lookback window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Consumed capacity as a percentage of provisioned capacity.
    pub consumed_percent: f64,
    /// Number of throttled requests.
    pub throttled_count: u64,
    /// Throttled requests as a percentage of provisioned capacity.
    pub throttled_by_provisioned_percent: f64,
    /// Throttled requests as a percentage of consumed capacity.
    pub throttled_by_consumed_percent: f64,
    pub window: LookbackWindow,
}

/// Per-direction hysteresis counters carried between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsecutiveChecks {
    pub reads: u32,
    pub writes: u32,
}

impl ConsecutiveChecks {
    pub fn new(reads: u32, writes: u32) -> Self {
        Self { reads, writes }
    }

    pub fn get(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Read => self.reads,
            Direction::Write => self.writes,
        }
    }

    pub fn set(&mut self, direction: Direction, checks: u32) {
        match direction {
            Direction::Read => self.reads = checks,
            Direction::Write => self.writes = checks,
        }
    }
}

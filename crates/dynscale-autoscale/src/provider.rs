//! Collaborator seams of a provisioning cycle.
//!
//! The engine never talks to a database or the network directly. Metrics,
//! capacity, the update call, the circuit breaker and persisted state all
//! come in through these traits so a cycle can run against the embedded
//! store, a remote service, or fakes in tests.

use std::future::Future;

use dynscale_core::{ConsecutiveChecks, Direction, LookbackWindow, MetricsSnapshot, TableStatus};

use crate::error::ScaleResult;

/// Load metrics for one table and direction over a lookback window.
pub trait MetricsProvider {
    fn consumed_percent(
        &self,
        table: &str,
        direction: Direction,
        window: LookbackWindow,
    ) -> ScaleResult<f64>;

    fn throttled_count(
        &self,
        table: &str,
        direction: Direction,
        window: LookbackWindow,
    ) -> ScaleResult<u64>;

    fn throttled_by_provisioned_percent(
        &self,
        table: &str,
        direction: Direction,
        window: LookbackWindow,
    ) -> ScaleResult<f64>;

    fn throttled_by_consumed_percent(
        &self,
        table: &str,
        direction: Direction,
        window: LookbackWindow,
    ) -> ScaleResult<f64>;

    /// All four metrics in one snapshot.
    fn snapshot(
        &self,
        table: &str,
        direction: Direction,
        window: LookbackWindow,
    ) -> ScaleResult<MetricsSnapshot> {
        Ok(MetricsSnapshot {
            consumed_percent: self.consumed_percent(table, direction, window)?,
            throttled_count: self.throttled_count(table, direction, window)?,
            throttled_by_provisioned_percent: self
                .throttled_by_provisioned_percent(table, direction, window)?,
            throttled_by_consumed_percent: self
                .throttled_by_consumed_percent(table, direction, window)?,
            window,
        })
    }
}

/// Read the provisioned state of tables.
pub trait CapacityProvider {
    fn list_tables(&self) -> ScaleResult<Vec<String>>;

    fn provisioned_units(&self, table: &str, direction: Direction) -> ScaleResult<u64>;

    fn status(&self, table: &str) -> ScaleResult<TableStatus>;
}

/// Push new provisioned throughput for a table.
pub trait CapacityMutator {
    fn apply(&self, table: &str, config_key: &str, read_units: u64, write_units: u64)
    -> ScaleResult<()>;
}

/// Remote gate that can pause scaling.
///
/// `is_open` never fails: an unreachable or erroring breaker reads as open.
pub trait CircuitBreaker: Send + Sync {
    fn is_open(&self, table: &str, config_key: &str) -> impl Future<Output = bool> + Send;
}

/// Dynamic per-table configuration overrides, stored as JSON.
pub trait OverrideStore {
    fn load_override(&self, key: &str) -> ScaleResult<Option<String>>;

    fn store_override(&self, key: &str, document: &str) -> ScaleResult<()>;
}

/// Hysteresis counters carried between cycles.
pub trait HysteresisStore {
    fn load_checks(&self, table: &str) -> ScaleResult<ConsecutiveChecks>;

    fn save_checks(&self, table: &str, checks: ConsecutiveChecks) -> ScaleResult<()>;
}

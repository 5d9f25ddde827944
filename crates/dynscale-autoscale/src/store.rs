//! Providers backed by the embedded state store.
//!
//! Capacity records, metrics samples, overrides and hysteresis counters
//! all live in [`StateStore`]. Metrics for a lookback window are the mean
//! of each percentage and the sum of throttled counts over the samples in
//! the window; an empty window reads as all zeros.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use dynscale_core::{ConsecutiveChecks, Direction, LookbackWindow, MetricsSnapshot, TableStatus};
use dynscale_state::{StateStore, TableCapacity};

use crate::error::{ScaleError, ScaleResult};
use crate::provider::{
    CapacityMutator, CapacityProvider, HysteresisStore, MetricsProvider, OverrideStore,
};

/// Metrics, capacity and mutation over a [`StateStore`].
#[derive(Clone)]
pub struct StoreProviders {
    state: StateStore,
    pinned_now: Option<u64>,
}

impl StoreProviders {
    pub fn new(state: StateStore) -> Self {
        Self {
            state,
            pinned_now: None,
        }
    }

    /// Evaluate lookback windows against a fixed clock.
    pub fn with_now(mut self, epoch: u64) -> Self {
        self.pinned_now = Some(epoch);
        self
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    fn now(&self) -> u64 {
        self.pinned_now.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
        })
    }

    fn capacity(&self, table: &str) -> ScaleResult<TableCapacity> {
        self.state
            .get_capacity(table)?
            .ok_or_else(|| ScaleError::TableNotFound(table.to_string()))
    }

    fn aggregate(
        &self,
        table: &str,
        direction: Direction,
        window: LookbackWindow,
    ) -> ScaleResult<MetricsSnapshot> {
        let (from, to) = window.bounds(self.now());
        let samples = self.state.list_metrics(table, direction, from, to)?;

        let mut snapshot = MetricsSnapshot {
            window,
            ..MetricsSnapshot::default()
        };
        if samples.is_empty() {
            debug!(%table, %direction, from, to, "no metrics in window");
            return Ok(snapshot);
        }

        let n = samples.len() as f64;
        for sample in &samples {
            snapshot.consumed_percent += sample.consumed_percent;
            snapshot.throttled_count += sample.throttled_count;
            snapshot.throttled_by_provisioned_percent += sample.throttled_by_provisioned_percent;
            snapshot.throttled_by_consumed_percent += sample.throttled_by_consumed_percent;
        }
        snapshot.consumed_percent /= n;
        snapshot.throttled_by_provisioned_percent /= n;
        snapshot.throttled_by_consumed_percent /= n;
        Ok(snapshot)
    }
}

impl MetricsProvider for StoreProviders {
    fn consumed_percent(
        &self,
        table: &str,
        direction: Direction,
        window: LookbackWindow,
    ) -> ScaleResult<f64> {
        Ok(self.aggregate(table, direction, window)?.consumed_percent)
    }

    fn throttled_count(
        &self,
        table: &str,
        direction: Direction,
        window: LookbackWindow,
    ) -> ScaleResult<u64> {
        Ok(self.aggregate(table, direction, window)?.throttled_count)
    }

    fn throttled_by_provisioned_percent(
        &self,
        table: &str,
        direction: Direction,
        window: LookbackWindow,
    ) -> ScaleResult<f64> {
        Ok(self
            .aggregate(table, direction, window)?
            .throttled_by_provisioned_percent)
    }

    fn throttled_by_consumed_percent(
        &self,
        table: &str,
        direction: Direction,
        window: LookbackWindow,
    ) -> ScaleResult<f64> {
        Ok(self
            .aggregate(table, direction, window)?
            .throttled_by_consumed_percent)
    }

    fn snapshot(
        &self,
        table: &str,
        direction: Direction,
        window: LookbackWindow,
    ) -> ScaleResult<MetricsSnapshot> {
        self.aggregate(table, direction, window)
    }
}

impl CapacityProvider for StoreProviders {
    fn list_tables(&self) -> ScaleResult<Vec<String>> {
        Ok(self
            .state
            .list_capacities()?
            .into_iter()
            .map(|c| c.table_name)
            .collect())
    }

    fn provisioned_units(&self, table: &str, direction: Direction) -> ScaleResult<u64> {
        Ok(self.capacity(table)?.units(direction))
    }

    fn status(&self, table: &str) -> ScaleResult<TableStatus> {
        Ok(self.capacity(table)?.status)
    }
}

impl CapacityMutator for StoreProviders {
    fn apply(
        &self,
        table: &str,
        config_key: &str,
        read_units: u64,
        write_units: u64,
    ) -> ScaleResult<()> {
        let mut capacity = self.capacity(table)?;
        capacity.read_units = read_units;
        capacity.write_units = write_units;
        capacity.updated_at = self.now();
        self.state.put_capacity(&capacity)?;
        debug!(%table, %config_key, read_units, write_units, "capacity record updated");
        Ok(())
    }
}

impl OverrideStore for StateStore {
    fn load_override(&self, key: &str) -> ScaleResult<Option<String>> {
        Ok(self.get_override(key)?)
    }

    fn store_override(&self, key: &str, document: &str) -> ScaleResult<()> {
        Ok(self.put_override(key, document)?)
    }
}

impl HysteresisStore for StateStore {
    fn load_checks(&self, table: &str) -> ScaleResult<ConsecutiveChecks> {
        Ok(self.get_checks(table)?)
    }

    fn save_checks(&self, table: &str, checks: ConsecutiveChecks) -> ScaleResult<()> {
        Ok(self.put_checks(table, checks)?)
    }
}

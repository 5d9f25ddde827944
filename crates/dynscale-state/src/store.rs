//! StateStore: redb-backed state persistence for dynscale.
//!
//! Provides typed operations over capacity records, metrics samples,
//! override documents, and hysteresis counters. The store supports both
//! on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use dynscale_core::{ConsecutiveChecks, Direction};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

type RawTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Closure factory turning a redb or serde error into a `StateError`.
macro_rules! map_err {
    (Open) => {
        |e| StateError::Open(e.to_string())
    };
    (Encode) => {
        |e| StateError::Encode(e.to_string())
    };
    (Corrupt) => {
        |e| StateError::Corrupt(e.to_string())
    };
    ($stage:literal) => {
        |e| StateError::storage($stage, e)
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(CAPACITY).map_err(map_err!("table open"))?;
        txn.open_table(METRICS).map_err(map_err!("table open"))?;
        txn.open_table(OVERRIDES).map_err(map_err!("table open"))?;
        txn.open_table(CHECKS).map_err(map_err!("table open"))?;
        txn.commit().map_err(map_err!("transaction"))?;
        Ok(())
    }

    fn put_raw(&self, def: RawTable, key: &str, value: &[u8]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        {
            let mut table = txn.open_table(def).map_err(map_err!("table open"))?;
            table.insert(key, value).map_err(map_err!("write"))?;
        }
        txn.commit().map_err(map_err!("transaction"))?;
        Ok(())
    }

    fn get_raw(&self, def: RawTable, key: &str) -> StateResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(def).map_err(map_err!("table open"))?;
        let value = table.get(key).map_err(map_err!("read"))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn delete_raw(&self, def: RawTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        let existed;
        {
            let mut table = txn.open_table(def).map_err(map_err!("table open"))?;
            existed = table.remove(key).map_err(map_err!("write"))?.is_some();
        }
        txn.commit().map_err(map_err!("transaction"))?;
        Ok(existed)
    }

    fn put_json<T: Serialize>(&self, def: RawTable, key: &str, record: &T) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Encode))?;
        self.put_raw(def, key, &value)
    }

    fn get_json<T: DeserializeOwned>(&self, def: RawTable, key: &str) -> StateResult<Option<T>> {
        match self.get_raw(def, key)? {
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes).map_err(map_err!(Corrupt))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    // ── Capacity ───────────────────────────────────────────────────

    /// Insert or update a table's capacity record.
    pub fn put_capacity(&self, capacity: &TableCapacity) -> StateResult<()> {
        self.put_json(CAPACITY, &capacity.table_name, capacity)?;
        debug!(
            table = %capacity.table_name,
            read_units = capacity.read_units,
            write_units = capacity.write_units,
            status = %capacity.status,
            "capacity stored"
        );
        Ok(())
    }

    pub fn get_capacity(&self, table_name: &str) -> StateResult<Option<TableCapacity>> {
        self.get_json(CAPACITY, table_name)
    }

    /// List all capacity records, ordered by table name.
    pub fn list_capacities(&self) -> StateResult<Vec<TableCapacity>> {
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(CAPACITY).map_err(map_err!("table open"))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!("read"))? {
            let (_, value) = entry.map_err(map_err!("read"))?;
            let capacity: TableCapacity =
                serde_json::from_slice(value.value()).map_err(map_err!(Corrupt))?;
            results.push(capacity);
        }
        Ok(results)
    }

    /// Delete a capacity record. Returns true if it existed.
    pub fn delete_capacity(&self, table_name: &str) -> StateResult<bool> {
        let existed = self.delete_raw(CAPACITY, table_name)?;
        debug!(table = %table_name, existed, "capacity deleted");
        Ok(existed)
    }

    // ── Metrics ────────────────────────────────────────────────────

    /// Insert a metrics sample.
    pub fn put_metrics(&self, sample: &MetricsSample) -> StateResult<()> {
        self.put_json(METRICS, &sample.table_key(), sample)
    }

    /// Samples for one table and direction with `from <= epoch <= to`,
    /// oldest first.
    pub fn list_metrics(
        &self,
        table_name: &str,
        direction: Direction,
        from: u64,
        to: u64,
    ) -> StateResult<Vec<MetricsSample>> {
        let prefix = metrics_prefix(table_name, direction);
        let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
        let table = txn.open_table(METRICS).map_err(map_err!("table open"))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!("read"))? {
            let (key, value) = entry.map_err(map_err!("read"))?;
            if !key.value().starts_with(&prefix) {
                continue;
            }
            let sample: MetricsSample =
                serde_json::from_slice(value.value()).map_err(map_err!(Corrupt))?;
            if sample.epoch > to {
                break;
            }
            if sample.epoch >= from {
                results.push(sample);
            }
        }
        Ok(results)
    }

    /// Drop every sample older than `before`. Returns the number removed.
    pub fn prune_metrics(&self, before: u64) -> StateResult<u32> {
        let stale: Vec<String> = {
            let txn = self.db.begin_read().map_err(map_err!("transaction"))?;
            let table = txn.open_table(METRICS).map_err(map_err!("table open"))?;
            let mut keys = Vec::new();
            for entry in table.iter().map_err(map_err!("read"))? {
                let (key, value) = entry.map_err(map_err!("read"))?;
                let sample: MetricsSample =
                    serde_json::from_slice(value.value()).map_err(map_err!(Corrupt))?;
                if sample.epoch < before {
                    keys.push(key.value().to_string());
                }
            }
            keys
        };

        if stale.is_empty() {
            return Ok(0);
        }

        let txn = self.db.begin_write().map_err(map_err!("transaction"))?;
        {
            let mut table = txn.open_table(METRICS).map_err(map_err!("table open"))?;
            for key in &stale {
                table.remove(key.as_str()).map_err(map_err!("write"))?;
            }
        }
        txn.commit().map_err(map_err!("transaction"))?;
        debug!(removed = stale.len(), before, "metrics pruned");
        Ok(stale.len() as u32)
    }

    // ── Overrides ──────────────────────────────────────────────────

    /// Store a raw JSON override document.
    pub fn put_override(&self, key: &str, document: &str) -> StateResult<()> {
        self.put_raw(OVERRIDES, key, document.as_bytes())?;
        debug!(%key, "override stored");
        Ok(())
    }

    pub fn get_override(&self, key: &str) -> StateResult<Option<String>> {
        match self.get_raw(OVERRIDES, key)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(map_err!(Corrupt)),
            None => Ok(None),
        }
    }

    pub fn delete_override(&self, key: &str) -> StateResult<bool> {
        self.delete_raw(OVERRIDES, key)
    }

    // ── Hysteresis ─────────────────────────────────────────────────

    pub fn put_checks(&self, table_name: &str, checks: ConsecutiveChecks) -> StateResult<()> {
        self.put_json(CHECKS, table_name, &checks)
    }

    /// Stored counters, or zero for a table never seen before.
    pub fn get_checks(&self, table_name: &str) -> StateResult<ConsecutiveChecks> {
        Ok(self.get_json(CHECKS, table_name)?.unwrap_or_default())
    }
}

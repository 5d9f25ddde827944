//! redb table definitions for the dynscale state store.
//!
//! Each table uses `&str` keys and `&[u8]` values.

use redb::TableDefinition;

/// Provisioned capacity and status keyed by `{table_name}`.
pub const CAPACITY: TableDefinition<&str, &[u8]> = TableDefinition::new("capacity");

/// Metrics samples keyed by `{table_name}:{direction}:{epoch:020}`.
pub const METRICS: TableDefinition<&str, &[u8]> = TableDefinition::new("metrics");

/// Raw JSON override documents keyed by `{prefix}/{table_name}`.
pub const OVERRIDES: TableDefinition<&str, &[u8]> = TableDefinition::new("overrides");

/// Hysteresis counters keyed by `{table_name}`.
pub const CHECKS: TableDefinition<&str, &[u8]> = TableDefinition::new("checks");

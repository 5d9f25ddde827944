//! dynscale-state: embedded state store for dynscale.
//!
//! Backed by [redb](https://docs.rs/redb), holds everything the controller
//! needs between cycles: per-table capacity records, per-direction metrics
//! samples, dynamic configuration overrides, and hysteresis counters.
//!
//! # Architecture
//!
//! Records are JSON-serialized into redb's `&[u8]` value columns. Metrics
//! keys are `{table}:{direction}:{epoch}` with a zero-padded epoch so a
//! prefix scan walks samples in time order.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;

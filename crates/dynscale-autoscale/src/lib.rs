//! dynscale-autoscale: throughput decisions for managed tables.
//!
//! Each cycle evaluates reads and writes independently with the same
//! [`DirectionEngine`], then the [`ThroughputOrchestrator`] combines the two
//! verdicts into at most one capacity update per table.
//!
//! # Cycle
//!
//! ```text
//! breaker open?           → skip, counters = (0, 0)
//! for read, write:
//!     metrics over lookback window
//!     engine(config, metrics, current units, counter) → decision
//! always_decrease_rw_together ? both : either
//!     table ACTIVE?       → apply (or log under dry-run)
//! return counters
//! ```
//!
//! Metrics, capacity, mutation and the breaker are reached only through
//! the traits in [`provider`]. [`StoreProviders`] backs them with the
//! embedded state store; the HTTP breaker lives in `dynscale-breaker`.

pub mod calculators;
pub mod engine;
pub mod error;
pub mod fleet;
pub mod orchestrator;
pub mod provider;
pub mod resolver;
pub mod scale_table;
pub mod store;

pub use engine::{DirectionDecision, DirectionEngine, ScaleReason};
pub use error::{ScaleError, ScaleResult};
pub use fleet::{FleetReport, FleetRunner, TableFailure};
pub use orchestrator::{CycleAction, CycleOutcome, NoBreaker, ThroughputOrchestrator};
pub use provider::{
    CapacityMutator, CapacityProvider, CircuitBreaker, HysteresisStore, MetricsProvider,
    OverrideStore,
};
pub use resolver::ConfigResolver;
pub use store::StoreProviders;

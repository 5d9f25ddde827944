//! dynscale-breaker: HTTP circuit breaker for the autoscaler.
//!
//! Before each table's cycle the autoscaler asks the breaker whether
//! scaling is allowed. The breaker issues `GET <url>` with `x-table-name`
//! and `x-table-key` headers:
//!
//! ```text
//! 2xx                          → closed, cycle runs
//! non-2xx | refused | timeout  → open, cycle skipped, counters reset
//! ```
//!
//! Endpoints come from configuration. A table's `circuit_breaker_url`
//! replaces the global one; tables with neither are never gated.

pub mod breaker;
pub mod error;
pub mod probe;

pub use breaker::HttpCircuitBreaker;
pub use error::{BreakerError, BreakerResult};
pub use probe::{Endpoint, ProbeResult, http_probe};

//! Error types for the decision engine and its collaborators.

use dynscale_core::ConfigError;
use dynscale_state::StateError;
use thiserror::Error;

/// Result type alias for scaling operations.
pub type ScaleResult<T> = Result<T, ScaleError>;

/// Errors surfaced by a provisioning cycle.
///
/// Nothing here is retried internally; the next scheduled cycle is the
/// retry.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error("table {0} not found")]
    TableNotFound(String),

    #[error("metrics unavailable for {table}: {message}")]
    Metrics { table: String, message: String },

    #[error("remote service rejected update of {table}: {message}")]
    RemoteService { table: String, message: String },
}

//! Failures of the embedded state store.

use std::fmt::Display;

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open state database: {0}")]
    Open(String),

    /// A redb transaction, table open, read or write failed.
    #[error("state store {stage} failed: {message}")]
    Storage { stage: &'static str, message: String },

    #[error("cannot encode record: {0}")]
    Encode(String),

    /// Bytes in the store did not decode into the expected record.
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

impl StateError {
    pub(crate) fn storage(stage: &'static str, err: impl Display) -> Self {
        StateError::Storage {
            stage,
            message: err.to_string(),
        }
    }
}

//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading, validating, or merging configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid table pattern {key:?}: {source}")]
    Pattern {
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid scale table: {0}")]
    ScaleTable(String),

    #[error("invalid override document: {0}")]
    Override(#[from] serde_json::Error),

    #[error("{scope}: {reason}")]
    Invalid { scope: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(scope: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            scope: scope.into(),
            reason: reason.into(),
        }
    }
}

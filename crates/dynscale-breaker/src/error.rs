use thiserror::Error;

pub type BreakerResult<T> = Result<T, BreakerError>;

#[derive(Debug, Error)]
pub enum BreakerError {
    #[error("invalid circuit breaker url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

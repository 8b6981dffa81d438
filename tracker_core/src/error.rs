//! Error type for the fallible boundaries of the tracker.
//!
//! Transient numerical failures (singular innovation covariance, underflowed
//! mode probabilities) are recovered locally inside the filter and never
//! surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid JSON in configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("network error: {0}")]
    Net(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

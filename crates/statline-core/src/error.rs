//! Unified error types for Statline

use thiserror::Error;

/// Unified error type for all Statline operations
#[derive(Error, Debug)]
pub enum StatlineError {
    /// Invalid configuration, fatal at construction and never retried
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using StatlineError
pub type Result<T> = std::result::Result<T, StatlineError>;

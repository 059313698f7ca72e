//! Error types for the scroll odometer.

use thiserror::Error;

/// Errors raised by the aggregate ledger and its backing store.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Ledger file is corrupt: {0}")]
    Corrupt(String),

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Invalid date key: {0}")]
    InvalidDateKey(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

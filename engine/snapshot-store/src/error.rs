//! Error types for the snapshot store

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias for snapshot store operations
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Errors that can occur in the snapshot store
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// I/O errors (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A final snapshot already exists for the date
    #[error("Snapshot for {0} is final and cannot be overwritten")]
    AlreadyFinal(NaiveDate),

    /// Invalid operation for current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl SnapshotError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }
}

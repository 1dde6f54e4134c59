//! Error types for the store module.

use thiserror::Error;
use vista_core::ErrorKind;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Credential could not be decoded from its stored bytes.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend cannot serve requests (poisoned lock, worker gone).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Every store failure is an infrastructure failure.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Infrastructure
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

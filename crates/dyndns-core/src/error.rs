//! Error types for the dynamic DNS core
//!
//! This module defines all error types used throughout the crate.
//!
//! Authentication and address validation failures are deliberately absent:
//! the update path recovers both locally and reports them as an outcome, so
//! they never travel as errors.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for dynamic DNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dynamic DNS system
#[derive(Error, Debug)]
pub enum Error {
    /// A uniqueness constraint was violated (domain or token already taken)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The record store failed or is unreachable (transient)
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store operation exceeded its time budget (transient)
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a store unavailable error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the caller may retry the operation unchanged
    ///
    /// HTTP callers map retryable errors to `503 Service Unavailable`.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::Timeout(_) | Self::Io(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

//! Common error types used throughout clipforge.
//!
//! This module provides a unified error type that covers the failure cases
//! callers of the engine facade can observe: unknown jobs, rejected input,
//! and I/O failures while staging artifacts.

/// Common error type for clipforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested job was not found.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The engine has been shut down and no longer accepts work.
    #[error("Engine is shut down")]
    ShutDown,

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

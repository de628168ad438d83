//! Error types for remaster-engine
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Decode failures are terminal for the affected chunk;
//! processing failures are terminal for the session; a full concurrency gate
//! is retryable and never fatal.

use thiserror::Error;

/// Main error type for remaster-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Errors bubbled up from the shared library
    #[error(transparent)]
    Common(#[from] remaster_common::Error),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Audio decoding errors (terminal for the affected chunk)
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// DSP chain violated an invariant or failed (terminal for the session)
    #[error("Processing error: {0}")]
    Processing(String),

    /// Concurrency gate is full; caller should retry with backoff
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using remaster-engine Error
pub type Result<T> = std::result::Result<T, Error>;

//! Common error types for Remaster

use thiserror::Error;

/// Common result type for Remaster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the engine and its library crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid boundary or timing input (rejected before scheduling)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed mastering parameters (rejected before processing)
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

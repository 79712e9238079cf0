//! Error types for the core crate.

use thiserror::Error;

/// Core error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

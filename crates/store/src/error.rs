//! Store error types.

use thiserror::Error;

/// File store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid table name: {0}")]
    InvalidTableName(String),

    #[error("too small limit: {limit} (need at least {required})")]
    InvalidLimit { limit: u64, required: u64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation cancelled")]
    Cancelled,

    /// The operation failed and its transaction was rolled back.
    #[error("rolled back after error: {source}")]
    Aborted { source: Box<StoreError> },

    /// The operation failed and so did the rollback.
    #[error("rollback failed ({rollback}) after error: {operation}")]
    RollbackFailed {
        operation: Box<StoreError>,
        rollback: Box<StoreError>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// The error that triggered a rollback, or `self` for every other kind.
    pub fn operation_error(&self) -> &StoreError {
        match self {
            Self::Aborted { source } => source.operation_error(),
            Self::RollbackFailed { operation, .. } => operation.operation_error(),
            other => other,
        }
    }

    /// Whether the failure stems from cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.operation_error(), Self::Cancelled)
    }
}

impl From<pgstash_core::Error> for StoreError {
    fn from(err: pgstash_core::Error) -> Self {
        match err {
            pgstash_core::Error::Io(e) => Self::Io(e),
            pgstash_core::Error::Config(msg) => Self::Config(msg),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

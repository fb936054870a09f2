//! Error types for the bill tracker.

use crate::store::StoreError;

/// Top-level error type for the bill tracker.
#[derive(Debug, thiserror::Error)]
pub enum BillarrError {
    /// User input failed field constraints. Carries one message per problem.
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// Referenced bill does not exist.
    #[error("bill not found: {0}")]
    NotFound(i64),

    /// SQLite store error.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for BillarrError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other.to_string()),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BillarrError>;

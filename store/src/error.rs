//! Store error types.

use thiserror::Error;

/// Errors returned by rate stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database reported an error.
    #[error("Database error: {0}")]
    Database(String),

    /// A persisted row could not be mapped back to an observation.
    #[error("Invalid stored row: {0}")]
    InvalidRow(String),

    /// The store refused the write as a whole.
    #[error("Write rejected: {0}")]
    Rejected(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

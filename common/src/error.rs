//! Error types shared by the ratefeed crates.

use thiserror::Error;

/// Errors raised while constructing common domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Code is not three ASCII letters.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrencyCode(String),

    /// Rate is negative or could not be parsed as a decimal.
    #[error("Invalid rate: {0}")]
    InvalidRate(String),
}

impl CommonError {
    /// Get error code for logs and API payloads.
    pub fn error_code(&self) -> &'static str {
        match self {
            CommonError::InvalidCurrencyCode(_) => "INVALID_CURRENCY_CODE",
            CommonError::InvalidRate(_) => "INVALID_RATE",
        }
    }
}

/// Result type alias for common operations.
pub type Result<T> = std::result::Result<T, CommonError>;

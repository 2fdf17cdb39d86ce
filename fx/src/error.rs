//! FX error types.

use ratefeed_common::{CommonError, CurrencyCode};
use ratefeed_store::StoreError;
use thiserror::Error;

/// Errors that can occur in the rate cache, pipeline and read path.
#[derive(Debug, Error)]
pub enum FxError {
    /// Code is not allow-listed, or is allow-listed but has never been observed.
    #[error("Invalid currency code: {code}")]
    InvalidCurrency {
        code: String,
        /// Sorted allow-list, for error payloads.
        valid_codes: Vec<String>,
    },

    /// Malformed arguments from a caller upstream of the cache or resolver.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider still failing after the retry budget was spent.
    #[error("Rate provider unavailable after {attempts} attempts: {reason}")]
    UpstreamUnavailable { attempts: u32, reason: String },

    /// Conversion from a currency whose rate is zero.
    #[error("Cannot convert from {0}: rate is zero")]
    DivideByZeroRate(CurrencyCode),

    /// A single provider call failed.
    #[error("Rate provider error: {0}")]
    Provider(String),

    /// A single provider call exceeded its deadline.
    #[error("Rate provider timed out after {0}ms")]
    Timeout(u64),

    /// The durable store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Startup resources or settings are unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FxError {
    /// Check if this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FxError::Provider(_) | FxError::Timeout(_) | FxError::UpstreamUnavailable { .. }
        )
    }

    /// Get error code for API payloads.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::InvalidCurrency { .. } => "INVALID_CURRENCY",
            FxError::InvalidInput(_) => "INVALID_INPUT",
            FxError::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            FxError::DivideByZeroRate(_) => "DIVIDE_BY_ZERO_RATE",
            FxError::Provider(_) => "PROVIDER_ERROR",
            FxError::Timeout(_) => "PROVIDER_TIMEOUT",
            FxError::Storage(_) => "STORAGE_ERROR",
            FxError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

impl From<CommonError> for FxError {
    fn from(err: CommonError) -> Self {
        FxError::InvalidInput(err.to_string())
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;

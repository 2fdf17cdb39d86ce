//! Service error types.

use ratefeed_common::CommonError;
use ratefeed_fx::FxError;
use thiserror::Error;

use crate::state::ServiceState;

/// Errors raised while wiring or running the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: ServiceState,
    },

    #[error(transparent)]
    Fx(#[from] FxError),
}

impl From<CommonError> for ServiceError {
    fn from(err: CommonError) -> Self {
        ServiceError::Configuration(err.to_string())
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

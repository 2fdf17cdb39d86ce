//! Ratefeed Service
//!
//! Wires the store, cache, provider, ingestion pipeline and resolver together
//! and drives periodic ingestion until shutdown.

pub mod config;
pub mod error;
pub mod scheduler;
pub mod service;
pub mod state;

pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use scheduler::IngestionScheduler;
pub use service::RateService;
pub use state::ServiceState;

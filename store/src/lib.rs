//! Ratefeed Rate Store
//!
//! Append-only time series of rate observations keyed by `(currency, observed_at)`.
//! The in-memory store backs tests and single-process deployments; the
//! PostgreSQL store is used whenever a database URL is configured.

pub mod store;
pub mod batch;
pub mod memory;
pub mod postgres;
pub mod error;

pub use store::{RateStore, SharedRateStore};
pub use batch::ObservationBatch;
pub use memory::MemoryRateStore;
pub use postgres::PgRateStore;
pub use error::{StoreError, StoreResult};

//! Ratefeed FX
//!
//! Rate freshness cache, ingestion pipeline and read path.
//!
//! # Features
//!
//! - Bounded-staleness cache in front of the durable store
//! - Periodic ingestion with bounded retry and per-entry skipping
//! - Cache-first resolution, conversion, filtering and ranking
//! - Allow-list validation of currency codes
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ratefeed_fx::{CodeValidator, FreshnessCache, RateResolver};
//! use ratefeed_store::MemoryRateStore;
//!
//! let resolver = RateResolver::new(
//!     Arc::new(CodeValidator::bundled()?),
//!     Arc::new(FreshnessCache::new()),
//!     Arc::new(MemoryRateStore::new()),
//! );
//!
//! let eur = resolver.resolve("EUR").await?;
//! let gbp = resolver.convert("EUR", "GBP", dec!(100)).await?;
//! ```

pub mod cache;
pub mod conversion;
pub mod error;
pub mod ingestion;
pub mod metrics;
pub mod provider;
pub mod resolver;
pub mod retry;
pub mod validator;

pub use cache::{CacheEntry, CacheStats, FreshnessCache, FreshnessCacheConfig, SharedFreshnessCache};
pub use conversion::{convert_amount, ConvertedAmount};
pub use error::{FxError, FxResult};
pub use ingestion::{IngestionConfig, IngestionOutcome, IngestionPipeline, IngestionReport};
pub use metrics::{FxMetrics, MetricsSnapshot, SharedMetrics};
pub use provider::{HttpRateProvider, RateProvider, RateSnapshot};
pub use resolver::RateResolver;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use validator::CodeValidator;

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateProvider;

//! The durable store boundary.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use ratefeed_common::{CurrencyCode, RateObservation};

use crate::error::StoreResult;

/// Durable, append-only log of rate observations.
///
/// Implementations own their internal consistency for concurrent appends and
/// reads. An observation whose `(currency, observed_at)` already exists is
/// ignored, so the first write for an identity wins.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Append one observation. Returns `false` when the identity already existed.
    async fn save(&self, observation: &RateObservation) -> StoreResult<bool>;

    /// Append a batch in a single write. Returns the observations that were
    /// newly written; ones whose identity already existed are left out.
    async fn save_all(&self, observations: &[RateObservation])
        -> StoreResult<Vec<RateObservation>>;

    /// Newest observation for a code.
    async fn latest_for(&self, code: &CurrencyCode) -> StoreResult<Option<RateObservation>>;

    /// Every observation for a code, newest first.
    async fn all_for(&self, code: &CurrencyCode) -> StoreResult<Vec<RateObservation>>;

    /// Codes with at least one observation.
    async fn all_distinct_codes(&self) -> StoreResult<BTreeSet<CurrencyCode>>;
}

/// Shared store handle.
pub type SharedRateStore = Arc<dyn RateStore>;

//! In-memory rate store.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use ratefeed_common::{CurrencyCode, RateObservation, Timestamp};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::StoreResult;
use crate::store::RateStore;

/// Rate store backed by per-currency ordered maps.
///
/// A batch is applied under a single write lock, so readers never observe
/// half of a `save_all`.
pub struct MemoryRateStore {
    series: RwLock<HashMap<CurrencyCode, BTreeMap<Timestamp, Decimal>>>,
}

impl MemoryRateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Total number of observations across all codes.
    pub fn len(&self) -> usize {
        self.series.read().values().map(BTreeMap::len).sum()
    }

    /// Check if the store holds no observations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(
        series: &mut HashMap<CurrencyCode, BTreeMap<Timestamp, Decimal>>,
        observation: &RateObservation,
    ) -> bool {
        let points = series.entry(observation.currency.clone()).or_default();
        if points.contains_key(&observation.observed_at) {
            return false;
        }
        points.insert(observation.observed_at, observation.rate);
        true
    }
}

impl Default for MemoryRateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn save(&self, observation: &RateObservation) -> StoreResult<bool> {
        let inserted = Self::insert(&mut self.series.write(), observation);
        if !inserted {
            debug!(observation = %observation, "Duplicate observation ignored");
        }
        Ok(inserted)
    }

    async fn save_all(
        &self,
        observations: &[RateObservation],
    ) -> StoreResult<Vec<RateObservation>> {
        let mut series = self.series.write();
        let written: Vec<_> = observations
            .iter()
            .filter(|observation| Self::insert(&mut series, observation))
            .cloned()
            .collect();

        debug!(
            submitted = observations.len(),
            written = written.len(),
            "Saved observation batch"
        );
        Ok(written)
    }

    async fn latest_for(&self, code: &CurrencyCode) -> StoreResult<Option<RateObservation>> {
        let series = self.series.read();
        Ok(series.get(code).and_then(|points| {
            points
                .last_key_value()
                .map(|(at, rate)| RateObservation::new(code.clone(), *rate, *at))
        }))
    }

    async fn all_for(&self, code: &CurrencyCode) -> StoreResult<Vec<RateObservation>> {
        let series = self.series.read();
        Ok(series
            .get(code)
            .map(|points| {
                points
                    .iter()
                    .rev()
                    .map(|(at, rate)| RateObservation::new(code.clone(), *rate, *at))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn all_distinct_codes(&self) -> StoreResult<BTreeSet<CurrencyCode>> {
        Ok(self.series.read().keys().cloned().collect())
    }
}

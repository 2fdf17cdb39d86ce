//! Observation batches written by one ingestion cycle.

use ratefeed_common::{CommonError, CurrencyCode, RateObservation, Timestamp};
use uuid::Uuid;

/// Observations captured in one ingestion cycle.
///
/// Every observation in a batch carries the batch's `observed_at`, which is
/// what lets "latest for code" queries line up across currencies.
#[derive(Debug, Clone)]
pub struct ObservationBatch {
    /// Batch ID, used for log correlation only.
    pub id: Uuid,
    /// Capture time shared by all observations.
    pub observed_at: Timestamp,
    observations: Vec<RateObservation>,
}

impl ObservationBatch {
    /// Create an empty batch stamped with `observed_at`.
    pub fn new(observed_at: Timestamp) -> Self {
        Self {
            id: Uuid::now_v7(),
            observed_at,
            observations: Vec::new(),
        }
    }

    /// Add a raw provider value, rejecting it if it does not parse.
    ///
    /// Returns `false` and keeps the earlier entry when the batch already
    /// holds the same code, since both would share one store identity.
    pub fn push_raw(&mut self, code: &str, raw_rate: &str) -> Result<bool, CommonError> {
        let currency = CurrencyCode::parse(code)?;
        let observation = RateObservation::from_raw(currency, raw_rate, self.observed_at)?;
        if self.contains(&observation.currency) {
            return Ok(false);
        }
        self.observations.push(observation);
        Ok(true)
    }

    /// Check if the batch already holds `currency`.
    pub fn contains(&self, currency: &CurrencyCode) -> bool {
        self.observations.iter().any(|o| o.currency == *currency)
    }

    /// Observations in insertion order.
    pub fn observations(&self) -> &[RateObservation] {
        &self.observations
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

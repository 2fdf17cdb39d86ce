//! Bounded-staleness rate cache.

use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use ratefeed_common::{
    constants, system_clock, within_window, CurrencyCode, RateObservation, SharedClock, Timestamp,
};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{FxError, FxResult};

/// Cached rate entry. One per currency, replaced on every refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub currency: CurrencyCode,
    pub rate: Decimal,
    pub cached_at: Timestamp,
}

impl CacheEntry {
    fn is_fresh_at(&self, now: Timestamp, ttl: Duration) -> bool {
        within_window(self.cached_at, now, ttl)
    }

    /// View the entry as an observation.
    pub fn to_observation(&self) -> RateObservation {
        RateObservation::new(self.currency.clone(), self.rate, self.cached_at)
    }
}

/// Configuration for the freshness cache.
#[derive(Debug, Clone)]
pub struct FreshnessCacheConfig {
    /// Maximum age at which an entry is still served.
    pub ttl: Duration,
}

impl Default for FreshnessCacheConfig {
    fn default() -> Self {
        Self {
            ttl: constants::default_cache_ttl(),
        }
    }
}

/// Thread-safe rate cache with a fixed freshness window.
///
/// An entry is fresh iff `now - cached_at <= ttl`, checked on every read.
/// Stale entries stay in the map until overwritten; nothing evicts them.
///
/// Writes overwrite unconditionally, so two interleaved refreshes for the
/// same code resolve as last-write-wins even if the later write carries an
/// older `cached_at`.
pub struct FreshnessCache {
    entries: DashMap<CurrencyCode, CacheEntry>,
    config: FreshnessCacheConfig,
    clock: SharedClock,
}

impl FreshnessCache {
    /// Create a new cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(FreshnessCacheConfig::default())
    }

    /// Create a new cache with custom configuration.
    pub fn with_config(config: FreshnessCacheConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Create a new cache reading time from `clock`.
    pub fn with_clock(config: FreshnessCacheConfig, clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            clock,
        }
    }

    /// Freshness window.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Get the cached rate for `code` if it is still fresh.
    pub fn get_if_fresh(&self, code: &str) -> Option<RateObservation> {
        let currency = CurrencyCode::parse(code).ok()?;
        let now = self.clock.now();

        match self.entries.get(&currency) {
            Some(entry) if entry.is_fresh_at(now, self.config.ttl) => {
                debug!(code = %currency, "Cache hit");
                Some(entry.to_observation())
            }
            Some(_) => {
                debug!(code = %currency, "Cache entry stale");
                None
            }
            None => {
                debug!(code = %currency, "Cache miss");
                None
            }
        }
    }

    /// Store a rate for `code`, replacing any existing entry.
    ///
    /// Fails with [`FxError::InvalidInput`] when the rate or timestamp is
    /// missing or the code is malformed.
    pub fn update(
        &self,
        code: &str,
        rate: Option<Decimal>,
        cached_at: Option<Timestamp>,
    ) -> FxResult<CacheEntry> {
        let (Some(rate), Some(cached_at)) = (rate, cached_at) else {
            return Err(FxError::InvalidInput(format!(
                "cannot cache {code}: rate and timestamp are required"
            )));
        };
        let currency = CurrencyCode::parse(code)?;

        let entry = CacheEntry {
            currency: currency.clone(),
            rate,
            cached_at,
        };
        self.entries.insert(currency, entry.clone());
        Ok(entry)
    }

    /// Store an observation, replacing any existing entry for its code.
    pub fn put(&self, observation: &RateObservation) -> CacheEntry {
        let entry = CacheEntry {
            currency: observation.currency.clone(),
            rate: observation.rate,
            cached_at: observation.observed_at,
        };
        self.entries.insert(observation.currency.clone(), entry.clone());
        entry
    }

    /// Clear all cached rates.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Get the number of entries, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let total = self.entries.len();
        let fresh = self
            .entries
            .iter()
            .filter(|e| e.is_fresh_at(now, self.config.ttl))
            .count();

        CacheStats {
            total_entries: total,
            fresh_entries: fresh,
            stale_entries: total.saturating_sub(fresh),
        }
    }
}

impl Default for FreshnessCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
    pub stale_entries: usize,
}

/// Shared freshness cache.
pub type SharedFreshnessCache = Arc<FreshnessCache>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ratefeed_common::ManualClock;
    use rust_decimal_macros::dec;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 7, 31, 12, 0, 0).unwrap()
    }

    fn cache_at(start: Timestamp) -> (FreshnessCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        let cache = FreshnessCache::with_clock(FreshnessCacheConfig::default(), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_update_and_get() {
        let (cache, _) = cache_at(t0());
        cache.update("EUR", Some(dec!(0.91)), Some(t0())).unwrap();

        let cached = cache.get_if_fresh("EUR").unwrap();
        assert_eq!(cached.currency, CurrencyCode::eur());
        assert_eq!(cached.rate, dec!(0.91));
        assert_eq!(cached.observed_at, t0());
    }

    #[test]
    fn test_code_is_case_insensitive() {
        let (cache, _) = cache_at(t0());
        cache.update("gbp", Some(dec!(0.77)), Some(t0())).unwrap();

        assert!(cache.get_if_fresh("GBP").is_some());
        assert!(cache.get_if_fresh("Gbp").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_miss() {
        let (cache, _) = cache_at(t0());
        assert!(cache.get_if_fresh("USD").is_none());
        assert!(cache.get_if_fresh("not-a-code").is_none());
    }

    #[test]
    fn test_ttl_boundary() {
        let (cache, clock) = cache_at(t0());
        cache.update("USD", Some(dec!(1)), Some(t0())).unwrap();

        clock.set(t0() + Duration::milliseconds(59_999));
        assert!(cache.get_if_fresh("USD").is_some());

        clock.set(t0() + Duration::seconds(60));
        assert!(cache.get_if_fresh("USD").is_some());

        clock.set(t0() + Duration::milliseconds(60_001));
        assert!(cache.get_if_fresh("USD").is_none());
    }

    #[test]
    fn test_stale_entry_is_not_evicted() {
        let (cache, clock) = cache_at(t0());
        cache.update("USD", Some(dec!(1)), Some(t0())).unwrap();

        clock.advance(Duration::minutes(5));
        assert!(cache.get_if_fresh("USD").is_none());
        assert_eq!(cache.len(), 1);

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.fresh_entries, 0);
        assert_eq!(stats.stale_entries, 1);
    }

    #[test]
    fn test_update_requires_rate_and_timestamp() {
        let (cache, _) = cache_at(t0());

        let err = cache.update("USD", None, Some(t0())).unwrap_err();
        assert!(matches!(err, FxError::InvalidInput(_)));

        let err = cache.update("USD", Some(dec!(1)), None).unwrap_err();
        assert!(matches!(err, FxError::InvalidInput(_)));

        assert!(matches!(
            cache.update("US", Some(dec!(1)), Some(t0())),
            Err(FxError::InvalidInput(_))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_overwrite_is_unconditional() {
        let (cache, _) = cache_at(t0());
        cache.update("EUR", Some(dec!(0.92)), Some(t0())).unwrap();
        cache
            .update("EUR", Some(dec!(0.90)), Some(t0() - Duration::seconds(10)))
            .unwrap();

        let cached = cache.get_if_fresh("EUR").unwrap();
        assert_eq!(cached.rate, dec!(0.90));
        assert_eq!(cached.observed_at, t0() - Duration::seconds(10));
    }

    #[test]
    fn test_cache_clear() {
        let (cache, _) = cache_at(t0());
        cache.put(&RateObservation::new(CurrencyCode::usd(), dec!(1), t0()));
        cache.put(&RateObservation::new(CurrencyCode::gbp(), dec!(0.77), t0()));

        assert_eq!(cache.len(), 2);

        cache.clear();

        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_concurrent_writers_leave_one_entry_per_code() {
        let cache = Arc::new(FreshnessCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let code = if (i + j) % 2 == 0 { "USD" } else { "EUR" };
                        cache
                            .update(code, Some(Decimal::from(j)), Some(Utc::now()))
                            .unwrap();
                        let _ = cache.get_if_fresh(code);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.get_if_fresh("USD").is_some());
    }
}

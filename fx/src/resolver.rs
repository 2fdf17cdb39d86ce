//! Read path: cache first, durable store on miss.

use std::sync::Arc;

use ratefeed_common::{system_clock, CurrencyCode, RateObservation, SharedClock};
use ratefeed_store::SharedRateStore;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::cache::SharedFreshnessCache;
use crate::conversion::ConvertedAmount;
use crate::error::FxResult;
use crate::metrics::{FxMetrics, SharedMetrics};
use crate::validator::CodeValidator;

/// Answers rate queries from the freshness cache, falling back to the store.
///
/// Every store hit is written back into the cache stamped with the
/// observation's own capture time, so a store row older than the TTL is
/// served but never makes the cache look fresh.
pub struct RateResolver {
    validator: Arc<CodeValidator>,
    cache: SharedFreshnessCache,
    store: SharedRateStore,
    clock: SharedClock,
    metrics: SharedMetrics,
}

impl RateResolver {
    /// Create a new resolver.
    pub fn new(
        validator: Arc<CodeValidator>,
        cache: SharedFreshnessCache,
        store: SharedRateStore,
    ) -> Self {
        Self {
            validator,
            cache,
            store,
            clock: system_clock(),
            metrics: Arc::new(FxMetrics::new()),
        }
    }

    /// Stamp conversions using `clock`.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Record counters into `metrics`.
    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Latest known rate for `code`.
    ///
    /// Unsupported codes, and supported codes that were never observed, both
    /// fail with `InvalidCurrency`. Unsupported codes touch neither the cache
    /// nor the store.
    #[instrument(skip(self))]
    pub async fn resolve(&self, code: &str) -> FxResult<RateObservation> {
        let currency = self.validator.validate(code)?;

        if let Some(cached) = self.cache.get_if_fresh(currency.as_str()) {
            self.metrics.cache_hit();
            return Ok(cached);
        }
        self.metrics.cache_miss();

        self.metrics.store_read();
        let observation = self
            .store
            .latest_for(&currency)
            .await?
            .ok_or_else(|| self.validator.invalid(code))?;

        self.cache.put(&observation);
        debug!(observation = %observation, "Repopulated cache from store");

        Ok(observation)
    }

    /// Convert `amount` of `from` into `to` through the base currency.
    #[instrument(skip(self))]
    pub async fn convert(&self, from: &str, to: &str, amount: Decimal) -> FxResult<ConvertedAmount> {
        let from_rate = self.resolve(from).await?;
        let to_rate = self.resolve(to).await?;

        let conversion =
            ConvertedAmount::from_observations(&from_rate, &to_rate, amount, self.clock.now())?;

        info!(
            from = %conversion.from,
            to = %conversion.to,
            effective_rate = %conversion.effective_rate(),
            converted = %conversion.converted,
            "Conversion completed"
        );

        Ok(conversion)
    }

    /// Latest rate per known code, keeping those at or above `min_rate`.
    #[instrument(skip(self))]
    pub async fn filter_by_min_rate(&self, min_rate: Decimal) -> FxResult<Vec<RateObservation>> {
        let mut latest = self.latest_per_code().await?;
        latest.retain(|observation| observation.rate >= min_rate);
        Ok(latest)
    }

    /// The `limit` highest latest rates, highest first.
    #[instrument(skip(self))]
    pub async fn top_n(&self, limit: usize) -> FxResult<Vec<RateObservation>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut latest = self.latest_per_code().await?;
        latest.sort_by(|a, b| b.rate.cmp(&a.rate));
        latest.truncate(limit);
        Ok(latest)
    }

    /// Every observation for `code`, newest first.
    #[instrument(skip(self))]
    pub async fn history(&self, code: &str) -> FxResult<Vec<RateObservation>> {
        let currency = self.validator.validate(code)?;
        Ok(self.store.all_for(&currency).await?)
    }

    /// Allow-listed codes, sorted.
    pub fn supported_codes(&self) -> Vec<CurrencyCode> {
        self.validator.codes().cloned().collect()
    }

    async fn latest_per_code(&self) -> FxResult<Vec<RateObservation>> {
        let codes = self.store.all_distinct_codes().await?;
        let mut latest = Vec::with_capacity(codes.len());

        for code in &codes {
            self.metrics.store_read();
            if let Some(observation) = self.store.latest_for(code).await? {
                latest.push(observation);
            }
        }

        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FreshnessCache, FreshnessCacheConfig};
    use crate::error::FxError;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use ratefeed_common::{ManualClock, Timestamp};
    use ratefeed_store::{MemoryRateStore, RateStore, StoreResult};
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store that counts reads.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryRateStore,
        reads: AtomicUsize,
    }

    impl CountingStore {
        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateStore for CountingStore {
        async fn save(&self, observation: &RateObservation) -> StoreResult<bool> {
            self.inner.save(observation).await
        }

        async fn save_all(
            &self,
            observations: &[RateObservation],
        ) -> StoreResult<Vec<RateObservation>> {
            self.inner.save_all(observations).await
        }

        async fn latest_for(&self, code: &CurrencyCode) -> StoreResult<Option<RateObservation>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.latest_for(code).await
        }

        async fn all_for(&self, code: &CurrencyCode) -> StoreResult<Vec<RateObservation>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.all_for(code).await
        }

        async fn all_distinct_codes(&self) -> StoreResult<BTreeSet<CurrencyCode>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.all_distinct_codes().await
        }
    }

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 7, 31, 12, 0, 0).unwrap()
    }

    fn obs(code: &str, rate: Decimal, at: Timestamp) -> RateObservation {
        RateObservation::new(CurrencyCode::parse(code).unwrap(), rate, at)
    }

    struct Fixture {
        store: Arc<CountingStore>,
        cache: SharedFreshnessCache,
        clock: Arc<ManualClock>,
        resolver: RateResolver,
    }

    async fn fixture(rows: &[(&str, Decimal)]) -> Fixture {
        let store = Arc::new(CountingStore::default());
        let batch: Vec<_> = rows.iter().map(|(code, rate)| obs(code, *rate, t0())).collect();
        store.save_all(&batch).await.unwrap();

        let clock = Arc::new(ManualClock::new(t0()));
        let cache = Arc::new(FreshnessCache::with_clock(
            FreshnessCacheConfig::default(),
            clock.clone(),
        ));
        let validator = Arc::new(CodeValidator::from_lines("USD\nEUR\nGBP\nJPY\nCHF").unwrap());
        let resolver = RateResolver::new(validator, cache.clone(), store.clone())
            .with_clock(clock.clone());

        Fixture {
            store,
            cache,
            clock,
            resolver,
        }
    }

    fn sample() -> [(&'static str, Decimal); 3] {
        [("USD", dec!(1.0000)), ("EUR", dec!(0.9000)), ("GBP", dec!(0.7700))]
    }

    #[tokio::test]
    async fn test_miss_writes_through() {
        let fx = fixture(&sample()).await;

        let first = fx.resolver.resolve("eur").await.unwrap();
        assert_eq!(first.rate, dec!(0.9));
        assert_eq!(fx.store.reads(), 1);

        fx.clock.advance(Duration::seconds(30));
        let second = fx.resolver.resolve("EUR").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(fx.store.reads(), 1);
    }

    #[tokio::test]
    async fn test_stale_entry_falls_back_to_store() {
        let fx = fixture(&sample()).await;
        fx.resolver.resolve("USD").await.unwrap();

        fx.clock.advance(Duration::seconds(61));
        fx.resolver.resolve("USD").await.unwrap();

        assert_eq!(fx.store.reads(), 2);
    }

    #[tokio::test]
    async fn test_old_store_row_never_looks_fresh() {
        let fx = fixture(&sample()).await;
        fx.clock.advance(Duration::minutes(5));

        let first = fx.resolver.resolve("EUR").await.unwrap();
        let second = fx.resolver.resolve("EUR").await.unwrap();

        // Repopulated entries keep the observation's capture time.
        assert_eq!(first.observed_at, t0());
        assert_eq!(second, first);
        assert_eq!(fx.store.reads(), 2);
        assert_eq!(fx.cache.len(), 1);
        assert!(fx.cache.get_if_fresh("EUR").is_none());
    }

    #[tokio::test]
    async fn test_convert_negative_amount() {
        let fx = fixture(&sample()).await;

        let result = fx.resolver.convert("EUR", "GBP", dec!(-100)).await.unwrap();

        assert_eq!(result.converted, dec!(-85.5556));
    }

    #[tokio::test]
    async fn test_unsupported_code_touches_nothing() {
        let fx = fixture(&sample()).await;

        match fx.resolver.resolve("ZZZ").await {
            Err(FxError::InvalidCurrency { code, valid_codes }) => {
                assert_eq!(code, "ZZZ");
                assert_eq!(valid_codes, vec!["CHF", "EUR", "GBP", "JPY", "USD"]);
            }
            other => panic!("expected InvalidCurrency, got {other:?}"),
        }

        assert_eq!(fx.store.reads(), 0);
        assert!(fx.cache.is_empty());
    }

    #[tokio::test]
    async fn test_supported_but_never_observed() {
        let fx = fixture(&sample()).await;

        let err = fx.resolver.resolve("JPY").await.unwrap_err();

        assert!(matches!(err, FxError::InvalidCurrency { ref code, .. } if code == "JPY"));
        assert!(fx.cache.is_empty());
    }

    #[tokio::test]
    async fn test_convert() {
        let fx = fixture(&sample()).await;

        let result = fx.resolver.convert("EUR", "GBP", dec!(100)).await.unwrap();

        assert_eq!(result.converted, dec!(85.5556));
        assert_eq!(result.from_rate, dec!(0.9));
        assert_eq!(result.to_rate, dec!(0.77));
        assert_eq!(result.executed_at, t0());
    }

    #[tokio::test]
    async fn test_convert_same_currency() {
        let fx = fixture(&sample()).await;

        let result = fx.resolver.convert("GBP", "GBP", dec!(12.3456)).await.unwrap();

        assert_eq!(result.converted, dec!(12.3456));
    }

    #[tokio::test]
    async fn test_convert_names_failing_code() {
        let fx = fixture(&sample()).await;

        let err = fx.resolver.convert("USD", "QQQ", dec!(1)).await.unwrap_err();
        assert!(matches!(err, FxError::InvalidCurrency { ref code, .. } if code == "QQQ"));

        let err = fx.resolver.convert("CHF", "USD", dec!(1)).await.unwrap_err();
        assert!(matches!(err, FxError::InvalidCurrency { ref code, .. } if code == "CHF"));
    }

    #[tokio::test]
    async fn test_convert_from_zero_rate() {
        let fx = fixture(&[("USD", dec!(1)), ("JPY", dec!(0))]).await;

        let err = fx.resolver.convert("JPY", "USD", dec!(5)).await.unwrap_err();

        assert!(matches!(err, FxError::DivideByZeroRate(ref code) if *code == CurrencyCode::jpy()));
    }

    #[tokio::test]
    async fn test_top_n() {
        let fx = fixture(&sample()).await;

        let top = fx.resolver.top_n(2).await.unwrap();
        let codes: Vec<_> = top.iter().map(|o| o.currency.as_str()).collect();
        assert_eq!(codes, vec!["USD", "EUR"]);

        assert!(fx.resolver.top_n(0).await.unwrap().is_empty());
        assert_eq!(fx.resolver.top_n(10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_filter_by_min_rate() {
        let fx = fixture(&sample()).await;

        let kept: BTreeSet<_> = fx
            .resolver
            .filter_by_min_rate(dec!(0.8))
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.currency)
            .collect();

        assert_eq!(kept, BTreeSet::from([CurrencyCode::usd(), CurrencyCode::eur()]));
    }

    #[tokio::test]
    async fn test_filter_uses_latest_rate_per_code() {
        let fx = fixture(&sample()).await;
        fx.store
            .save(&obs("GBP", dec!(0.85), t0() + Duration::seconds(60)))
            .await
            .unwrap();

        let kept = fx.resolver.filter_by_min_rate(dec!(0.8)).await.unwrap();

        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|o| o.rate >= dec!(0.8)));
    }

    #[tokio::test]
    async fn test_history() {
        let fx = fixture(&sample()).await;
        fx.store
            .save(&obs("EUR", dec!(0.91), t0() + Duration::seconds(60)))
            .await
            .unwrap();

        let history = fx.resolver.history("eur").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].rate, dec!(0.91));
        assert_eq!(history[1].rate, dec!(0.9));

        assert!(fx.resolver.history("CHF").await.unwrap().is_empty());
        assert!(matches!(
            fx.resolver.history("ZZZ").await,
            Err(FxError::InvalidCurrency { .. })
        ));
    }

    #[test]
    fn test_supported_codes_sorted() {
        let validator = Arc::new(CodeValidator::from_lines("JPY\nusd\nEUR").unwrap());
        let resolver = RateResolver::new(
            validator,
            Arc::new(FreshnessCache::new()),
            Arc::new(MemoryRateStore::new()),
        );

        let codes: Vec<_> = resolver.supported_codes().iter().map(ToString::to_string).collect();
        assert_eq!(codes, vec!["EUR", "JPY", "USD"]);
    }
}

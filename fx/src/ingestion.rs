//! Scheduled ingestion: provider snapshot to durable store to cache.

use std::sync::Arc;

use ratefeed_common::{system_clock, CurrencyCode, SharedClock, Timestamp};
use ratefeed_store::{ObservationBatch, SharedRateStore};
use serde_json::Value;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cache::SharedFreshnessCache;
use crate::error::{FxError, FxResult};
use crate::metrics::{FxMetrics, SharedMetrics};
use crate::provider::RateProvider;
use crate::retry::{retry_with_backoff, RetryPolicy};

/// Configuration for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Currency every fetched rate is quoted against.
    pub base: CurrencyCode,
    /// Retry behaviour for provider calls.
    pub retry: RetryPolicy,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            base: CurrencyCode::usd(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of one successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub batch_id: Uuid,
    /// Capture time shared by every persisted observation.
    pub observed_at: Timestamp,
    /// Entries in the provider snapshot.
    pub received: usize,
    /// Rows newly written to the store.
    pub persisted: usize,
    /// Codes dropped as malformed or repeated.
    pub skipped: Vec<String>,
}

impl IngestionReport {
    fn empty(batch_id: Uuid, observed_at: Timestamp) -> Self {
        Self {
            batch_id,
            observed_at,
            received: 0,
            persisted: 0,
            skipped: Vec::new(),
        }
    }

    /// Check if the provider had nothing to ingest.
    pub fn is_empty(&self) -> bool {
        self.received == 0
    }
}

/// What a scheduled cycle did. Cycles never fail outward.
#[derive(Debug)]
pub enum IngestionOutcome {
    /// A batch was written.
    Persisted(IngestionReport),
    /// The provider answered with no rates.
    Empty,
    /// Upstream or store failure; logged and swallowed.
    Failed(FxError),
}

impl IngestionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, IngestionOutcome::Failed(_))
    }
}

/// Pulls one snapshot per cycle and persists it as a single batch.
pub struct IngestionPipeline {
    provider: Arc<dyn RateProvider>,
    store: SharedRateStore,
    cache: Option<SharedFreshnessCache>,
    config: IngestionConfig,
    clock: SharedClock,
    metrics: SharedMetrics,
}

impl IngestionPipeline {
    /// Create a new pipeline with no cache attached.
    pub fn new(
        provider: Arc<dyn RateProvider>,
        store: SharedRateStore,
        config: IngestionConfig,
    ) -> Self {
        Self {
            provider,
            store,
            cache: None,
            config,
            clock: system_clock(),
            metrics: Arc::new(FxMetrics::new()),
        }
    }

    /// Write persisted observations through to `cache`.
    pub fn with_cache(mut self, cache: SharedFreshnessCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Stamp batches using `clock`.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Record counters into `metrics`.
    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    pub fn base(&self) -> &CurrencyCode {
        &self.config.base
    }

    /// Fetch and persist one snapshot, surfacing failures to the caller.
    #[instrument(skip(self), fields(provider = %self.provider.name(), base = %self.config.base))]
    pub async fn refresh(&self) -> FxResult<IngestionReport> {
        match self.ingest().await {
            Ok(report) if report.is_empty() => {
                self.metrics.cycle_empty();
                Ok(report)
            }
            Ok(report) => {
                self.metrics
                    .cycle_succeeded(report.persisted as u64, report.skipped.len() as u64);
                Ok(report)
            }
            Err(err) => {
                self.metrics.cycle_failed();
                Err(err)
            }
        }
    }

    /// Scheduled entry point. Logs failures instead of returning them.
    pub async fn run_cycle(&self) -> IngestionOutcome {
        match self.refresh().await {
            Ok(report) if report.is_empty() => IngestionOutcome::Empty,
            Ok(report) => IngestionOutcome::Persisted(report),
            Err(err) => {
                error!(
                    error = %err,
                    error_code = err.error_code(),
                    "Ingestion cycle failed; keeping previous rates"
                );
                IngestionOutcome::Failed(err)
            }
        }
    }

    async fn ingest(&self) -> FxResult<IngestionReport> {
        let provider = &self.provider;
        let base = &self.config.base;
        let snapshot = retry_with_backoff(&self.config.retry, "fetch_latest", move || {
            provider.fetch_latest(base)
        })
        .await?;

        let mut batch = ObservationBatch::new(self.clock.now());

        let snapshot = match snapshot {
            Some(snapshot) if !snapshot.is_empty() => snapshot,
            _ => {
                info!(batch_id = %batch.id, "Provider returned no rates; nothing to ingest");
                return Ok(IngestionReport::empty(batch.id, batch.observed_at));
            }
        };

        if !snapshot.base_code.eq_ignore_ascii_case(base.as_str()) {
            warn!(
                requested = %base,
                received = %snapshot.base_code,
                "Snapshot quoted against an unexpected base currency"
            );
        }

        let mut skipped = Vec::new();
        for (code, value) in &snapshot.rates {
            let pushed = match raw_rate(value) {
                Some(raw) => batch.push_raw(code, &raw).map_err(FxError::from),
                None => Err(FxError::InvalidInput(format!(
                    "{code}: unsupported rate value {value}"
                ))),
            };
            match pushed {
                Ok(true) => {}
                Ok(false) => {
                    warn!(code = %code, "Skipping duplicate rate entry");
                    skipped.push(code.clone());
                }
                Err(err) => {
                    warn!(code = %code, error = %err, "Skipping malformed rate entry");
                    skipped.push(code.clone());
                }
            }
        }

        // Only rows the store accepted reach the cache.
        let written = if batch.is_empty() {
            Vec::new()
        } else {
            self.store.save_all(batch.observations()).await?
        };
        let persisted = written.len();

        if let Some(cache) = &self.cache {
            for observation in &written {
                cache.put(observation);
            }
        }

        info!(
            batch_id = %batch.id,
            observed_at = %batch.observed_at,
            received = snapshot.len(),
            persisted,
            skipped = skipped.len(),
            "Ingested rate snapshot"
        );

        Ok(IngestionReport {
            batch_id: batch.id,
            observed_at: batch.observed_at,
            received: snapshot.len(),
            persisted,
            skipped,
        })
    }
}

fn raw_rate(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
}

//! Rate provider trait and implementations.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use ratefeed_common::CurrencyCode;
use serde::{Deserialize, Deserializer};
use tracing::{debug, error};

use crate::error::{FxError, FxResult};

/// One fetch result: every rate quoted against `base_code` at one instant.
///
/// Rates are kept as raw JSON values so that a single malformed entry can
/// be skipped downstream without rejecting the whole snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateSnapshot {
    pub base_code: String,
    pub rates: BTreeMap<String, serde_json::Value>,
}

impl RateSnapshot {
    /// Build a snapshot from `(code, value)` pairs.
    pub fn new<I, K>(base_code: impl Into<String>, rates: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        Self {
            base_code: base_code.into(),
            rates: rates.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Number of entries, malformed ones included.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Check if there is nothing to ingest.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)
        .map(Option::unwrap_or_default)
}

/// Trait for exchange rate sources.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Fetch the latest snapshot quoted against `base`.
    ///
    /// `Ok(None)` means the provider answered with nothing to ingest.
    async fn fetch_latest(&self, base: &CurrencyCode) -> FxResult<Option<RateSnapshot>>;
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(rename = "error-type", default)]
    error_type: Option<String>,
    #[serde(default)]
    base_code: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    conversion_rates: BTreeMap<String, serde_json::Value>,
}

/// Provider for the exchangerate-api.com v6 `latest` endpoint.
///
/// Requests go to `{base_url}/{api_key}/latest/{base}`. The key is part of
/// the path, so URLs are never logged.
pub struct HttpRateProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpRateProvider {
    /// Create a provider whose HTTP client enforces `timeout` per request.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> FxResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FxError::Configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        })
    }

    fn latest_url(&self, base: &CurrencyCode) -> String {
        format!("{}/{}/latest/{}", self.base_url, self.api_key, base)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> FxError {
        if err.is_timeout() {
            FxError::Timeout(self.timeout.as_millis() as u64)
        } else {
            FxError::Provider(err.without_url().to_string())
        }
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        "exchangerate-api"
    }

    async fn fetch_latest(&self, base: &CurrencyCode) -> FxResult<Option<RateSnapshot>> {
        debug!(base = %base, "Requesting latest rates");

        let response = self
            .client
            .get(self.latest_url(base))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            let body = if body.is_empty() { "No error body" } else { body.as_str() };
            error!(status = %status, body = %body, "Rate provider returned an error status");
            return Err(FxError::Provider(format!("HTTP {status}: {body}")));
        }

        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(None);
        }

        let parsed: LatestResponse = serde_json::from_str(trimmed)
            .map_err(|e| FxError::Provider(format!("malformed response: {e}")))?;

        if parsed.result.as_deref() == Some("error") {
            let kind = parsed.error_type.unwrap_or_else(|| "unknown".to_string());
            return Err(FxError::Provider(format!("provider rejected request: {kind}")));
        }

        let snapshot = RateSnapshot {
            base_code: parsed.base_code.unwrap_or_else(|| base.to_string()),
            rates: parsed.conversion_rates,
        };

        debug!(base = %snapshot.base_code, entries = snapshot.len(), "Received snapshot");
        Ok(Some(snapshot))
    }
}

/// Mock rate provider for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateProvider {
    name: String,
    snapshot: parking_lot::Mutex<Option<RateSnapshot>>,
    failures_remaining: std::sync::atomic::AtomicU32,
    delay: Option<Duration>,
    calls: std::sync::atomic::AtomicU32,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateProvider {
    /// Create a mock that answers with no snapshot.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            snapshot: parking_lot::Mutex::new(None),
            failures_remaining: std::sync::atomic::AtomicU32::new(0),
            delay: None,
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the snapshot returned by successful calls.
    pub fn set_snapshot(&self, snapshot: Option<RateSnapshot>) {
        *self.snapshot.lock() = snapshot;
    }

    /// Fail the next `count` calls with a provider error.
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining
            .store(count, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_latest(&self, _base: &CurrencyCode) -> FxResult<Option<RateSnapshot>> {
        use std::sync::atomic::Ordering;

        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(FxError::Provider("simulated failure".to_string()));
        }

        Ok(self.snapshot.lock().clone())
    }
}

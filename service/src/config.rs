//! Service configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ratefeed_common::{constants, CommonError, CurrencyCode, DurationExt};
use ratefeed_fx::{FreshnessCacheConfig, IngestionConfig, RetryPolicy};
use tracing::warn;

/// Upstream provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider endpoint root, without the key or path.
    pub base_url: String,
    /// API key embedded in request paths.
    pub api_key: String,
    /// Currency the snapshot is quoted against.
    pub base_currency: String,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Total attempts per cycle.
    pub max_attempts: u32,
    /// First retry delay.
    pub initial_backoff: Duration,
    /// Largest retry delay.
    pub max_backoff: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://v6.exchangerate-api.com/v6".to_string(),
            api_key: String::new(),
            base_currency: "USD".to_string(),
            timeout: constants::default_fetch_timeout().as_std(),
            max_attempts: 3,
            initial_backoff: constants::default_initial_backoff().as_std(),
            max_backoff: constants::default_max_backoff().as_std(),
        }
    }
}

impl ProviderConfig {
    /// Parsed base currency.
    pub fn base_currency(&self) -> Result<CurrencyCode, CommonError> {
        CurrencyCode::parse(&self.base_currency)
    }

    /// Retry policy for provider calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: self.initial_backoff,
            max_backoff: self.max_backoff,
            attempt_timeout: self.timeout,
        }
    }

    /// Pipeline configuration.
    pub fn ingestion_config(&self) -> Result<IngestionConfig, CommonError> {
        Ok(IngestionConfig {
            base: self.base_currency()?,
            retry: self.retry_policy(),
        })
    }
}

/// Ingestion schedule configuration.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Time between cycle starts. The first cycle runs at startup.
    pub fetch_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            fetch_interval: constants::default_fetch_interval().as_std(),
        }
    }
}

/// Freshness cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum age at which a cached rate is served.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: constants::default_cache_ttl().as_std(),
        }
    }
}

impl CacheConfig {
    pub fn freshness_config(&self) -> FreshnessCacheConfig {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| constants::default_cache_ttl());
        FreshnessCacheConfig { ttl }
    }
}

/// Main service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Provider configuration.
    pub provider: ProviderConfig,
    /// Schedule configuration.
    pub schedule: ScheduleConfig,
    /// Cache configuration.
    pub cache: CacheConfig,
    /// PostgreSQL URL. Observations stay in memory when unset.
    pub database_url: Option<String>,
    /// Connection pool size.
    pub db_max_connections: u32,
    /// Allow-list file. The bundled list is used when unset.
    pub currency_codes_path: Option<PathBuf>,
    /// Log level.
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            schedule: ScheduleConfig::default(),
            cache: CacheConfig::default(),
            database_url: None,
            db_max_connections: 5,
            currency_codes_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("RATEFEED_PROVIDER_URL") {
            config.provider.base_url = url;
        }

        if let Ok(key) = std::env::var("RATEFEED_API_KEY") {
            config.provider.api_key = key;
        }

        if let Ok(base) = std::env::var("RATEFEED_BASE_CURRENCY") {
            config.provider.base_currency = base;
        }

        if let Some(secs) = parse_env::<u64>("RATEFEED_FETCH_INTERVAL_SECS") {
            config.schedule.fetch_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_env::<u64>("RATEFEED_FETCH_TIMEOUT_SECS") {
            config.provider.timeout = Duration::from_secs(secs);
        }

        if let Some(attempts) = parse_env("RATEFEED_FETCH_MAX_ATTEMPTS") {
            config.provider.max_attempts = attempts;
        }

        if let Some(secs) = parse_env::<u64>("RATEFEED_CACHE_TTL_SECS") {
            config.cache.ttl = Duration::from_secs(secs);
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = Some(url).filter(|url| !url.is_empty());
        }

        if let Some(max) = parse_env("RATEFEED_DB_MAX_CONNECTIONS") {
            config.db_max_connections = max;
        }

        if let Ok(path) = std::env::var("RATEFEED_CURRENCY_CODES") {
            config.currency_codes_path = Some(PathBuf::from(path));
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.provider.api_key.trim().is_empty() {
            return Err("Provider API key cannot be empty".to_string());
        }

        if self.provider.base_currency().is_err() {
            return Err(format!(
                "Base currency must be a three-letter code, got {:?}",
                self.provider.base_currency
            ));
        }

        if self.provider.max_attempts == 0 {
            return Err("Fetch attempts must be at least 1".to_string());
        }

        if self.provider.timeout.is_zero() {
            return Err("Fetch timeout cannot be 0".to_string());
        }

        if self.schedule.fetch_interval.is_zero() {
            return Err("Fetch interval cannot be 0".to_string());
        }

        if self.cache.ttl.is_zero() {
            return Err("Cache TTL cannot be 0".to_string());
        }

        if self.db_max_connections == 0 {
            return Err("Database pool size cannot be 0".to_string());
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring unparsable setting");
            None
        }
    }
}

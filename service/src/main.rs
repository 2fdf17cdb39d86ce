//! Ratefeed Binary
//!
//! Periodically ingests exchange rates and keeps the freshness cache warm.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratefeed_fx::{CodeValidator, HttpRateProvider};
use ratefeed_service::{RateService, ServiceConfig};
use ratefeed_store::{MemoryRateStore, PgRateStore, SharedRateStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env();

    // RUST_LOG wins over LOG_LEVEL
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting ratefeed");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let validator = match &config.currency_codes_path {
        Some(path) => CodeValidator::from_path(path)?,
        None => CodeValidator::bundled()?,
    };
    info!(codes = validator.len(), "Currency allow-list loaded");

    let store: SharedRateStore = match &config.database_url {
        Some(url) => {
            let store = PgRateStore::connect(url, config.db_max_connections).await?;
            store.init_schema().await?;
            info!("Connected to PostgreSQL rate store");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; observations are kept in memory only");
            Arc::new(MemoryRateStore::new())
        }
    };

    let provider = Arc::new(HttpRateProvider::new(
        config.provider.base_url.clone(),
        config.provider.api_key.clone(),
        config.provider.timeout,
    )?);

    let service = RateService::build(config, Arc::new(validator), store, provider)?;
    service.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    service.stop().await?;

    info!("Ratefeed shutdown complete");
    Ok(())
}

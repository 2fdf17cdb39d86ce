//! Service runtime: wiring and lifecycle.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use ratefeed_fx::{
    CodeValidator, FreshnessCache, FxMetrics, IngestionPipeline, IngestionReport, MetricsSnapshot,
    RateProvider, RateResolver, SharedFreshnessCache, SharedMetrics,
};
use ratefeed_store::SharedRateStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::scheduler::IngestionScheduler;
use crate::state::ServiceState;

/// The running rate service: one scheduler plus the shared read path.
pub struct RateService {
    config: ServiceConfig,
    cache: SharedFreshnessCache,
    pipeline: Arc<IngestionPipeline>,
    resolver: Arc<RateResolver>,
    metrics: SharedMetrics,
    state: Arc<RwLock<ServiceState>>,
    shutdown_tx: watch::Sender<bool>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl RateService {
    /// Wire the cache, pipeline and resolver around the given collaborators.
    ///
    /// The cache and metrics are shared by the pipeline and the resolver.
    pub fn build(
        config: ServiceConfig,
        validator: Arc<CodeValidator>,
        store: SharedRateStore,
        provider: Arc<dyn RateProvider>,
    ) -> ServiceResult<Self> {
        config.validate().map_err(ServiceError::Configuration)?;

        let metrics: SharedMetrics = Arc::new(FxMetrics::new());
        let cache = Arc::new(FreshnessCache::with_config(config.cache.freshness_config()));

        let pipeline = IngestionPipeline::new(
            provider,
            store.clone(),
            config.provider.ingestion_config()?,
        )
        .with_cache(cache.clone())
        .with_metrics(metrics.clone());

        let resolver =
            RateResolver::new(validator, cache.clone(), store).with_metrics(metrics.clone());

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            cache,
            pipeline: Arc::new(pipeline),
            resolver: Arc::new(resolver),
            metrics,
            state: Arc::new(RwLock::new(ServiceState::Starting)),
            shutdown_tx,
            scheduler: Mutex::new(None),
        })
    }

    /// Start the ingestion scheduler.
    #[instrument(skip(self))]
    pub async fn start(&self) -> ServiceResult<()> {
        {
            let mut state = self.state.write();
            if *state != ServiceState::Starting {
                return Err(ServiceError::InvalidState {
                    action: "start",
                    state: *state,
                });
            }
            *state = ServiceState::Running;
        }

        let scheduler =
            IngestionScheduler::new(self.pipeline.clone(), self.config.schedule.fetch_interval);
        *self.scheduler.lock() = Some(scheduler.spawn(self.shutdown_tx.subscribe()));

        info!(
            interval_secs = self.config.schedule.fetch_interval.as_secs(),
            ttl_secs = self.config.cache.ttl.as_secs(),
            "Rate service started"
        );
        Ok(())
    }

    /// Stop the scheduler, letting an in-flight cycle finish.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> ServiceResult<()> {
        {
            let mut state = self.state.write();
            if *state != ServiceState::Running {
                return Err(ServiceError::InvalidState {
                    action: "stop",
                    state: *state,
                });
            }
            *state = ServiceState::ShuttingDown;
        }

        info!("Stopping rate service");
        let _ = self.shutdown_tx.send(true);

        let handle = self.scheduler.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Scheduler task ended abnormally");
            }
        }

        *self.state.write() = ServiceState::Stopped;

        let metrics = self.metrics.snapshot();
        info!(
            cycles_succeeded = metrics.cycles_succeeded,
            cycles_failed = metrics.cycles_failed,
            cache_hit_ratio = metrics.cache_hit_ratio(),
            "Rate service stopped"
        );
        Ok(())
    }

    /// Run one ingestion cycle now, outside the schedule.
    pub async fn refresh_now(&self) -> ServiceResult<IngestionReport> {
        Ok(self.pipeline.refresh().await?)
    }

    /// Read path shared with callers.
    pub fn resolver(&self) -> &Arc<RateResolver> {
        &self.resolver
    }

    /// The shared freshness cache.
    pub fn cache(&self) -> &SharedFreshnessCache {
        &self.cache
    }

    /// Get the current service state.
    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    /// Check if the scheduler is running.
    pub fn is_running(&self) -> bool {
        self.state().is_operational()
    }

    /// Current counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

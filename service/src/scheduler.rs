//! Periodic ingestion task.

use std::sync::Arc;
use std::time::Duration;

use ratefeed_fx::{IngestionOutcome, IngestionPipeline};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Runs one ingestion cycle per interval until told to stop.
///
/// The first cycle starts immediately. A cycle that overruns the interval
/// delays the next tick rather than triggering a burst of catch-up cycles.
pub struct IngestionScheduler {
    pipeline: Arc<IngestionPipeline>,
    interval: Duration,
}

impl IngestionScheduler {
    /// Create a new scheduler.
    pub fn new(pipeline: Arc<IngestionPipeline>, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Run on a new task. The task exits once `shutdown` turns true.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Drive cycles until shutdown. An in-flight cycle always completes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs_f64(),
            base = %self.pipeline.base(),
            "Ingestion scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.pipeline.run_cycle().await;
                    self.record(&outcome);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown handle dropped; stopping scheduler");
                        break;
                    }
                }
            }
        }

        info!("Ingestion scheduler stopped");
    }

    fn record(&self, outcome: &IngestionOutcome) {
        let metrics = self.pipeline.metrics().snapshot();

        match outcome {
            IngestionOutcome::Persisted(report) => debug!(
                batch_id = %report.batch_id,
                persisted = report.persisted,
                cycles_succeeded = metrics.cycles_succeeded,
                observations_persisted = metrics.observations_persisted,
                "Cycle complete"
            ),
            IngestionOutcome::Empty => debug!(cycles_empty = metrics.cycles_empty, "Cycle had nothing to ingest"),
            IngestionOutcome::Failed(_) => warn!(
                cycles_failed = metrics.cycles_failed,
                cycles_succeeded = metrics.cycles_succeeded,
                "Cycle failed; next attempt on schedule"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratefeed_fx::{IngestionConfig, MockRateProvider, RateSnapshot, RetryPolicy};
    use ratefeed_store::MemoryRateStore;
    use serde_json::json;

    fn pipeline(provider: Arc<MockRateProvider>, store: Arc<MemoryRateStore>) -> Arc<IngestionPipeline> {
        let config = IngestionConfig {
            retry: RetryPolicy {
                max_attempts: 1,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(1),
                attempt_timeout: Duration::from_millis(100),
            },
            ..Default::default()
        };
        Arc::new(IngestionPipeline::new(provider, store, config))
    }

    #[tokio::test]
    async fn test_first_cycle_runs_immediately() {
        let provider = Arc::new(MockRateProvider::new("mock"));
        provider.set_snapshot(Some(RateSnapshot::new("USD", [("EUR", json!(0.9))])));
        let store = Arc::new(MemoryRateStore::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = IngestionScheduler::new(pipeline(provider.clone(), store.clone()), Duration::from_secs(3600))
            .spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_schedule() {
        let provider = Arc::new(MockRateProvider::new("mock"));
        provider.set_snapshot(Some(RateSnapshot::new("USD", [("EUR", json!(0.9))])));
        provider.fail_next(2);
        let store = Arc::new(MemoryRateStore::new());
        let pipeline = pipeline(provider.clone(), store.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = IngestionScheduler::new(pipeline.clone(), Duration::from_millis(20)).spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let metrics = pipeline.metrics().snapshot();
        assert_eq!(metrics.cycles_failed, 2);
        assert!(metrics.cycles_succeeded >= 1);
        assert!(provider.calls() >= 3);
        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_sender_stops_scheduler() {
        let provider = Arc::new(MockRateProvider::new("mock"));
        let store = Arc::new(MemoryRateStore::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = IngestionScheduler::new(pipeline(provider, store), Duration::from_secs(3600)).spawn(shutdown_rx);
        drop(shutdown_tx);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

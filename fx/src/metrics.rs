//! Counters for the cache, read path and ingestion pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// FX metrics.
#[derive(Debug, Default)]
pub struct FxMetrics {
    /// Resolves answered from the cache.
    pub cache_hits: AtomicU64,
    /// Resolves that fell through to the store.
    pub cache_misses: AtomicU64,
    /// Latest-for-code reads issued against the store.
    pub store_reads: AtomicU64,
    /// Ingestion cycles that persisted a batch.
    pub cycles_succeeded: AtomicU64,
    /// Ingestion cycles with nothing to ingest.
    pub cycles_empty: AtomicU64,
    /// Ingestion cycles that failed upstream or at the store.
    pub cycles_failed: AtomicU64,
    /// Observations written to the store.
    pub observations_persisted: AtomicU64,
    /// Snapshot entries skipped as malformed.
    pub entries_skipped: AtomicU64,
}

impl FxMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn store_read(&self) {
        self.store_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cycle that wrote `persisted` rows and skipped `skipped` entries.
    pub fn cycle_succeeded(&self, persisted: u64, skipped: u64) {
        self.cycles_succeeded.fetch_add(1, Ordering::Relaxed);
        self.observations_persisted.fetch_add(persisted, Ordering::Relaxed);
        self.entries_skipped.fetch_add(skipped, Ordering::Relaxed);
    }

    pub fn cycle_empty(&self) {
        self.cycles_empty.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycle_failed(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            store_reads: self.store_reads.load(Ordering::Relaxed),
            cycles_succeeded: self.cycles_succeeded.load(Ordering::Relaxed),
            cycles_empty: self.cycles_empty.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            observations_persisted: self.observations_persisted.load(Ordering::Relaxed),
            entries_skipped: self.entries_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FxMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub store_reads: u64,
    pub cycles_succeeded: u64,
    pub cycles_empty: u64,
    pub cycles_failed: u64,
    pub observations_persisted: u64,
    pub entries_skipped: u64,
}

impl MetricsSnapshot {
    /// Fraction of resolves served from the cache.
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }
}

/// Shared metrics handle.
pub type SharedMetrics = Arc<FxMetrics>;

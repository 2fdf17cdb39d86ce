//! Time utilities and constants for ratefeed.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Timing defaults.
pub mod constants {
    use super::Duration;

    /// Cache freshness window (60 seconds).
    pub fn default_cache_ttl() -> Duration {
        Duration::seconds(60)
    }

    /// Interval between ingestion cycles (60 seconds).
    pub fn default_fetch_interval() -> Duration {
        Duration::seconds(60)
    }

    /// Upper bound for a single provider call (5 seconds).
    pub fn default_fetch_timeout() -> Duration {
        Duration::seconds(5)
    }

    /// First retry delay after a failed provider call (500 milliseconds).
    pub fn default_initial_backoff() -> Duration {
        Duration::milliseconds(500)
    }

    /// Largest retry delay (5 seconds).
    pub fn default_max_backoff() -> Duration {
        Duration::seconds(5)
    }
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Check whether `since` lies within `window` of `at`, inclusive.
pub fn within_window(since: Timestamp, at: Timestamp, window: Duration) -> bool {
    at.signed_duration_since(since) <= window
}

/// Duration extensions for convenient construction.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now()
    }
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// The default shared clock.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

/// Manually driven clock for tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub struct ManualClock {
    current: parking_lot::Mutex<Timestamp>,
}

#[cfg(any(test, feature = "test-utils"))]
impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: parking_lot::Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current += by;
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: Timestamp) {
        *self.current.lock() = to;
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_window_is_inclusive() {
        let t0 = now();
        let window = Duration::seconds(60);

        assert!(within_window(t0, t0 + Duration::seconds(60), window));
        assert!(!within_window(t0, t0 + Duration::milliseconds(60_001), window));
    }

    #[test]
    fn test_manual_clock() {
        let start = now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::seconds(5));
        assert_eq!(clock.now(), start + Duration::seconds(5));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_as_std_clamps_negative() {
        assert_eq!(Duration::seconds(-1).as_std(), std::time::Duration::ZERO);
        assert_eq!(Duration::seconds(2).as_std(), std::time::Duration::from_secs(2));
    }
}

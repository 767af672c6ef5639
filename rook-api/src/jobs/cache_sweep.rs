//! Cache Sweep Background Task
//!
//! Reads already ignore expired rows, so nothing depends on them being
//! gone. This task keeps the table from growing without bound by
//! periodically deleting rows whose `expires_at` has passed. Historical
//! rows (`expires_at IS NULL`) are never touched.
//!
//! # Configuration
//!
//! ```rust
//! use rook_api::jobs::CacheSweepConfig;
//! use std::time::Duration;
//!
//! let config = CacheSweepConfig {
//!     enabled: true,
//!     interval: Duration::from_secs(3600), // Sweep hourly
//! };
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rook_storage::CacheStore;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::telemetry::ServiceMetrics;

/// Default time between sweeps (1 hour).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the cache sweep background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSweepConfig {
    /// Whether the sweep runs at all (default: true)
    pub enabled: bool,

    /// How often to delete expired rows (default: 1 hour)
    pub interval: Duration,
}

impl Default for CacheSweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl CacheSweepConfig {
    /// Create CacheSweepConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `ROOK_CACHE_SWEEP_ENABLED`: Set to `false` to disable (default: true)
    /// - `ROOK_CACHE_SWEEP_INTERVAL_SECS`: Seconds between sweeps (default: 3600)
    pub fn from_env() -> Self {
        let enabled = std::env::var("ROOK_CACHE_SWEEP_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let interval = Duration::from_secs(
            std::env::var("ROOK_CACHE_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
        );

        Self { enabled, interval }
    }

    /// Short interval for local development.
    pub fn development() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
        }
    }

    pub fn production() -> Self {
        Self::default()
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for sweep activity since startup.
#[derive(Debug, Default)]
pub struct CacheSweepMetrics {
    /// Completed sweep cycles, successful or not
    pub runs: AtomicU64,

    /// Rows deleted across all cycles
    pub deleted: AtomicU64,

    /// Cycles that failed
    pub errors: AtomicU64,
}

impl CacheSweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CacheSweepSnapshot {
        CacheSweepSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sweep metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSweepSnapshot {
    pub runs: u64,
    pub deleted: u64,
    pub errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that periodically deletes expired cache rows.
///
/// Runs until the shutdown signal is received, then returns the counters
/// collected over its lifetime. A disabled config returns immediately.
pub async fn cache_sweep_task(
    store: Arc<dyn CacheStore>,
    config: CacheSweepConfig,
    service_metrics: Option<Arc<ServiceMetrics>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<CacheSweepMetrics> {
    let metrics = Arc::new(CacheSweepMetrics::new());

    if !config.enabled {
        tracing::info!("Cache sweep disabled");
        return metrics;
    }

    let mut sweep_interval = interval(config.interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        "Cache sweep task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache sweep task shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                let deleted = sweep_once(store.as_ref(), &metrics).await;
                if let Some(service_metrics) = &service_metrics {
                    service_metrics.record_sweep(deleted);
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        runs = snapshot.runs,
        deleted = snapshot.deleted,
        errors = snapshot.errors,
        "Cache sweep task completed"
    );

    metrics
}

/// Perform one sweep cycle. Returns the number of rows deleted.
pub async fn sweep_once(store: &dyn CacheStore, metrics: &CacheSweepMetrics) -> u64 {
    metrics.runs.fetch_add(1, Ordering::Relaxed);

    match store.delete_expired().await {
        Ok(0) => {
            tracing::trace!("Cache sweep found no expired rows");
            0
        }
        Ok(deleted) => {
            metrics.deleted.fetch_add(deleted, Ordering::Relaxed);
            tracing::info!(deleted, "Cache sweep removed expired rows");
            deleted
        }
        Err(e) => {
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Cache sweep failed");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as TimeDelta, Utc};
    use rook_storage::InMemoryCacheStore;
    use rook_test_utils::{cached_player, period, FailingCacheStore};

    #[test]
    fn test_default_config() {
        let config = CacheSweepConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval, Duration::from_secs(3600));
        assert_eq!(CacheSweepConfig::production(), config);
    }

    #[test]
    fn test_development_config() {
        let config = CacheSweepConfig::development();
        assert_eq!(config.interval, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_sweep_once_deletes_only_expired() {
        let store = InMemoryCacheStore::new();
        let now = Utc::now();
        store.insert(cached_player(1, period(2024, 1), None)).unwrap();
        store
            .insert(cached_player(2, period(2024, 2), Some(now - TimeDelta::hours(1))))
            .unwrap();
        store
            .insert(cached_player(3, period(2024, 3), Some(now + TimeDelta::hours(1))))
            .unwrap();

        let metrics = CacheSweepMetrics::new();
        let deleted = sweep_once(&store, &metrics).await;

        assert_eq!(deleted, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(
            metrics.snapshot(),
            CacheSweepSnapshot {
                runs: 1,
                deleted: 1,
                errors: 0
            }
        );
    }

    #[tokio::test]
    async fn test_sweep_once_counts_errors() {
        let store = FailingCacheStore::new();
        let metrics = CacheSweepMetrics::new();

        assert_eq!(sweep_once(&store, &metrics).await, 0);
        assert_eq!(metrics.snapshot().errors, 1);
        assert_eq!(metrics.snapshot().runs, 1);
    }

    #[tokio::test]
    async fn test_task_runs_then_stops_on_shutdown() {
        let store = Arc::new(InMemoryCacheStore::new());
        store
            .insert(cached_player(
                7,
                period(2024, 5),
                Some(Utc::now() - TimeDelta::minutes(5)),
            ))
            .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = CacheSweepConfig {
            enabled: true,
            interval: Duration::from_millis(10),
        };
        let handle = tokio::spawn(cache_sweep_task(
            store.clone() as Arc<dyn CacheStore>,
            config,
            None,
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        let metrics = handle.await.unwrap();

        assert!(metrics.snapshot().runs >= 1);
        assert_eq!(metrics.snapshot().deleted, 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_task_returns_immediately() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = CacheSweepConfig {
            enabled: false,
            ..CacheSweepConfig::default()
        };
        let metrics = cache_sweep_task(
            Arc::new(InMemoryCacheStore::new()),
            config,
            None,
            shutdown_rx,
        )
        .await;
        assert_eq!(metrics.snapshot().runs, 0);
    }
}

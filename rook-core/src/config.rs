//! Cache orchestration settings.

use std::time::Duration;

use crate::{ExpiryPolicy, RookError, RookResult};

/// Default TTL for snapshots of the current rating period.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Largest id list a single batch request may carry.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Widest rating-history window, in months.
pub const DEFAULT_MAX_HISTORY_MONTHS: usize = 120;

/// Upper bound on concurrently running fetch tasks inside one batch.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 100;

/// Settings for the cache-aside orchestrator.
///
/// Built once at startup and handed to the service; nothing reads these
/// values from global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied to current and future periods.
    pub ttl: Duration,
    pub max_batch_size: usize,
    pub max_history_months: usize,
    pub fetch_concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_history_months: DEFAULT_MAX_HISTORY_MONTHS,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

impl CacheConfig {
    /// Load from `ROOK_CACHE_TTL_SECS`, `ROOK_MAX_BATCH_SIZE`,
    /// `ROOK_MAX_HISTORY_MONTHS` and `ROOK_FETCH_CONCURRENCY`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl: std::env::var("ROOK_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
            max_batch_size: std::env::var("ROOK_MAX_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_batch_size),
            max_history_months: std::env::var("ROOK_MAX_HISTORY_MONTHS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_history_months),
            fetch_concurrency: std::env::var("ROOK_FETCH_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.fetch_concurrency),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }

    pub fn with_max_history_months(mut self, max: usize) -> Self {
        self.max_history_months = max;
        self
    }

    pub fn with_fetch_concurrency(mut self, permits: usize) -> Self {
        self.fetch_concurrency = permits;
        self
    }

    pub fn expiry(&self) -> ExpiryPolicy {
        ExpiryPolicy::new(self.ttl)
    }

    /// Reject settings that would make every request fail.
    pub fn validate(&self) -> RookResult<()> {
        if self.ttl.is_zero() {
            return Err(RookError::invalid_input("cache ttl must be greater than zero"));
        }
        if self.max_batch_size == 0 {
            return Err(RookError::invalid_input("max batch size must be at least 1"));
        }
        if self.max_history_months == 0 {
            return Err(RookError::invalid_input("max history months must be at least 1"));
        }
        if self.fetch_concurrency == 0 {
            return Err(RookError::invalid_input("fetch concurrency must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(86_400));
        assert_eq!(config.max_batch_size, 100);
        assert_eq!(config.max_history_months, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = CacheConfig::default()
            .with_ttl(Duration::from_secs(5))
            .with_max_batch_size(3)
            .with_max_history_months(6)
            .with_fetch_concurrency(2);
        assert_eq!(config.ttl, Duration::from_secs(5));
        assert_eq!(config.max_batch_size, 3);
        assert_eq!(config.max_history_months, 6);
        assert_eq!(config.fetch_concurrency, 2);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(CacheConfig::default().with_ttl(Duration::ZERO).validate().is_err());
        assert!(CacheConfig::default().with_max_batch_size(0).validate().is_err());
        assert!(CacheConfig::default().with_fetch_concurrency(0).validate().is_err());
    }
}

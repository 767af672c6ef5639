//! Upstream API connection settings.

use std::time::Duration;

/// Public member API of the Swedish Chess Federation.
pub const DEFAULT_BASE_URL: &str = "https://member.schack.se/public/api/v1";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Requests per second, also used as the burst capacity.
pub const DEFAULT_RATE_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Per-request timeout applied by the HTTP client.
    pub timeout: Duration,
    pub rate_limit: u32,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            rate_limit: DEFAULT_RATE_LIMIT,
            user_agent: format!("rook/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl UpstreamConfig {
    /// Load from `ROOK_UPSTREAM_BASE_URL`, `ROOK_UPSTREAM_TIMEOUT_SECS`
    /// and `ROOK_UPSTREAM_RATE_LIMIT`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ROOK_UPSTREAM_BASE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("ROOK_UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            rate_limit: std::env::var("ROOK_UPSTREAM_RATE_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit),
            user_agent: defaults.user_agent,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

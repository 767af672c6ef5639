//! API Configuration Module
//!
//! HTTP server settings plus the [`AppConfig`] aggregate that `main` loads
//! once from the environment and hands to every component.

use std::net::SocketAddr;
use std::time::Duration;

use rook_core::CacheConfig;
use rook_upstream::UpstreamConfig;

use crate::db::DbConfig;
use crate::error::{ApiError, ApiResult};
use crate::jobs::CacheSweepConfig;
use crate::telemetry::TelemetryConfig;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Path prefix for the player routes. Empty or `/` mounts them at the root.
    pub prefix: String,

    /// Overall deadline for a single request, store and upstream calls included.
    pub request_timeout: Duration,

    /// How long in-flight requests may run after a shutdown signal.
    pub shutdown_grace: Duration,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins.
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            prefix: "/api".to_string(),
            request_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(10),
            cors_origins: Vec::new(),
            cors_max_age_secs: 86400,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ROOK_HOST` / `ROOK_PORT`: listen address (default: localhost:8080)
    /// - `ROOK_API_PREFIX`: route prefix (default: /api)
    /// - `ROOK_REQUEST_TIMEOUT_SECS`: per-request deadline (default: 30)
    /// - `ROOK_SHUTDOWN_GRACE_SECS`: drain period on shutdown (default: 10)
    /// - `ROOK_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `ROOK_CORS_MAX_AGE_SECS`: preflight cache duration (default: 86400)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("ROOK_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            host: std::env::var("ROOK_HOST").unwrap_or(defaults.host),
            port: std::env::var("ROOK_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            prefix: std::env::var("ROOK_API_PREFIX").unwrap_or(defaults.prefix),
            request_timeout: std::env::var("ROOK_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            shutdown_grace: std::env::var("ROOK_SHUTDOWN_GRACE_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_grace),
            cors_origins,
            cors_max_age_secs: std::env::var("ROOK_CORS_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cors_max_age_secs),
        }
    }

    /// Socket address to bind. `ROOK_BIND_ADDR` overrides host and port.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = std::env::var("ROOK_BIND_ADDR")
            .unwrap_or_else(|_| format!("{}:{}", self.host, self.port));
        resolve_addr(&addr)
    }

    /// Prefix normalized to `/segment` form, or `None` for the root.
    pub fn normalized_prefix(&self) -> Option<String> {
        let trimmed = self.prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(format!("/{}", trimmed))
        }
    }
}

fn resolve_addr(addr: &str) -> ApiResult<SocketAddr> {
    if let Ok(parsed) = addr.parse::<SocketAddr>() {
        return Ok(parsed);
    }
    std::net::ToSocketAddrs::to_socket_addrs(addr)
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))?
        .next()
        .ok_or_else(|| ApiError::invalid_input(format!("Bind address {} did not resolve", addr)))
}

// ============================================================================
// APPLICATION CONFIGURATION
// ============================================================================

/// Every component's settings, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub db: DbConfig,
    pub cache: CacheConfig,
    pub upstream: UpstreamConfig,
    pub telemetry: TelemetryConfig,
    pub sweep: CacheSweepConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            db: DbConfig::from_env(),
            cache: CacheConfig::from_env(),
            upstream: UpstreamConfig::from_env(),
            telemetry: TelemetryConfig::from_env(),
            sweep: CacheSweepConfig::from_env(),
        }
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> ApiResult<()> {
        self.cache.validate().map_err(ApiError::from)?;
        if self.api.request_timeout.is_zero() {
            return Err(ApiError::invalid_input("request timeout must be greater than zero"));
        }
        Ok(())
    }
}

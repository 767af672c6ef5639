//! Tracing Subscriber Initialization
//!
//! Structured logging through tracing-subscriber with an env-driven filter
//! and either JSON or human-readable output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,rook_api=debug,tower_http=info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to startup logs
    pub service_name: String,
    pub log_format: LogFormat,
    /// Fallback `EnvFilter` directive
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "rook-api".to_string(),
            log_format: LogFormat::Text,
            default_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Load from `ROOK_SERVICE_NAME`, `ROOK_LOG_FORMAT` (`json` or `text`)
    /// and `ROOK_LOG_LEVEL`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: std::env::var("ROOK_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_format: std::env::var("ROOK_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.log_format),
            default_filter: std::env::var("ROOK_LOG_LEVEL").unwrap_or(defaults.default_filter),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup; a second call fails.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to initialize tracing: {}", e)))?;

    tracing::info!(
        service = %config.service_name,
        format = ?config.log_format,
        "Tracing initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match &self.previous {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
        assert_eq!(LogFormat::parse("anything"), LogFormat::Text);
    }

    #[test]
    fn test_from_env_reads_format() {
        let _format = EnvVarGuard::set("ROOK_LOG_FORMAT", "json");
        let _name = EnvVarGuard::set("ROOK_SERVICE_NAME", "rook-test");
        let config = TelemetryConfig::from_env();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.service_name, "rook-test");
    }
}

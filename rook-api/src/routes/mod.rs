//! HTTP Routes for the rook API
//!
//! - Player lookups under the configured prefix (default `/api`)
//! - Health checks at /health/*
//! - Prometheus metrics at /metrics

pub mod health;
pub mod players;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use rook_storage::CacheStore;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    config::ApiConfig,
    services::PlayerService,
    telemetry::{metrics_handler, ServiceMetrics},
};

pub use health::{HealthResponse, HealthStatus};
pub use players::PlayerState;

/// Extra time the serving layer allows past the request deadline, so the
/// handler's own `Cancelled` error reaches the client first.
const SERVER_TIMEOUT_MARGIN: Duration = Duration::from_secs(1);

fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!("CORS: allowing origins: {:?}", config.cors_origins);
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Create the complete router: player routes, health, metrics and layers.
pub fn create_router(
    service: Arc<PlayerService>,
    store: Arc<dyn CacheStore>,
    metrics: Arc<ServiceMetrics>,
    config: &ApiConfig,
) -> Router {
    let players = players::create_router(service, config.request_timeout);

    let router = match config.normalized_prefix() {
        Some(prefix) => Router::new().nest(&prefix, players),
        None => players,
    };

    router
        .nest("/health", health::create_router(store))
        .merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(metrics),
        )
        .layer(TimeoutLayer::new(
            config.request_timeout.saturating_add(SERVER_TIMEOUT_MARGIN),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_builds_for_both_modes() {
        let mut config = ApiConfig::default();
        let _ = build_cors_layer(&config);

        config.cors_origins = vec!["https://example.com".to_string(), "not a header\n".to_string()];
        let _ = build_cors_layer(&config);
    }
}

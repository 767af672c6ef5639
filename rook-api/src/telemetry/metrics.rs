//! Prometheus Metrics Definitions
//!
//! Cache and upstream counters owned by an injected [`ServiceMetrics`]
//! instance with its own registry, exposed on `/metrics` for scraping.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// Upstream fetch latency buckets (seconds)
/// Covers: 10ms .. 30s, the upstream client timeout.
const FETCH_LATENCY_BUCKETS: &[f64] = &[0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Outcome label for a cache read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Hit,
    Miss,
    Error,
}

impl LookupOutcome {
    fn as_str(self) -> &'static str {
        match self {
            LookupOutcome::Hit => "hit",
            LookupOutcome::Miss => "miss",
            LookupOutcome::Error => "error",
        }
    }
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Container for all rook metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,

    /// Cache reads - labels: operation, outcome (hit/miss/error)
    pub cache_lookups_total: IntCounterVec,

    /// Cache writes - labels: outcome (success/failure)
    pub cache_writes_total: IntCounterVec,

    /// Upstream fetches - labels: operation, outcome (success/failure)
    pub upstream_fetches_total: IntCounterVec,

    /// Upstream fetch duration - labels: operation
    pub fetch_duration_seconds: HistogramVec,

    /// Rows removed by the maintenance sweep
    pub sweep_deleted_total: IntCounterVec,
}

impl ServiceMetrics {
    /// Create all metrics in a fresh registry.
    pub fn new() -> ApiResult<Self> {
        let registry = Registry::new();

        let cache_lookups_total = IntCounterVec::new(
            Opts::new("rook_cache_lookups_total", "Cache reads by operation and outcome"),
            &["operation", "outcome"],
        )
        .map_err(|e| metric_error("rook_cache_lookups_total", e))?;

        let cache_writes_total = IntCounterVec::new(
            Opts::new("rook_cache_writes_total", "Cache upserts by outcome"),
            &["outcome"],
        )
        .map_err(|e| metric_error("rook_cache_writes_total", e))?;

        let upstream_fetches_total = IntCounterVec::new(
            Opts::new("rook_upstream_fetches_total", "Upstream fetches by operation and outcome"),
            &["operation", "outcome"],
        )
        .map_err(|e| metric_error("rook_upstream_fetches_total", e))?;

        let fetch_duration_seconds = HistogramVec::new(
            HistogramOpts::new("rook_fetch_duration_seconds", "Upstream fetch duration in seconds")
                .buckets(FETCH_LATENCY_BUCKETS.to_vec()),
            &["operation"],
        )
        .map_err(|e| metric_error("rook_fetch_duration_seconds", e))?;

        let sweep_deleted_total = IntCounterVec::new(
            Opts::new("rook_sweep_deleted_total", "Expired cache rows removed by the sweep"),
            &["outcome"],
        )
        .map_err(|e| metric_error("rook_sweep_deleted_total", e))?;

        registry
            .register(Box::new(cache_lookups_total.clone()))
            .and_then(|_| registry.register(Box::new(cache_writes_total.clone())))
            .and_then(|_| registry.register(Box::new(upstream_fetches_total.clone())))
            .and_then(|_| registry.register(Box::new(fetch_duration_seconds.clone())))
            .and_then(|_| registry.register(Box::new(sweep_deleted_total.clone())))
            .map_err(|e| metric_error("registry", e))?;

        #[cfg(target_os = "linux")]
        registry
            .register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))
            .map_err(|e| metric_error("process_collector", e))?;

        Ok(Self {
            registry,
            cache_lookups_total,
            cache_writes_total,
            upstream_fetches_total,
            fetch_duration_seconds,
            sweep_deleted_total,
        })
    }

    pub fn record_lookup(&self, operation: &str, result: LookupOutcome) {
        self.cache_lookups_total
            .with_label_values(&[operation, result.as_str()])
            .inc();
    }

    pub fn record_write(&self, success: bool) {
        self.cache_writes_total.with_label_values(&[outcome(success)]).inc();
    }

    pub fn record_fetch(&self, operation: &str, success: bool, elapsed: Duration) {
        self.upstream_fetches_total
            .with_label_values(&[operation, outcome(success)])
            .inc();
        self.fetch_duration_seconds
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_sweep(&self, deleted: u64) {
        self.sweep_deleted_total.with_label_values(&["success"]).inc_by(deleted);
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn render(&self) -> ApiResult<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| ApiError::internal_error(format!("Failed to encode metrics: {}", e)))?;
        Ok(buffer)
    }
}

fn metric_error(name: &str, err: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, err))
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_handler(State(metrics): State<Arc<ServiceMetrics>>) -> impl IntoResponse {
    match metrics.render() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.message.into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instances_do_not_collide() {
        let first = ServiceMetrics::new();
        let second = ServiceMetrics::new();
        assert!(first.is_ok());
        assert!(second.is_ok());
    }

    #[test]
    fn test_counters_render() {
        let metrics = ServiceMetrics::new().unwrap();
        metrics.record_lookup("get_player", LookupOutcome::Hit);
        metrics.record_lookup("get_player", LookupOutcome::Hit);
        metrics.record_write(false);
        metrics.record_fetch("get_player", true, Duration::from_millis(40));

        let text = String::from_utf8(metrics.render().unwrap()).unwrap();
        assert!(text.contains(
            "rook_cache_lookups_total{operation=\"get_player\",outcome=\"hit\"} 2"
        ));
        assert!(text.contains("rook_cache_writes_total{outcome=\"failure\"} 1"));
        assert!(text.contains("rook_fetch_duration_seconds_count{operation=\"get_player\"} 1"));
    }

    #[test]
    fn test_sweep_counter_accumulates() {
        let metrics = ServiceMetrics::new().unwrap();
        metrics.record_sweep(3);
        metrics.record_sweep(4);
        assert_eq!(metrics.sweep_deleted_total.with_label_values(&["success"]).get(), 7);
    }
}

//! rook Telemetry - Observability Infrastructure
//!
//! Structured logging via tracing-subscriber and Prometheus metrics for the
//! cache and upstream paths.

pub mod metrics;
pub mod tracer;

pub use metrics::{metrics_handler, LookupOutcome, ServiceMetrics};
pub use tracer::{init_tracing, LogFormat, TelemetryConfig, DEFAULT_LOG_FILTER};

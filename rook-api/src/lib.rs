//! rook API - caching proxy for the Swedish Chess Federation member API
//!
//! Serves player snapshots per calendar month. Each lookup is answered from
//! a Postgres-backed cache when a live record exists and otherwise fetched
//! from the rate-limited upstream and written back. Historical months are
//! cached forever; the current month expires after a configurable TTL.

pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod services;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, AppConfig};
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{cache_sweep_task, CacheSweepConfig};
pub use routes::create_router;
pub use services::PlayerService;
pub use store::PgCacheStore;
pub use telemetry::{init_tracing, ServiceMetrics, TelemetryConfig};

//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling with deadpool-postgres, plus the schema
//! bootstrap for the `player_cache` table.

use std::time::{Duration, Instant};

use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use rook_core::StoreError;
use tokio_postgres::NoTls;

/// DDL for the cache table, applied idempotently at startup.
pub const SCHEMA_SQL: &str = include_str!("../schema/player_cache.sql");

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait/create timeout for pooled connections
    pub timeout: Duration,
    /// Apply `SCHEMA_SQL` on startup
    pub auto_migrate: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "rook".to_string(),
            user: "rook".to_string(),
            password: "rook".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(5),
            auto_migrate: true,
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from `ROOK_DB_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("ROOK_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("ROOK_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("ROOK_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("ROOK_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("ROOK_DB_PASSWORD").unwrap_or(defaults.password),
            max_size: std::env::var("ROOK_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("ROOK_DB_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            auto_migrate: std::env::var("ROOK_DB_AUTO_MIGRATE")
                .ok()
                .map(|s| s.to_lowercase() != "false")
                .unwrap_or(defaults.auto_migrate),
        }
    }

    /// Create a connection pool from this configuration.
    ///
    /// Connections are opened lazily, so this succeeds without a reachable server.
    pub fn create_pool(&self) -> Result<Pool, StoreError> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = PoolConfig::new(self.max_size);
        pool_config.timeouts.wait = Some(self.timeout);
        pool_config.timeouts.create = Some(self.timeout);
        pool_config.timeouts.recycle = Some(self.timeout);
        cfg.pool = Some(pool_config);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Connection {
                reason: format!("Failed to create pool: {}", e),
            })
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Cheaply cloneable handle on the shared connection pool.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> Result<Self, StoreError> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Get a connection from the pool.
    pub async fn get_conn(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool.get().await.map_err(pool_error)
    }

    /// Round-trip a trivial query; returns the latency.
    pub async fn health_check(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await.map_err(query_error)?;
        Ok(start.elapsed())
    }

    /// Create the cache table and indexes if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA_SQL).await.map_err(query_error)?;
        tracing::info!("player_cache schema ensured");
        Ok(())
    }

    /// Stop handing out connections and drop idle ones.
    pub fn close(&self) {
        self.pool.close();
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

pub(crate) fn query_error(err: tokio_postgres::Error) -> StoreError {
    tracing::debug!("Database error: {:?}", err);
    StoreError::Query {
        reason: err.to_string(),
    }
}

pub(crate) fn pool_error(err: deadpool_postgres::PoolError) -> StoreError {
    let reason = match &err {
        deadpool_postgres::PoolError::Timeout(_) => "connection pool exhausted".to_string(),
        deadpool_postgres::PoolError::Closed => "connection pool is closed".to_string(),
        other => format!("failed to acquire database connection: {}", other),
    };
    StoreError::Connection { reason }
}

pub(crate) fn serialization_error(err: serde_json::Error) -> StoreError {
    StoreError::Serialization {
        reason: err.to_string(),
    }
}

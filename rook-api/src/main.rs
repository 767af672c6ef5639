//! rook API Server Entry Point
//!
//! Loads configuration, prepares the cache table, wires the service and
//! serves HTTP until ctrl-c or SIGTERM.

use std::sync::Arc;

use rook_api::{
    cache_sweep_task, create_router, init_tracing, ApiError, ApiResult, AppConfig, DbClient,
    PgCacheStore, PlayerService, ServiceMetrics,
};
use rook_storage::CacheStore;
use rook_upstream::{PlayerSource, UpstreamClient};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = AppConfig::from_env();
    init_tracing(&config.telemetry)?;
    config.validate()?;

    let db = DbClient::from_config(&config.db)?;
    if config.db.auto_migrate {
        match db.ensure_schema().await {
            Ok(()) => tracing::info!("Cache schema ready"),
            Err(e) => tracing::warn!(error = %e, "Failed to ensure cache schema"),
        }
    }

    let store: Arc<dyn CacheStore> = Arc::new(PgCacheStore::new(db.clone()));
    let source: Arc<dyn PlayerSource> = Arc::new(UpstreamClient::new(&config.upstream)?);
    let metrics = Arc::new(ServiceMetrics::new()?);
    let service = Arc::new(PlayerService::new(
        Arc::clone(&store),
        source,
        config.cache.clone(),
        Arc::clone(&metrics),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep = tokio::spawn(cache_sweep_task(
        Arc::clone(&store),
        config.sweep.clone(),
        Some(Arc::clone(&metrics)),
        shutdown_rx.clone(),
    ));

    let app = create_router(service, store, metrics, &config.api);
    let addr = config.api.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(
        %addr,
        upstream = %config.upstream.base_url,
        ttl_secs = config.cache.ttl.as_secs(),
        "Starting rook API server"
    );

    let mut server_rx = shutdown_rx;
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_rx.wait_for(|stop| *stop).await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            // The server stopped on its own; nothing left to drain.
            let _ = shutdown_tx.send(true);
            finish(result)?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(config.api.shutdown_grace, &mut server).await {
                Ok(result) => finish(result)?,
                Err(_) => {
                    tracing::warn!(
                        grace_secs = config.api.shutdown_grace.as_secs(),
                        "In-flight requests did not finish in time, aborting"
                    );
                    server.abort();
                }
            }
        }
    }

    if let Err(e) = sweep.await {
        tracing::warn!(error = %e, "Cache sweep task ended abnormally");
    }
    db.close();
    tracing::info!("rook API server stopped");
    Ok(())
}

fn finish(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> ApiResult<()> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ApiError::internal_error(format!("Server error: {}", e))),
        Err(e) => Err(ApiError::internal_error(format!("Server task failed: {}", e))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

//! doccache Server Entry Point
//!
//! Opens the cache store, optionally starts the seeding job, and serves the
//! read-only HTTP API until interrupted.

use axum::Router;
use doccache_api::jobs::{seed_task, SeedConfig};
use doccache_api::telemetry::{init_tracer, TelemetryConfig};
use doccache_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState};
use doccache_storage::{CacheStore, StoreConfig};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let store_config = StoreConfig::from_env();
    tracing::info!(
        db_path = ?store_config.db_path,
        ttl_secs = store_config.ttl.as_secs(),
        sweep_interval_secs = ?store_config.sweep_interval.map(|d| d.as_secs()),
        "Opening cache store"
    );
    let store = CacheStore::open_with_config(store_config).await?;

    let api_config = ApiConfig::from_env()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let seeder = api_config.seed_interval.map(|interval| {
        tokio::spawn(seed_task(
            store.clone(),
            SeedConfig::new(interval),
            shutdown_rx.clone(),
        ))
    });

    let app: Router = create_api_router(AppState::new(store.clone()));

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting doccache API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(handle) = seeder {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Seed task failed");
        }
    }
    store.close().await;

    Ok(())
}

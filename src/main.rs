//! Krishi Mitra Backend Server
//!
//! HTTP API for the farmer-to-buyer marketplace: accounts, listings, orders,
//! crop disease diagnosis and dashboards.

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use krishi_mitra_server::cache::MemoryCache;
use krishi_mitra_server::config::{Config, StorageBackend};
use krishi_mitra_server::db::Database;
use krishi_mitra_server::diagnosis::HttpDiseasePredictor;
use krishi_mitra_server::middleware::RateLimiter;
use krishi_mitra_server::repository::Repositories;
use krishi_mitra_server::routes;
use krishi_mitra_server::state::AppState;

/// How often idle rate limiter buckets are dropped
const RATE_LIMIT_CLEANUP_EVERY: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (.env included)
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        environment = config.environment.as_str(),
        storage = ?config.storage_backend,
        "Starting Krishi Mitra server"
    );

    let repositories = match config.storage_backend {
        StorageBackend::Postgres => {
            let database = Database::connect(&config)
                .await
                .context("Failed to initialise the database")?;
            Repositories::postgres(database)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Repositories::in_memory()
        }
    };

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.upload_dir.display()))?;

    let cache = Arc::new(MemoryCache::new(config.cache_max_entries));
    let predictor = Arc::new(
        HttpDiseasePredictor::new(
            &config.ml_service_url,
            Duration::from_secs(config.ml_timeout_seconds),
        )
        .context("Failed to build the prediction service client")?,
    );
    tracing::info!(url = %config.ml_service_url, "Disease prediction service configured");

    let rate_limiter = RateLimiter::new(config.rate_limit_rps);
    let _cleanup = rate_limiter.spawn_cleanup(RATE_LIMIT_CLEANUP_EVERY);

    let port = config.port;
    let app_state = AppState::new(config, repositories, cache, predictor);
    let app = routes::app_router(app_state, rate_limiter);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/api/health", addr);

    // Serve with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

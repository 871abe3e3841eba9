//! Route definitions for Krishi Mitra API

mod admin;
mod auth;
mod dashboard;
mod diagnose;
mod market;
mod orders;

pub use admin::admin_routes;
pub use auth::auth_routes;
pub use dashboard::dashboard_routes;
pub use diagnose::diagnose_routes;
pub use market::market_routes;
pub use orders::order_routes;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
};

use crate::config::Config;
use crate::handlers::health;
use crate::middleware::{self, RateLimiter};
use crate::state::AppState;

/// Full application router with middleware applied
pub fn app_router(state: AppState, rate_limiter: RateLimiter) -> Router {
    let config = state.config.clone();

    let mut app = Router::new()
        .route("/api/health", get(health::health_check))
        .merge(auth_routes())
        .merge(market_routes())
        .merge(order_routes())
        .merge(diagnose_routes(config.max_upload_bytes))
        .merge(dashboard_routes())
        .merge(admin_routes())
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .fallback(middleware::route_not_found)
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::method_not_allowed))
        .layer(axum::middleware::from_fn(middleware::security_headers));

    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    app.layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(axum::middleware::from_fn(middleware::rate_limit_layer(
            rate_limiter,
        )))
        .layer(configure_cors(&config))
}

fn configure_cors(config: &Config) -> CorsLayer {
    let allowed = config.cors_allowed_origins.as_deref().unwrap_or_default();

    if allowed.trim().is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(600))
}

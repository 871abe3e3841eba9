//! Health check handler

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: &'static str,
    pub storage: &'static str,
    pub storage_status: &'static str,
    pub version: &'static str,
}

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = state.repositories.is_healthy().await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            success: healthy,
            status: if healthy { "healthy" } else { "unhealthy" },
            storage: state.repositories.backend_name(),
            storage_status: if healthy { "connected" } else { "unreachable" },
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

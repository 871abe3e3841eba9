//! Diagnosis routes

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::diagnose;
use crate::state::AppState;

/// Diagnosis routes; the upload route gets its own body limit
pub fn diagnose_routes(max_upload_bytes: usize) -> Router<AppState> {
    let upload = Router::new()
        .route("/api/diagnose", post(diagnose::diagnose))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes));

    Router::new()
        .route("/api/diagnose/history", get(diagnose::history))
        .route("/api/diagnose/:id", get(diagnose::get_diagnosis))
        .merge(upload)
}

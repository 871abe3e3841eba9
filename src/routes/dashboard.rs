//! Dashboard routes

use axum::{routing::get, Router};

use crate::handlers::dashboard;
use crate::state::AppState;

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard/farmer/stats", get(dashboard::farmer_stats))
        .route("/api/dashboard/buyer/stats", get(dashboard::buyer_stats))
        .route("/api/dashboard/activity", get(dashboard::recent_activity))
        .route("/api/dashboard/crop-health", get(dashboard::crop_health))
        .route(
            "/api/dashboard/recommended-farmers",
            get(dashboard::recommended_farmers),
        )
}

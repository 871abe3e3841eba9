//! Admin routes

use axum::{routing::get, Router};

use crate::handlers::admin;
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(admin::list_users))
        .route(
            "/api/admin/users/:id",
            get(admin::get_user).put(admin::update_user),
        )
        .route("/api/admin/stats", get(admin::stats))
}

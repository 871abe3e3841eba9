//! Marketplace routes

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::market;
use crate::state::AppState;

/// Public browsing plus owner-only listing management
pub fn market_routes() -> Router<AppState> {
    Router::new()
        .route("/api/market", get(market::list_listings))
        .route("/api/market/:id", get(market::get_listing))
        .route("/api/market/items", post(market::create_listing))
        .route("/api/market/items/my", get(market::my_listings))
        .route(
            "/api/market/items/:id",
            put(market::update_listing).delete(market::delete_listing),
        )
}

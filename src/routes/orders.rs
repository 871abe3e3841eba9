//! Order routes

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::orders;
use crate::state::AppState;

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/api/orders", post(orders::create_order))
        .route("/api/orders/my", get(orders::my_orders))
        .route("/api/orders/farmer", get(orders::farmer_orders))
        .route("/api/orders/:id", get(orders::get_order))
        .route("/api/orders/:id/status", put(orders::update_order_status))
        .route("/api/orders/:id/cancel", put(orders::cancel_order))
        .route("/api/orders/:id/payment", put(orders::update_payment_status))
}

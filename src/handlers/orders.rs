//! Order API handlers

use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use super::{ApiJson, ApiPath, AuthenticatedUser};
use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::orders::{
    CreateOrderRequest, Order, OrderDetails, OrderView, UpdateOrderStatusRequest,
    UpdatePaymentStatusRequest,
};
use crate::state::AppState;

/// POST /api/orders - Place an order
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderView>>), ApiError> {
    let order = state.order_service.create_order(user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(order))))
}

/// GET /api/orders/my - Orders the caller placed
pub async fn my_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<OrderView>>>, ApiError> {
    let orders = state.order_service.list_for_buyer(user.user_id).await?;
    Ok(Json(ApiResponse::ok(orders)))
}

/// GET /api/orders/farmer - Orders the caller received as seller
pub async fn farmer_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<OrderView>>>, ApiError> {
    let orders = state.order_service.list_for_seller(user.user_id).await?;
    Ok(Json(ApiResponse::ok(orders)))
}

/// GET /api/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<OrderDetails>>, ApiError> {
    let order = state
        .order_service
        .get_order(id, user.user_id, user.is_admin())
        .await?;
    Ok(Json(ApiResponse::ok(order)))
}

/// PUT /api/orders/:id/status - Seller advances fulfilment
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state
        .order_service
        .update_order_status(id, user.user_id, &req.status)
        .await?;
    Ok(Json(ApiResponse::ok(order)))
}

/// PUT /api/orders/:id/cancel - Buyer cancels before shipping
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state.order_service.cancel_order(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(order)))
}

/// PUT /api/orders/:id/payment - Seller records the payment outcome
pub async fn update_payment_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdatePaymentStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state
        .order_service
        .update_payment_status(id, user.user_id, &req.payment_status)
        .await?;
    Ok(Json(ApiResponse::ok(order)))
}

//! Marketplace API handlers

use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use super::{ApiJson, ApiPath, ApiQuery, AuthenticatedUser, OptionalUser};
use crate::error::ApiError;
use crate::market::{
    CreateListingRequest, ListingQuery, ListingView, MarketItem, UpdateListingRequest,
};
use crate::models::{ApiResponse, PaginatedResponse};
use crate::state::AppState;

/// GET /api/market - Browse active listings
pub async fn list_listings(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListingQuery>,
) -> Result<Json<PaginatedResponse<ListingView>>, ApiError> {
    let (views, pagination) = state.market_service.list_listings(query).await?;
    Ok(Json(PaginatedResponse::new(views, pagination)))
}

/// GET /api/market/:id - Single listing; signed-in callers get it recorded as viewed
pub async fn get_listing(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    OptionalUser(viewer): OptionalUser,
) -> Result<Json<ApiResponse<ListingView>>, ApiError> {
    let view = state
        .market_service
        .get_listing(id, viewer.map(|v| v.user_id))
        .await?;
    Ok(Json(ApiResponse::ok(view)))
}

/// POST /api/market/items
pub async fn create_listing(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<CreateListingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ListingView>>), ApiError> {
    let view = state.market_service.create_listing(user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(view))))
}

/// GET /api/market/items/my - Every listing the caller owns
pub async fn my_listings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<MarketItem>>>, ApiError> {
    let items = state.market_service.list_own_listings(user.user_id).await?;
    Ok(Json(ApiResponse::ok(items)))
}

/// PUT /api/market/items/:id - Owner only
pub async fn update_listing(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateListingRequest>,
) -> Result<Json<ApiResponse<ListingView>>, ApiError> {
    let view = state
        .market_service
        .update_listing(id, user.user_id, req)
        .await?;
    Ok(Json(ApiResponse::ok(view)))
}

/// DELETE /api/market/items/:id - Owner only
pub async fn delete_listing(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.market_service.delete_listing(id, user.user_id).await?;
    Ok(Json(ApiResponse::message("Listing deleted successfully")))
}

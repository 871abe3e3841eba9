//! Dashboard API handlers

use axum::{extract::State, Json};

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::{ApiResponse, Role};
use crate::services::dashboard::{
    ActivityItem, BuyerStats, CropHealth, FarmerStats, RecommendedFarmer,
};
use crate::state::AppState;

/// GET /api/dashboard/farmer/stats
pub async fn farmer_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<FarmerStats>>, ApiError> {
    user.authorize(&[Role::Farmer, Role::Admin])?;
    let stats = state.dashboard_service.farmer_stats(user.user_id).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /api/dashboard/buyer/stats
pub async fn buyer_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<BuyerStats>>, ApiError> {
    user.authorize(&[Role::Buyer, Role::Admin])?;
    let stats = state.dashboard_service.buyer_stats(user.user_id).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /api/dashboard/activity
pub async fn recent_activity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<ActivityItem>>>, ApiError> {
    let activity = state
        .dashboard_service
        .recent_activity(user.user_id, user.role)
        .await?;
    Ok(Json(ApiResponse::ok(activity)))
}

/// GET /api/dashboard/crop-health
pub async fn crop_health(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<CropHealth>>>, ApiError> {
    let health = state.dashboard_service.crop_health(user.user_id).await?;
    Ok(Json(ApiResponse::ok(health)))
}

/// GET /api/dashboard/recommended-farmers
pub async fn recommended_farmers(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<RecommendedFarmer>>>, ApiError> {
    let farmers = state.dashboard_service.recommended_farmers().await?;
    Ok(Json(ApiResponse::ok(farmers)))
}

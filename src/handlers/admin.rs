//! Admin API handlers; every route requires the admin role

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::{AdminUser, ApiJson, ApiPath, ApiQuery};
use crate::error::ApiError;
use crate::models::{
    AdminUpdateUserRequest, ApiResponse, PageRequest, PaginatedResponse, Role, UserResponse,
};
use crate::services::PlatformStats;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct ListUsersQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub role: Option<String>,
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ApiError> {
    let page = PageRequest::from_query(query.page.as_deref(), query.limit.as_deref())
        .map_err(ApiError::Validation)?;
    let role = query
        .role
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| r.parse::<Role>())
        .transpose()
        .map_err(ApiError::Validation)?;

    let (users, pagination) = state.admin_service.list_users(role, page).await?;
    let users = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(PaginatedResponse::new(users, pagination)))
}

/// GET /api/admin/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.admin_service.get_user(id).await?;
    Ok(Json(ApiResponse::ok(user.into())))
}

/// PUT /api/admin/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AdminUpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state
        .admin_service
        .update_user(admin.user_id, id, req)
        .await?;
    Ok(Json(ApiResponse::ok(user.into())))
}

/// GET /api/admin/stats
pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<PlatformStats>>, ApiError> {
    let stats = state.admin_service.stats().await?;
    Ok(Json(ApiResponse::ok(stats)))
}

//! Authentication HTTP handlers
//!
//! Email/password registration and login, current user and profile updates.

use axum::{extract::State, http::StatusCode, Json};

use super::{ApiJson, AuthenticatedUser};
use crate::error::ApiError;
use crate::models::{
    AuthResponse, CurrentUserResponse, LoginRequest, RegisterRequest, UpdateProfileRequest,
};
use crate::state::AppState;

/// POST /api/auth/register - Create an account and sign it in
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let (token, user) = state.auth_service.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            token,
            user: user.into(),
        }),
    ))
}

/// POST /api/auth/login - Exchange credentials for a session token
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (token, user) = state.auth_service.login(req).await?;

    Ok(Json(AuthResponse {
        success: true,
        token,
        user: user.into(),
    }))
}

/// GET /api/auth/me - Get current authenticated user
pub async fn get_current_user(user: AuthenticatedUser) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        success: true,
        message: None,
        user: user.user.into(),
    })
}

/// PUT /api/auth/profile - Update the caller's own account
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<CurrentUserResponse>, ApiError> {
    let updated = state.auth_service.update_profile(user.user_id, req).await?;

    Ok(Json(CurrentUserResponse {
        success: true,
        message: Some("Profile updated successfully".to_string()),
        user: updated.into(),
    }))
}

//! Crop diagnosis API handlers

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{ApiPath, ApiQuery, AuthenticatedUser};
use crate::diagnosis::{Diagnosis, DiagnosisUpload};
use crate::error::ApiError;
use crate::models::{ApiResponse, PageRequest, PaginatedResponse, PaginationParams};
use crate::state::AppState;

/// POST /api/diagnose - Multipart image upload plus optional crop details
pub async fn diagnose(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Diagnosis>>), ApiError> {
    let upload = read_upload(multipart?).await?;
    let diagnosis = state
        .diagnosis_service
        .diagnose(user.user_id, upload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(diagnosis))))
}

/// GET /api/diagnose/history
pub async fn history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> Result<Json<PaginatedResponse<Diagnosis>>, ApiError> {
    let page = PageRequest::from_query(params.page.as_deref(), params.limit.as_deref())
        .map_err(ApiError::Validation)?;
    let (rows, pagination) = state.diagnosis_service.history(user.user_id, page).await?;
    Ok(Json(PaginatedResponse::new(rows, pagination)))
}

/// GET /api/diagnose/:id - Owner only
pub async fn get_diagnosis(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Diagnosis>>, ApiError> {
    let diagnosis = state.diagnosis_service.get(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(diagnosis)))
}

async fn read_upload(mut multipart: Multipart) -> Result<DiagnosisUpload, ApiError> {
    let mut upload = DiagnosisUpload::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "image" => upload.image = field.bytes().await?.to_vec(),
            "cropType" | "crop_type" => upload.crop_type = Some(field.text().await?),
            "notes" => upload.notes = Some(field.text().await?),
            "lat" => upload.location.lat = parse_coordinate("lat", &field.text().await?)?,
            "lng" => upload.location.lng = parse_coordinate("lng", &field.text().await?)?,
            "address" => {
                let address = field.text().await?;
                let address = address.trim();
                if !address.is_empty() {
                    upload.location.address = Some(address.to_string());
                }
            }
            _ => {}
        }
    }

    Ok(upload)
}

fn parse_coordinate(field: &str, raw: &str) -> Result<Option<f64>, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| ApiError::validation(format!("Invalid {}: {}", field, raw)))
}

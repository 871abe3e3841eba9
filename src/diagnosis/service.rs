//! Diagnosis service
//!
//! Stores the uploaded image, asks the prediction service about it and persists
//! the outcome. A failed prediction still produces a record (status `error`).

use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use super::ml_client::{fallback_recommendations, DiseasePredictor, ImagePayload};
use super::model::{Diagnosis, DiagnosisStatus, GeoLocation, Severity};
use crate::error::{ApiError, ApiResult};
use crate::models::{PageRequest, Pagination};
use crate::repository::{DiagnosisRepository, NewDiagnosis};

pub const DEFAULT_CROP_TYPE: &str = "tomato";

/// Parsed multipart upload
#[derive(Debug, Default)]
pub struct DiagnosisUpload {
    pub image: Vec<u8>,
    pub crop_type: Option<String>,
    pub notes: Option<String>,
    pub location: GeoLocation,
}

/// Accepted image formats, detected from content rather than the client's claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageKind::Png)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }
}

/// Service for crop disease diagnosis
#[derive(Clone)]
pub struct DiagnosisService {
    diagnoses: Arc<dyn DiagnosisRepository>,
    predictor: Arc<dyn DiseasePredictor>,
    upload_dir: PathBuf,
}

impl DiagnosisService {
    pub fn new(
        diagnoses: Arc<dyn DiagnosisRepository>,
        predictor: Arc<dyn DiseasePredictor>,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            diagnoses,
            predictor,
            upload_dir,
        }
    }

    pub async fn diagnose(&self, user_id: Uuid, upload: DiagnosisUpload) -> ApiResult<Diagnosis> {
        if upload.image.is_empty() {
            return Err(ApiError::validation("Please upload an image"));
        }
        let kind = ImageKind::detect(&upload.image)
            .ok_or_else(|| ApiError::validation("Only JPEG and PNG images are accepted"))?;

        let crop_type = upload
            .crop_type
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CROP_TYPE.to_string());

        let file_name = format!("{}.{}", Uuid::new_v4(), kind.extension());
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::write(self.upload_dir.join(&file_name), &upload.image).await?;
        let image_url = format!("/uploads/{}", file_name);

        let payload = ImagePayload {
            bytes: upload.image,
            file_name: file_name.clone(),
            mime_type: kind.mime_type(),
        };

        let (prediction, severity, recommendations, status) =
            match self.predictor.predict(payload, &crop_type).await {
                Ok(outcome) => {
                    let severity = Severity::from_prediction(
                        outcome.severity.as_deref(),
                        &outcome.prediction.disease,
                        outcome.prediction.confidence,
                    );
                    let recommendations = match self
                        .predictor
                        .recommendations(&outcome.prediction.disease, &crop_type)
                        .await
                    {
                        Ok(set) => set,
                        Err(e) => {
                            tracing::warn!(error = %e, "Using fallback recommendations");
                            fallback_recommendations()
                        }
                    };
                    (
                        Some(outcome.prediction),
                        severity,
                        recommendations,
                        DiagnosisStatus::Processed,
                    )
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        image = %image_url,
                        "Prediction failed; storing diagnosis with error status"
                    );
                    (
                        None,
                        Severity::Low,
                        fallback_recommendations(),
                        DiagnosisStatus::Error,
                    )
                }
            };

        let location = Some(upload.location).filter(|l| !l.is_empty());
        let notes = upload
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let diagnosis = self
            .diagnoses
            .insert(NewDiagnosis {
                user_id,
                image_url,
                crop_type,
                prediction,
                recommendations,
                severity,
                status,
                location,
                notes,
            })
            .await?;

        tracing::info!(
            diagnosis_id = %diagnosis.id,
            user_id = %user_id,
            status = ?diagnosis.status,
            "Diagnosis recorded"
        );

        Ok(diagnosis)
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> ApiResult<(Vec<Diagnosis>, Pagination)> {
        let (rows, total) = self.diagnoses.list_for_user(user_id, page).await?;
        Ok((rows, Pagination::new(page, total)))
    }

    pub async fn get(&self, id: Uuid, caller_id: Uuid) -> ApiResult<Diagnosis> {
        let diagnosis = self
            .diagnoses
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Diagnosis not found"))?;

        if diagnosis.user_id != caller_id {
            return Err(ApiError::forbidden("Not authorized to view this diagnosis"));
        }

        Ok(diagnosis)
    }
}

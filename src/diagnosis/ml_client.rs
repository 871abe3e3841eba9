//! Client for the external disease prediction service
//!
//! The service is optional at runtime. Callers recover from every `DependencyError`
//! locally; none of them surfaces as an HTTP failure.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use super::model::{Prediction, RecommendationSet};

/// Failure talking to the prediction service
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("Disease prediction service is unavailable: {0}")]
    Unavailable(String),

    #[error("Disease prediction service returned an unusable response: {0}")]
    BadResponse(String),
}

impl From<reqwest::Error> for DependencyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DependencyError::BadResponse(e.to_string())
        } else {
            DependencyError::Unavailable(e.to_string())
        }
    }
}

/// Image handed to the predictor
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: &'static str,
}

/// Model output
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPrediction {
    pub prediction: Prediction,
    /// Severity label if the model supplies one
    pub severity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    disease: String,
    confidence: f64,
    #[serde(default, alias = "commonName")]
    common_name: Option<String>,
    #[serde(default, alias = "scientificName")]
    scientific_name: Option<String>,
    #[serde(default)]
    severity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecommendationsResponse {
    #[serde(default, alias = "general")]
    treatment: Vec<String>,
    #[serde(default)]
    prevention: Vec<String>,
    #[serde(default, alias = "organic", alias = "organicRemedies")]
    organic_remedies: Vec<String>,
    #[serde(
        default,
        alias = "chemical",
        alias = "chemicalRemedies",
        alias = "chemicalTreatments"
    )]
    chemical_remedies: Vec<String>,
}

/// Disease prediction capability
#[async_trait]
pub trait DiseasePredictor: Send + Sync {
    async fn predict(
        &self,
        image: ImagePayload,
        crop_type: &str,
    ) -> Result<ModelPrediction, DependencyError>;

    async fn recommendations(
        &self,
        disease: &str,
        crop_type: &str,
    ) -> Result<RecommendationSet, DependencyError>;
}

/// HTTP implementation against `POST /predict` and `GET /recommendations`
#[derive(Clone)]
pub struct HttpDiseasePredictor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDiseasePredictor {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DependencyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DiseasePredictor for HttpDiseasePredictor {
    async fn predict(
        &self,
        image: ImagePayload,
        crop_type: &str,
    ) -> Result<ModelPrediction, DependencyError> {
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(image.mime_type)?;
        let form = Form::new()
            .part("image", part)
            .text("crop_type", crop_type.to_string());

        let body: PredictResponse = self
            .client
            .post(format!("{}/predict", self.base_url))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !(0.0..=1.0).contains(&body.confidence) {
            return Err(DependencyError::BadResponse(format!(
                "confidence {} outside [0, 1]",
                body.confidence
            )));
        }

        Ok(ModelPrediction {
            prediction: Prediction {
                disease: body.disease,
                confidence: body.confidence,
                scientific_name: body.scientific_name,
                common_name: body.common_name,
            },
            severity: body.severity,
        })
    }

    async fn recommendations(
        &self,
        disease: &str,
        crop_type: &str,
    ) -> Result<RecommendationSet, DependencyError> {
        let body: RecommendationsResponse = self
            .client
            .get(format!("{}/recommendations", self.base_url))
            .query(&[("disease", disease), ("crop_type", crop_type)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(RecommendationSet {
            treatment: body.treatment,
            prevention: body.prevention,
            organic_remedies: body.organic_remedies,
            chemical_remedies: body.chemical_remedies,
        })
    }
}

/// Static advice used whenever the service cannot provide any
pub fn fallback_recommendations() -> RecommendationSet {
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    RecommendationSet {
        treatment: owned(&[
            "Remove and destroy infected plant parts",
            "Avoid overhead watering",
        ]),
        prevention: owned(&[
            "Ensure proper spacing for air circulation",
            "Practice crop rotation",
        ]),
        organic_remedies: owned(&[
            "Use neem oil spray",
            "Apply baking soda solution",
            "Use garlic or chili spray",
        ]),
        chemical_remedies: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_response_accepts_service_shape() {
        let body: PredictResponse = serde_json::from_value(serde_json::json!({
            "disease": "Tomato___Early_blight",
            "confidence": 0.93,
            "common_name": "Early Blight",
            "scientific_name": "Alternaria solani",
            "top_k": [],
            "source": "ml-service"
        }))
        .unwrap();
        assert_eq!(body.common_name.as_deref(), Some("Early Blight"));
        assert_eq!(body.severity, None);
    }

    #[test]
    fn test_recommendations_accept_legacy_keys() {
        let body: RecommendationsResponse = serde_json::from_value(serde_json::json!({
            "general": ["Remove infected leaves"],
            "organic": ["Neem oil"],
            "chemicalTreatments": ["Mancozeb"]
        }))
        .unwrap();
        assert_eq!(body.treatment, vec!["Remove infected leaves"]);
        assert_eq!(body.organic_remedies, vec!["Neem oil"]);
        assert_eq!(body.chemical_remedies, vec!["Mancozeb"]);
    }

    #[test]
    fn test_fallback_is_never_empty() {
        let fallback = fallback_recommendations();
        assert!(!fallback.treatment.is_empty());
        assert!(!fallback.organic_remedies.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_dependency_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let predictor =
            HttpDiseasePredictor::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = predictor
            .recommendations("Early Blight", "tomato")
            .await
            .unwrap_err();
        assert!(matches!(err, DependencyError::Unavailable(_)));
    }
}

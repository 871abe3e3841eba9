//! Diagnosis record models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use std::str::FromStr;
use uuid::Uuid;

/// Disease severity
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[sqlx(type_name = "severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Severity from model output: an explicit label wins, otherwise confidence decides
    pub fn from_prediction(explicit: Option<&str>, disease: &str, confidence: f64) -> Self {
        if let Some(severity) = explicit.and_then(|s| s.parse::<Severity>().ok()) {
            return severity;
        }
        if disease.to_lowercase().contains("healthy") {
            Severity::Low
        } else if confidence >= 0.9 {
            Severity::High
        } else if confidence >= 0.7 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" | "moderate" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" | "severe" => Ok(Severity::Critical),
            other => Err(format!("Unknown severity: {}", other)),
        }
    }
}

/// Processing status of a diagnosis
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Default)]
#[sqlx(type_name = "diagnosis_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisStatus {
    #[default]
    Pending,
    Processed,
    Error,
}

/// What the model said about the image
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub disease: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scientific_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
}

/// Treatment advice
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationSet {
    #[serde(default)]
    pub treatment: Vec<String>,
    #[serde(default)]
    pub prevention: Vec<String>,
    #[serde(default)]
    pub organic_remedies: Vec<String>,
    #[serde(default)]
    pub chemical_remedies: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct GeoLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl GeoLocation {
    pub fn is_empty(&self) -> bool {
        self.lat.is_none() && self.lng.is_none() && self.address.is_none()
    }
}

/// Diagnosis record
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    pub crop_type: String,
    pub prediction: Option<Json<Prediction>>,
    pub recommendations: Json<RecommendationSet>,
    pub severity: Severity,
    pub status: DiagnosisStatus,
    pub location: Option<Json<GeoLocation>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-crop severity tallies used by the crop health view
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CropSeverityCounts {
    pub crop_type: String,
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
    pub last_diagnosis: DateTime<Utc>,
}

impl CropSeverityCounts {
    pub fn empty(crop_type: &str, at: DateTime<Utc>) -> Self {
        Self {
            crop_type: crop_type.to_string(),
            critical: 0,
            high: 0,
            medium: 0,
            low: 0,
            last_diagnosis: at,
        }
    }

    pub fn record(&mut self, severity: Severity, at: DateTime<Utc>) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
        if at > self.last_diagnosis {
            self.last_diagnosis = at;
        }
    }
}

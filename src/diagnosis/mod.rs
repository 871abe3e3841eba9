//! Crop disease diagnosis backed by an external prediction service

mod ml_client;
mod model;
mod service;

pub use ml_client::{
    fallback_recommendations, DependencyError, DiseasePredictor, HttpDiseasePredictor,
    ImagePayload, ModelPrediction,
};
pub use model::*;
pub use service::{DiagnosisService, DiagnosisUpload, ImageKind, DEFAULT_CROP_TYPE};

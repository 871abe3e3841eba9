//! Shared harness for the router-level tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;
use uuid::Uuid;

use krishi_mitra_server::cache::MemoryCache;
use krishi_mitra_server::config::{Config, StorageBackend};
use krishi_mitra_server::diagnosis::{
    DependencyError, DiseasePredictor, ImagePayload, ModelPrediction, Prediction,
    RecommendationSet,
};
use krishi_mitra_server::middleware::RateLimiter;
use krishi_mitra_server::repository::Repositories;
use krishi_mitra_server::routes;
use krishi_mitra_server::state::AppState;

/// Smallest byte prefix recognised as a JPEG
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// Predictor returning a canned answer, or failing like an unreachable service
pub struct StubPredictor {
    outcome: Option<(String, f64)>,
    pub calls: AtomicUsize,
}

impl StubPredictor {
    pub fn answering(disease: &str, confidence: f64) -> Self {
        Self {
            outcome: Some((disease.to_string(), confidence)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            outcome: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DiseasePredictor for StubPredictor {
    async fn predict(
        &self,
        _image: ImagePayload,
        _crop_type: &str,
    ) -> Result<ModelPrediction, DependencyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Some((disease, confidence)) => Ok(ModelPrediction {
                prediction: Prediction {
                    disease: disease.clone(),
                    confidence: *confidence,
                    scientific_name: None,
                    common_name: Some(disease.clone()),
                },
                severity: None,
            }),
            None => Err(DependencyError::Unavailable("connection refused".to_string())),
        }
    }

    async fn recommendations(
        &self,
        _disease: &str,
        _crop_type: &str,
    ) -> Result<RecommendationSet, DependencyError> {
        match &self.outcome {
            Some(_) => Ok(RecommendationSet {
                treatment: vec!["Apply copper fungicide".to_string()],
                prevention: vec!["Rotate crops".to_string()],
                organic_remedies: vec!["Neem oil".to_string()],
                chemical_remedies: vec!["Mancozeb".to_string()],
            }),
            None => Err(DependencyError::Unavailable("connection refused".to_string())),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub repositories: Repositories,
    pub predictor: Arc<StubPredictor>,
}

pub fn test_config() -> Config {
    Config {
        storage_backend: StorageBackend::Memory,
        bcrypt_cost: 4,
        rate_limit_rps: 10_000,
        upload_dir: std::env::temp_dir().join(format!("krishi-mitra-test-{}", Uuid::new_v4())),
        ..Config::default()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_predictor(StubPredictor::answering("Early Blight", 0.93))
    }

    pub fn with_predictor(predictor: StubPredictor) -> Self {
        Self::with_repositories(Repositories::in_memory(), predictor)
    }

    pub fn with_repositories(repositories: Repositories, predictor: StubPredictor) -> Self {
        let config = test_config();
        let predictor = Arc::new(predictor);
        let cache = Arc::new(MemoryCache::new(1_000));
        let rate_limiter = RateLimiter::new(config.rate_limit_rps);

        let state = AppState::new(config, repositories.clone(), cache, predictor.clone());
        Self {
            router: routes::app_router(state, rate_limiter),
            repositories,
            predictor,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Register an account and return (token, user id)
    pub async fn register(&self, name: &str, email: &str, role: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({ "name": name, "email": email, "password": "Secret123", "role": role }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Create a listing and return its id
    pub async fn create_listing(&self, token: &str, listing: Value) -> String {
        let (status, body) = self.post("/api/market/items", Some(token), listing).await;
        assert_eq!(status, StatusCode::CREATED, "create listing failed: {}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// POST /api/diagnose with a multipart body
    pub async fn upload_diagnosis(
        &self,
        token: &str,
        image: &[u8],
        fields: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let boundary = "krishi-test-boundary";
        let mut body: Vec<u8> = Vec::new();
        if !image.is_empty() {
            body.extend_from_slice(
                format!(
                    "--{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"leaf.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
                    b = boundary
                )
                .as_bytes(),
            );
            body.extend_from_slice(image);
            body.extend_from_slice(b"\r\n");
        }
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{b}\r\nContent-Disposition: form-data; name=\"{n}\"\r\n\r\n{v}\r\n",
                    b = boundary,
                    n = name,
                    v = value
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/diagnose")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

pub fn tomatoes() -> Value {
    json!({
        "title": "Organic Tomatoes",
        "price": 45,
        "unit": "kg",
        "quantity": 100,
        "category": "vegetables"
    })
}

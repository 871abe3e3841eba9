//! Application state shared across handlers

use std::sync::Arc;

use crate::auth::AuthService;
use crate::cache::Cache;
use crate::config::Config;
use crate::diagnosis::{DiagnosisService, DiseasePredictor};
use crate::market::MarketService;
use crate::orders::OrderService;
use crate::repository::Repositories;
use crate::services::{AdminService, DashboardService};

use axum::extract::FromRef;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repositories: Repositories,
    pub auth_service: Arc<AuthService>,
    pub market_service: Arc<MarketService>,
    pub order_service: Arc<OrderService>,
    pub diagnosis_service: Arc<DiagnosisService>,
    pub dashboard_service: Arc<DashboardService>,
    pub admin_service: Arc<AdminService>,
}

impl AppState {
    /// Wire every service against one set of repositories and one cache
    pub fn new(
        config: Config,
        repositories: Repositories,
        cache: Arc<dyn Cache>,
        predictor: Arc<dyn DiseasePredictor>,
    ) -> Self {
        let auth_service = Arc::new(AuthService::new(
            repositories.users.clone(),
            config.jwt_secret.clone(),
            config.jwt_ttl_days,
            config.bcrypt_cost,
        ));
        let market_service = Arc::new(MarketService::new(
            repositories.listings.clone(),
            repositories.users.clone(),
            cache.clone(),
        ));
        let order_service = Arc::new(OrderService::new(
            repositories.orders.clone(),
            repositories.listings.clone(),
            repositories.users.clone(),
        ));
        let diagnosis_service = Arc::new(DiagnosisService::new(
            repositories.diagnoses.clone(),
            predictor,
            config.upload_dir.clone(),
        ));
        let dashboard_service = Arc::new(DashboardService::new(&repositories, cache));
        let admin_service = Arc::new(AdminService::new(&repositories));

        Self {
            config: Arc::new(config),
            repositories,
            auth_service,
            market_service,
            order_service,
            diagnosis_service,
            dashboard_service,
            admin_service,
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for Arc<MarketService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.market_service.clone()
    }
}

impl FromRef<AppState> for Arc<OrderService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.order_service.clone()
    }
}

impl FromRef<AppState> for Arc<DiagnosisService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.diagnosis_service.clone()
    }
}

impl FromRef<AppState> for Arc<DashboardService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.dashboard_service.clone()
    }
}

impl FromRef<AppState> for Arc<AdminService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.admin_service.clone()
    }
}

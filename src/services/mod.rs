//! Cross-entity services for Krishi Mitra

mod admin;
pub mod dashboard;

pub use admin::{AdminService, PlatformStats};
pub use dashboard::DashboardService;

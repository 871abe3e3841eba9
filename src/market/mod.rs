//! Marketplace listings: models, search filters and the owning service

mod model;
mod service;

pub use model::*;
pub use service::MarketService;

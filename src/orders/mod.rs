//! Orders between a buyer and a single seller

mod model;
mod service;

pub use model::*;
pub use service::OrderService;

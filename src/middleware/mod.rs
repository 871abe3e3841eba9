//! Middleware for the Krishi Mitra API
//!
//! Request tracing, rate limiting, security headers and authentication extractors.

pub mod auth;
mod fallback;
mod rate_limiter;
mod security;
mod tracing;

pub use auth::{AdminUser, AuthenticatedUser, OptionalUser};
pub use fallback::{method_not_allowed, route_not_found};
pub use rate_limiter::{rate_limit_layer, RateLimiter};
pub use security::{hsts_header, security_headers};
pub use tracing::request_tracing;

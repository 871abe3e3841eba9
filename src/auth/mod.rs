//! Authentication module for Krishi Mitra
//!
//! - Email/password registration and login with bcrypt hashes
//! - JWT session tokens (30 days by default)
//! - Token resolution to the stored user for request guards

mod jwt;
mod password;
mod service;

pub use jwt::{Claims, JwtError, SessionKeys};
pub use password::{hash_password, verify_password};
pub use service::{AuthError, AuthService};

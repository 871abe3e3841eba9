//! API handlers for Krishi Mitra backend

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod diagnose;
pub mod health;
pub mod market;
pub mod orders;

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

// Re-export AuthenticatedUser from middleware for handler use
pub use crate::middleware::auth::{AdminUser, AuthenticatedUser, OptionalUser};

/// JSON body whose rejection renders as the standard error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

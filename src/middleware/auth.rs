//! Authentication extractors
//!
//! Bearer tokens are resolved to the stored user on every request, so a deleted
//! account or a changed role takes effect immediately.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{AuthError, AuthService};
use crate::error::ApiError;
use crate::models::{Role, User};

/// Authenticated user resolved from the bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
    pub user: User,
}

impl AuthenticatedUser {
    /// Fail with 403 unless the caller holds one of `allowed`
    pub fn authorize(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "User role {} is not authorized to access this route",
                self.role
            )))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Extractor for authenticated users
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, {}", user.user.name)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::from(AuthError::MissingToken))?;

        let auth_service = Arc::<AuthService>::from_ref(state);
        let user = auth_service.authenticate(bearer.token()).await?;

        Ok(AuthenticatedUser {
            user_id: user.id,
            role: user.role,
            user,
        })
    }
}

/// Optional authenticated user extractor
///
/// Attempts to authenticate but never rejects the request.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthenticatedUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(OptionalUser(Some(user))),
            Err(_) => Ok(OptionalUser(None)),
        }
    }
}

/// Extractor that requires the admin role
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        user.authorize(&[Role::Admin])?;
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;

    fn caller(role: Role) -> AuthenticatedUser {
        let user = User {
            id: Uuid::new_v4(),
            name: "Caller".to_string(),
            email: "caller@example.com".to_string(),
            role,
            language: "en".to_string(),
            profile: Json(Default::default()),
            is_verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        AuthenticatedUser {
            user_id: user.id,
            role,
            user,
        }
    }

    #[test]
    fn test_authorize_allows_listed_roles() {
        let farmer = caller(Role::Farmer);
        assert!(farmer.authorize(&[Role::Farmer, Role::Admin]).is_ok());
    }

    #[test]
    fn test_authorize_rejects_other_roles() {
        let buyer = caller(Role::Buyer);
        let err = buyer.authorize(&[Role::Farmer, Role::Admin]).unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));
        assert!(!buyer.is_admin());
    }
}

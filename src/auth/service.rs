//! Authentication service
//!
//! Registration, login, token resolution and profile maintenance.

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::models::{LoginRequest, RegisterRequest, Role, UpdateProfileRequest, User};
use crate::repository::{NewUser, RepoError, UserPatch, UserRepository};

use super::jwt::{JwtError, SessionKeys};
use super::password::{hash_password, verify_password};

const MIN_PASSWORD_LEN: usize = 6;
const DEFAULT_LANGUAGE: &str = "en";

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No token provided")]
    MissingToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error(transparent)]
    Repository(RepoError),
}

impl From<RepoError> for AuthError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Duplicate(_) => AuthError::EmailTaken,
            other => AuthError::Repository(other),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::TokenExpired => AuthError::TokenExpired,
            JwtError::EncodingFailed(detail) => AuthError::Token(detail),
            JwtError::InvalidToken(_) => AuthError::InvalidToken,
        }
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(e: validator::ValidationErrors) -> Self {
        AuthError::Validation(ApiError::from(e).public_message())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(message) => ApiError::Validation(message),
            AuthError::EmailTaken => ApiError::Validation(e.to_string()),
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::InvalidToken
            | AuthError::UserNotFound => ApiError::Authentication(e.to_string()),
            AuthError::Hashing(detail) | AuthError::Token(detail) => ApiError::Internal(detail),
            AuthError::Repository(repo) => ApiError::from(repo),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    keys: SessionKeys,
    bcrypt_cost: u32,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(
        users: Arc<dyn UserRepository>,
        jwt_secret: String,
        token_ttl_days: i64,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            keys: SessionKeys::new(&jwt_secret, token_ttl_days),
            bcrypt_cost,
        }
    }

    /// Create an account and sign it in
    pub async fn register(&self, req: RegisterRequest) -> Result<(String, User), AuthError> {
        let name = req.name.trim().to_string();
        let email = normalize_email(&req.email);

        if name.is_empty() || email.is_empty() || req.password.is_empty() {
            return Err(AuthError::Validation("All fields are required".to_string()));
        }
        req.validate()?;
        if !validator::validate_email(email.as_str()) {
            return Err(AuthError::Validation("Please enter a valid email".to_string()));
        }
        check_password_length(&req.password)?;

        let role = req.role.unwrap_or_default();
        if role == Role::Admin {
            return Err(AuthError::Validation(
                "Admin accounts cannot be self-registered".to_string(),
            ));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&req.password, self.bcrypt_cost).await?;
        let user = self
            .users
            .create(NewUser {
                name,
                email,
                password_hash,
                role,
                language: DEFAULT_LANGUAGE.to_string(),
                profile: Default::default(),
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");

        let token = self.issue_token(&user)?;
        Ok((token, user))
    }

    /// Exchange credentials for a session token
    pub async fn login(&self, req: LoginRequest) -> Result<(String, User), AuthError> {
        let email = normalize_email(&req.email);
        if email.is_empty() || req.password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let (user, password_hash) = self
            .users
            .find_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&req.password, &password_hash).await? {
            tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issue_token(&user)?;
        Ok((token, user))
    }

    /// Resolve a bearer token to the stored user
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let user_id = self.keys.verify(token)?.user_id()?;
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Apply a profile update; the hash is only recomputed when the password changes.
    /// Everything, new hash included, is persisted in a single write.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<User, AuthError> {
        req.validate()?;

        let user = self.get_user(user_id).await?;
        let mut patch = UserPatch::default();

        if let Some(name) = req.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AuthError::Validation("Name cannot be empty".to_string()));
            }
            patch.name = Some(name);
        }

        if let Some(email) = req.email {
            let email = normalize_email(&email);
            if email != user.email {
                if self.users.find_by_email(&email).await?.is_some() {
                    return Err(AuthError::EmailTaken);
                }
                patch.email = Some(email);
            }
        }

        patch.language = req.language.map(|l| l.trim().to_string());
        patch.profile = req.profile;

        if let Some(new_password) = req.new_password {
            let current = req.current_password.ok_or_else(|| {
                AuthError::Validation(
                    "Current password is required to set a new password".to_string(),
                )
            })?;
            check_password_length(&new_password)?;

            let stored_hash = self.users.password_hash(user_id).await?;
            if !verify_password(&current, &stored_hash).await? {
                return Err(AuthError::Validation(
                    "Current password is incorrect".to_string(),
                ));
            }

            if new_password != current {
                patch.password_hash = Some(hash_password(&new_password, self.bcrypt_cost).await?);
            }
        }

        if patch.is_empty() {
            return Ok(user);
        }

        let password_changed = patch.password_hash.is_some();
        let updated = self.users.update(user_id, patch).await?;
        if password_changed {
            tracing::info!(user_id = %user_id, "Password changed");
        }
        Ok(updated)
    }

    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        Ok(self.keys.issue(user)?)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_password_length(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

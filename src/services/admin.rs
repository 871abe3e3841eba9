//! Administrative user management and platform totals

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::models::{AdminUpdateUserRequest, PageRequest, Pagination, Role, User};
use crate::repository::{
    DiagnosisRepository, ListingRepository, OrderRepository, Repositories, UserPatch,
    UserRepository,
};

/// Window for the "new in the last week" counters
const RECENT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_users: i64,
    pub farmers: i64,
    pub buyers: i64,
    pub listings: i64,
    pub orders: i64,
    pub diagnoses: i64,
    pub new_users_this_week: i64,
    pub new_orders_this_week: i64,
}

#[derive(Clone)]
pub struct AdminService {
    users: Arc<dyn UserRepository>,
    listings: Arc<dyn ListingRepository>,
    orders: Arc<dyn OrderRepository>,
    diagnoses: Arc<dyn DiagnosisRepository>,
}

impl AdminService {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            users: repos.users.clone(),
            listings: repos.listings.clone(),
            orders: repos.orders.clone(),
            diagnoses: repos.diagnoses.clone(),
        }
    }

    pub async fn list_users(
        &self,
        role: Option<Role>,
        page: PageRequest,
    ) -> ApiResult<(Vec<User>, Pagination)> {
        let (users, total) = self.users.list(role, page).await?;
        Ok((users, Pagination::new(page, total)))
    }

    pub async fn get_user(&self, id: Uuid) -> ApiResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    /// Change name, role or verification; accounts are never deleted
    pub async fn update_user(
        &self,
        admin_id: Uuid,
        id: Uuid,
        req: AdminUpdateUserRequest,
    ) -> ApiResult<User> {
        req.validate()?;
        self.get_user(id).await?;
        let mut patch = UserPatch::default();

        if let Some(name) = req.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ApiError::validation("Name cannot be empty"));
            }
            patch.name = Some(name);
        }
        if let Some(role) = req.role {
            if admin_id == id && role != Role::Admin {
                return Err(ApiError::validation("You cannot remove your own admin role"));
            }
            patch.role = Some(role);
        }
        patch.is_verified = req.is_verified;

        let updated = self.users.update(id, patch).await?;
        tracing::info!(
            admin_id = %admin_id,
            user_id = %id,
            role = %updated.role,
            verified = updated.is_verified,
            "User updated by admin"
        );
        Ok(updated)
    }

    pub async fn stats(&self) -> ApiResult<PlatformStats> {
        let since = Utc::now() - Duration::days(RECENT_WINDOW_DAYS);

        Ok(PlatformStats {
            total_users: self.users.count(None).await?,
            farmers: self.users.count(Some(Role::Farmer)).await?,
            buyers: self.users.count(Some(Role::Buyer)).await?,
            listings: self.listings.count().await?,
            orders: self.orders.count().await?,
            diagnoses: self.diagnoses.count().await?,
            new_users_this_week: self.users.count_created_since(since).await?,
            new_orders_this_week: self.orders.count_created_since(since).await?,
        })
    }
}

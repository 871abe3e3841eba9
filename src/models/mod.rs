//! Data models for Krishi Mitra backend

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod auth;
pub use auth::*;

/// User model
///
/// The password hash lives only in the users table; it is never loaded into this type.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub language: String,
    pub profile: Json<UserProfile>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User roles
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Farmer,
    Buyer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "farmer",
            Role::Buyer => "buyer",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "farmer" => Ok(Role::Farmer),
            "buyer" => Ok(Role::Buyer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Optional profile fields
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Farm size in acres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farm_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farm_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
}

/// Postal address, shared by user profiles and order shipping
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Display info for another party (seller on a listing, counterparty on an order)
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            phone: user.profile.phone.clone(),
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            language: user.language,
            profile: user.profile.0,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Pagination parameters after validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Build from raw query values; page defaults to 1, limit to 10 and is clamped to [1, 100]
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Result<Self, String> {
        let page = match page.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| format!("Invalid page: {}", raw))?
                .max(1),
            None => 1,
        };
        let limit = match limit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| format!("Invalid limit: {}", raw))?
                .clamp(1, Self::MAX_LIMIT),
            None => Self::DEFAULT_LIMIT,
        };
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Raw pagination query parameters
#[derive(Debug, Deserialize, Default)]
pub struct PaginationParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Pagination block returned with paged results
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let limit = i64::from(request.limit);
        Self {
            page: request.page,
            limit: request.limit,
            total,
            pages: (total + limit - 1) / limit,
        }
    }
}

/// Paginated response
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: Pagination) -> Self {
        Self {
            success: true,
            data,
            pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults() {
        let page = PageRequest::from_query(None, None).unwrap();
        assert_eq!(page, PageRequest { page: 1, limit: 10 });
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_page_request_clamps_limit() {
        let page = PageRequest::from_query(Some("3"), Some("1000")).unwrap();
        assert_eq!(page.limit, 100);
        assert_eq!(page.offset(), 200);

        let page = PageRequest::from_query(Some("0"), Some("0")).unwrap();
        assert_eq!(page, PageRequest { page: 1, limit: 1 });
    }

    #[test]
    fn test_page_request_rejects_garbage() {
        assert!(PageRequest::from_query(Some("two"), None).is_err());
        assert!(PageRequest::from_query(None, Some("-5")).is_err());
    }

    #[test]
    fn test_pages_is_ceiling_of_total_over_limit() {
        let request = PageRequest { page: 1, limit: 10 };
        assert_eq!(Pagination::new(request, 0).pages, 0);
        assert_eq!(Pagination::new(request, 1).pages, 1);
        assert_eq!(Pagination::new(request, 10).pages, 1);
        assert_eq!(Pagination::new(request, 11).pages, 2);
        assert_eq!(Pagination::new(request, 95).pages, 10);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Farmer".parse::<Role>().unwrap(), Role::Farmer);
        assert_eq!("buyer".parse::<Role>().unwrap(), Role::Buyer);
        assert!("seller".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::Farmer);
    }
}

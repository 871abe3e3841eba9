//! Persistence interfaces
//!
//! One trait per entity. The service layer only ever sees these traits; the concrete
//! backend (Postgres or in-process memory) is picked once at startup from configuration.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::types::chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::db::Database;
use crate::diagnosis::{
    CropSeverityCounts, Diagnosis, DiagnosisStatus, GeoLocation, Prediction, RecommendationSet,
    Severity,
};
use crate::market::{
    Category, ListingFilter, ListingImage, ListingPatch, Location, MarketItem, QualityGrade, Unit,
};
use crate::models::{PageRequest, Role, User, UserProfile};
use crate::orders::{NewOrder, Order, OrderStatus, PaymentStatus};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;

/// Repository errors
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Duplicate(String),

    /// The write lost against current state (stock, status)
    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound("Record"),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepoError::Duplicate(db.message().to_string())
            }
            other => RepoError::Database(other.to_string()),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

pub const EMAIL_TAKEN: &str = "Email already registered";

// ============================================================================
// Insert shapes
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub language: String,
    pub profile: UserProfile,
}

/// Field-level account change; only `Some` fields are written
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub language: Option<String>,
    pub profile: Option<UserProfile>,
    pub is_verified: Option<bool>,
    pub password_hash: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.language.is_none()
            && self.profile.is_none()
            && self.is_verified.is_none()
            && self.password_hash.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewListing {
    pub seller_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub unit: Unit,
    pub quantity: f64,
    pub category: Category,
    pub quality_grade: QualityGrade,
    pub organic: bool,
    pub harvest_date: Option<NaiveDate>,
    pub location: Location,
    pub tags: Vec<String>,
    pub images: Vec<ListingImage>,
}

#[derive(Debug, Clone)]
pub struct NewDiagnosis {
    pub user_id: Uuid,
    pub image_url: String,
    pub crop_type: String,
    pub prediction: Option<Prediction>,
    pub recommendations: RecommendationSet,
    pub severity: Severity,
    pub status: DiagnosisStatus,
    pub location: Option<GeoLocation>,
    pub notes: Option<String>,
}

/// Active inventory grouped by seller
#[derive(Debug, Clone, PartialEq)]
pub struct SellerInventory {
    pub seller_id: Uuid,
    pub item_count: i64,
    pub categories: Vec<Category>,
    pub total_quantity: f64,
    pub average_price: f64,
}

// ============================================================================
// Traits
// ============================================================================

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Duplicate` when the email is taken
    async fn create(&self, user: NewUser) -> RepoResult<User>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// User plus stored hash, for login only
    async fn find_credentials(&self, email: &str) -> RepoResult<Option<(User, String)>>;
    async fn password_hash(&self, id: Uuid) -> RepoResult<String>;
    /// Write the patched fields, new hash included, in one step. A taken email fails
    /// with `Duplicate` and leaves the row as it was.
    async fn update(&self, id: Uuid, patch: UserPatch) -> RepoResult<User>;
    async fn find_many(&self, ids: &[Uuid]) -> RepoResult<Vec<User>>;
    async fn list(&self, role: Option<Role>, page: PageRequest) -> RepoResult<(Vec<User>, i64)>;
    async fn count(&self, role: Option<Role>) -> RepoResult<i64>;
    async fn count_created_since(&self, since: DateTime<Utc>) -> RepoResult<i64>;
}

#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn insert(&self, listing: NewListing) -> RepoResult<MarketItem>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<MarketItem>>;
    /// Write only the patched fields onto the current row; stock moved by orders is kept
    async fn update(&self, id: Uuid, patch: &ListingPatch) -> RepoResult<MarketItem>;
    async fn delete(&self, id: Uuid) -> RepoResult<()>;
    /// Filtered page, newest first, plus the total match count
    async fn search(
        &self,
        filter: &ListingFilter,
        page: PageRequest,
    ) -> RepoResult<(Vec<MarketItem>, i64)>;
    /// Every listing of a seller regardless of status, newest first
    async fn list_by_seller(&self, seller_id: Uuid) -> RepoResult<Vec<MarketItem>>;
    async fn recent_active(&self, limit: i64) -> RepoResult<Vec<MarketItem>>;
    async fn find_many(&self, ids: &[Uuid]) -> RepoResult<Vec<MarketItem>>;
    async fn count(&self) -> RepoResult<i64>;
    async fn active_inventory_by_seller(&self) -> RepoResult<Vec<SellerInventory>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert the order and take each line's quantity out of stock atomically.
    /// A listing reaching zero becomes `sold`. Insufficient stock is a `Conflict`.
    async fn create(&self, order: NewOrder) -> RepoResult<Order>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Order>>;
    async fn list_for_seller(&self, seller_id: Uuid) -> RepoResult<Vec<Order>>;
    async fn list_for_buyer(&self, buyer_id: Uuid) -> RepoResult<Vec<Order>>;
    /// Compare-and-set on status; moving to `cancelled` puts the stock back
    async fn update_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> RepoResult<Order>;
    async fn update_payment_status(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> RepoResult<Order>;
    /// Sum of paid order totals for a seller
    async fn seller_revenue(&self, seller_id: Uuid) -> RepoResult<f64>;
    async fn count(&self) -> RepoResult<i64>;
    async fn count_created_since(&self, since: DateTime<Utc>) -> RepoResult<i64>;
}

#[async_trait]
pub trait DiagnosisRepository: Send + Sync {
    async fn insert(&self, diagnosis: NewDiagnosis) -> RepoResult<Diagnosis>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Diagnosis>>;
    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> RepoResult<(Vec<Diagnosis>, i64)>;
    async fn recent_for_user(&self, user_id: Uuid, limit: i64) -> RepoResult<Vec<Diagnosis>>;
    async fn count_for_user_since(&self, user_id: Uuid, since: DateTime<Utc>) -> RepoResult<i64>;
    /// Severity tallies per crop, most recently diagnosed crop first
    async fn severity_by_crop(&self, user_id: Uuid) -> RepoResult<Vec<CropSeverityCounts>>;
    async fn count(&self) -> RepoResult<i64>;
}

/// The set of repositories the services run against
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub listings: Arc<dyn ListingRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub diagnoses: Arc<dyn DiagnosisRepository>,
    database: Option<Database>,
}

impl Repositories {
    pub fn postgres(database: Database) -> Self {
        let pool = database.pool().clone();
        Self {
            users: Arc::new(postgres::PgUserRepository::new(pool.clone())),
            listings: Arc::new(postgres::PgListingRepository::new(pool.clone())),
            orders: Arc::new(postgres::PgOrderRepository::new(pool.clone())),
            diagnoses: Arc::new(postgres::PgDiagnosisRepository::new(pool)),
            database: Some(database),
        }
    }

    pub fn in_memory() -> Self {
        let store = MemoryStore::new();
        Self {
            users: Arc::new(store.clone()),
            listings: Arc::new(store.clone()),
            orders: Arc::new(store.clone()),
            diagnoses: Arc::new(store),
            database: None,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        if self.database.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }

    pub async fn is_healthy(&self) -> bool {
        match &self.database {
            Some(db) => db.is_healthy().await,
            None => true,
        }
    }
}

//! In-process repository backend
//!
//! All four repositories share one store behind a single lock, so order placement can
//! check and take stock in one critical section the way the Postgres backend does in
//! one transaction.

use async_trait::async_trait;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    DiagnosisRepository, ListingRepository, NewDiagnosis, NewListing, NewUser, OrderRepository,
    RepoError, RepoResult, SellerInventory, UserPatch, UserRepository, EMAIL_TAKEN,
};
use crate::diagnosis::{CropSeverityCounts, Diagnosis};
use crate::market::{Category, ListingFilter, ListingPatch, ListingStatus, MarketItem};
use crate::models::{PageRequest, Role, User};
use crate::orders::{NewOrder, Order, OrderStatus, PaymentStatus};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, (User, String)>,
    listings: HashMap<Uuid, MarketItem>,
    orders: HashMap<Uuid, Order>,
    diagnoses: HashMap<Uuid, Diagnosis>,
}

/// Shared in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(rows: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
}

fn paginate<T>(rows: Vec<T>, page: PageRequest) -> Vec<T> {
    rows.into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect()
}

fn email_taken(tables: &Tables, email: &str, except: Option<Uuid>) -> bool {
    tables
        .users
        .values()
        .any(|(u, _)| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: NewUser) -> RepoResult<User> {
        let mut tables = self.tables.write().await;
        if email_taken(&tables, &user.email, None) {
            return Err(RepoError::Duplicate(EMAIL_TAKEN.to_string()));
        }

        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            role: user.role,
            language: user.language,
            profile: Json(user.profile),
            is_verified: false,
            created_at: now,
            updated_at: now,
        };
        tables
            .users
            .insert(record.id, (record.clone(), user.password_hash));
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).map(|(u, _)| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self.find_credentials(email).await?.map(|(u, _)| u))
    }

    async fn find_credentials(&self, email: &str) -> RepoResult<Option<(User, String)>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|(u, _)| u.email == email)
            .cloned())
    }

    async fn password_hash(&self, id: Uuid) -> RepoResult<String> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(&id)
            .map(|(_, hash)| hash.clone())
            .ok_or(RepoError::NotFound("User"))
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> RepoResult<User> {
        let mut tables = self.tables.write().await;
        if let Some(email) = &patch.email {
            if email_taken(&tables, email, Some(id)) {
                return Err(RepoError::Duplicate(EMAIL_TAKEN.to_string()));
            }
        }
        let (stored, hash) = tables.users.get_mut(&id).ok_or(RepoError::NotFound("User"))?;

        if let Some(name) = patch.name {
            stored.name = name;
        }
        if let Some(email) = patch.email {
            stored.email = email;
        }
        if let Some(role) = patch.role {
            stored.role = role;
        }
        if let Some(language) = patch.language {
            stored.language = language;
        }
        if let Some(profile) = patch.profile {
            stored.profile = Json(profile);
        }
        if let Some(verified) = patch.is_verified {
            stored.is_verified = verified;
        }
        if let Some(new_hash) = patch.password_hash {
            *hash = new_hash;
        }
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn find_many(&self, ids: &[Uuid]) -> RepoResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).map(|(u, _)| u.clone()))
            .collect())
    }

    async fn list(&self, role: Option<Role>, page: PageRequest) -> RepoResult<(Vec<User>, i64)> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .map(|(u, _)| u)
            .filter(|u| role.map_or(true, |r| u.role == r))
            .cloned()
            .collect();
        newest_first(&mut users, |u| u.created_at);
        let total = users.len() as i64;
        Ok((paginate(users, page), total))
    }

    async fn count(&self, role: Option<Role>) -> RepoResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|(u, _)| role.map_or(true, |r| u.role == r))
            .count() as i64)
    }

    async fn count_created_since(&self, since: DateTime<Utc>) -> RepoResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|(u, _)| u.created_at >= since)
            .count() as i64)
    }
}

#[async_trait]
impl ListingRepository for MemoryStore {
    async fn insert(&self, listing: NewListing) -> RepoResult<MarketItem> {
        let now = Utc::now();
        let item = MarketItem {
            id: Uuid::new_v4(),
            seller_id: listing.seller_id,
            title: listing.title,
            description: listing.description,
            price: listing.price,
            unit: listing.unit,
            quantity: listing.quantity,
            category: listing.category,
            quality_grade: listing.quality_grade,
            organic: listing.organic,
            harvest_date: listing.harvest_date,
            status: ListingStatus::Active,
            location: Json(listing.location),
            tags: listing.tags,
            images: Json(listing.images),
            created_at: now,
            updated_at: now,
        };
        let mut tables = self.tables.write().await;
        tables.listings.insert(item.id, item.clone());
        Ok(item)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<MarketItem>> {
        let tables = self.tables.read().await;
        Ok(tables.listings.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, patch: &ListingPatch) -> RepoResult<MarketItem> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .listings
            .get_mut(&id)
            .ok_or(RepoError::NotFound("Item"))?;
        patch.apply_to(stored);
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> RepoResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .listings
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound("Item"))
    }

    async fn search(
        &self,
        filter: &ListingFilter,
        page: PageRequest,
    ) -> RepoResult<(Vec<MarketItem>, i64)> {
        let tables = self.tables.read().await;
        let mut items: Vec<MarketItem> = tables
            .listings
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        newest_first(&mut items, |i| i.created_at);
        let total = items.len() as i64;
        Ok((paginate(items, page), total))
    }

    async fn list_by_seller(&self, seller_id: Uuid) -> RepoResult<Vec<MarketItem>> {
        let tables = self.tables.read().await;
        let mut items: Vec<MarketItem> = tables
            .listings
            .values()
            .filter(|item| item.seller_id == seller_id)
            .cloned()
            .collect();
        newest_first(&mut items, |i| i.created_at);
        Ok(items)
    }

    async fn recent_active(&self, limit: i64) -> RepoResult<Vec<MarketItem>> {
        let tables = self.tables.read().await;
        let mut items: Vec<MarketItem> = tables
            .listings
            .values()
            .filter(|item| item.status == ListingStatus::Active)
            .cloned()
            .collect();
        newest_first(&mut items, |i| i.created_at);
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }

    async fn find_many(&self, ids: &[Uuid]) -> RepoResult<Vec<MarketItem>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.listings.get(id).cloned())
            .collect())
    }

    async fn count(&self) -> RepoResult<i64> {
        Ok(self.tables.read().await.listings.len() as i64)
    }

    async fn active_inventory_by_seller(&self) -> RepoResult<Vec<SellerInventory>> {
        let tables = self.tables.read().await;
        let mut grouped: BTreeMap<Uuid, (i64, Vec<Category>, f64, f64)> = BTreeMap::new();
        for item in tables
            .listings
            .values()
            .filter(|item| item.status == ListingStatus::Active)
        {
            let entry = grouped.entry(item.seller_id).or_default();
            entry.0 += 1;
            if !entry.1.contains(&item.category) {
                entry.1.push(item.category);
            }
            entry.2 += item.quantity;
            entry.3 += item.price;
        }

        Ok(grouped
            .into_iter()
            .map(|(seller_id, (count, mut categories, quantity, price_sum))| {
                categories.sort_by_key(|c| c.as_str());
                SellerInventory {
                    seller_id,
                    item_count: count,
                    categories,
                    total_quantity: quantity,
                    average_price: price_sum / count as f64,
                }
            })
            .collect())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create(&self, order: NewOrder) -> RepoResult<Order> {
        let mut tables = self.tables.write().await;

        // Total demand per listing, so repeated lines cannot oversell
        let mut demand: HashMap<Uuid, f64> = HashMap::new();
        for line in &order.items {
            *demand.entry(line.listing_id).or_default() += line.quantity;
        }

        for (listing_id, wanted) in &demand {
            let listing = tables
                .listings
                .get(listing_id)
                .ok_or(RepoError::NotFound("Item"))?;
            if listing.status != ListingStatus::Active {
                return Err(RepoError::Conflict(format!(
                    "{} is no longer available",
                    listing.title
                )));
            }
            if listing.quantity < *wanted {
                return Err(RepoError::Conflict(format!(
                    "Insufficient stock for {}",
                    listing.title
                )));
            }
        }

        let now = Utc::now();
        for (listing_id, wanted) in demand {
            if let Some(listing) = tables.listings.get_mut(&listing_id) {
                listing.quantity -= wanted;
                if listing.quantity <= 0.0 {
                    listing.quantity = 0.0;
                    listing.status = ListingStatus::Sold;
                }
                listing.updated_at = now;
            }
        }

        let record = Order {
            id: Uuid::new_v4(),
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            items: Json(order.items),
            total_amount: order.total_amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            shipping_address: order.shipping_address.map(Json),
            created_at: now,
            updated_at: now,
        };
        tables.orders.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn list_for_seller(&self, seller_id: Uuid) -> RepoResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.seller_id == seller_id)
            .cloned()
            .collect();
        newest_first(&mut orders, |o| o.created_at);
        Ok(orders)
    }

    async fn list_for_buyer(&self, buyer_id: Uuid) -> RepoResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.buyer_id == buyer_id)
            .cloned()
            .collect();
        newest_first(&mut orders, |o| o.created_at);
        Ok(orders)
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> RepoResult<Order> {
        let mut tables = self.tables.write().await;
        let order = tables.orders.get(&id).ok_or(RepoError::NotFound("Order"))?;
        if order.status != from {
            return Err(RepoError::Conflict(
                "Order status was changed by another request".to_string(),
            ));
        }
        let lines = order.items.0.clone();
        let now = Utc::now();

        if to == OrderStatus::Cancelled {
            for line in lines {
                if let Some(listing) = tables.listings.get_mut(&line.listing_id) {
                    listing.quantity += line.quantity;
                    if listing.status == ListingStatus::Sold {
                        listing.status = ListingStatus::Active;
                    }
                    listing.updated_at = now;
                }
            }
        }

        let order = tables
            .orders
            .get_mut(&id)
            .ok_or(RepoError::NotFound("Order"))?;
        order.status = to;
        order.updated_at = now;
        Ok(order.clone())
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> RepoResult<Order> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or(RepoError::NotFound("Order"))?;
        if order.payment_status != from {
            return Err(RepoError::Conflict(
                "Payment status was changed by another request".to_string(),
            ));
        }
        order.payment_status = to;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn seller_revenue(&self, seller_id: Uuid) -> RepoResult<f64> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| o.seller_id == seller_id && o.payment_status == PaymentStatus::Paid)
            .map(|o| o.total_amount)
            .sum())
    }

    async fn count(&self) -> RepoResult<i64> {
        Ok(self.tables.read().await.orders.len() as i64)
    }

    async fn count_created_since(&self, since: DateTime<Utc>) -> RepoResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| o.created_at >= since)
            .count() as i64)
    }
}

#[async_trait]
impl DiagnosisRepository for MemoryStore {
    async fn insert(&self, diagnosis: NewDiagnosis) -> RepoResult<Diagnosis> {
        let record = Diagnosis {
            id: Uuid::new_v4(),
            user_id: diagnosis.user_id,
            image_url: diagnosis.image_url,
            crop_type: diagnosis.crop_type,
            prediction: diagnosis.prediction.map(Json),
            recommendations: Json(diagnosis.recommendations),
            severity: diagnosis.severity,
            status: diagnosis.status,
            location: diagnosis.location.map(Json),
            notes: diagnosis.notes,
            created_at: Utc::now(),
        };
        let mut tables = self.tables.write().await;
        tables.diagnoses.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Diagnosis>> {
        Ok(self.tables.read().await.diagnoses.get(&id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> RepoResult<(Vec<Diagnosis>, i64)> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Diagnosis> = tables
            .diagnoses
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |d| d.created_at);
        let total = rows.len() as i64;
        Ok((paginate(rows, page), total))
    }

    async fn recent_for_user(&self, user_id: Uuid, limit: i64) -> RepoResult<Vec<Diagnosis>> {
        let (mut rows, _) = self
            .list_for_user(user_id, PageRequest { page: 1, limit: u32::MAX })
            .await?;
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn count_for_user_since(&self, user_id: Uuid, since: DateTime<Utc>) -> RepoResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .diagnoses
            .values()
            .filter(|d| d.user_id == user_id && d.created_at >= since)
            .count() as i64)
    }

    async fn severity_by_crop(&self, user_id: Uuid) -> RepoResult<Vec<CropSeverityCounts>> {
        let tables = self.tables.read().await;
        let mut by_crop: HashMap<String, CropSeverityCounts> = HashMap::new();
        for diagnosis in tables.diagnoses.values().filter(|d| d.user_id == user_id) {
            by_crop
                .entry(diagnosis.crop_type.clone())
                .or_insert_with(|| {
                    CropSeverityCounts::empty(&diagnosis.crop_type, diagnosis.created_at)
                })
                .record(diagnosis.severity, diagnosis.created_at);
        }
        let mut crops: Vec<CropSeverityCounts> = by_crop.into_values().collect();
        newest_first(&mut crops, |c| c.last_diagnosis);
        Ok(crops)
    }

    async fn count(&self) -> RepoResult<i64> {
        Ok(self.tables.read().await.diagnoses.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{Location, QualityGrade, Unit};
    use crate::models::UserProfile;
    use crate::orders::OrderItem;

    fn new_listing(seller_id: Uuid, quantity: f64) -> NewListing {
        NewListing {
            seller_id,
            title: "Basmati Rice".to_string(),
            description: None,
            price: 80.0,
            unit: Unit::Kg,
            quantity,
            category: Category::Cereals,
            quality_grade: QualityGrade::Premium,
            organic: false,
            harvest_date: None,
            location: Location::default(),
            tags: vec![],
            images: vec![],
        }
    }

    fn order_for(item: &MarketItem, buyer_id: Uuid, quantity: f64) -> NewOrder {
        NewOrder {
            buyer_id,
            seller_id: item.seller_id,
            items: vec![OrderItem {
                listing_id: item.id,
                title: item.title.clone(),
                quantity,
                unit: item.unit,
                price: item.price,
            }],
            total_amount: item.price * quantity,
            shipping_address: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        let user = NewUser {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Farmer,
            language: "en".to_string(),
            profile: UserProfile::default(),
        };
        UserRepository::create(&store, user.clone()).await.unwrap();
        let err = UserRepository::create(&store, user).await.unwrap_err();
        assert!(matches!(err, RepoError::Duplicate(_)));
        assert_eq!(UserRepository::count(&store, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_order_takes_stock_and_cancel_returns_it() {
        let store = MemoryStore::new();
        let seller = Uuid::new_v4();
        let item = ListingRepository::insert(&store, new_listing(seller, 10.0))
            .await
            .unwrap();

        let order = OrderRepository::create(&store, order_for(&item, Uuid::new_v4(), 10.0))
            .await
            .unwrap();
        let sold = ListingRepository::find_by_id(&store, item.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sold.quantity, 0.0);
        assert_eq!(sold.status, ListingStatus::Sold);

        OrderRepository::update_status(&store, order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap();
        let restocked = ListingRepository::find_by_id(&store, item.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restocked.quantity, 10.0);
        assert_eq!(restocked.status, ListingStatus::Active);
    }

    #[tokio::test]
    async fn test_oversell_is_conflict_and_leaves_stock() {
        let store = MemoryStore::new();
        let item = ListingRepository::insert(&store, new_listing(Uuid::new_v4(), 5.0))
            .await
            .unwrap();

        let err = OrderRepository::create(&store, order_for(&item, Uuid::new_v4(), 6.0))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));

        let unchanged = ListingRepository::find_by_id(&store, item.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.quantity, 5.0);
        assert_eq!(OrderRepository::count(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_compare_and_set() {
        let store = MemoryStore::new();
        let item = ListingRepository::insert(&store, new_listing(Uuid::new_v4(), 50.0))
            .await
            .unwrap();
        let order = OrderRepository::create(&store, order_for(&item, Uuid::new_v4(), 1.0))
            .await
            .unwrap();

        OrderRepository::update_status(&store, order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap();
        let err = OrderRepository::update_status(
            &store,
            order.id,
            OrderStatus::Pending,
            OrderStatus::Cancelled,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Asha".to_string(),
            email: email.to_string(),
            password_hash: "old-hash".to_string(),
            role: Role::Farmer,
            language: "en".to_string(),
            profile: UserProfile::default(),
        }
    }

    #[tokio::test]
    async fn test_listing_patch_keeps_stock_taken_after_read() {
        let store = MemoryStore::new();
        let item = ListingRepository::insert(&store, new_listing(Uuid::new_v4(), 100.0))
            .await
            .unwrap();

        // The seller's edit was prepared from `item`; an order lands before it is written
        OrderRepository::create(&store, order_for(&item, Uuid::new_v4(), 40.0))
            .await
            .unwrap();

        let patch = ListingPatch {
            title: Some("Aged Basmati Rice".to_string()),
            ..ListingPatch::default()
        };
        let updated = ListingRepository::update(&store, item.id, &patch)
            .await
            .unwrap();
        assert_eq!(updated.title, "Aged Basmati Rice");
        assert_eq!(updated.quantity, 60.0);
        assert_eq!(updated.status, ListingStatus::Active);
    }

    #[tokio::test]
    async fn test_profile_patch_keeps_concurrent_role_change() {
        let store = MemoryStore::new();
        let user = UserRepository::create(&store, new_user("asha@example.com"))
            .await
            .unwrap();

        UserRepository::update(
            &store,
            user.id,
            UserPatch {
                role: Some(Role::Buyer),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap();

        let updated = UserRepository::update(
            &store,
            user.id,
            UserPatch {
                name: Some("Asha Patil".to_string()),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Asha Patil");
        assert_eq!(updated.role, Role::Buyer);
    }

    #[tokio::test]
    async fn test_taken_email_rejects_whole_user_patch() {
        let store = MemoryStore::new();
        UserRepository::create(&store, new_user("taken@example.com"))
            .await
            .unwrap();
        let user = UserRepository::create(&store, new_user("asha@example.com"))
            .await
            .unwrap();

        let err = UserRepository::update(
            &store,
            user.id,
            UserPatch {
                email: Some("taken@example.com".to_string()),
                password_hash: Some("new-hash".to_string()),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Duplicate(_)));
        assert_eq!(store.password_hash(user.id).await.unwrap(), "old-hash");
    }
}


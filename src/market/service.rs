//! Marketplace listing service

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::model::{
    CreateListingRequest, ListingQuery, ListingView, MarketItem, UpdateListingRequest,
};
use crate::cache::{self, Cache, RecentView, RECENTLY_VIEWED_TTL};
use crate::error::{ApiError, ApiResult};
use crate::models::{Pagination, UserSummary};
use crate::repository::{ListingRepository, NewListing, UserRepository};

/// How many recently viewed listings are kept per user
const RECENTLY_VIEWED_CAP: usize = 10;

/// Service for marketplace listings
#[derive(Clone)]
pub struct MarketService {
    listings: Arc<dyn ListingRepository>,
    users: Arc<dyn UserRepository>,
    cache: Arc<dyn Cache>,
}

impl MarketService {
    pub fn new(
        listings: Arc<dyn ListingRepository>,
        users: Arc<dyn UserRepository>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            listings,
            users,
            cache,
        }
    }

    /// Create a listing owned by `seller_id`; status starts as active
    pub async fn create_listing(
        &self,
        seller_id: Uuid,
        req: CreateListingRequest,
    ) -> ApiResult<ListingView> {
        req.validate()?;

        let new_listing = NewListing {
            seller_id,
            title: req.title.trim().to_string(),
            description: req
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            price: req.price.unwrap_or_default(),
            unit: req.unit.unwrap_or_default(),
            quantity: req.quantity.unwrap_or_default(),
            category: req
                .category
                .ok_or_else(|| ApiError::validation("Category is required"))?,
            quality_grade: req.quality_grade.unwrap_or_default(),
            organic: req.organic.unwrap_or(false),
            harvest_date: req.harvest_date,
            location: req
                .location
                .map(|l| l.normalize())
                .transpose()?
                .unwrap_or_default(),
            tags: req.tags.map(|t| t.normalize()).transpose()?.unwrap_or_default(),
            images: req
                .images
                .map(|i| i.normalize())
                .transpose()?
                .unwrap_or_default(),
        };

        let item = self.listings.insert(new_listing).await?;
        tracing::info!(listing_id = %item.id, seller_id = %seller_id, "Listing created");

        self.with_seller(item).await
    }

    /// Active listings matching the query, newest first
    pub async fn list_listings(
        &self,
        query: ListingQuery,
    ) -> ApiResult<(Vec<ListingView>, Pagination)> {
        let (filter, page) = query.into_filter()?;
        let (items, total) = self.listings.search(&filter, page).await?;
        let views = self.with_sellers(items).await?;
        Ok((views, Pagination::new(page, total)))
    }

    /// Fetch a listing; a signed-in viewer gets it added to their recently viewed list
    pub async fn get_listing(&self, id: Uuid, viewer: Option<Uuid>) -> ApiResult<ListingView> {
        let item = self.find(id).await?;

        if let Some(viewer) = viewer {
            self.record_view(viewer, item.id).await;
        }

        self.with_seller(item).await
    }

    pub async fn update_listing(
        &self,
        id: Uuid,
        caller_id: Uuid,
        req: UpdateListingRequest,
    ) -> ApiResult<ListingView> {
        self.find_owned(id, caller_id, "update").await?;

        req.validate()?;
        let patch = req.into_patch()?;

        let updated = self.listings.update(id, &patch).await?;
        tracing::info!(listing_id = %id, "Listing updated");

        self.with_seller(updated).await
    }

    pub async fn delete_listing(&self, id: Uuid, caller_id: Uuid) -> ApiResult<()> {
        self.find_owned(id, caller_id, "delete").await?;
        self.listings.delete(id).await?;
        tracing::info!(listing_id = %id, "Listing deleted");
        Ok(())
    }

    /// All of a seller's listings regardless of status, newest first
    pub async fn list_own_listings(&self, seller_id: Uuid) -> ApiResult<Vec<MarketItem>> {
        Ok(self.listings.list_by_seller(seller_id).await?)
    }

    async fn find(&self, id: Uuid) -> ApiResult<MarketItem> {
        self.listings
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Item not found"))
    }

    /// 404 when absent, 403 when the caller is not the seller
    async fn find_owned(&self, id: Uuid, caller_id: Uuid, action: &str) -> ApiResult<MarketItem> {
        let item = self.find(id).await?;
        if item.seller_id != caller_id {
            tracing::debug!(listing_id = %id, caller = %caller_id, "Ownership check failed");
            return Err(ApiError::forbidden(format!(
                "Not authorized to {} this item",
                action
            )));
        }
        Ok(item)
    }

    async fn record_view(&self, user_id: Uuid, listing_id: Uuid) {
        let key = cache::recently_viewed_key(user_id);
        let mut viewed: Vec<RecentView> = cache::get_json(self.cache.as_ref(), &key)
            .await
            .unwrap_or_default();

        viewed.retain(|view| view.listing_id != listing_id);
        viewed.insert(
            0,
            RecentView {
                listing_id,
                viewed_at: Utc::now(),
            },
        );
        viewed.truncate(RECENTLY_VIEWED_CAP);

        cache::set_json(self.cache.as_ref(), &key, &viewed, RECENTLY_VIEWED_TTL).await;
    }

    async fn with_seller(&self, item: MarketItem) -> ApiResult<ListingView> {
        let seller = self
            .users
            .find_by_id(item.seller_id)
            .await?
            .map(|u| UserSummary::from(&u));
        Ok(ListingView { item, seller })
    }

    /// Resolve sellers for a page of listings with one lookup
    async fn with_sellers(&self, items: Vec<MarketItem>) -> ApiResult<Vec<ListingView>> {
        let mut seller_ids: Vec<Uuid> = items.iter().map(|i| i.seller_id).collect();
        seller_ids.sort();
        seller_ids.dedup();

        let sellers: HashMap<Uuid, UserSummary> = self
            .users
            .find_many(&seller_ids)
            .await?
            .iter()
            .map(|u| (u.id, UserSummary::from(u)))
            .collect();

        Ok(items
            .into_iter()
            .map(|item| {
                let seller = sellers.get(&item.seller_id).cloned();
                ListingView { item, seller }
            })
            .collect())
    }
}

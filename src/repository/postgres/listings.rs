use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::contains_pattern;
use crate::market::{Category, ListingFilter, ListingPatch, ListingStatus, MarketItem};
use crate::models::PageRequest;
use crate::repository::{ListingRepository, NewListing, RepoError, RepoResult, SellerInventory};

#[derive(Clone)]
pub struct PgListingRepository {
    pool: PgPool,
}

impl PgListingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// WHERE clause shared by the page query and the count query
fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &ListingFilter) {
    query.push(" WHERE status = ").push_bind(filter.status);

    if let Some(category) = filter.category {
        query.push(" AND category = ").push_bind(category);
    }
    if let Some(grade) = filter.quality_grade {
        query.push(" AND quality_grade = ").push_bind(grade);
    }
    if let Some(organic) = filter.organic {
        query.push(" AND organic = ").push_bind(organic);
    }
    if let Some(min) = filter.min_price {
        query.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        query.push(" AND price <= ").push_bind(max);
    }
    if let Some(search) = &filter.search {
        let pattern = contains_pattern(search);
        query
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(location) = &filter.location {
        let pattern = contains_pattern(location);
        query
            .push(" AND (location->>'city' ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR location->>'state' ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl ListingRepository for PgListingRepository {
    async fn insert(&self, listing: NewListing) -> RepoResult<MarketItem> {
        let item = sqlx::query_as::<_, MarketItem>(
            r#"
            INSERT INTO market_items (
                id, seller_id, title, description, price, unit, quantity, category,
                quality_grade, organic, harvest_date, status, location, tags, images,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(listing.seller_id)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(listing.price)
        .bind(listing.unit)
        .bind(listing.quantity)
        .bind(listing.category)
        .bind(listing.quality_grade)
        .bind(listing.organic)
        .bind(listing.harvest_date)
        .bind(ListingStatus::Active)
        .bind(Json(&listing.location))
        .bind(&listing.tags)
        .bind(Json(&listing.images))
        .fetch_one(&self.pool)
        .await?;

        Ok(item)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<MarketItem>> {
        Ok(
            sqlx::query_as::<_, MarketItem>("SELECT * FROM market_items WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn update(&self, id: Uuid, patch: &ListingPatch) -> RepoResult<MarketItem> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE market_items SET ");
        let mut set = query.separated(", ");

        if let Some(title) = &patch.title {
            set.push("title = ").push_bind_unseparated(title.clone());
        }
        if let Some(description) = &patch.description {
            set.push("description = ")
                .push_bind_unseparated(description.clone());
        }
        if let Some(price) = patch.price {
            set.push("price = ").push_bind_unseparated(price);
        }
        if let Some(unit) = patch.unit {
            set.push("unit = ").push_bind_unseparated(unit);
        }
        if let Some(quantity) = patch.quantity {
            set.push("quantity = ").push_bind_unseparated(quantity);
        }
        if let Some(category) = patch.category {
            set.push("category = ").push_bind_unseparated(category);
        }
        if let Some(grade) = patch.quality_grade {
            set.push("quality_grade = ").push_bind_unseparated(grade);
        }
        if let Some(organic) = patch.organic {
            set.push("organic = ").push_bind_unseparated(organic);
        }
        if let Some(harvest_date) = patch.harvest_date {
            set.push("harvest_date = ").push_bind_unseparated(harvest_date);
        }
        if let Some(status) = patch.status {
            set.push("status = ").push_bind_unseparated(status);
        }
        if let Some(location) = &patch.location {
            set.push("location = ")
                .push_bind_unseparated(Json(location.clone()));
        }
        if let Some(tags) = &patch.tags {
            set.push("tags = ").push_bind_unseparated(tags.clone());
        }
        if let Some(images) = &patch.images {
            set.push("images = ")
                .push_bind_unseparated(Json(images.clone()));
        }
        set.push("updated_at = NOW()");

        query.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        query
            .build_query_as::<MarketItem>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepoError::NotFound("Item"))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM market_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound("Item"));
        }
        Ok(())
    }

    async fn search(
        &self,
        filter: &ListingFilter,
        page: PageRequest,
    ) -> RepoResult<(Vec<MarketItem>, i64)> {
        let mut count_query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM market_items");
        push_filter(&mut count_query, filter);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM market_items");
        push_filter(&mut query_builder, filter);
        query_builder.push(" ORDER BY created_at DESC LIMIT ");
        query_builder.push_bind(i64::from(page.limit));
        query_builder.push(" OFFSET ");
        query_builder.push_bind(page.offset());

        let items = query_builder
            .build_query_as::<MarketItem>()
            .fetch_all(&self.pool)
            .await?;

        Ok((items, total))
    }

    async fn list_by_seller(&self, seller_id: Uuid) -> RepoResult<Vec<MarketItem>> {
        Ok(sqlx::query_as::<_, MarketItem>(
            "SELECT * FROM market_items WHERE seller_id = $1 ORDER BY created_at DESC",
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn recent_active(&self, limit: i64) -> RepoResult<Vec<MarketItem>> {
        Ok(sqlx::query_as::<_, MarketItem>(
            "SELECT * FROM market_items WHERE status = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(ListingStatus::Active)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_many(&self, ids: &[Uuid]) -> RepoResult<Vec<MarketItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(
            sqlx::query_as::<_, MarketItem>("SELECT * FROM market_items WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn count(&self) -> RepoResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM market_items")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn active_inventory_by_seller(&self) -> RepoResult<Vec<SellerInventory>> {
        let rows = sqlx::query_as::<_, (Uuid, i64, Vec<String>, f64, f64)>(
            r#"
            SELECT seller_id,
                   COUNT(*) AS item_count,
                   ARRAY_AGG(DISTINCT category::TEXT ORDER BY category::TEXT) AS categories,
                   COALESCE(SUM(quantity), 0)::FLOAT8 AS total_quantity,
                   COALESCE(AVG(price), 0)::FLOAT8 AS average_price
            FROM market_items
            WHERE status = $1
            GROUP BY seller_id
            "#,
        )
        .bind(ListingStatus::Active)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(seller_id, item_count, categories, total_quantity, average_price)| {
                    SellerInventory {
                        seller_id,
                        item_count,
                        categories: categories
                            .iter()
                            .filter_map(|c| c.parse::<Category>().ok())
                            .collect(),
                        total_quantity,
                        average_price,
                    }
                },
            )
            .collect())
    }
}

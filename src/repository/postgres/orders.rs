use async_trait::async_trait;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::market::ListingStatus;
use crate::orders::{NewOrder, Order, OrderStatus, PaymentStatus};
use crate::repository::{OrderRepository, RepoError, RepoResult};

#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, order: NewOrder) -> RepoResult<Order> {
        // Listing rows are locked in id order so concurrent orders cannot deadlock
        let mut demand: BTreeMap<Uuid, f64> = BTreeMap::new();
        for line in &order.items {
            *demand.entry(line.listing_id).or_default() += line.quantity;
        }

        let mut tx = self.pool.begin().await?;

        for (listing_id, wanted) in &demand {
            let (title, quantity, status) = sqlx::query_as::<_, (String, f64, ListingStatus)>(
                "SELECT title, quantity, status FROM market_items WHERE id = $1 FOR UPDATE",
            )
            .bind(listing_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepoError::NotFound("Item"))?;

            if status != ListingStatus::Active {
                return Err(RepoError::Conflict(format!(
                    "{} is no longer available",
                    title
                )));
            }
            if quantity < *wanted {
                return Err(RepoError::Conflict(format!("Insufficient stock for {}", title)));
            }

            let remaining = (quantity - wanted).max(0.0);
            let new_status = if remaining <= 0.0 {
                ListingStatus::Sold
            } else {
                status
            };

            sqlx::query(
                "UPDATE market_items SET quantity = $1, status = $2, updated_at = NOW() WHERE id = $3",
            )
            .bind(remaining)
            .bind(new_status)
            .bind(listing_id)
            .execute(&mut *tx)
            .await?;
        }

        let created = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                id, buyer_id, seller_id, items, total_amount, status, payment_status,
                shipping_address, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.buyer_id)
        .bind(order.seller_id)
        .bind(Json(&order.items))
        .bind(order.total_amount)
        .bind(OrderStatus::Pending)
        .bind(PaymentStatus::Pending)
        .bind(order.shipping_address.as_ref().map(Json))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Order>> {
        Ok(sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_for_seller(&self, seller_id: Uuid) -> RepoResult<Vec<Order>> {
        Ok(sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE seller_id = $1 ORDER BY created_at DESC",
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_for_buyer(&self, buyer_id: Uuid) -> RepoResult<Vec<Order>> {
        Ok(sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC",
        )
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> RepoResult<Order> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepoError::NotFound("Order"))?;

        if order.status != from {
            return Err(RepoError::Conflict(
                "Order status was changed by another request".to_string(),
            ));
        }

        if to == OrderStatus::Cancelled {
            for line in order.items.iter() {
                sqlx::query(
                    r#"
                    UPDATE market_items
                    SET quantity = quantity + $1,
                        status = CASE WHEN status = 'sold' THEN 'active'::listing_status ELSE status END,
                        updated_at = NOW()
                    WHERE id = $2
                    "#,
                )
                .bind(line.quantity)
                .bind(line.listing_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        let updated = sqlx::query_as::<_, Order>(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(to)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> RepoResult<Order> {
        let updated = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders SET payment_status = $1, updated_at = NOW()
            WHERE id = $2 AND payment_status = $3
            RETURNING *
            "#,
        )
        .bind(to)
        .bind(id)
        .bind(from)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(order) => Ok(order),
            None => match self.find_by_id(id).await? {
                Some(_) => Err(RepoError::Conflict(
                    "Payment status was changed by another request".to_string(),
                )),
                None => Err(RepoError::NotFound("Order")),
            },
        }
    }

    async fn seller_revenue(&self, seller_id: Uuid) -> RepoResult<f64> {
        Ok(sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(SUM(total_amount), 0)::FLOAT8 FROM orders WHERE seller_id = $1 AND payment_status = $2",
        )
        .bind(seller_id)
        .bind(PaymentStatus::Paid)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn count(&self) -> RepoResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn count_created_since(&self, since: DateTime<Utc>) -> RepoResult<i64> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE created_at >= $1")
                .bind(since)
                .fetch_one(&self.pool)
                .await?,
        )
    }
}

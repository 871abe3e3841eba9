//! Order service
//!
//! Placement, dual-sided views and the fulfilment/payment workflows.

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::model::{
    CreateOrderRequest, NewOrder, Order, OrderDetails, OrderItem, OrderStatus, OrderView,
    PaymentStatus,
};
use crate::error::{ApiError, ApiResult};
use crate::market::{ListingStatus, MarketItem};
use crate::models::UserSummary;
use crate::repository::{ListingRepository, OrderRepository, UserRepository};

/// Which side of the order the caller is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Buyer,
    Seller,
}

/// Service for orders
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    listings: Arc<dyn ListingRepository>,
    users: Arc<dyn UserRepository>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        listings: Arc<dyn ListingRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            orders,
            listings,
            users,
        }
    }

    /// Place an order against one seller's listings at their current prices
    pub async fn create_order(
        &self,
        buyer_id: Uuid,
        req: CreateOrderRequest,
    ) -> ApiResult<OrderView> {
        req.validate()?;

        if req
            .items
            .iter()
            .any(|line| !line.quantity.is_finite() || line.quantity <= 0.0)
        {
            return Err(ApiError::validation("Quantity must be greater than zero"));
        }

        let mut listing_ids: Vec<Uuid> = req.items.iter().map(|l| l.listing_id).collect();
        listing_ids.sort();
        listing_ids.dedup();

        let listings: HashMap<Uuid, MarketItem> = self
            .listings
            .find_many(&listing_ids)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        let mut seller_id: Option<Uuid> = None;
        let mut items = Vec::with_capacity(req.items.len());

        for line in &req.items {
            let listing = listings
                .get(&line.listing_id)
                .ok_or_else(|| ApiError::not_found("Item not found"))?;

            if listing.status != ListingStatus::Active {
                return Err(ApiError::validation(format!(
                    "{} is not available",
                    listing.title
                )));
            }
            if listing.seller_id == buyer_id {
                return Err(ApiError::validation("You cannot order your own listing"));
            }
            match seller_id {
                Some(seller) if seller != listing.seller_id => {
                    return Err(ApiError::validation(
                        "All items in an order must be from the same seller",
                    ));
                }
                _ => seller_id = Some(listing.seller_id),
            }

            items.push(OrderItem {
                listing_id: listing.id,
                title: listing.title.clone(),
                quantity: line.quantity,
                unit: listing.unit,
                price: listing.price,
            });
        }

        let seller_id = seller_id
            .ok_or_else(|| ApiError::validation("Order must contain at least one item"))?;
        let total_amount: f64 = items.iter().map(OrderItem::subtotal).sum();

        let order = self
            .orders
            .create(NewOrder {
                buyer_id,
                seller_id,
                items,
                total_amount,
                shipping_address: req.shipping_address,
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            buyer_id = %buyer_id,
            seller_id = %seller_id,
            total = order.total_amount,
            "Order placed"
        );

        let mut views = self.annotate(vec![order], Side::Buyer).await?;
        views
            .pop()
            .ok_or_else(|| ApiError::Internal("Created order vanished".to_string()))
    }

    /// Orders received by a seller, newest first, annotated with buyer names
    pub async fn list_for_seller(&self, seller_id: Uuid) -> ApiResult<Vec<OrderView>> {
        let orders = self.orders.list_for_seller(seller_id).await?;
        self.annotate(orders, Side::Seller).await
    }

    /// Orders placed by a buyer, newest first, annotated with seller names
    pub async fn list_for_buyer(&self, buyer_id: Uuid) -> ApiResult<Vec<OrderView>> {
        let orders = self.orders.list_for_buyer(buyer_id).await?;
        self.annotate(orders, Side::Buyer).await
    }

    /// Visible to the buyer, the seller and admins; anyone else gets a 404
    pub async fn get_order(
        &self,
        id: Uuid,
        caller_id: Uuid,
        is_admin: bool,
    ) -> ApiResult<OrderDetails> {
        let order = self.find(id).await?;
        if !is_admin && !order.is_party(caller_id) {
            return Err(ApiError::not_found("Order not found"));
        }

        let parties = self
            .users
            .find_many(&[order.buyer_id, order.seller_id])
            .await?;
        let summary = |id: Uuid| parties.iter().find(|u| u.id == id).map(UserSummary::from);

        Ok(OrderDetails {
            buyer: summary(order.buyer_id),
            seller: summary(order.seller_id),
            order,
        })
    }

    /// Seller-driven fulfilment step
    pub async fn update_order_status(
        &self,
        id: Uuid,
        caller_id: Uuid,
        status: &str,
    ) -> ApiResult<Order> {
        let next: OrderStatus = status.parse()?;
        let order = self.find(id).await?;

        if order.seller_id != caller_id {
            return Err(ApiError::forbidden("Not authorized to update this order"));
        }

        let next = order.status.transition_to(next)?;
        let updated = self.orders.update_status(id, order.status, next).await?;

        tracing::info!(order_id = %id, from = %order.status, to = %next, "Order status changed");
        Ok(updated)
    }

    /// Buyer-driven cancellation, allowed until the order ships
    pub async fn cancel_order(&self, id: Uuid, caller_id: Uuid) -> ApiResult<Order> {
        let order = self.find(id).await?;

        if order.buyer_id != caller_id {
            return Err(ApiError::forbidden("Not authorized to cancel this order"));
        }

        let next = order.status.transition_to(OrderStatus::Cancelled)?;
        let updated = self.orders.update_status(id, order.status, next).await?;

        tracing::info!(order_id = %id, "Order cancelled by buyer");
        Ok(updated)
    }

    /// Seller records the payment outcome
    pub async fn update_payment_status(
        &self,
        id: Uuid,
        caller_id: Uuid,
        payment_status: &str,
    ) -> ApiResult<Order> {
        let next: PaymentStatus = payment_status.parse()?;
        let order = self.find(id).await?;

        if order.seller_id != caller_id {
            return Err(ApiError::forbidden("Not authorized to update this order"));
        }

        let next = order.payment_status.transition_to(next)?;
        let updated = self
            .orders
            .update_payment_status(id, order.payment_status, next)
            .await?;

        tracing::info!(order_id = %id, payment_status = %next, "Payment status changed");
        Ok(updated)
    }

    async fn find(&self, id: Uuid) -> ApiResult<Order> {
        self.orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Order not found"))
    }

    async fn annotate(&self, orders: Vec<Order>, viewer: Side) -> ApiResult<Vec<OrderView>> {
        let counterparty = |order: &Order| match viewer {
            Side::Buyer => order.seller_id,
            Side::Seller => order.buyer_id,
        };

        let mut ids: Vec<Uuid> = orders.iter().map(counterparty).collect();
        ids.sort();
        ids.dedup();

        let names: HashMap<Uuid, String> = self
            .users
            .find_many(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        Ok(orders
            .into_iter()
            .map(|order| {
                let counterparty_name = names.get(&counterparty(&order)).cloned();
                OrderView {
                    order,
                    counterparty_name,
                }
            })
            .collect())
    }
}

//! Dashboard aggregation for Krishi Mitra
//!
//! Read-only statistics for the farmer and buyer home screens. Nothing here mutates
//! state; the only writes go to the process-local cache.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{self, Cache, RecentView, RECOMMENDED_FARMERS_KEY, RECOMMENDED_FARMERS_TTL};
use crate::diagnosis::{CropSeverityCounts, Diagnosis};
use crate::error::ApiResult;
use crate::market::{Category, ListingStatus, MarketItem};
use crate::models::Role;
use crate::orders::{OrderStatus, PaymentStatus};
use crate::repository::{
    DiagnosisRepository, ListingRepository, OrderRepository, Repositories, SellerInventory,
    UserRepository,
};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Share of listed inventory value assumed sold when revenue cannot be aggregated
const REVENUE_ESTIMATE_RATIO: f64 = 0.3;

/// Listings below this quantity need the farmer's attention
const LOW_STOCK_THRESHOLD: f64 = 10.0;

const RECENT_DIAGNOSES: i64 = 3;
const RECENT_LISTINGS: usize = 2;
const RECENT_VIEWS: usize = 3;

/// Points removed from a perfect score per weighted finding
const HEALTH_PENALTY: i64 = 10;
const CRITICAL_WEIGHT: i64 = 5;
const HIGH_WEIGHT: i64 = 3;

/// Number of crops shown on the crop health card
const CROP_HEALTH_LIMIT: usize = 5;

const RECOMMENDED_FARMERS_LIMIT: usize = 6;
const SPECIALTIES_SHOWN: usize = 2;

/// Sellers carry no rating yet; every recommendation shows the platform default
const DEFAULT_FARMER_RATING: f64 = 4.5;

// ============================================================================
// Data Models
// ============================================================================

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FarmerStats {
    pub active_listings: i64,
    pub diagnoses_this_month: i64,
    /// Whole currency units
    pub total_revenue: i64,
    /// Listings low on stock or no longer active
    pub pending_alerts: i64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuyerStats {
    pub active_orders: i64,
    pub total_spent: f64,
    /// Distinct sellers this buyer has ordered from
    pub favorite_farmers: i64,
    pub pending_deliveries: i64,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Diagnosis,
    Sale,
    View,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Completed,
    Pending,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ActivityItem {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub message: String,
    /// Relative time, see [`format_time_ago`]
    pub time: String,
    pub status: ActivityStatus,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Good,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn from_score(score: i64) -> Self {
        if score < 40 {
            HealthStatus::Critical
        } else if score < 70 {
            HealthStatus::Warning
        } else {
            HealthStatus::Good
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CropHealth {
    pub crop: String,
    pub health: HealthStatus,
    pub issues: i64,
    /// Health score in [0, 100]
    pub progress: i64,
}

impl From<&CropSeverityCounts> for CropHealth {
    fn from(counts: &CropSeverityCounts) -> Self {
        let score = health_score(counts.critical, counts.high);
        let health = HealthStatus::from_score(score);
        let issues = match health {
            HealthStatus::Critical => counts.critical + counts.high,
            HealthStatus::Warning => counts.high,
            HealthStatus::Good => 0,
        };
        Self {
            crop: counts.crop_type.clone(),
            health,
            issues,
            progress: score,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedFarmer {
    pub id: Uuid,
    pub name: String,
    pub rating: f64,
    pub item_count: i64,
    pub specialties: Vec<Category>,
    pub total_quantity: f64,
    pub average_price: f64,
    pub delivery_time: String,
}

// ============================================================================
// Scoring helpers
// ============================================================================

/// `100 - 10 * (5 * critical + 3 * high)`, clamped to [0, 100]
pub fn health_score(critical: i64, high: i64) -> i64 {
    let penalty = HEALTH_PENALTY * (CRITICAL_WEIGHT * critical + HIGH_WEIGHT * high);
    (100 - penalty).clamp(0, 100)
}

/// Delivery window by the seller's total active stock
pub fn delivery_estimate(total_quantity: f64) -> &'static str {
    if total_quantity >= 1000.0 {
        "3-4 days"
    } else if total_quantity >= 500.0 {
        "2-3 days"
    } else {
        "1-2 days"
    }
}

/// "Nm ago" under an hour, "Nh ago" under a day, "Nd ago" under a week, else the date
pub fn format_time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes().max(0);

    if minutes < 60 {
        format!("{}m ago", minutes)
    } else if elapsed.num_hours() < 24 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 7 {
        format!("{}d ago", elapsed.num_days())
    } else {
        then.format("%Y-%m-%d").to_string()
    }
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

fn needs_attention(item: &MarketItem) -> bool {
    item.quantity < LOW_STOCK_THRESHOLD || item.status != ListingStatus::Active
}

fn estimated_revenue(listings: &[MarketItem]) -> f64 {
    listings
        .iter()
        .map(|item| item.inventory_value() * REVENUE_ESTIMATE_RATIO)
        .sum()
}

// ============================================================================
// Service
// ============================================================================

/// Read-only statistics service
#[derive(Clone)]
pub struct DashboardService {
    users: Arc<dyn UserRepository>,
    listings: Arc<dyn ListingRepository>,
    orders: Arc<dyn OrderRepository>,
    diagnoses: Arc<dyn DiagnosisRepository>,
    cache: Arc<dyn Cache>,
}

impl DashboardService {
    pub fn new(repos: &Repositories, cache: Arc<dyn Cache>) -> Self {
        Self {
            users: repos.users.clone(),
            listings: repos.listings.clone(),
            orders: repos.orders.clone(),
            diagnoses: repos.diagnoses.clone(),
            cache,
        }
    }

    pub async fn farmer_stats(&self, user_id: Uuid) -> ApiResult<FarmerStats> {
        let now = Utc::now();
        let listings = self.listings.list_by_seller(user_id).await?;

        let active_listings = listings
            .iter()
            .filter(|item| item.status == ListingStatus::Active)
            .count() as i64;
        let pending_alerts = listings.iter().filter(|item| needs_attention(item)).count() as i64;

        let diagnoses_this_month = self
            .diagnoses
            .count_for_user_since(user_id, start_of_month(now))
            .await?;

        let revenue = match self.orders.seller_revenue(user_id).await {
            Ok(revenue) => revenue,
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Revenue aggregation failed, estimating from listings"
                );
                estimated_revenue(&listings)
            }
        };

        Ok(FarmerStats {
            active_listings,
            diagnoses_this_month,
            total_revenue: revenue.round() as i64,
            pending_alerts,
        })
    }

    pub async fn buyer_stats(&self, user_id: Uuid) -> ApiResult<BuyerStats> {
        let orders = self.orders.list_for_buyer(user_id).await?;

        let active_orders = orders.iter().filter(|o| o.status.is_active()).count() as i64;
        let total_spent = orders
            .iter()
            .filter(|o| o.payment_status == PaymentStatus::Paid)
            .map(|o| o.total_amount)
            .sum();
        let mut sellers: Vec<Uuid> = orders.iter().map(|o| o.seller_id).collect();
        sellers.sort();
        sellers.dedup();
        let pending_deliveries = orders
            .iter()
            .filter(|o| {
                matches!(o.status, OrderStatus::Confirmed | OrderStatus::Shipped)
            })
            .count() as i64;

        Ok(BuyerStats {
            active_orders,
            total_spent,
            favorite_farmers: sellers.len() as i64,
            pending_deliveries,
        })
    }

    /// Farmers see their diagnoses and listings; everyone else sees recently viewed listings
    pub async fn recent_activity(&self, user_id: Uuid, role: Role) -> ApiResult<Vec<ActivityItem>> {
        let mut entries: Vec<(DateTime<Utc>, ActivityItem)> = match role {
            Role::Farmer => self.farmer_activity(user_id).await?,
            Role::Buyer | Role::Admin => self.viewing_activity(user_id).await?,
        };

        entries.sort_by(|a, b| b.0.cmp(&a.0));

        let now = Utc::now();
        Ok(entries
            .into_iter()
            .map(|(at, mut item)| {
                item.time = format_time_ago(at, now);
                item
            })
            .collect())
    }

    async fn farmer_activity(&self, user_id: Uuid) -> ApiResult<Vec<(DateTime<Utc>, ActivityItem)>> {
        let diagnoses = self
            .diagnoses
            .recent_for_user(user_id, RECENT_DIAGNOSES)
            .await?;
        let listings = self.listings.list_by_seller(user_id).await?;

        let diagnosis_entries = diagnoses.iter().map(|d: &Diagnosis| {
            let outcome = d
                .prediction
                .as_ref()
                .map(|p| p.disease.clone())
                .unwrap_or_else(|| "Analyzed".to_string());
            (
                d.created_at,
                ActivityItem {
                    kind: ActivityKind::Diagnosis,
                    message: format!("{} - {}", d.crop_type, outcome),
                    time: String::new(),
                    status: ActivityStatus::Completed,
                },
            )
        });

        let listing_entries = listings.iter().take(RECENT_LISTINGS).map(|item| {
            let status = if item.status == ListingStatus::Active {
                ActivityStatus::Completed
            } else {
                ActivityStatus::Pending
            };
            (
                item.created_at,
                ActivityItem {
                    kind: ActivityKind::Sale,
                    message: format!("Listed: {}", item.title),
                    time: String::new(),
                    status,
                },
            )
        });

        Ok(diagnosis_entries.chain(listing_entries).collect())
    }

    async fn viewing_activity(&self, user_id: Uuid) -> ApiResult<Vec<(DateTime<Utc>, ActivityItem)>> {
        let key = cache::recently_viewed_key(user_id);
        let viewed: Vec<RecentView> = cache::get_json(self.cache.as_ref(), &key)
            .await
            .unwrap_or_default();

        let mut listings: Vec<(DateTime<Utc>, MarketItem)> = if viewed.is_empty() {
            Vec::new()
        } else {
            let ids: Vec<Uuid> = viewed.iter().map(|view| view.listing_id).collect();
            let found: HashMap<Uuid, MarketItem> = self
                .listings
                .find_many(&ids)
                .await?
                .into_iter()
                .map(|item| (item.id, item))
                .collect();
            viewed
                .iter()
                .filter_map(|view| {
                    found
                        .get(&view.listing_id)
                        .map(|item| (view.viewed_at, item.clone()))
                })
                .take(RECENT_VIEWS)
                .collect()
        };

        if listings.is_empty() {
            listings = self
                .listings
                .recent_active(RECENT_VIEWS as i64)
                .await?
                .into_iter()
                .map(|item| (item.created_at, item))
                .collect();
        }

        let mut seller_ids: Vec<Uuid> = listings.iter().map(|(_, item)| item.seller_id).collect();
        seller_ids.sort();
        seller_ids.dedup();
        let sellers: HashMap<Uuid, String> = self
            .users
            .find_many(&seller_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        Ok(listings
            .into_iter()
            .map(|(at, item)| {
                let message = match sellers.get(&item.seller_id) {
                    Some(name) => format!("Viewed: {} from {}", item.title, name),
                    None => format!("Viewed: {}", item.title),
                };
                (
                    at,
                    ActivityItem {
                        kind: ActivityKind::View,
                        message,
                        time: String::new(),
                        status: ActivityStatus::Completed,
                    },
                )
            })
            .collect())
    }

    /// Health per crop, most recently diagnosed first; empty without diagnoses
    pub async fn crop_health(&self, user_id: Uuid) -> ApiResult<Vec<CropHealth>> {
        let counts = self.diagnoses.severity_by_crop(user_id).await?;
        Ok(counts
            .iter()
            .take(CROP_HEALTH_LIMIT)
            .map(CropHealth::from)
            .collect())
    }

    pub async fn recommended_farmers(&self) -> ApiResult<Vec<RecommendedFarmer>> {
        if let Some(cached) =
            cache::get_json::<Vec<RecommendedFarmer>>(self.cache.as_ref(), RECOMMENDED_FARMERS_KEY)
                .await
        {
            return Ok(cached);
        }

        let mut inventory = self.listings.active_inventory_by_seller().await?;
        inventory.sort_by(|a, b| b.item_count.cmp(&a.item_count));

        let seller_ids: Vec<Uuid> = inventory.iter().map(|s| s.seller_id).collect();
        let names: HashMap<Uuid, String> = self
            .users
            .find_many(&seller_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        let farmers: Vec<RecommendedFarmer> = inventory
            .into_iter()
            .filter_map(|seller: SellerInventory| {
                let name = names.get(&seller.seller_id)?.clone();
                Some(RecommendedFarmer {
                    id: seller.seller_id,
                    name,
                    rating: DEFAULT_FARMER_RATING,
                    item_count: seller.item_count,
                    specialties: seller.categories.into_iter().take(SPECIALTIES_SHOWN).collect(),
                    total_quantity: seller.total_quantity,
                    average_price: seller.average_price,
                    delivery_time: delivery_estimate(seller.total_quantity).to_string(),
                })
            })
            .take(RECOMMENDED_FARMERS_LIMIT)
            .collect();

        cache::set_json(
            self.cache.as_ref(),
            RECOMMENDED_FARMERS_KEY,
            &farmers,
            RECOMMENDED_FARMERS_TTL,
        )
        .await;

        Ok(farmers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::Severity;
    use chrono::Duration;

    #[test]
    fn test_health_score_two_critical_one_high() {
        let score = health_score(2, 1);
        assert_eq!(score, 0);
        assert_eq!(HealthStatus::from_score(score), HealthStatus::Critical);
    }

    #[test]
    fn test_health_score_clamps() {
        assert_eq!(health_score(0, 0), 100);
        assert_eq!(health_score(0, 1), 70);
        assert_eq!(health_score(0, 2), 40);
        assert_eq!(health_score(10, 10), 0);
    }

    #[test]
    fn test_health_status_boundaries() {
        assert_eq!(HealthStatus::from_score(39), HealthStatus::Critical);
        assert_eq!(HealthStatus::from_score(40), HealthStatus::Warning);
        assert_eq!(HealthStatus::from_score(69), HealthStatus::Warning);
        assert_eq!(HealthStatus::from_score(70), HealthStatus::Good);
    }

    #[test]
    fn test_issue_count_follows_status() {
        let now = Utc::now();
        let mut warning = CropSeverityCounts::empty("wheat", now);
        warning.record(Severity::High, now);
        warning.record(Severity::Medium, now);
        let health = CropHealth::from(&warning);
        assert_eq!(health.health, HealthStatus::Good);
        assert_eq!(health.progress, 70);
        assert_eq!(health.issues, 0);

        warning.record(Severity::High, now);
        let health = CropHealth::from(&warning);
        assert_eq!(health.health, HealthStatus::Warning);
        assert_eq!(health.issues, 2);

        warning.record(Severity::Critical, now);
        let health = CropHealth::from(&warning);
        assert_eq!(health.health, HealthStatus::Critical);
        assert_eq!(health.issues, 3);
    }

    #[test]
    fn test_delivery_estimate_thresholds() {
        assert_eq!(delivery_estimate(1500.0), "3-4 days");
        assert_eq!(delivery_estimate(1000.0), "3-4 days");
        assert_eq!(delivery_estimate(500.0), "2-3 days");
        assert_eq!(delivery_estimate(499.9), "1-2 days");
    }

    #[test]
    fn test_format_time_ago() {
        let now = Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap();
        assert_eq!(format_time_ago(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_time_ago(now - Duration::minutes(59), now), "59m ago");
        assert_eq!(format_time_ago(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_time_ago(now - Duration::days(2), now), "2d ago");
        assert_eq!(format_time_ago(now - Duration::days(10), now), "2024-06-10");
    }

    #[test]
    fn test_start_of_month() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 18, 30, 0).unwrap();
        assert_eq!(
            start_of_month(now),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
    }
}

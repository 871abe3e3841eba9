//! Process-local key/value cache with per-entry expiry
//!
//! Holds derived data only. Every caller treats a miss as "recompute".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache as MokaCache;
use moka::Expiry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const RECOMMENDED_FARMERS_KEY: &str = "dashboard:recommended-farmers";
pub const RECOMMENDED_FARMERS_TTL: Duration = Duration::from_secs(5 * 60);
pub const RECENTLY_VIEWED_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub fn recently_viewed_key(user_id: Uuid) -> String {
    format!("user:{}:recently-viewed", user_id)
}

/// Entry of a user's recently viewed list, most recent first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentView {
    pub listing_id: Uuid,
    pub viewed_at: DateTime<Utc>,
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    /// Store without expiry (capacity eviction only)
    async fn set(&self, key: &str, value: String);
    async fn set_with_expiry(&self, key: &str, value: String, ttl: Duration);
    async fn delete(&self, key: &str);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    ttl: Option<Duration>,
}

struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

/// moka-backed cache
#[derive(Clone)]
pub struct MemoryCache {
    inner: MokaCache<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: MokaCache::builder()
                .max_capacity(max_capacity)
                .expire_after(EntryExpiry)
                .build(),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    async fn set(&self, key: &str, value: String) {
        self.inner
            .insert(key.to_string(), CacheEntry { value, ttl: None })
            .await;
    }

    async fn set_with_expiry(&self, key: &str, value: String, ttl: Duration) {
        self.inner
            .insert(
                key.to_string(),
                CacheEntry {
                    value,
                    ttl: Some(ttl),
                },
            )
            .await;
    }

    async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

/// Read a JSON value; undecodable entries count as a miss
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let raw = cache.get(key).await?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(key = %key, error = %e, "Discarding undecodable cache entry");
            cache.delete(key).await;
            None
        }
    }
}

pub async fn set_json<T: Serialize + ?Sized>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_string(value) {
        Ok(raw) => cache.set_with_expiry(key, raw, ttl).await,
        Err(e) => tracing::warn!(key = %key, error = %e, "Failed to encode cache entry"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new(100);
        assert_eq!(cache.get("k").await, None);

        cache.set("k", "v".to_string()).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));

        cache.delete("k").await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let cache = MemoryCache::new(100);
        cache
            .set_with_expiry("short", "v".to_string(), Duration::from_millis(50))
            .await;
        assert!(cache.get("short").await.is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.get("short").await, None);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let cache = MemoryCache::new(100);
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        set_json(&cache, "ids", &ids, Duration::from_secs(60)).await;
        let back: Vec<Uuid> = get_json(&cache, "ids").await.unwrap();
        assert_eq!(back, ids);

        cache.set("broken", "{not json".to_string()).await;
        assert_eq!(get_json::<Vec<Uuid>>(&cache, "broken").await, None);
        assert_eq!(cache.get("broken").await, None);
    }
}

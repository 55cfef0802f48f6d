//! Key-value cache with per-entry TTL, used for pending OTPs and their
//! failed-attempt counters.

use async_trait::async_trait;
use moka::{future::Cache as MokaStore, Expiry};
use std::time::{Duration, Instant};

#[async_trait]
pub trait Cache: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration);
    /// Stores `value` only when `key` holds nothing live. `false` when an
    /// entry was already present.
    async fn insert_if_absent(&self, key: &str, value: &str, ttl: Duration) -> bool;
    /// `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> Option<String>;
    /// Atomically bumps a numeric counter and returns the new count. A fresh
    /// or non-numeric entry counts from zero.
    async fn incr(&self, key: &str, ttl: Duration) -> u64;
    async fn remove(&self, key: &str);
}

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // overwriting a key restarts its clock
        Some(entry.ttl)
    }
}

/// In-process cache backed by moka.
pub struct MokaCache {
    store: MokaStore<String, Entry>,
}

impl MokaCache {
    pub fn new(max_entries: u64) -> Self {
        let store = MokaStore::builder().max_capacity(max_entries).expire_after(EntryExpiry).build();
        Self { store }
    }
}

#[async_trait]
impl Cache for MokaCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        self.store.insert(key.to_string(), Entry { value: value.to_string(), ttl }).await;
    }

    async fn insert_if_absent(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let entry = Entry { value: value.to_string(), ttl };
        self.store.entry(key.to_string()).or_insert_with(async move { entry }).await.is_fresh()
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.store.get(key).await.map(|entry| entry.value)
    }

    async fn incr(&self, key: &str, ttl: Duration) -> u64 {
        let entry = self
            .store
            .entry(key.to_string())
            .and_upsert_with(|current| {
                let count = current.and_then(|c| c.into_value().value.parse::<u64>().ok()).unwrap_or(0);
                std::future::ready(Entry { value: (count + 1).to_string(), ttl })
            })
            .await;
        entry.into_value().value.parse().unwrap_or(1)
    }

    async fn remove(&self, key: &str) {
        self.store.invalidate(key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_when_no_entry_exists() {
        let cache = MokaCache::new(100);
        assert!(cache.get("otp-nobody@example.com").await.is_none());
    }

    #[tokio::test]
    async fn hit_after_set_and_gone_after_remove() {
        let cache = MokaCache::new(100);
        cache.set("otp-a@b.c", "123456", Duration::from_secs(60)).await;
        assert_eq!(cache.get("otp-a@b.c").await.as_deref(), Some("123456"));

        cache.remove("otp-a@b.c").await;
        assert!(cache.get("otp-a@b.c").await.is_none());
    }

    #[tokio::test]
    async fn insert_if_absent_keeps_the_first_value() {
        let cache = MokaCache::new(100);
        assert!(cache.insert_if_absent("otp-a@b.c", "111111", Duration::from_secs(60)).await);
        assert!(!cache.insert_if_absent("otp-a@b.c", "222222", Duration::from_secs(60)).await);
        assert_eq!(cache.get("otp-a@b.c").await.as_deref(), Some("111111"));

        cache.remove("otp-a@b.c").await;
        assert!(cache.insert_if_absent("otp-a@b.c", "333333", Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn incr_counts_from_one() {
        let cache = MokaCache::new(100);
        let ttl = Duration::from_secs(60);
        assert_eq!(cache.incr("attempts", ttl).await, 1);
        assert_eq!(cache.incr("attempts", ttl).await, 2);
        assert_eq!(cache.incr("attempts", ttl).await, 3);

        cache.set("garbage", "x", ttl).await;
        assert_eq!(cache.incr("garbage", ttl).await, 1);
    }

    #[tokio::test]
    async fn entries_expire_individually() {
        let cache = MokaCache::new(100);
        cache.set("short", "1", Duration::from_millis(200)).await;
        cache.set("long", "2", Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(cache.get("short").await.is_none());
        assert_eq!(cache.get("long").await.as_deref(), Some("2"));
    }
}

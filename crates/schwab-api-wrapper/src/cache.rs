//! In-memory response cache for market data GETs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Cache behaviour for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Serve a fresh entry when present, otherwise fetch and store.
    #[default]
    Use,
    /// Always fetch, then overwrite the entry.
    Refresh,
    /// Always fetch; neither read nor write the cache.
    Bypass,
}

impl CacheMode {
    pub const fn reads(self) -> bool {
        matches!(self, Self::Use)
    }

    pub const fn writes(self) -> bool {
        matches!(self, Self::Use | Self::Refresh)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    expires_at: Instant,
}

/// Hit/miss counters since the cache was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub const DEFAULT_MAX_ENTRIES: usize = 512;

/// Thread-safe TTL cache keyed by request URL. Clones share entries.
///
/// Holds at most `max_entries`. A full cache first drops expired entries,
/// then the one closest to expiry.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    max_entries: usize,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Arc::default(),
            hits: Arc::default(),
            misses: Arc::default(),
            max_entries: max_entries.max(1),
        }
    }

    /// Returns the body when an unexpired entry exists.
    pub async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        let body = entries
            .get(key)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.body.clone());

        let counter = if body.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        body
    }

    /// Stores `body` for `ttl`. A zero TTL stores nothing.
    pub async fn put(&self, key: impl Into<String>, body: impl Into<String>, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let key = key.into();
        let now = Instant::now();
        let entry = CacheEntry {
            body: body.into(),
            expires_at: now + ttl,
        };

        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.max_entries {
                let soonest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(key, _)| key.clone());
                if let Some(soonest) = soonest {
                    entries.remove(&soonest);
                }
            }
        }
        entries.insert(key, entry);
    }

    /// Drops every entry whose key starts with `prefix`; returns how many.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().await.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_fresh_entries_and_counts_hits() {
        let cache = ResponseCache::new();

        assert!(cache.get("quotes?symbols=AAPL").await.is_none());
        cache
            .put("quotes?symbols=AAPL", "{}", Duration::from_secs(1))
            .await;
        assert_eq!(cache.get("quotes?symbols=AAPL").await.as_deref(), Some("{}"));

        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[tokio::test]
    async fn expired_entries_miss_and_are_purged() {
        let cache = ResponseCache::new();
        cache.put("a", "1", Duration::from_millis(20)).await;
        cache.put("b", "2", Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.stats().await.entries, 1);
    }

    #[tokio::test]
    async fn zero_ttl_is_not_stored() {
        let cache = ResponseCache::new();
        cache.put("a", "1", Duration::ZERO).await;
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn invalidates_by_prefix() {
        let cache = ResponseCache::new();
        let ttl = Duration::from_secs(60);
        cache.put("https://x/marketdata/v1/quotes?symbols=AAPL", "1", ttl).await;
        cache.put("https://x/marketdata/v1/quotes?symbols=MSFT", "2", ttl).await;
        cache.put("https://x/marketdata/v1/markets?markets=equity", "3", ttl).await;

        assert_eq!(cache.invalidate_prefix("https://x/marketdata/v1/quotes").await, 2);
        assert!(cache
            .get("https://x/marketdata/v1/markets?markets=equity")
            .await
            .is_some());
    }

    #[tokio::test]
    async fn full_cache_drops_expired_entries_first() {
        let cache = ResponseCache::with_capacity(3);
        cache.put("a", "1", Duration::from_millis(10)).await;
        cache.put("b", "2", Duration::from_millis(10)).await;
        cache.put("c", "3", Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.put("d", "4", Duration::from_secs(60)).await;

        assert_eq!(cache.stats().await.entries, 2);
        assert!(cache.get("c").await.is_some());
        assert!(cache.get("d").await.is_some());
    }

    #[tokio::test]
    async fn full_cache_of_live_entries_evicts_the_soonest_to_expire() {
        let cache = ResponseCache::with_capacity(2);
        cache.put("short", "1", Duration::from_secs(5)).await;
        cache.put("long", "2", Duration::from_secs(60)).await;

        cache.put("new", "3", Duration::from_secs(30)).await;

        assert_eq!(cache.stats().await.entries, 2);
        assert!(cache.get("short").await.is_none());
        assert!(cache.get("long").await.is_some());

        // Overwriting an existing key never evicts.
        cache.put("long", "4", Duration::from_secs(60)).await;
        assert_eq!(cache.get("new").await.as_deref(), Some("3"));
    }

    #[test]
    fn modes_describe_read_and_write() {
        assert!(CacheMode::default().reads());
        assert!(CacheMode::Refresh.writes() && !CacheMode::Refresh.reads());
        assert!(!CacheMode::Bypass.writes());
    }
}

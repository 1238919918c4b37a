//! Response cache for graph queries.
//!
//! Graph responses are cached by request shape with a TTL (default 5
//! minutes). The ingestion path that records new edges calls
//! [`GraphCache::invalidate_all`]; invalidation only drops cached responses
//! and never refreshes the in-memory graph (see
//! [`GraphService::reset`](crate::GraphService::reset) for that).
//!
//! ## Cache Key Design
//!
//! `apiwatch:graph:<xxh64>` over the endpoint pattern and every request
//! parameter, so any parameter change is a miss.

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use xxhash_rust::xxh64::Xxh64;

/// Prefix shared by every graph cache key.
pub const KEY_PREFIX: &str = "apiwatch:graph:";

/// Configuration for the response cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_entries: usize,
    /// Time an entry stays valid.
    pub ttl: Duration,
    /// Whether to enable the cache.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(300),
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables.
    ///
    /// - `GRAPH_CACHE_MAX_ENTRIES` (default 10000)
    /// - `GRAPH_CACHE_TTL_SECS` (default 300)
    /// - `GRAPH_CACHE_ENABLED` (default true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: std::env::var("GRAPH_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_entries),
            ttl: std::env::var("GRAPH_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
            enabled: std::env::var("GRAPH_CACHE_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.enabled),
        }
    }
}

/// Cache key derived from an endpoint pattern and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compute the key for `endpoint` called with `params`.
    ///
    /// Parameter order matters; callers pass them in a fixed order.
    pub fn new(endpoint: &str, params: &[(&str, &str)]) -> Self {
        let mut hasher = Xxh64::new(0);
        hasher.write(endpoint.as_bytes());
        for (name, value) in params {
            hasher.write(&[0]);
            hasher.write(name.as_bytes());
            hasher.write(&[b'=']);
            hasher.write(value.as_bytes());
        }
        Self(format!("{}{:016x}", KEY_PREFIX, hasher.finish()))
    }

    /// The full key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backing store unreachable.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
    /// Value could not be serialized.
    #[error("Cache encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Key-value store for serialized graph responses.
#[async_trait]
pub trait GraphCache: Send + Sync {
    /// Fetch a live entry.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;

    /// Store an entry with the cache's TTL.
    async fn set(&self, key: &CacheKey, value: String) -> Result<(), CacheError>;

    /// Drop every graph entry. Returns how many were removed.
    async fn invalidate_all(&self) -> Result<usize, CacheError>;
}

/// Fetch and decode a cached value.
///
/// An entry that no longer decodes is treated as a miss.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn GraphCache,
    key: &CacheKey,
) -> Result<Option<T>, CacheError> {
    let Some(raw) = cache.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::debug!(key = %key, error = %e, "Discarding undecodable cache entry");
            Ok(None)
        }
    }
}

/// Encode and store a value.
pub async fn set_json<T: Serialize + ?Sized>(
    cache: &dyn GraphCache,
    key: &CacheKey,
    value: &T,
) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, raw).await
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Live entries (may include expired ones not yet evicted).
    pub entries: usize,
    /// Lookups served from cache.
    pub hits: u64,
    /// Lookups that missed or found an expired entry.
    pub misses: u64,
}

#[derive(Debug)]
struct CacheEntry {
    value: String,
    stored_at: Instant,
}

/// In-process LRU cache with per-entry TTL.
///
/// Thread-safe and suitable for use in async services.
pub struct LruGraphCache {
    config: CacheConfig,
    entries: Option<Mutex<LruCache<CacheKey, CacheEntry>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LruGraphCache {
    /// Create a new cache.
    pub fn new(config: CacheConfig) -> Self {
        let entries = if config.enabled {
            let size = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
            Some(Mutex::new(LruCache::new(size)))
        } else {
            None
        };

        Self {
            config,
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.as_ref().map(|c| c.lock().len()).unwrap_or(0),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<String> {
        let cache = self.entries.as_ref()?;
        let mut cache = cache.lock();

        let expired = match cache.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.config.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.pop(key);
        }
        None
    }
}

impl Default for LruGraphCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[async_trait]
impl GraphCache for LruGraphCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let found = self.lookup(key);
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(found)
    }

    async fn set(&self, key: &CacheKey, value: String) -> Result<(), CacheError> {
        if let Some(cache) = &self.entries {
            cache.lock().put(
                key.clone(),
                CacheEntry {
                    value,
                    stored_at: Instant::now(),
                },
            );
        }
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<usize, CacheError> {
        let removed = match &self.entries {
            Some(cache) => {
                let mut cache = cache.lock();
                let count = cache.len();
                cache.clear();
                count
            }
            None => 0,
        };
        tracing::debug!(removed, "Graph cache invalidated");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_depends_on_params() {
        let a = CacheKey::new("/api/graph/stats", &[("q", "stats")]);
        let b = CacheKey::new("/api/graph/stats", &[("q", "stats")]);
        let c = CacheKey::new("/api/graph/stats", &[("q", "other")]);
        let d = CacheKey::new("/api/graph/apis/:api_id/dependents", &[("q", "stats")]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert!(a.as_str().starts_with(KEY_PREFIX));
    }

    #[test]
    fn test_key_separates_params() {
        // "ab" + "c" must not collide with "a" + "bc".
        let a = CacheKey::new("/x", &[("ab", "c")]);
        let b = CacheKey::new("/x", &[("a", "bc")]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = LruGraphCache::default();
        let key = CacheKey::new("/api/graph/stats", &[]);

        assert!(cache.get(&key).await.unwrap().is_none());
        cache.set(&key, "{}".to_string()).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("{}"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_expired_entries_miss() {
        let cache = LruGraphCache::new(CacheConfig {
            ttl: Duration::from_millis(20),
            ..CacheConfig::default()
        });
        let key = CacheKey::new("/api/graph/stats", &[]);
        cache.set(&key, "1".to_string()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cache.get(&key).await.unwrap().is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = LruGraphCache::default();
        for i in 0..3 {
            let key = CacheKey::new("/api/graph/apis/:api_id/dependents", &[("api_id", &i.to_string())]);
            cache.set(&key, "[]".to_string()).await.unwrap();
        }

        assert_eq!(cache.invalidate_all().await.unwrap(), 3);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits() {
        let cache = LruGraphCache::new(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });
        let key = CacheKey::new("/api/graph/stats", &[]);
        cache.set(&key, "1".to_string()).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let cache = LruGraphCache::default();
        let key = CacheKey::new("/api/graph/critical-path", &[]);

        set_json(&cache, &key, &vec!["a", "b"]).await.unwrap();
        let value: Option<Vec<String>> = get_json(&cache, &key).await.unwrap();
        assert_eq!(value, Some(vec!["a".to_string(), "b".to_string()]));

        cache.set(&key, "not json".to_string()).await.unwrap();
        let value: Option<Vec<String>> = get_json(&cache, &key).await.unwrap();
        assert!(value.is_none());
    }
}

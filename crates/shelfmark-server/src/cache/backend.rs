//! Cache backend with local (DashMap) and Redis variants.
//!
//! Every operation is best-effort: a backend failure degrades to a cache
//! miss or no-op, logged at `warn`, never an error to the caller. The
//! relational store stays the source of truth with the cache entirely
//! disabled.

use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cached entry with TTL support.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Vec<u8>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    /// Create a new cached entry.
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this entry has expired.
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Cache backend.
///
/// ## Modes
///
/// - **Local**: Single-instance mode using only DashMap. Also the test
///   backend.
/// - **Redis**: Shared store for multi-instance deployments.
#[derive(Clone)]
pub enum CacheBackend {
    /// Single-instance: local DashMap only
    Local(Arc<DashMap<String, CachedEntry>>),

    /// Multi-instance: Redis pool
    Redis(Pool),
}

impl CacheBackend {
    /// Create a new local-only cache backend.
    pub fn new_local() -> Self {
        CacheBackend::Local(Arc::new(DashMap::new()))
    }

    /// Create a new Redis-backed cache backend.
    pub fn new_redis(redis_pool: Pool) -> Self {
        CacheBackend::Redis(redis_pool)
    }

    /// Get a value from the cache. Backend errors read as a miss.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self {
            CacheBackend::Local(map) => {
                if let Some(entry) = map.get(key) {
                    if !entry.is_expired() {
                        return Some(entry.data.clone());
                    }
                    drop(entry);
                    map.remove(key);
                }
                None
            }
            CacheBackend::Redis(redis) => match redis.get().await {
                Ok(mut conn) => match conn.get::<_, Option<Vec<u8>>>(key).await {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Redis GET error");
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to get Redis connection");
                    None
                }
            },
        }
    }

    /// Set a value in the cache with TTL. Backend errors are a no-op.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        match self {
            CacheBackend::Local(map) => {
                map.insert(key.to_string(), CachedEntry::new(value, ttl));
            }
            CacheBackend::Redis(redis) => match redis.get().await {
                Ok(mut conn) => {
                    if let Err(e) = conn
                        .set_ex::<_, _, ()>(key, value, ttl.as_secs())
                        .await
                    {
                        tracing::warn!(key = %key, error = %e, "Redis SET error");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to get Redis connection");
                }
            },
        }
    }

    /// Delete a cache entry. Returns whether an entry was removed; backend
    /// errors read as `false`.
    pub async fn delete(&self, key: &str) -> bool {
        match self {
            CacheBackend::Local(map) => map.remove(key).is_some(),
            CacheBackend::Redis(redis) => match redis.get().await {
                Ok(mut conn) => match conn.del::<_, u64>(key).await {
                    Ok(n) => n > 0,
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Redis DEL error");
                        false
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to get Redis connection");
                    false
                }
            },
        }
    }

    /// Delete every key matching a glob pattern (`*` wildcards only).
    ///
    /// Returns the number of entries removed. Exact list keys are
    /// unenumerable from the outside, so invalidation after writes goes
    /// through here.
    pub async fn delete_by_pattern(&self, pattern: &str) -> u64 {
        match self {
            CacheBackend::Local(map) => {
                let Some(re) = glob_to_regex(pattern) else {
                    tracing::warn!(pattern = %pattern, "Invalid cache pattern");
                    return 0;
                };
                let mut removed = 0u64;
                map.retain(|k, _| {
                    if re.is_match(k) {
                        removed += 1;
                        false
                    } else {
                        true
                    }
                });
                removed
            }
            CacheBackend::Redis(redis) => {
                let mut conn = match redis.get().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to get Redis connection");
                        return 0;
                    }
                };
                let mut keys: Vec<String> = Vec::new();
                let mut cursor: u64 = 0;
                loop {
                    let (next, batch): (u64, Vec<String>) = match redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(100)
                        .query_async(&mut *conn)
                        .await
                    {
                        Ok(reply) => reply,
                        Err(e) => {
                            tracing::warn!(pattern = %pattern, error = %e, "Redis SCAN error");
                            return 0;
                        }
                    };
                    keys.extend(batch);
                    cursor = next;
                    if cursor == 0 {
                        break;
                    }
                }
                if keys.is_empty() {
                    return 0;
                }
                match conn.del::<_, u64>(keys).await {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::warn!(pattern = %pattern, error = %e, "Redis DEL error");
                        0
                    }
                }
            }
        }
    }

    /// Check whether a key exists. Backend errors read as `false`.
    pub async fn exists(&self, key: &str) -> bool {
        match self {
            CacheBackend::Local(map) => map
                .get(key)
                .map(|entry| !entry.is_expired())
                .unwrap_or(false),
            CacheBackend::Redis(redis) => match redis.get().await {
                Ok(mut conn) => match conn.exists::<_, bool>(key).await {
                    Ok(exists) => exists,
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Redis EXISTS error");
                        false
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to get Redis connection");
                    false
                }
            },
        }
    }

    /// Atomically increment a counter, returning the new value.
    ///
    /// The TTL is applied only on the increment that creates the key
    /// (0 -> 1), so later hits never extend the window. Backend errors
    /// read as `None`.
    pub async fn increment(&self, key: &str, window: Duration) -> Option<i64> {
        match self {
            CacheBackend::Local(map) => {
                let mut entry = map
                    .entry(key.to_string())
                    .or_insert_with(|| CachedEntry::new(b"0".to_vec(), window));
                if entry.is_expired() {
                    *entry.value_mut() = CachedEntry::new(b"0".to_vec(), window);
                }
                let current: i64 = std::str::from_utf8(&entry.data)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                let next = current + 1;
                entry.value_mut().data = next.to_string().into_bytes();
                Some(next)
            }
            CacheBackend::Redis(redis) => match redis.get().await {
                Ok(mut conn) => match conn.incr::<_, _, i64>(key, 1).await {
                    Ok(count) => {
                        if count == 1
                            && let Err(e) =
                                conn.expire::<_, ()>(key, window.as_secs() as i64).await
                        {
                            tracing::warn!(key = %key, error = %e, "Redis EXPIRE error");
                        }
                        Some(count)
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Redis INCR error");
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to get Redis connection");
                    None
                }
            },
        }
    }

    /// Get and deserialize a cached JSON value. Deserialization failures
    /// read as a miss (the entry is dropped).
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Dropping undecodable cache entry");
                self.delete(key).await;
                None
            }
        }
    }

    /// Serialize and cache a JSON value. Serialization failures are a
    /// no-op.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set(key, bytes, ttl).await,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache serialization failed");
            }
        }
    }

    /// Check if the backend is reachable (for health checks).
    pub async fn ping(&self) -> bool {
        match self {
            CacheBackend::Local(_) => true,
            CacheBackend::Redis(redis) => redis.get().await.is_ok(),
        }
    }
}

/// Translates a `*`-wildcard glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> Option<regex::Regex> {
    let escaped = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    regex::Regex::new(&format!("^{escaped}$")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let cache = CacheBackend::new_local();
        cache
            .set("book:1", b"payload".to_vec(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("book:1").await.unwrap(), b"payload");
        assert!(cache.exists("book:1").await);
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_miss() {
        let cache = CacheBackend::new_local();
        cache
            .set("book:1", b"payload".to_vec(), Duration::from_millis(10))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("book:1").await.is_none());
        assert!(!cache.exists("book:1").await);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = CacheBackend::new_local();
        cache
            .set("book:1", b"payload".to_vec(), Duration::from_secs(60))
            .await;
        assert!(cache.delete("book:1").await);
        assert!(!cache.delete("book:1").await);
        assert!(cache.get("book:1").await.is_none());
    }

    #[tokio::test]
    async fn test_delete_by_pattern() {
        let cache = CacheBackend::new_local();
        for key in ["books:list:p=1", "books:list:p=2", "book:1", "stats:books"] {
            cache
                .set(key, b"x".to_vec(), Duration::from_secs(60))
                .await;
        }
        let removed = cache.delete_by_pattern("books:list:*").await;
        assert_eq!(removed, 2);
        assert!(cache.get("book:1").await.is_some());
        assert!(cache.get("stats:books").await.is_some());
        assert!(cache.get("books:list:p=1").await.is_none());
    }

    #[tokio::test]
    async fn test_pattern_is_anchored() {
        let cache = CacheBackend::new_local();
        cache
            .set("user:1", b"x".to_vec(), Duration::from_secs(60))
            .await;
        cache
            .set("user_sessions:1", b"x".to_vec(), Duration::from_secs(60))
            .await;
        let removed = cache.delete_by_pattern("user:*").await;
        assert_eq!(removed, 1);
        assert!(cache.get("user_sessions:1").await.is_some());
    }

    #[tokio::test]
    async fn test_increment_counts_up() {
        let cache = CacheBackend::new_local();
        for expected in 1..=5 {
            let n = cache
                .increment("ratelimit:1.2.3.4", Duration::from_secs(60))
                .await
                .unwrap();
            assert_eq!(n, expected);
        }
    }

    #[tokio::test]
    async fn test_increment_window_resets_after_expiry() {
        let cache = CacheBackend::new_local();
        let window = Duration::from_millis(20);
        assert_eq!(cache.increment("rl", window).await.unwrap(), 1);
        assert_eq!(cache.increment("rl", window).await.unwrap(), 2);

        tokio::time::sleep(Duration::from_millis(30)).await;
        // The window elapsed past the first increment; counter resets.
        assert_eq!(cache.increment("rl", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_increment_does_not_extend_window() {
        let cache = CacheBackend::new_local();
        let window = Duration::from_millis(50);
        cache.increment("rl", window).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Mid-window increments keep the original deadline.
        cache.increment("rl", window).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.increment("rl", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let cache = CacheBackend::new_local();
        cache
            .set_json("user:1", &vec!["a".to_string()], Duration::from_secs(60))
            .await;
        let value: Vec<String> = cache.get_json("user:1").await.unwrap();
        assert_eq!(value, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_undecodable_json_dropped() {
        let cache = CacheBackend::new_local();
        cache
            .set("user:1", b"not json".to_vec(), Duration::from_secs(60))
            .await;
        let value: Option<Vec<String>> = cache.get_json("user:1").await;
        assert!(value.is_none());
        assert!(cache.get("user:1").await.is_none());
    }

    #[tokio::test]
    async fn test_local_ping() {
        assert!(CacheBackend::new_local().ping().await);
    }
}

//! Precedent-Cache: the shared cache capability.
//!
//! Everything process-wide in the engine (reasoner plan cache, circuit
//! breaker state, rate buckets, distributed locks, stale-response recall)
//! goes through this small interface, so a distributed KV backend maps
//! directly. The bundled implementation is in-memory with sharded mutexes
//! and TTL expiry.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The shared cache capability.
///
/// Values are JSON; counters are monotonic within their TTL window; locks
/// are owner-tagged and released only by their owner.
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Reads a JSON value, honouring TTL.
    async fn get_json(&self, key: &str) -> Option<serde_json::Value>;

    /// Writes a JSON value with a TTL in seconds.
    async fn set_json(&self, key: &str, value: serde_json::Value, ttl_sec: u64);

    /// Increments a windowed counter and returns the new count.
    async fn increment(&self, key: &str, ttl_sec: u64) -> i64;

    /// Tries to take an owner-tagged lock; true on success.
    async fn acquire_lock(&self, key: &str, owner: &str, ttl_sec: u64) -> bool;

    /// Releases a lock if (and only if) `owner` still holds it.
    async fn release_lock(&self, key: &str, owner: &str);
}

/// Reads and deserializes a typed value.
pub async fn get_typed<T: DeserializeOwned>(cache: &dyn SharedCache, key: &str) -> Option<T> {
    let value = cache.get_json(key).await?;
    match serde_json::from_value(value) {
        Ok(typed) => Some(typed),
        Err(error) => {
            tracing::warn!(%key, %error, "cache entry failed to deserialize, treating as miss");
            None
        }
    }
}

/// Serializes and writes a typed value.
pub async fn set_typed<T: Serialize>(cache: &dyn SharedCache, key: &str, value: &T, ttl_sec: u64) {
    match serde_json::to_value(value) {
        Ok(json) => cache.set_json(key, json, ttl_sec).await,
        Err(error) => tracing::warn!(%key, %error, "value failed to serialize, skipping cache write"),
    }
}

enum Slot {
    Json(serde_json::Value),
    Counter(i64),
    Lock(String),
}

struct Entry {
    slot: Slot,
    expires_at: Instant,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

const SHARD_COUNT: usize = 16;
const SHARD_CAPACITY: usize = 4096;

/// In-memory [`SharedCache`] with sharded mutexes.
///
/// Locks are never held across an await point. Expired entries are dropped
/// lazily on access; a shard past capacity evicts its soonest-expiring
/// entries first.
pub struct MemoryCache {
    shards: Vec<Mutex<HashMap<String, Entry>>>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, Entry>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    fn with_shard<R>(&self, key: &str, f: impl FnOnce(&mut HashMap<String, Entry>) -> R) -> R {
        let mut guard = match self.shard(key).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        guard.retain(|_, entry| !entry.expired(now));
        if guard.len() > SHARD_CAPACITY {
            let mut expiries: Vec<(String, Instant)> = guard
                .iter()
                .map(|(k, e)| (k.clone(), e.expires_at))
                .collect();
            expiries.sort_by_key(|(_, at)| *at);
            for (key, _) in expiries.into_iter().take(guard.len() - SHARD_CAPACITY) {
                guard.remove(&key);
            }
        }
        f(&mut guard)
    }
}

#[async_trait]
impl SharedCache for MemoryCache {
    async fn get_json(&self, key: &str) -> Option<serde_json::Value> {
        self.with_shard(key, |map| match map.get(key) {
            Some(Entry {
                slot: Slot::Json(value),
                ..
            }) => Some(value.clone()),
            _ => None,
        })
    }

    async fn set_json(&self, key: &str, value: serde_json::Value, ttl_sec: u64) {
        let expires_at = Instant::now() + Duration::from_secs(ttl_sec);
        self.with_shard(key, |map| {
            map.insert(
                key.to_string(),
                Entry {
                    slot: Slot::Json(value),
                    expires_at,
                },
            );
        });
    }

    async fn increment(&self, key: &str, ttl_sec: u64) -> i64 {
        let expires_at = Instant::now() + Duration::from_secs(ttl_sec);
        self.with_shard(key, |map| match map.get_mut(key) {
            Some(Entry {
                slot: Slot::Counter(count),
                ..
            }) => {
                *count += 1;
                *count
            }
            _ => {
                map.insert(
                    key.to_string(),
                    Entry {
                        slot: Slot::Counter(1),
                        expires_at,
                    },
                );
                1
            }
        })
    }

    async fn acquire_lock(&self, key: &str, owner: &str, ttl_sec: u64) -> bool {
        let expires_at = Instant::now() + Duration::from_secs(ttl_sec);
        self.with_shard(key, |map| match map.get(key) {
            Some(Entry {
                slot: Slot::Lock(_),
                ..
            }) => false,
            _ => {
                map.insert(
                    key.to_string(),
                    Entry {
                        slot: Slot::Lock(owner.to_string()),
                        expires_at,
                    },
                );
                true
            }
        })
    }

    async fn release_lock(&self, key: &str, owner: &str) {
        self.with_shard(key, |map| {
            if let Some(Entry {
                slot: Slot::Lock(holder),
                ..
            }) = map.get(key)
            {
                if holder == owner {
                    map.remove(key);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_roundtrip() {
        let cache = MemoryCache::new();
        cache
            .set_json("k", serde_json::json!({"a": 1}), 60)
            .await;
        assert_eq!(
            cache.get_json("k").await,
            Some(serde_json::json!({"a": 1}))
        );
        assert_eq!(cache.get_json("missing").await, None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = MemoryCache::new();
        cache.set_json("k", serde_json::json!(1), 0).await;
        assert_eq!(cache.get_json("k").await, None);
    }

    #[tokio::test]
    async fn test_counter_monotonic_within_window() {
        let cache = MemoryCache::new();
        assert_eq!(cache.increment("bucket", 60).await, 1);
        assert_eq!(cache.increment("bucket", 60).await, 2);
        assert_eq!(cache.increment("bucket", 60).await, 3);
    }

    #[tokio::test]
    async fn test_lock_mutual_exclusion() {
        let cache = MemoryCache::new();
        assert!(cache.acquire_lock("lock:x", "a", 60).await);
        assert!(!cache.acquire_lock("lock:x", "b", 60).await);
        cache.release_lock("lock:x", "b").await;
        assert!(!cache.acquire_lock("lock:x", "b", 60).await);
        cache.release_lock("lock:x", "a").await;
        assert!(cache.acquire_lock("lock:x", "b", 60).await);
    }

    #[tokio::test]
    async fn test_lock_expires() {
        let cache = MemoryCache::new();
        assert!(cache.acquire_lock("lock:x", "a", 0).await);
        assert!(cache.acquire_lock("lock:x", "b", 60).await);
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        let cache = MemoryCache::new();
        set_typed(&cache, "typed", &vec![1u32, 2, 3], 60).await;
        let back: Option<Vec<u32>> = get_typed(&cache, "typed").await;
        assert_eq!(back, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_concurrent_increments() {
        let cache = std::sync::Arc::new(MemoryCache::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    cache.increment("contended", 60).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.increment("contended", 60).await, 401);
    }
}

//! Fail-soft cache client
//!
//! The store is an accelerator, never a dependency for correctness: every
//! backend or serialization error is logged and turned into a miss or
//! `false`. Nothing returned from here is a `Result`.

use super::backend::StoreBackend;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// Remaining-TTL answer used when the store cannot be asked
pub const TTL_UNKNOWN: i64 = -1;

/// Typed, fail-soft key-value client over a [`StoreBackend`]
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn StoreBackend>,
}

impl CacheStore {
    /// Wrap a backend handle
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// The raw, fallible backend (read-only diagnostics use this)
    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    /// Read and decode a value. Absent, unreachable and corrupt all yield `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key, "Cache get failed: {}", err);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(key, "Discarding undecodable cache entry: {}", err);
                None
            }
        }
    }

    /// Encode and write a value with a TTL in seconds (`0` = no expiry)
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: u64) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, "Cache value not serializable: {}", err);
                return false;
            }
        };

        match self.backend.set(key, &raw, ttl).await {
            Ok(()) => true,
            Err(err) => {
                warn!(key, "Cache set failed: {}", err);
                false
            }
        }
    }

    /// Write only if the key is absent (`SET NX EX`)
    pub async fn set_if_absent<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: u64,
    ) -> bool {
        let Ok(raw) = serde_json::to_string(value) else {
            return false;
        };

        match self.backend.set_if_absent(key, &raw, ttl).await {
            Ok(written) => written,
            Err(err) => {
                warn!(key, "Cache set-if-absent failed: {}", err);
                false
            }
        }
    }

    /// Delete one key, returning whether it existed
    pub async fn del(&self, key: &str) -> bool {
        match self.backend.del(&[key.to_string()]).await {
            Ok(removed) => removed > 0,
            Err(err) => {
                warn!(key, "Cache delete failed: {}", err);
                false
            }
        }
    }

    /// Delete every key matching a glob, walking the keyspace with SCAN
    pub async fn del_pattern(&self, pattern: &str) -> u64 {
        const PAGE: usize = 500;

        // Collect first, delete after: deleting mid-scan would shift
        // position-based cursors.
        let mut cursor = 0u64;
        let mut matched = Vec::new();
        loop {
            match self.backend.scan(cursor, pattern, PAGE).await {
                Ok((next, keys)) => {
                    matched.extend(keys);
                    cursor = next;
                }
                Err(err) => {
                    warn!(pattern, "Cache pattern delete aborted: {}", err);
                    return 0;
                }
            }
            if cursor == 0 {
                break;
            }
        }

        matched.sort_unstable();
        matched.dedup();

        let mut removed = 0u64;
        for chunk in matched.chunks(PAGE) {
            match self.backend.del(chunk).await {
                Ok(count) => removed += count,
                Err(err) => {
                    warn!(pattern, "Cache pattern delete aborted: {}", err);
                    break;
                }
            }
        }

        debug!(pattern, removed, "Deleted keys by pattern");
        removed
    }

    /// Whether a live key exists
    pub async fn exists(&self, key: &str) -> bool {
        match self.backend.exists(key).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(key, "Cache exists failed: {}", err);
                false
            }
        }
    }

    /// Remaining TTL in seconds as reported by the store, or `-1` on error
    pub async fn ttl(&self, key: &str) -> i64 {
        match self.backend.ttl(key).await {
            Ok(ttl) => ttl,
            Err(err) => {
                warn!(key, "Cache ttl failed: {}", err);
                TTL_UNKNOWN
            }
        }
    }

    /// Whether the store answers `PING`
    pub async fn ping(&self) -> bool {
        self.backend.ping().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::memory_store::MemoryStore;
    use crate::core::backend::StoreBackend;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Quote {
        price: f64,
        symbol: String,
    }

    fn store() -> (CacheStore, MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let memory = MemoryStore::new(clock.clone());
        (CacheStore::new(Arc::new(memory.clone())), memory, clock)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (cache, _, _) = store();
        let quote = Quote {
            price: 1.25,
            symbol: "SOL".to_string(),
        };

        assert!(cache.set("price:SOL", &quote, 60).await);
        assert_eq!(cache.get::<Quote>("price:SOL").await, Some(quote));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let (cache, memory, _) = store();
        memory.set("broken", "{not json", 60).await.unwrap();

        assert_eq!(cache.get::<Quote>("broken").await, None);
    }

    #[tokio::test]
    async fn test_wrong_shape_is_a_miss() {
        let (cache, _, _) = store();
        cache.set("shape", &vec![1, 2, 3], 60).await;

        assert_eq!(cache.get::<Quote>("shape").await, None);
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades() {
        let (cache, memory, _) = store();
        cache.set("key", &1u32, 60).await;
        memory.set_available(false);

        assert_eq!(cache.get::<u32>("key").await, None);
        assert!(!cache.set("key", &2u32, 60).await);
        assert!(!cache.del("key").await);
        assert!(!cache.exists("key").await);
        assert_eq!(cache.ttl("key").await, TTL_UNKNOWN);
        assert_eq!(cache.del_pattern("*").await, 0);
        assert!(!cache.ping().await);
    }

    #[tokio::test]
    async fn test_ttl_and_expiry() {
        let (cache, _, clock) = store();
        cache.set("trending:10", &"list", 180).await;

        assert_eq!(cache.ttl("trending:10").await, 180);
        clock.advance(Duration::from_secs(181));
        assert!(!cache.exists("trending:10").await);
        assert_eq!(cache.get::<String>("trending:10").await, None);
    }

    #[tokio::test]
    async fn test_del_pattern() {
        let (cache, _, _) = store();
        for i in 0..1200 {
            cache.set(&format!("token:{i}"), &i, 60).await;
        }
        cache.set("market:20:0", &"page", 60).await;

        assert_eq!(cache.del_pattern("token:*").await, 1200);
        assert!(cache.exists("market:20:0").await);
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let (cache, _, _) = store();
        assert!(cache.set_if_absent("lock:refresh:a", &1, 30).await);
        assert!(!cache.set_if_absent("lock:refresh:a", &1, 30).await);
    }
}

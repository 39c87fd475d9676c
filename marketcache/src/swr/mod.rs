//! Stale-while-revalidate orchestration
//!
//! `get_stale_while_revalidate` answers from the cache whenever it can. An
//! entry in the final slice of its lifetime (`remaining < ttl / 20` by
//! default) is still returned immediately, and a background refresh is
//! handed to the [`RefreshScheduler`]. Only a true miss makes the caller wait
//! on the upstream fetch.

mod retry;
mod scheduler;

pub use retry::RetryPolicy;
pub use scheduler::{DeferredScheduler, RefreshScheduler, RefreshTask, TokioScheduler};

use crate::config::SwrConfig;
use crate::core::{BatchPipeline, CacheEntry, CacheStore, FetchError, RequestDeduplicator};
use crate::keys;
use futures::FutureExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

type ExtractFn<T> = Arc<dyn Fn(&T) -> Vec<Value> + Send + Sync>;
type KeyFn = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;
type TransformFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Warms per-item cache entries from a composite fetch result.
///
/// Fetching a whole list also populates each item's own key, so later
/// direct lookups hit.
pub struct BatchConfig<T> {
    extract: ExtractFn<T>,
    key_for: KeyFn,
    ttl: Option<u64>,
    transform: Option<TransformFn>,
}

impl<T> Clone for BatchConfig<T> {
    fn clone(&self) -> Self {
        Self {
            extract: Arc::clone(&self.extract),
            key_for: Arc::clone(&self.key_for),
            ttl: self.ttl,
            transform: self.transform.clone(),
        }
    }
}

impl<T> BatchConfig<T> {
    /// `extract` pulls the sub-items out of a result; `key_for` names each
    /// item's cache key (items without one are skipped).
    pub fn new<E, K>(extract: E, key_for: K) -> Self
    where
        E: Fn(&T) -> Vec<Value> + Send + Sync + 'static,
        K: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            extract: Arc::new(extract),
            key_for: Arc::new(key_for),
            ttl: None,
            transform: None,
        }
    }

    /// Per-item TTL; defaults to the parent entry's TTL
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Rewrite each item before it is cached
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    fn entries(&self, value: &T, parent_ttl: u64) -> Vec<CacheEntry<Value>> {
        let ttl = self.ttl.unwrap_or(parent_ttl);
        (self.extract)(value)
            .into_iter()
            .filter_map(|item| {
                let key = (self.key_for)(&item)?;
                let item = match &self.transform {
                    Some(transform) => transform(item),
                    None => item,
                };
                Some(CacheEntry::new(key, item, ttl))
            })
            .collect()
    }
}

/// Orchestrator counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwrStats {
    /// Fresh cache hits
    pub hits: u64,
    /// Hits inside the stale window
    pub stale_hits: u64,
    pub misses: u64,
    pub refreshes_scheduled: u64,
    pub refreshes_completed: u64,
    pub refreshes_failed: u64,
    /// Refreshes not scheduled because another holder had the lease
    pub refreshes_skipped: u64,
}

#[derive(Default)]
struct SwrCounters {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    refreshes_scheduled: AtomicU64,
    refreshes_completed: AtomicU64,
    refreshes_failed: AtomicU64,
    refreshes_skipped: AtomicU64,
}

impl SwrCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SwrStats {
        SwrStats {
            hits: self.hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refreshes_scheduled: self.refreshes_scheduled.load(Ordering::Relaxed),
            refreshes_completed: self.refreshes_completed.load(Ordering::Relaxed),
            refreshes_failed: self.refreshes_failed.load(Ordering::Relaxed),
            refreshes_skipped: self.refreshes_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Stale-while-revalidate cache front
#[derive(Clone)]
pub struct SwrCache {
    store: CacheStore,
    batch: BatchPipeline,
    scheduler: Arc<dyn RefreshScheduler>,
    retry: RetryPolicy,
    stale_divisor: u64,
    dedup: Option<Arc<RequestDeduplicator>>,
    refresh_lease_secs: Option<u64>,
    counters: Arc<SwrCounters>,
}

impl SwrCache {
    /// Default policy: stale below `ttl / 20`, three attempts, no lease
    pub fn new(store: CacheStore, scheduler: Arc<dyn RefreshScheduler>) -> Self {
        Self {
            batch: BatchPipeline::new(store.clone()),
            store,
            scheduler,
            retry: RetryPolicy::default(),
            stale_divisor: 20,
            dedup: None,
            refresh_lease_secs: None,
            counters: Arc::new(SwrCounters::default()),
        }
    }

    pub fn from_config(
        store: CacheStore,
        scheduler: Arc<dyn RefreshScheduler>,
        config: &SwrConfig,
    ) -> Self {
        Self::new(store, scheduler)
            .with_stale_divisor(config.stale_divisor)
            .with_retry_policy(config.retry.to_policy())
            .with_refresh_lease(config.refresh_lease_secs)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_stale_divisor(mut self, divisor: u64) -> Self {
        self.stale_divisor = divisor.max(1);
        self
    }

    /// Route every upstream fetch through a shared deduplicator
    pub fn with_deduplicator(mut self, dedup: Arc<RequestDeduplicator>) -> Self {
        self.dedup = Some(dedup);
        self
    }

    /// Require a `SET NX` lease before scheduling a refresh for a key
    pub fn with_refresh_lease(mut self, lease_secs: Option<u64>) -> Self {
        self.refresh_lease_secs = lease_secs.filter(|secs| *secs > 0);
        self
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn batch(&self) -> &BatchPipeline {
        &self.batch
    }

    pub fn deduplicator(&self) -> Option<&Arc<RequestDeduplicator>> {
        self.dedup.as_ref()
    }

    pub fn stats(&self) -> SwrStats {
        self.counters.snapshot()
    }

    /// Whether a hit with `remaining` seconds left should trigger a refresh
    pub fn is_stale(&self, remaining: i64, ttl: u64) -> bool {
        remaining > 0 && (remaining as f64) < ttl as f64 / self.stale_divisor as f64
    }

    /// Serve `key` from cache, refreshing in the background near expiry, or
    /// fetch synchronously on a miss.
    ///
    /// Only the miss path can return an error; a hit always returns the
    /// cached value.
    pub async fn get_stale_while_revalidate<T, F, Fut>(
        &self,
        key: &str,
        ttl: u64,
        fetch: F,
        batch: Option<BatchConfig<T>>,
    ) -> Result<T, FetchError>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        if let Some(cached) = self.store.get::<T>(key).await {
            let remaining = self.store.ttl(key).await;

            if self.is_stale(remaining, ttl) {
                SwrCounters::bump(&self.counters.stale_hits);
                debug!(key, remaining, ttl, "Stale hit, scheduling refresh");
                self.schedule_refresh(key, ttl, fetch, batch).await;
            } else {
                SwrCounters::bump(&self.counters.hits);
                debug!(key, remaining, "Cache hit");
            }
            return Ok(cached);
        }

        SwrCounters::bump(&self.counters.misses);
        debug!(key, "Cache miss, fetching");

        let value = self.fetch_once(key, &fetch).await?;
        self.write_through(key, ttl, &value, batch.as_ref()).await;
        Ok(value)
    }

    /// Drop a key so the next read takes the miss path
    pub async fn invalidate(&self, key: &str) -> bool {
        self.store.del(key).await
    }

    async fn schedule_refresh<T, F, Fut>(
        &self,
        key: &str,
        ttl: u64,
        fetch: F,
        batch: Option<BatchConfig<T>>,
    ) where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let lease_key = match self.refresh_lease_secs {
            Some(lease_secs) => {
                let lease_key = keys::refresh_lease(key);
                if !self.store.set_if_absent(&lease_key, &1u8, lease_secs).await {
                    SwrCounters::bump(&self.counters.refreshes_skipped);
                    debug!(key, "Refresh already leased elsewhere");
                    return;
                }
                Some(lease_key)
            }
            None => None,
        };

        SwrCounters::bump(&self.counters.refreshes_scheduled);

        let this = self.clone();
        let key = key.to_string();
        let task = async move {
            this.refresh(&key, ttl, &fetch, batch.as_ref()).await;
            if let Some(lease_key) = lease_key {
                this.store.del(&lease_key).await;
            }
        };
        self.scheduler.schedule(task.boxed());
    }

    async fn refresh<T, F, Fut>(&self, key: &str, ttl: u64, fetch: &F, batch: Option<&BatchConfig<T>>)
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        match self.retry.run(key, move || self.fetch_once(key, fetch)).await {
            Ok(value) => {
                self.write_through(key, ttl, &value, batch).await;
                SwrCounters::bump(&self.counters.refreshes_completed);
                info!(key, "Background refresh stored");
            }
            Err(err) => {
                SwrCounters::bump(&self.counters.refreshes_failed);
                warn!(key, "Background refresh failed: {}", err);
            }
        }
    }

    async fn fetch_once<T, F, Fut>(&self, key: &str, fetch: &F) -> Result<T, FetchError>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        match &self.dedup {
            Some(dedup) => dedup.run(key, fetch).await,
            None => fetch().await,
        }
    }

    async fn write_through<T: Serialize>(
        &self,
        key: &str,
        ttl: u64,
        value: &T,
        batch: Option<&BatchConfig<T>>,
    ) {
        self.store.set(key, value, ttl).await;

        if let Some(batch) = batch {
            let entries = batch.entries(value, ttl);
            if !entries.is_empty() {
                debug!(key, items = entries.len(), "Warming item entries");
                self.batch.set_many(&entries).await;
            }
        }
    }
}

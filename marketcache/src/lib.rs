pub mod config;
pub mod core;
pub mod keys;
pub mod monitoring;
pub mod protocol;
pub mod swr;
pub mod token;

// Re-export commonly used types
pub use config::{CacheConfig, LoggingConfig, MonitorConfig, StoreConfig, SwrConfig, TtlConfig};
pub use crate::core::{
    BatchPipeline, CacheEntry, CacheStore, Clock, DedupStats, FetchError, ManualClock, MemoryStore,
    RedisStore, RequestDeduplicator, StoreBackend, StoreError, StoreResult, SystemClock,
};
pub use monitoring::{CacheMonitor, CacheStats, MemoryInfo};
pub use protocol::{Protocol, ProtocolCache, ProtocolFeed};
pub use swr::{
    BatchConfig, DeferredScheduler, RefreshScheduler, RetryPolicy, SwrCache, SwrStats,
    TokioScheduler,
};
pub use token::{
    DataSource, FeedSource, ListFeed, MarketPage, OverviewFeed, TokenCache, TokenData,
    TokenListPage, UnifiedTokenRecord,
};

use std::sync::Arc;

/// Fully wired cache: one store handle, one deduplicator and one
/// orchestrator shared by every cache family.
#[derive(Clone)]
pub struct MarketCache {
    config: CacheConfig,
    store: CacheStore,
    swr: SwrCache,
    dedup: Arc<RequestDeduplicator>,
    clock: Arc<dyn Clock>,
}

impl MarketCache {
    /// Wire every component over `backend`
    pub fn new(
        config: CacheConfig,
        backend: Arc<dyn StoreBackend>,
        scheduler: Arc<dyn RefreshScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = CacheStore::new(backend);
        let dedup = Arc::new(RequestDeduplicator::new());
        let swr = SwrCache::from_config(store.clone(), scheduler, &config.swr)
            .with_deduplicator(Arc::clone(&dedup));

        Self {
            config,
            store,
            swr,
            dedup,
            clock,
        }
    }

    /// Redis-backed cache with tokio background refreshes. The connection
    /// is opened on first use.
    pub fn connect(config: CacheConfig) -> StoreResult<Self> {
        let backend = RedisStore::new(config.store.clone())?;
        Ok(Self::new(
            config,
            Arc::new(backend),
            Arc::new(TokioScheduler),
            Arc::new(SystemClock),
        ))
    }

    /// In-process cache, used by tests and local tooling
    pub fn in_memory(
        config: CacheConfig,
        scheduler: Arc<dyn RefreshScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let backend = MemoryStore::new(Arc::clone(&clock));
        Self::new(config, Arc::new(backend), scheduler, clock)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn swr(&self) -> &SwrCache {
        &self.swr
    }

    pub fn deduplicator(&self) -> &Arc<RequestDeduplicator> {
        &self.dedup
    }

    pub fn tokens(
        &self,
        list_feed: Arc<dyn ListFeed>,
        overview_feed: Arc<dyn OverviewFeed>,
    ) -> TokenCache {
        TokenCache::new(
            self.swr.clone(),
            list_feed,
            overview_feed,
            Arc::clone(&self.clock),
        )
        .with_ttl(self.config.ttl.clone())
    }

    pub fn protocols(&self, feed: Arc<dyn ProtocolFeed>) -> ProtocolCache {
        ProtocolCache::new(self.swr.clone(), feed).with_ttl(self.config.ttl.protocol)
    }

    pub fn monitor(&self) -> CacheMonitor {
        CacheMonitor::new(self.store.clone())
            .with_deduplicator(Arc::clone(&self.dedup))
            .with_swr(self.swr.clone())
            .with_clock(Arc::clone(&self.clock))
            .with_config(self.config.monitor.clone())
    }
}

//! Cache diagnostics
//!
//! Point-in-time snapshot of the store:
//! - total key count (`DBSIZE`)
//! - key distribution by namespace, sampled with a bounded `SCAN`
//! - memory usage (`INFO memory`)
//! - deduplicator and orchestrator counters

mod info;

pub use info::{MemoryInfo, format_bytes, parse_fields};

use crate::config::MonitorConfig;
use crate::core::{CacheStore, Clock, DedupStats, RequestDeduplicator, SystemClock};
use crate::keys;
use crate::swr::{SwrCache, SwrStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Snapshot returned by [`CacheMonitor::get_cache_stats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub connected: bool,
    pub total_keys: u64,
    /// Namespace prefix to sampled key count
    pub key_distribution: BTreeMap<String, u64>,
    pub sampled_keys: u64,
    /// Whether the sample walked the whole keyspace
    pub sample_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup: Option<DedupStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swr: Option<SwrStats>,
    pub timestamp: DateTime<Utc>,
}

impl CacheStats {
    /// Snapshot for an unreachable store
    pub fn disconnected(timestamp: DateTime<Utc>) -> Self {
        Self {
            connected: false,
            total_keys: 0,
            key_distribution: BTreeMap::new(),
            sampled_keys: 0,
            sample_complete: false,
            memory: None,
            dedup: None,
            swr: None,
            timestamp,
        }
    }
}

/// Read-only, best-effort store inspector
#[derive(Clone)]
pub struct CacheMonitor {
    store: CacheStore,
    dedup: Option<Arc<RequestDeduplicator>>,
    swr: Option<SwrCache>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
}

impl CacheMonitor {
    pub fn new(store: CacheStore) -> Self {
        Self {
            store,
            dedup: None,
            swr: None,
            clock: Arc::new(SystemClock),
            config: MonitorConfig::default(),
        }
    }

    pub fn with_deduplicator(mut self, dedup: Arc<RequestDeduplicator>) -> Self {
        self.dedup = Some(dedup);
        self
    }

    pub fn with_swr(mut self, swr: SwrCache) -> Self {
        self.swr = Some(swr);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Collect a snapshot. Never fails: an unreachable store yields
    /// [`CacheStats::disconnected`].
    pub async fn get_cache_stats(&self) -> CacheStats {
        let timestamp = self.clock.now();
        let backend = self.store.backend();

        let total_keys = match backend.dbsize().await {
            Ok(count) => count,
            Err(err) => {
                warn!("Cache stats unavailable: {}", err);
                let mut stats = CacheStats::disconnected(timestamp);
                stats.dedup = self.dedup_stats();
                stats.swr = self.swr.as_ref().map(SwrCache::stats);
                return stats;
            }
        };

        let (key_distribution, sampled_keys, sample_complete) = self.sample_keys().await;

        let memory = match backend.info("memory").await {
            Ok(raw) => MemoryInfo::parse(&raw),
            Err(err) => {
                warn!("INFO memory failed: {}", err);
                None
            }
        };

        CacheStats {
            connected: true,
            total_keys,
            key_distribution,
            sampled_keys,
            sample_complete,
            memory,
            dedup: self.dedup_stats(),
            swr: self.swr.as_ref().map(SwrCache::stats),
            timestamp,
        }
    }

    fn dedup_stats(&self) -> Option<DedupStats> {
        self.dedup
            .as_ref()
            .or_else(|| self.swr.as_ref().and_then(SwrCache::deduplicator))
            .map(|dedup| dedup.stats())
    }

    /// Walk at most `scan_budget` SCAN pages and bucket keys by namespace
    async fn sample_keys(&self) -> (BTreeMap<String, u64>, u64, bool) {
        let backend = self.store.backend();
        let mut distribution: BTreeMap<String, u64> = BTreeMap::new();
        let mut sampled = 0u64;
        let mut cursor = 0u64;

        for _ in 0..self.config.scan_budget.max(1) {
            match backend.scan(cursor, "*", self.config.scan_count).await {
                Ok((next, batch)) => {
                    for key in &batch {
                        *distribution.entry(keys::namespace(key).to_string()).or_default() += 1;
                    }
                    sampled += batch.len() as u64;
                    if next == 0 {
                        return (distribution, sampled, true);
                    }
                    cursor = next;
                }
                Err(err) => {
                    warn!("SCAN failed during sampling: {}", err);
                    return (distribution, sampled, false);
                }
            }
        }

        debug!(sampled, "Key sample hit its scan budget");
        (distribution, sampled, false)
    }
}

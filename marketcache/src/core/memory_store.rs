use super::backend::{PipelinedSet, StoreBackend};
use super::clock::{Clock, SystemClock};
use super::error::{StoreError, StoreResult};
use super::types::{StoreStats, StoredValue};
use crate::monitoring::format_bytes;
use async_trait::async_trait;
use parking_lot::RwLock;
use radix_trie::{Trie, TrieCommon};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// In-process key-value store using a radix trie, with Redis command
/// semantics for TTL, SCAN and INFO.
///
/// Expiry is evaluated lazily against the injected [`Clock`], so a
/// `ManualClock` makes TTL behaviour fully deterministic.
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<RwLock<Trie<String, StoredValue>>>,
    stats: Arc<RwLock<StoreStats>>,
    clock: Arc<dyn Clock>,
    available: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryStore {
    /// Create a new store reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        info!("Initializing in-memory store");

        Self {
            data: Arc::new(RwLock::new(Trie::new())),
            stats: Arc::new(RwLock::new(StoreStats::default())),
            clock,
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate an outage: while unavailable every command fails
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Get statistics
    pub fn stats(&self) -> StoreStats {
        self.stats.read().clone()
    }

    /// Drop every expired key, returning how many were removed
    fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut data = self.data.write();

        let expired_keys: Vec<String> = data
            .iter()
            .filter(|(_, v)| v.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();

        let count = expired_keys.len();
        if count > 0 {
            debug!("Purging {} expired keys", count);
            let mut stats = self.stats.write();
            for key in expired_keys {
                if let Some(old) = data.remove(&key) {
                    stats.total_memory_bytes = stats
                        .total_memory_bytes
                        .saturating_sub(estimate_entry_size(&key, &old));
                }
            }
            stats.total_keys = stats.total_keys.saturating_sub(count);
        }

        count
    }

    fn begin(&self) -> StoreResult<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.stats.write().round_trips += 1;
        Ok(())
    }

    fn write_entry(&self, key: &str, value: &str, ttl_secs: u64) {
        let now = self.clock.now_millis();
        let ttl = (ttl_secs > 0).then_some(ttl_secs);
        let stored = StoredValue::new(value.to_string(), ttl, now);
        let entry_size = estimate_entry_size(key, &stored);

        let mut data = self.data.write();
        let previous = data.insert(key.to_string(), stored);

        let mut stats = self.stats.write();
        stats.sets += 1;
        match previous {
            Some(old) => {
                stats.total_memory_bytes = stats
                    .total_memory_bytes
                    .saturating_sub(estimate_entry_size(key, &old));
            }
            None => stats.total_keys += 1,
        }
        stats.total_memory_bytes += entry_size;
        stats.peak_memory_bytes = stats.peak_memory_bytes.max(stats.total_memory_bytes);
    }

    fn read_entry(&self, key: &str) -> Option<String> {
        let now = self.clock.now_millis();
        let mut data = self.data.write();
        let mut stats = self.stats.write();
        stats.gets += 1;

        let expired = match data.get(key) {
            Some(value) if !value.is_expired(now) => {
                stats.hits += 1;
                return Some(value.data.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            debug!("Key expired: {}", key);
            if let Some(old) = data.remove(key) {
                stats.total_keys = stats.total_keys.saturating_sub(1);
                stats.total_memory_bytes = stats
                    .total_memory_bytes
                    .saturating_sub(estimate_entry_size(key, &old));
            }
        }
        stats.misses += 1;
        None
    }

    fn live_keys(&self, pattern: &glob::Pattern, literal_prefix: &str) -> Vec<String> {
        let now = self.clock.now_millis();
        let data = self.data.read();

        let matches = |(k, v): (&String, &StoredValue)| {
            (!v.is_expired(now) && pattern.matches(k)).then(|| k.clone())
        };

        if literal_prefix.is_empty() {
            data.iter().filter_map(matches).collect()
        } else {
            data.get_raw_descendant(literal_prefix)
                .map(|subtrie| subtrie.iter().filter_map(matches).collect())
                .unwrap_or_default()
        }
    }

    fn memory_info(&self) -> String {
        let stats = self.stats.read();
        format!(
            "# Memory\r\nused_memory:{}\r\nused_memory_human:{}\r\nused_memory_peak:{}\r\nused_memory_peak_human:{}\r\nmaxmemory:0\r\nmem_allocator:libc\r\n",
            stats.total_memory_bytes,
            format_bytes(stats.total_memory_bytes),
            stats.peak_memory_bytes,
            format_bytes(stats.peak_memory_bytes),
        )
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.begin()?;
        debug!("GET key={}", key);
        Ok(self.read_entry(key))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        self.begin()?;
        debug!("SET key={}, size={}, ttl={}", key, value.len(), ttl_secs);
        self.write_entry(key, value, ttl_secs);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<bool> {
        self.begin()?;
        debug!("SET NX key={}, ttl={}", key, ttl_secs);

        let now = self.clock.now_millis();
        let occupied = self
            .data
            .read()
            .get(key)
            .is_some_and(|v| !v.is_expired(now));
        if occupied {
            return Ok(false);
        }

        self.write_entry(key, value, ttl_secs);
        Ok(true)
    }

    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        self.begin()?;
        debug!("DEL count={}", keys.len());

        let now = self.clock.now_millis();
        let mut data = self.data.write();
        let mut stats = self.stats.write();
        let mut removed = 0;

        for key in keys {
            if let Some(old) = data.remove(key) {
                stats.total_keys = stats.total_keys.saturating_sub(1);
                stats.total_memory_bytes = stats
                    .total_memory_bytes
                    .saturating_sub(estimate_entry_size(key, &old));
                if !old.is_expired(now) {
                    removed += 1;
                }
            }
        }
        stats.dels += removed;

        Ok(removed)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.begin()?;
        let now = self.clock.now_millis();
        Ok(self
            .data
            .read()
            .get(key)
            .is_some_and(|v| !v.is_expired(now)))
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        self.begin()?;
        let now = self.clock.now_millis();
        Ok(match self.data.read().get(key) {
            Some(value) if !value.is_expired(now) => value.remaining_ttl_secs(now),
            _ => -2,
        })
    }

    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        self.begin()?;
        debug!("MGET count={}", keys.len());
        Ok(keys.iter().map(|key| self.read_entry(key)).collect())
    }

    async fn pipeline_set(&self, entries: &[PipelinedSet]) -> StoreResult<()> {
        self.begin()?;
        debug!("PIPELINE SET count={}", entries.len());
        for entry in entries {
            self.write_entry(&entry.key, &entry.value, entry.ttl_secs);
        }
        Ok(())
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> StoreResult<(u64, Vec<String>)> {
        self.begin()?;
        debug!("SCAN cursor={}, pattern={}, count={}", cursor, pattern, count);

        let compiled = glob::Pattern::new(pattern)
            .map_err(|e| StoreError::Protocol(format!("invalid pattern {pattern}: {e}")))?;
        let literal_prefix: String = pattern
            .chars()
            .take_while(|c| !matches!(c, '*' | '?' | '[' | '\\'))
            .collect();

        let keys = self.live_keys(&compiled, &literal_prefix);
        let start = cursor as usize;
        let end = start.saturating_add(count.max(1)).min(keys.len());
        let page = keys.get(start..end).map(<[String]>::to_vec).unwrap_or_default();
        let next = if end >= keys.len() { 0 } else { end as u64 };

        Ok((next, page))
    }

    async fn dbsize(&self) -> StoreResult<u64> {
        self.begin()?;
        self.purge_expired();
        Ok(self.data.read().len() as u64)
    }

    async fn info(&self, section: &str) -> StoreResult<String> {
        self.begin()?;
        match section.to_lowercase().as_str() {
            "memory" | "all" | "" => Ok(self.memory_info()),
            other => Ok(format!("# {}\r\n", other)),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        self.begin()
    }
}

/// Estimate memory size of an entry
fn estimate_entry_size(key: &str, value: &StoredValue) -> usize {
    key.len() + value.data.len() + std::mem::size_of::<StoredValue>()
}

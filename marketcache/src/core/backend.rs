//! Store backend abstraction
//!
//! A backend speaks the raw, fallible key-value protocol. Callers outside
//! this crate should go through [`CacheStore`](super::CacheStore), which
//! turns every backend error into a miss.

use super::error::StoreResult;
use async_trait::async_trait;

/// One `SET key value [EX ttl]` inside a pipelined write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinedSet {
    pub key: String,
    pub value: String,
    /// Seconds; `0` writes without expiry
    pub ttl_secs: u64,
}

/// Raw key-value protocol with TTL support (Redis command semantics)
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// `GET key`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// `SET key value EX ttl` (or plain `SET` when `ttl_secs == 0`)
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()>;

    /// `SET key value NX EX ttl`, returns whether the key was written
    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<bool>;

    /// `DEL key [key ...]`, returns the number of keys removed
    async fn del(&self, keys: &[String]) -> StoreResult<u64>;

    /// `EXISTS key`
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// `TTL key`: seconds remaining, `-1` without expiry, `-2` when absent
    async fn ttl(&self, key: &str) -> StoreResult<i64>;

    /// `MGET key [key ...]` in one round trip
    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>>;

    /// Pipelined `SET ... EX` commands in one round trip
    async fn pipeline_set(&self, entries: &[PipelinedSet]) -> StoreResult<()>;

    /// `SCAN cursor MATCH pattern COUNT count`
    async fn scan(&self, cursor: u64, pattern: &str, count: usize)
    -> StoreResult<(u64, Vec<String>)>;

    /// `DBSIZE`
    async fn dbsize(&self) -> StoreResult<u64>;

    /// `INFO section`, raw text reply
    async fn info(&self, section: &str) -> StoreResult<String>;

    /// `PING`
    async fn ping(&self) -> StoreResult<()>;
}

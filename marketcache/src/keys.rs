//! Cache key namespace and default TTLs
//!
//! Keys follow `<domain>:<qualifier>[:<qualifier>...]`. Addresses are used
//! verbatim since chain addresses are case-sensitive.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Query parameters for list endpoints. A `BTreeMap` keeps them key-sorted.
pub type MarketParams = BTreeMap<String, Value>;

pub const TTL_MARKET: u64 = 120;
pub const TTL_TOKEN: u64 = 120;
pub const TTL_PRICE_HISTORY: u64 = 300;
pub const TTL_TRENDING: u64 = 180;
pub const TTL_GLOBAL_STATS: u64 = 300;
pub const TTL_SEARCH: u64 = 60;
pub const TTL_PROTOCOL: u64 = 300;

pub const GLOBAL_STATS: &str = "global:stats";
pub const PROTOCOLS_LIST: &str = "protocols:list";

const HASH_LEN: usize = 12;

pub fn token(address: &str) -> String {
    format!("token:{address}")
}

/// `market:<limit>:<offset>[:<paramsHash>]`
pub fn market(limit: u32, offset: u32, params: &MarketParams) -> String {
    match params_hash(params) {
        Some(hash) => format!("market:{limit}:{offset}:{hash}"),
        None => format!("market:{limit}:{offset}"),
    }
}

pub fn price(address: &str, range: &str) -> String {
    format!("price:{address}:{range}")
}

pub fn trending(limit: u32) -> String {
    format!("trending:{limit}")
}

/// `search:<queryHash>`; the query is trimmed first
pub fn search(query: &str) -> String {
    format!("search:{}", short_hash(query.trim().as_bytes()))
}

pub fn protocol(slug: &str) -> String {
    format!("protocol:{slug}")
}

/// Marker guarding a background refresh of `key`
pub fn refresh_lease(key: &str) -> String {
    format!("lock:refresh:{key}")
}

/// Namespace prefix of a key: everything before the first `:`
pub fn namespace(key: &str) -> &str {
    key.split_once(':').map_or(key, |(prefix, _)| prefix)
}

/// First 12 hex chars of SHA-256 over the canonical JSON of `params`.
/// Empty params have no hash.
pub fn params_hash(params: &MarketParams) -> Option<String> {
    if params.is_empty() {
        return None;
    }
    let canonical = serde_json::to_string(params).ok()?;
    Some(short_hash(canonical.as_bytes()))
}

fn short_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut encoded = hex::encode(digest);
    encoded.truncate(HASH_LEN);
    encoded
}

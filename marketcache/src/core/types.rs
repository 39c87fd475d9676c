use serde::{Deserialize, Serialize};

/// Stored value in the in-memory store with metadata
#[derive(Debug, Clone)]
pub struct StoredValue {
    /// Serialized payload
    pub data: String,
    /// Absolute expiry as epoch milliseconds
    pub expires_at: Option<i64>,
}

impl StoredValue {
    /// Create a new stored value
    pub fn new(data: String, ttl_secs: Option<u64>, now_millis: i64) -> Self {
        Self {
            data,
            expires_at: ttl_secs.map(|secs| now_millis + (secs as i64) * 1000),
        }
    }

    /// Check if the value has expired
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.expires_at.is_some_and(|expires| now_millis >= expires)
    }

    /// Remaining TTL in whole seconds, rounded to nearest like Redis `TTL`.
    ///
    /// `-1` when the value has no expiry.
    pub fn remaining_ttl_secs(&self, now_millis: i64) -> i64 {
        match self.expires_at {
            Some(expires) if now_millis >= expires => 0,
            Some(expires) => (expires - now_millis + 500) / 1000,
            None => -1,
        }
    }
}

/// A single key/value/ttl triple for batched writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: T,
    /// Time to live in seconds; `0` means no expiry
    pub ttl: u64,
}

impl<T> CacheEntry<T> {
    pub fn new(key: impl Into<String>, value: T, ttl: u64) -> Self {
        Self {
            key: key.into(),
            value,
            ttl,
        }
    }
}

/// Operation counters for the in-memory store
#[derive(Debug, Default, Clone, Serialize)]
pub struct StoreStats {
    /// Total number of live keys
    pub total_keys: usize,
    /// Estimated memory usage in bytes
    pub total_memory_bytes: usize,
    /// Highest `total_memory_bytes` seen
    pub peak_memory_bytes: usize,
    /// Number of GET operations
    pub gets: u64,
    /// Number of SET operations
    pub sets: u64,
    /// Number of DEL operations
    pub dels: u64,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of client round trips (a pipeline counts once)
    pub round_trips: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_value_expiry() {
        let value = StoredValue::new("v".to_string(), Some(10), 1_000);
        assert_eq!(value.expires_at, Some(11_000));
        assert!(!value.is_expired(10_999));
        assert!(value.is_expired(11_000));
    }

    #[test]
    fn test_remaining_ttl_rounds_to_nearest() {
        let value = StoredValue::new("v".to_string(), Some(120), 0);
        assert_eq!(value.remaining_ttl_secs(0), 120);
        assert_eq!(value.remaining_ttl_secs(114_000), 6);
        assert_eq!(value.remaining_ttl_secs(114_500), 6);
        assert_eq!(value.remaining_ttl_secs(114_600), 5);
        assert_eq!(value.remaining_ttl_secs(119_600), 0);
        assert_eq!(value.remaining_ttl_secs(200_000), 0);
    }

    #[test]
    fn test_no_expiry() {
        let value = StoredValue::new("v".to_string(), None, 0);
        assert!(!value.is_expired(i64::MAX));
        assert_eq!(value.remaining_ttl_secs(5), -1);
    }
}

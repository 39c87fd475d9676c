//! Cache diagnostics snapshots


use feed_helper::{harness, harness_with_config};
use marketcache::keys;
use marketcache::{CacheConfig, CacheMonitor, CacheStore, MemoryStore};
use std::sync::Arc;

#[tokio::test]
async fn test_stats_on_empty_store() {
    let h = harness();
    let stats = h.cache.monitor().get_cache_stats().await;

    assert!(stats.connected);
    assert_eq!(stats.total_keys, 0);
    assert!(stats.key_distribution.is_empty());
    assert!(stats.sample_complete);
    assert!(stats.memory.is_some());
    assert_eq!(stats.dedup.unwrap().total, 0);
    assert_eq!(stats.swr.unwrap().misses, 0);
}

#[tokio::test]
async fn test_key_distribution_by_namespace() {
    let h = harness();
    let store = h.cache.store();
    for i in 0..3 {
        store.set(&format!("token:T{i}"), &i, 120).await;
    }
    store.set("market:50:0", &"page", 120).await;
    store.set(keys::GLOBAL_STATS, &1, 300).await;

    let stats = h.cache.monitor().get_cache_stats().await;

    assert_eq!(stats.total_keys, 5);
    assert_eq!(stats.sampled_keys, 5);
    assert_eq!(stats.key_distribution.get("token"), Some(&3));
    assert_eq!(stats.key_distribution.get("market"), Some(&1));
    assert_eq!(stats.key_distribution.get("global"), Some(&1));
    assert!(stats.sample_complete);

    let memory = stats.memory.unwrap();
    assert!(memory.used_memory > 0);
    assert!(!memory.used_memory_human.is_empty());
}

#[tokio::test]
async fn test_sample_is_bounded_by_scan_budget() {
    let mut config = CacheConfig::default();
    config.monitor.scan_budget = 2;
    config.monitor.scan_count = 10;
    let h = harness_with_config(config);

    for i in 0..100 {
        h.cache.store().set(&format!("token:T{i:03}"), &i, 120).await;
    }

    let stats = h.cache.monitor().get_cache_stats().await;
    assert_eq!(stats.total_keys, 100);
    assert_eq!(stats.sampled_keys, 20);
    assert!(!stats.sample_complete);
}

#[tokio::test]
async fn test_disconnected_snapshot() {
    let backend = MemoryStore::default();
    backend.set_available(false);
    let monitor = CacheMonitor::new(CacheStore::new(Arc::new(backend)));

    let stats = monitor.get_cache_stats().await;
    assert!(!stats.connected);
    assert_eq!(stats.total_keys, 0);
    assert!(stats.memory.is_none());
    assert!(stats.swr.is_none());
}

#[tokio::test]
async fn test_snapshot_serializes_camel_case() {
    let h = harness();
    h.cache.store().set("token:A", &1, 120).await;

    let stats = h.cache.monitor().get_cache_stats().await;
    let value = serde_json::to_value(&stats).unwrap();

    assert_eq!(value["totalKeys"], 1);
    assert_eq!(value["keyDistribution"]["token"], 1);
    assert!(value["sampleComplete"].as_bool().unwrap());
    assert!(value["memory"]["usedMemoryHuman"].is_string());
    assert!(value["dedup"]["savingsPercent"].is_number());
    assert!(value.get("timestamp").is_some());
}

//! Multi-key reads and writes in a single round trip

use super::backend::PipelinedSet;
use super::store::CacheStore;
use super::types::CacheEntry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Batched get/set on top of a [`CacheStore`]
#[derive(Clone)]
pub struct BatchPipeline {
    store: CacheStore,
}

impl BatchPipeline {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    /// Read many keys with one `MGET`.
    ///
    /// The map has an entry for every requested key; absent, undecodable and
    /// unreachable values are all `None`.
    pub async fn get_many<T: DeserializeOwned>(&self, keys: &[String]) -> HashMap<String, Option<T>> {
        if keys.is_empty() {
            return HashMap::new();
        }

        let raw = match self.store.backend().mget(keys).await {
            Ok(raw) if raw.len() == keys.len() => raw,
            Ok(raw) => {
                warn!(
                    "MGET returned {} values for {} keys, treating batch as missed",
                    raw.len(),
                    keys.len()
                );
                vec![None; keys.len()]
            }
            Err(err) => {
                warn!("Batch get of {} keys failed: {}", keys.len(), err);
                vec![None; keys.len()]
            }
        };

        keys.iter()
            .zip(raw)
            .map(|(key, value)| {
                let decoded = value.and_then(|raw| match serde_json::from_str(&raw) {
                    Ok(decoded) => Some(decoded),
                    Err(err) => {
                        debug!(key = key.as_str(), "Discarding undecodable batch entry: {}", err);
                        None
                    }
                });
                (key.clone(), decoded)
            })
            .collect()
    }

    /// Write many entries, each with its own TTL, in one pipelined round trip
    pub async fn set_many<T: Serialize>(&self, entries: &[CacheEntry<T>]) {
        if entries.is_empty() {
            return;
        }

        let mut commands = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::to_string(&entry.value) {
                Ok(value) => commands.push(PipelinedSet {
                    key: entry.key.clone(),
                    value,
                    ttl_secs: entry.ttl,
                }),
                Err(err) => {
                    warn!(key = entry.key.as_str(), "Skipping unserializable batch entry: {}", err)
                }
            }
        }

        if let Err(err) = self.store.backend().pipeline_set(&commands).await {
            warn!("Batch set of {} entries failed: {}", commands.len(), err);
        } else {
            debug!("Batch set {} entries", commands.len());
        }
    }
}

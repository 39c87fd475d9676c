//! Protocol/TVL cache family

use crate::core::FetchError;
use crate::keys;
use crate::swr::{BatchConfig, SwrCache};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub slug: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvl: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chains: Vec<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

#[async_trait]
pub trait ProtocolFeed: Send + Sync {
    async fn fetch_protocols(&self) -> Result<Vec<Protocol>, FetchError>;
    async fn fetch_protocol(&self, slug: &str) -> Result<Protocol, FetchError>;
}

#[derive(Clone)]
pub struct ProtocolCache {
    swr: SwrCache,
    feed: Arc<dyn ProtocolFeed>,
    ttl: u64,
}

impl ProtocolCache {
    pub fn new(swr: SwrCache, feed: Arc<dyn ProtocolFeed>) -> Self {
        Self {
            swr,
            feed,
            ttl: keys::TTL_PROTOCOL,
        }
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    /// All protocols. A fetch also warms every `protocol:<slug>` entry.
    pub async fn list(&self) -> Result<Vec<Protocol>, FetchError> {
        let feed = Arc::clone(&self.feed);
        let fetch = move || {
            let feed = Arc::clone(&feed);
            async move { feed.fetch_protocols().await }
        };

        let warm = BatchConfig::new(
            |protocols: &Vec<Protocol>| {
                protocols
                    .iter()
                    .filter_map(|protocol| serde_json::to_value(protocol).ok())
                    .collect()
            },
            |item: &Value| item.get("slug")?.as_str().map(keys::protocol),
        );

        self.swr
            .get_stale_while_revalidate(keys::PROTOCOLS_LIST, self.ttl, fetch, Some(warm))
            .await
    }

    pub async fn get(&self, slug: &str) -> Result<Protocol, FetchError> {
        let feed = Arc::clone(&self.feed);
        let owned = slug.to_string();
        let fetch = move || {
            let feed = Arc::clone(&feed);
            let slug = owned.clone();
            async move { feed.fetch_protocol(&slug).await }
        };

        self.swr
            .get_stale_while_revalidate(&keys::protocol(slug), self.ttl, fetch, None)
            .await
    }
}

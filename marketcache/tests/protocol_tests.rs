//! Protocol/TVL cache family


use async_trait::async_trait;
use feed_helper::harness;
use marketcache::{FetchError, Protocol, ProtocolFeed};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn protocol(slug: &str, tvl: f64) -> Protocol {
    Protocol {
        slug: slug.to_string(),
        name: slug.to_uppercase(),
        tvl: Some(tvl),
        chains: vec!["solana".to_string()],
        other: BTreeMap::new(),
    }
}

#[derive(Default)]
struct StaticProtocols {
    list_calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

#[async_trait]
impl ProtocolFeed for StaticProtocols {
    async fn fetch_protocols(&self) -> Result<Vec<Protocol>, FetchError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![protocol("raydium", 1.5e9), protocol("orca", 7.0e8)])
    }

    async fn fetch_protocol(&self, slug: &str) -> Result<Protocol, FetchError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        match slug {
            "jupiter" => Ok(protocol("jupiter", 2.0e9)),
            other => Err(FetchError::NotFound(other.to_string())),
        }
    }
}

#[tokio::test]
async fn test_list_warms_each_protocol() {
    let h = harness();
    let feed = Arc::new(StaticProtocols::default());
    let protocols = h.cache.protocols(feed.clone());

    let list = protocols.list().await.unwrap();
    assert_eq!(list.len(), 2);

    let orca = protocols.get("orca").await.unwrap();
    assert_eq!(orca, protocol("orca", 7.0e8));
    assert_eq!(feed.detail_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.cache.store().ttl("protocol:orca").await, 300);

    protocols.list().await.unwrap();
    assert_eq!(feed.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unwarmed_protocol_fetched_on_miss() {
    let h = harness();
    let feed = Arc::new(StaticProtocols::default());
    let protocols = h.cache.protocols(feed.clone());

    assert_eq!(protocols.get("jupiter").await, Ok(protocol("jupiter", 2.0e9)));
    assert_eq!(protocols.get("jupiter").await, Ok(protocol("jupiter", 2.0e9)));
    assert_eq!(feed.detail_calls.load(Ordering::SeqCst), 1);

    assert_eq!(
        protocols.get("unknown").await,
        Err(FetchError::NotFound("unknown".to_string()))
    );
}

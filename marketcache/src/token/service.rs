use super::feeds::{ListFeed, MarketPage, OverviewFeed};
use super::merge::merge;
use super::record::{FeedSource, TokenData, UnifiedTokenRecord};
use crate::config::TtlConfig;
use crate::core::{CacheEntry, Clock, FetchError, RequestDeduplicator};
use crate::keys::{self, MarketParams};
use crate::swr::SwrCache;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Read-merge-write access to unified token records
#[derive(Clone)]
pub struct TokenCache {
    swr: SwrCache,
    list_feed: Arc<dyn ListFeed>,
    overview_feed: Arc<dyn OverviewFeed>,
    dedup: Arc<RequestDeduplicator>,
    clock: Arc<dyn Clock>,
    ttl: TtlConfig,
}

impl TokenCache {
    pub fn new(
        swr: SwrCache,
        list_feed: Arc<dyn ListFeed>,
        overview_feed: Arc<dyn OverviewFeed>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let dedup = swr
            .deduplicator()
            .cloned()
            .unwrap_or_else(|| Arc::new(RequestDeduplicator::new()));

        Self {
            swr,
            list_feed,
            overview_feed,
            dedup,
            clock,
            ttl: TtlConfig::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: TtlConfig) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn get_unified_token(&self, address: &str) -> Option<UnifiedTokenRecord> {
        self.swr.store().get(&keys::token(address)).await
    }

    pub async fn set_unified_token(
        &self,
        address: &str,
        record: &UnifiedTokenRecord,
        ttl: u64,
    ) -> bool {
        self.swr.store().set(&keys::token(address), record, ttl).await
    }

    /// Merge with the injected clock as `now`
    pub fn merge_token_data(
        &self,
        existing: Option<&UnifiedTokenRecord>,
        incoming: &TokenData,
        source: FeedSource,
    ) -> UnifiedTokenRecord {
        merge(existing, incoming, source, self.clock.now_millis())
    }

    /// Read the current record, merge `incoming` into it, write it back
    pub async fn apply_update(
        &self,
        address: &str,
        incoming: TokenData,
        source: FeedSource,
        ttl: u64,
    ) -> UnifiedTokenRecord {
        let incoming = with_address(incoming, address);
        let existing = self.get_unified_token(address).await;
        let merged = self.merge_token_data(existing.as_ref(), &incoming, source);
        self.set_unified_token(address, &merged, ttl).await;
        merged
    }

    /// Merge a whole list page with one batched read and one batched write.
    ///
    /// Items without an address are dropped. Returns the merged records in
    /// input order.
    pub async fn apply_list_items(&self, items: &[TokenData], ttl: u64) -> Vec<UnifiedTokenRecord> {
        let keyed: Vec<(String, &TokenData)> = items
            .iter()
            .filter_map(|item| Some((keys::token(item.address.as_deref()?), item)))
            .collect();
        if keyed.is_empty() {
            return Vec::new();
        }

        let lookup: Vec<String> = keyed.iter().map(|(key, _)| key.clone()).collect();
        let mut current: HashMap<String, Option<UnifiedTokenRecord>> =
            self.swr.batch().get_many(&lookup).await;

        // A repeated address merges onto the record produced earlier in the
        // same page and is written once.
        let mut merged_records = Vec::with_capacity(keyed.len());
        let mut written = HashSet::with_capacity(keyed.len());
        let mut write_order = Vec::with_capacity(keyed.len());
        for (key, item) in keyed {
            let existing = current.get(&key).and_then(Option::as_ref);
            let merged = self.merge_token_data(existing, item, FeedSource::List);
            if written.insert(key.clone()) {
                write_order.push(key.clone());
            }
            current.insert(key, Some(merged.clone()));
            merged_records.push(merged);
        }

        let entries: Vec<CacheEntry<&UnifiedTokenRecord>> = write_order
            .iter()
            .filter_map(|key| {
                let record = current.get(key)?.as_ref()?;
                Some(CacheEntry::new(key.clone(), record, ttl))
            })
            .collect();
        self.swr.batch().set_many(&entries).await;

        debug!(items = merged_records.len(), "Merged list page");
        merged_records
    }

    /// Market list page through stale-while-revalidate. Each fetch also
    /// merges the page's items into their token records.
    pub async fn market_list(
        &self,
        limit: u32,
        offset: u32,
        params: MarketParams,
    ) -> Result<MarketPage, FetchError> {
        let key = keys::market(limit, offset, &params);
        let this = self.clone();
        let fetch = move || {
            let this = this.clone();
            let params = params.clone();
            async move { this.fetch_market_page(limit, offset, &params).await }
        };

        self.swr
            .get_stale_while_revalidate(&key, self.ttl.market, fetch, None)
            .await
    }

    async fn fetch_market_page(
        &self,
        limit: u32,
        offset: u32,
        params: &MarketParams,
    ) -> Result<MarketPage, FetchError> {
        let page = self.list_feed.fetch_list(limit, offset, params).await?;
        let tokens = self.apply_list_items(&page.tokens, self.ttl.token).await;
        Ok(MarketPage {
            limit,
            offset,
            tokens,
            total: page.total,
        })
    }

    /// Token detail.
    ///
    /// A record that already carries overview data goes through
    /// stale-while-revalidate. Otherwise the overview is fetched now,
    /// merged and written. An unknown token yields the list record, if any.
    pub async fn token_detail(&self, address: &str) -> Result<Option<UnifiedTokenRecord>, FetchError> {
        let cached = self.get_unified_token(address).await;

        if cached.as_ref().is_some_and(UnifiedTokenRecord::has_overview) {
            let this = self.clone();
            let owned = address.to_string();
            let fetch = move || {
                let this = this.clone();
                let address = owned.clone();
                async move { this.refresh_overview(&address).await }
            };
            return self
                .swr
                .get_stale_while_revalidate(&keys::token(address), self.ttl.token, fetch, None)
                .await
                .map(Some);
        }

        match self.fetch_overview(address).await? {
            Some(overview) => {
                let merged = self
                    .apply_update(address, overview, FeedSource::Overview, self.ttl.token)
                    .await;
                info!(address, "Overview merged into token record");
                Ok(Some(merged))
            }
            None => {
                debug!(address, "No overview upstream, serving cached record");
                Ok(cached)
            }
        }
    }

    /// Background path for `token_detail`: the result is written by the
    /// orchestrator, so only merge here.
    async fn refresh_overview(&self, address: &str) -> Result<UnifiedTokenRecord, FetchError> {
        let overview = self
            .fetch_overview(address)
            .await?
            .ok_or_else(|| FetchError::NotFound(address.to_string()))?;
        let existing = self.get_unified_token(address).await;
        Ok(self.merge_token_data(
            existing.as_ref(),
            &with_address(overview, address),
            FeedSource::Overview,
        ))
    }

    async fn fetch_overview(&self, address: &str) -> Result<Option<TokenData>, FetchError> {
        let feed = Arc::clone(&self.overview_feed);
        let owned = address.to_string();
        self.dedup
            .run(&format!("overview:{address}"), move || async move {
                feed.fetch_overview(&owned).await
            })
            .await
    }
}

fn with_address(mut data: TokenData, address: &str) -> TokenData {
    if data.address.is_none() {
        data.address = Some(address.to_string());
    }
    data
}

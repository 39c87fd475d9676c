//! Token record reconciliation across the list and overview feeds


use feed_helper::{
    START_MILLIS, ScriptedListFeed, ScriptedOverviewFeed, harness, list_token, overview_token,
};
use marketcache::keys::MarketParams;
use marketcache::token::merge;
use marketcache::{DataSource, FeedSource, FetchError, TokenData, TokenListPage, UnifiedTokenRecord};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_overview_does_not_override_list_price() {
    let existing = merge(None, &list_token("ABC", 10.0, 500.0), FeedSource::List, 1);
    let incoming = TokenData {
        price: Some(20.0),
        ..Default::default()
    };

    let merged = merge(Some(&existing), &incoming, FeedSource::Overview, 2);
    assert_eq!(merged.data.price, Some(10.0));
}

#[test]
fn test_overview_upgrades_list_record() {
    let existing = merge(None, &list_token("ABC", 10.0, 500.0), FeedSource::List, 1);
    let merged = merge(
        Some(&existing),
        &overview_token("ABC", 9.0, 1e6, 1200),
        FeedSource::Overview,
        2,
    );
    assert_eq!(merged.data_source, DataSource::Merged);
}

#[test]
fn test_repeated_list_update_is_idempotent() {
    let base = merge(None, &overview_token("ABC", 9.0, 1e6, 1200), FeedSource::Overview, 1);
    let update = list_token("ABC", 10.0, 500.0);

    let once = merge(Some(&base), &update, FeedSource::List, 2);
    let twice = merge(Some(&once), &update, FeedSource::List, 3);

    assert_eq!(twice.data.price, once.data.price);
    assert_eq!(twice.data.price_change_24h_percent, once.data.price_change_24h_percent);
    assert_eq!(twice.data.v24h_usd, once.data.v24h_usd);
    assert_eq!(twice.data.market_cap, once.data.market_cap);
    assert_eq!(twice.data, once.data);
}

#[tokio::test]
async fn test_apply_update_round_trip() {
    let h = harness();
    let tokens = h
        .cache
        .tokens(ScriptedListFeed::new(), ScriptedOverviewFeed::new());

    let written = tokens
        .apply_update("ABC", list_token("ABC", 1.0, 10.0), FeedSource::List, 120)
        .await;
    assert_eq!(written.last_updated, START_MILLIS);
    assert_eq!(tokens.get_unified_token("ABC").await, Some(written.clone()));

    h.clock.advance(Duration::from_secs(1));
    let merged = tokens
        .apply_update("ABC", overview_token("ABC", 0.5, 99.0, 7), FeedSource::Overview, 120)
        .await;

    assert_eq!(merged.data.price, Some(1.0));
    assert_eq!(merged.data.liquidity, Some(99.0));
    assert_eq!(merged.data_source, DataSource::Merged);
    assert_eq!(merged.last_updated, START_MILLIS + 1000);
}

#[tokio::test]
async fn test_apply_update_fills_missing_address() {
    let h = harness();
    let tokens = h
        .cache
        .tokens(ScriptedListFeed::new(), ScriptedOverviewFeed::new());

    let incoming = TokenData {
        price: Some(3.0),
        ..Default::default()
    };
    let written = tokens.apply_update("XYZ", incoming, FeedSource::List, 120).await;
    assert_eq!(written.address(), Some("XYZ"));
}

#[tokio::test]
async fn test_last_updated_strictly_increases_without_clock_movement() {
    let h = harness();
    let tokens = h
        .cache
        .tokens(ScriptedListFeed::new(), ScriptedOverviewFeed::new());

    let mut previous = i64::MIN;
    for price in [1.0, 1.1, 1.2] {
        let record = tokens
            .apply_update("ABC", list_token("ABC", price, 1.0), FeedSource::List, 120)
            .await;
        assert!(record.last_updated > previous);
        previous = record.last_updated;
    }
}

#[tokio::test]
async fn test_apply_list_items_merges_with_existing_records() {
    let h = harness();
    let tokens = h
        .cache
        .tokens(ScriptedListFeed::new(), ScriptedOverviewFeed::new());

    tokens
        .apply_update("AAA", overview_token("AAA", 0.1, 500.0, 3), FeedSource::Overview, 120)
        .await;

    let items = vec![
        list_token("AAA", 1.0, 100.0),
        list_token("BBB", 2.0, 200.0),
        TokenData {
            symbol: Some("NOADDR".to_string()),
            ..Default::default()
        },
    ];
    let merged = tokens.apply_list_items(&items, 120).await;

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].data.price, Some(1.0));
    assert_eq!(merged[0].data.liquidity, Some(500.0));
    assert_eq!(merged[0].data_source, DataSource::Merged);
    assert_eq!(merged[1].data_source, DataSource::List);

    let stored = tokens.get_unified_token("BBB").await.unwrap();
    assert_eq!(stored.data.v24h_usd, Some(200.0));
}

#[tokio::test]
async fn test_apply_list_items_with_repeated_address() {
    let h = harness();
    let tokens = h
        .cache
        .tokens(ScriptedListFeed::new(), ScriptedOverviewFeed::new());

    let merged = tokens
        .apply_list_items(&[list_token("AAA", 1.0, 1.0), list_token("AAA", 2.0, 2.0)], 120)
        .await;

    assert_eq!(merged.len(), 2);
    assert!(merged[1].last_updated > merged[0].last_updated);
    let stored = tokens.get_unified_token("AAA").await.unwrap();
    assert_eq!(stored.data.price, Some(2.0));
}

#[tokio::test]
async fn test_market_list_caches_page_and_items() {
    let h = harness();
    let list = ScriptedListFeed::new();
    list.push(Ok(TokenListPage {
        tokens: vec![list_token("AAA", 1.0, 10.0), list_token("BBB", 2.0, 20.0)],
        total: Some(2),
    }));
    let tokens = h.cache.tokens(list.clone(), ScriptedOverviewFeed::new());

    let page = tokens.market_list(50, 0, MarketParams::new()).await.unwrap();
    assert_eq!(page.tokens.len(), 2);
    assert_eq!(page.total, Some(2));

    let again = tokens.market_list(50, 0, MarketParams::new()).await.unwrap();
    assert_eq!(again, page);
    assert_eq!(list.calls(), 1);

    assert!(h.cache.store().exists("market:50:0").await);
    assert_eq!(
        tokens.get_unified_token("BBB").await.map(|r| r.data.price),
        Some(Some(2.0))
    );
}

#[tokio::test]
async fn test_market_list_error_surfaces_on_miss() {
    let h = harness();
    let list = ScriptedListFeed::new();
    list.push(Err(FetchError::Status {
        status: 502,
        message: "bad gateway".to_string(),
    }));
    let tokens = h.cache.tokens(list, ScriptedOverviewFeed::new());

    let result = tokens.market_list(50, 0, MarketParams::new()).await;
    assert!(matches!(result, Err(FetchError::Status { status: 502, .. })));
}

#[tokio::test]
async fn test_token_detail_upgrades_list_record() {
    let h = harness();
    let overview = ScriptedOverviewFeed::new();
    overview.insert(overview_token("ABC", 0.9, 1e6, 1200));
    let tokens = h.cache.tokens(ScriptedListFeed::new(), overview.clone());

    tokens
        .apply_update("ABC", list_token("ABC", 1.0, 10.0), FeedSource::List, 120)
        .await;

    let detail: UnifiedTokenRecord = tokens.token_detail("ABC").await.unwrap().unwrap();
    assert_eq!(detail.data_source, DataSource::Merged);
    assert_eq!(detail.data.price, Some(1.0));
    assert_eq!(detail.data.holder, Some(1200));
    assert_eq!(overview.calls(), 1);

    // Now carries overview data: served from cache
    let cached = tokens.token_detail("ABC").await.unwrap().unwrap();
    assert_eq!(cached, detail);
    assert_eq!(overview.calls(), 1);
}

#[tokio::test]
async fn test_token_detail_unknown_token() {
    let h = harness();
    let overview = ScriptedOverviewFeed::new();
    let tokens = h.cache.tokens(ScriptedListFeed::new(), overview.clone());

    assert_eq!(tokens.token_detail("GHOST").await, Ok(None));

    tokens
        .apply_update("LISTED", list_token("LISTED", 1.0, 1.0), FeedSource::List, 120)
        .await;
    let record = tokens.token_detail("LISTED").await.unwrap().unwrap();
    assert_eq!(record.data_source, DataSource::List);
    assert_eq!(overview.calls(), 2);
}

#[tokio::test]
async fn test_token_detail_concurrent_overview_fetch_coalesces() {
    let h = harness();
    let overview = ScriptedOverviewFeed::new();
    overview.insert(overview_token("ABC", 0.9, 1e6, 1200));
    let tokens = h.cache.tokens(ScriptedListFeed::new(), overview.clone());

    let (a, b) = tokio::join!(tokens.token_detail("ABC"), tokens.token_detail("ABC"));
    assert!(a.unwrap().is_some());
    assert!(b.unwrap().is_some());
    assert_eq!(overview.calls(), 1);
}

#[tokio::test]
async fn test_token_detail_refreshes_in_background_when_stale() {
    let h = harness();
    let overview = ScriptedOverviewFeed::new();
    overview.insert(overview_token("ABC", 0.9, 1e6, 1200));
    let tokens = h.cache.tokens(ScriptedListFeed::new(), overview.clone());

    tokens.token_detail("ABC").await.unwrap();
    overview.insert(overview_token("ABC", 0.9, 2e6, 1300));
    h.clock.advance(Duration::from_millis(114_600));

    let stale = tokens.token_detail("ABC").await.unwrap().unwrap();
    assert_eq!(stale.data.holder, Some(1200));
    assert_eq!(h.scheduler.pending(), 1);

    h.scheduler.run_pending().await;
    let fresh = tokens.get_unified_token("ABC").await.unwrap();
    assert_eq!(fresh.data.holder, Some(1300));
    assert_eq!(fresh.data.liquidity, Some(2e6));
    assert!(fresh.last_updated > stale.last_updated);
}

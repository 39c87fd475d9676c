use super::record::{TokenData, UnifiedTokenRecord};
use crate::core::FetchError;
use crate::keys::MarketParams;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One page of the upstream token list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenListPage {
    pub tokens: Vec<TokenData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// A cached market page, with every item already merged into its record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPage {
    pub limit: u32,
    pub offset: u32,
    pub tokens: Vec<UnifiedTokenRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Paginated market list upstream
#[async_trait]
pub trait ListFeed: Send + Sync {
    async fn fetch_list(
        &self,
        limit: u32,
        offset: u32,
        params: &MarketParams,
    ) -> Result<TokenListPage, FetchError>;
}

/// Per-token detail upstream
#[async_trait]
pub trait OverviewFeed: Send + Sync {
    /// `Ok(None)` when the upstream has no such token
    async fn fetch_overview(&self, address: &str) -> Result<Option<TokenData>, FetchError>;
}

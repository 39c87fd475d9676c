use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Social and link metadata. Unknown keys are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExtensions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coingecko_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Token fields as supplied by an upstream feed. Every field is optional
/// since each feed only fills part of the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "logoURI", skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,

    // Hot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_24h_percent: Option<f64>,
    #[serde(rename = "v24hUSD", skip_serializing_if = "Option::is_none")]
    pub v24h_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,

    // Cold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fdv: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circulating_supply: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade24h: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy24h: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell24h: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_wallet24h: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<TokenExtensions>,
}

impl TokenData {
    /// Partial record carrying only an address
    pub fn for_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Default::default()
        }
    }
}

/// Which feed produced a partial update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    List,
    Overview,
}

/// Provenance of a cached record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    List,
    Overview,
    Merged,
}

impl From<FeedSource> for DataSource {
    fn from(source: FeedSource) -> Self {
        match source {
            FeedSource::List => DataSource::List,
            FeedSource::Overview => DataSource::Overview,
        }
    }
}

/// Canonical cached view of one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedTokenRecord {
    #[serde(flatten)]
    pub data: TokenData,
    /// Unix epoch milliseconds
    pub last_updated: i64,
    pub data_source: DataSource,
}

impl UnifiedTokenRecord {
    pub fn address(&self) -> Option<&str> {
        self.data.address.as_deref()
    }

    /// Whether overview data has been folded in
    pub fn has_overview(&self) -> bool {
        self.data_source != DataSource::List
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_names() {
        let record = UnifiedTokenRecord {
            data: TokenData {
                address: Some("ABC".to_string()),
                logo_uri: Some("https://img/abc.png".to_string()),
                v24h_usd: Some(1500.0),
                price_change_24h_percent: Some(-2.5),
                unique_wallet24h: Some(42),
                ..Default::default()
            },
            last_updated: 1_700_000_000_000,
            data_source: DataSource::Merged,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["address"], json!("ABC"));
        assert_eq!(value["logoURI"], json!("https://img/abc.png"));
        assert_eq!(value["v24hUSD"], json!(1500.0));
        assert_eq!(value["priceChange24hPercent"], json!(-2.5));
        assert_eq!(value["uniqueWallet24h"], json!(42));
        assert_eq!(value["lastUpdated"], json!(1_700_000_000_000i64));
        assert_eq!(value["dataSource"], json!("merged"));
        assert!(value.get("price").is_none());
    }

    #[test]
    fn test_unknown_extension_keys_survive() {
        let raw = json!({
            "address": "ABC",
            "extensions": {"website": "https://abc.xyz", "medium": "https://medium.com/abc"},
            "lastUpdated": 1,
            "dataSource": "overview"
        });

        let record: UnifiedTokenRecord = serde_json::from_value(raw).unwrap();
        let extensions = record.data.extensions.clone().unwrap();
        assert_eq!(extensions.website.as_deref(), Some("https://abc.xyz"));
        assert_eq!(extensions.other["medium"], json!("https://medium.com/abc"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["extensions"]["medium"], json!("https://medium.com/abc"));
        assert!(record.has_overview());
    }
}

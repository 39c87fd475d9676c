use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::keys;
use crate::swr::RetryPolicy;

/// Main cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub store: StoreConfig,
    pub swr: SwrConfig,
    pub ttl: TtlConfig,
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
}

/// Remote store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    /// Connect attempts per request before giving up
    pub connect_attempts: u32,
    /// Backoff after attempt `n` is `n * step`, capped at `max`
    pub connect_backoff_step_ms: u64,
    pub connect_backoff_max_ms: u64,
    /// Poll interval for callers waiting on an in-progress connect
    pub connecting_poll_ms: u64,
    pub connecting_max_polls: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connect_attempts: 3,
            connect_backoff_step_ms: 50,
            connect_backoff_max_ms: 2000,
            connecting_poll_ms: 100,
            connecting_max_polls: 50,
        }
    }
}

impl StoreConfig {
    /// Delay after a failed connect attempt (1-based)
    pub fn connect_backoff(&self, attempt: u32) -> Duration {
        let ms = (attempt as u64)
            .saturating_mul(self.connect_backoff_step_ms)
            .min(self.connect_backoff_max_ms);
        Duration::from_millis(ms)
    }
}

/// Stale-while-revalidate policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwrConfig {
    /// An entry is stale once its remaining TTL drops below `ttl / stale_divisor`
    pub stale_divisor: u64,
    pub retry: RetryConfig,
    /// Per-key refresh lease; `None` disables it
    pub refresh_lease_secs: Option<u64>,
}

impl Default for SwrConfig {
    fn default() -> Self {
        Self {
            stale_divisor: 20,
            retry: RetryConfig::default(),
            refresh_lease_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Default TTLs in seconds per key family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    pub market: u64,
    pub token: u64,
    pub price_history: u64,
    pub trending: u64,
    pub global_stats: u64,
    pub search: u64,
    pub protocol: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            market: keys::TTL_MARKET,
            token: keys::TTL_TOKEN,
            price_history: keys::TTL_PRICE_HISTORY,
            trending: keys::TTL_TRENDING,
            global_stats: keys::TTL_GLOBAL_STATS,
            search: keys::TTL_SEARCH,
            protocol: keys::TTL_PROTOCOL,
        }
    }
}

/// Diagnostics sampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Maximum SCAN calls per stats snapshot
    pub scan_budget: u32,
    /// COUNT hint per SCAN call
    pub scan_count: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            scan_budget: 10,
            scan_count: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: CacheConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Override the store URL
    pub fn with_store_url(mut self, url: impl Into<String>) -> Self {
        self.store.url = url.into();
        self
    }
}

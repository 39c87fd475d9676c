use thiserror::Error;

/// Errors raised by a store backend.
///
/// These never escape [`CacheStore`](super::CacheStore); it converts every
/// variant into a miss or a `false` result.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable")]
    Unavailable,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl StoreError {
    /// Whether the error means the connection handle should be dropped
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Unavailable => true,
            Self::Redis(err) => {
                err.is_io_error()
                    || err.is_connection_dropped()
                    || err.is_connection_refusal()
                    || err.is_timeout()
            }
            Self::Serialization(_) | Self::Protocol(_) => false,
        }
    }
}

/// Result type alias for store backend operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by an upstream fetcher.
///
/// Cloneable so a single in-flight result can be handed to every coalesced
/// waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    #[error("Upstream timeout: {0}")]
    Timeout(String),

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("Fetch failed: {0}")]
    Network(String),

    #[error("Upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Transient network failures are retried on the background path
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionReset(_) | Self::Timeout(_) | Self::Dns(_) | Self::Network(_)
        )
    }

    /// Classify a raw upstream error message.
    ///
    /// HTTP clients usually surface transport failures as strings carrying an
    /// errno-style code; those map onto the retryable variants.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("econnreset") || lower.contains("connection reset") {
            Self::ConnectionReset(message)
        } else if lower.contains("etimedout") || lower.contains("timed out") {
            Self::Timeout(message)
        } else if lower.contains("enotfound") || lower.contains("eai_again") {
            Self::Dns(message)
        } else if lower.contains("fetch failed") {
            Self::Network(message)
        } else {
            Self::Other(message)
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

//! Upstream market-data API boundary
//!
//! The engine only assumes a chunked candle-range query (bounded rows per
//! call), a single-timestamp price query, and an optional per-chain token
//! metadata lookup. Everything else about the upstream is opaque.

pub mod birdeye;

use crate::candles::types::{Candle, Chain, Interval};
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by upstream API clients
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Upstream explicitly reports an unknown/invalid asset. An expected
    /// negative answer, not an infrastructure failure.
    #[error("unknown or invalid asset: {0}")]
    InvalidAsset(String),

    #[error("rate limit exceeded")]
    RateLimited,

    /// Timeouts, connection failures, DNS errors
    #[error("request failed: {0}")]
    Transport(String),

    #[error("API returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl ApiError {
    /// Whether the failure is an infrastructure problem rather than an
    /// expected negative answer from the upstream.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ApiError::InvalidAsset(_))
    }
}

/// Token metadata returned by the per-chain lookup
#[derive(Debug, Clone)]
pub struct TokenMeta {
    pub chain: Chain,
    pub symbol: Option<String>,
}

/// The three upstream operations the engine depends on
#[async_trait]
pub trait MarketApi: Send + Sync {
    /// Candle range query. The upstream caps rows per call; callers bound
    /// the window so the cap is never hit mid-range.
    async fn candle_range(
        &self,
        asset: &str,
        chain: Chain,
        interval: Interval,
        time_from: i64,
        time_to: i64,
    ) -> Result<Vec<Candle>, ApiError>;

    /// Point-in-time price lookup, roughly 6x cheaper than a candle call.
    /// `Ok(None)` means the upstream has no price at that instant.
    async fn price_at(&self, asset: &str, chain: Chain, unix_time: i64) -> Result<Option<f64>, ApiError>;

    /// Token metadata on one specific chain. `Ok(None)` means the asset is
    /// not known on that chain.
    async fn token_metadata(&self, asset: &str, chain: Chain) -> Result<Option<TokenMeta>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(!ApiError::InvalidAsset("x".into()).is_transient());
        assert!(ApiError::RateLimited.is_transient());
        assert!(ApiError::Transport("timeout".into()).is_transient());
        assert!(ApiError::Http {
            status: 502,
            body: String::new(),
        }
        .is_transient());
    }
}

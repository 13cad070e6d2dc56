// Availability probe: answers "does any data exist?" without spending a
// full-price candle call. A single probe can spare a whole chunk sequence
// across every interval for a dead asset.

use crate::apis::{ApiError, MarketApi};
use crate::candles::store::CandleStore;
use crate::candles::types::{Chain, ProbeResult};
use crate::logger::{self, LogTag};
use std::sync::Arc;

pub struct AvailabilityProbe {
    api: Arc<dyn MarketApi>,
    store: Arc<dyn CandleStore>,
}

impl AvailabilityProbe {
    pub fn new(api: Arc<dyn MarketApi>, store: Arc<dyn CandleStore>) -> Self {
        Self { api, store }
    }

    /// Existence check at one instant. Durable bars settle it for free;
    /// otherwise one cheap point-price lookup decides. A probe that errors
    /// out assumes data exists: an unnecessary fetch attempt costs less than
    /// silently skipping a live asset.
    pub async fn check(&self, asset: &str, chain: Chain, at: i64) -> ProbeResult {
        match self.store.has_bar_covering(asset, chain, at) {
            Ok(true) => {
                return ProbeResult {
                    has_data: true,
                    satisfied_from_cache: true,
                };
            }
            Ok(false) => {}
            Err(e) => {
                logger::warning(LogTag::Probe, &format!("store lookup failed: {}", e));
            }
        }

        match self.api.price_at(asset, chain, at).await {
            Ok(Some(_)) => ProbeResult {
                has_data: true,
                satisfied_from_cache: false,
            },
            Ok(None) => ProbeResult {
                has_data: false,
                satisfied_from_cache: false,
            },
            Err(ApiError::InvalidAsset(_)) => ProbeResult {
                has_data: false,
                satisfied_from_cache: false,
            },
            Err(e) => {
                // Fail open on infrastructure errors
                logger::debug(
                    LogTag::Probe,
                    &format!("probe for {} errored ({}); assuming data exists", asset, e),
                );
                ProbeResult {
                    has_data: true,
                    satisfied_from_cache: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::TokenMeta;
    use crate::candles::store::SqliteCandleStore;
    use crate::candles::types::{Candle, Interval};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ProbeApi {
        price: Result<Option<f64>, ApiError>,
        calls: AtomicUsize,
    }

    impl ProbeApi {
        fn new(price: Result<Option<f64>, ApiError>) -> Self {
            Self {
                price,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MarketApi for ProbeApi {
        async fn candle_range(
            &self,
            _asset: &str,
            _chain: Chain,
            _interval: Interval,
            _from: i64,
            _to: i64,
        ) -> Result<Vec<Candle>, ApiError> {
            Ok(Vec::new())
        }

        async fn price_at(&self, _asset: &str, _chain: Chain, _at: i64) -> Result<Option<f64>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.price.clone()
        }

        async fn token_metadata(&self, _asset: &str, _chain: Chain) -> Result<Option<TokenMeta>, ApiError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_durable_hit_skips_network() {
        let store = Arc::new(SqliteCandleStore::in_memory().unwrap());
        store
            .insert_batch(
                "mint",
                Chain::Solana,
                Interval::Minute1,
                &[Candle::new(1_700_000_000, 1.0, 1.2, 0.9, 1.1, 5.0)],
            )
            .unwrap();

        let api = Arc::new(ProbeApi::new(Ok(Some(1.0))));
        let probe = AvailabilityProbe::new(api.clone(), store);

        let result = probe.check("mint", Chain::Solana, 1_700_000_030).await;
        assert!(result.has_data);
        assert!(result.satisfied_from_cache);
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_point_price_confirms_data() {
        let store = Arc::new(SqliteCandleStore::in_memory().unwrap());
        let api = Arc::new(ProbeApi::new(Ok(Some(0.002))));
        let probe = AvailabilityProbe::new(api.clone(), store);

        let result = probe.check("mint", Chain::Solana, 1_700_000_000).await;
        assert!(result.has_data);
        assert!(!result.satisfied_from_cache);
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_absence_means_no_data() {
        let store = Arc::new(SqliteCandleStore::in_memory().unwrap());
        let api = Arc::new(ProbeApi::new(Ok(None)));
        let probe = AvailabilityProbe::new(api, store);

        let result = probe.check("mint", Chain::Solana, 1_700_000_000).await;
        assert!(!result.has_data);
    }

    #[tokio::test]
    async fn test_invalid_asset_means_no_data() {
        let store = Arc::new(SqliteCandleStore::in_memory().unwrap());
        let api = Arc::new(ProbeApi::new(Err(ApiError::InvalidAsset("mint".into()))));
        let probe = AvailabilityProbe::new(api, store);

        let result = probe.check("mint", Chain::Solana, 1_700_000_000).await;
        assert!(!result.has_data);
    }

    #[tokio::test]
    async fn test_transport_error_fails_open() {
        let store = Arc::new(SqliteCandleStore::in_memory().unwrap());
        let api = Arc::new(ProbeApi::new(Err(ApiError::Transport("timeout".into()))));
        let probe = AvailabilityProbe::new(api, store);

        let result = probe.check("mint", Chain::Solana, 1_700_000_000).await;
        assert!(result.has_data);
        assert!(!result.satisfied_from_cache);
    }
}

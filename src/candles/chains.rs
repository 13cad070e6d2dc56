// Chain resolution for address-format-ambiguous assets
//
// Hex addresses are shared across the EVM chains, so the first touch of such
// an asset does a one-time metadata lookup to pin the chain. Base58
// addresses are structurally Solana and never hit the network.

use crate::apis::MarketApi;
use crate::candles::types::Chain;
use crate::config::CacheConfig;
use crate::logger::{self, LogTag};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Outcome of chain resolution. `confirmed` is false when the resolver had
/// to fall back to the caller-supplied hint.
#[derive(Debug, Clone)]
pub struct ResolvedChain {
    pub chain: Chain,
    pub symbol: Option<String>,
    pub confirmed: bool,
}

struct ChainCacheEntry {
    chain: Chain,
    symbol: Option<String>,
    resolved_at: Instant,
}

pub struct ChainResolver {
    api: Arc<dyn MarketApi>,
    cache: RwLock<HashMap<String, ChainCacheEntry>>,
    config: CacheConfig,
}

/// Hex-style address shared by the EVM chains
pub fn is_ambiguous_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Base58 Solana address (32..44 chars, decodes to 32 bytes)
pub fn is_solana_address(address: &str) -> bool {
    if address.len() < 32 || address.len() > 44 {
        return false;
    }
    bs58::decode(address)
        .into_vec()
        .map(|bytes| bytes.len() == 32)
        .unwrap_or(false)
}

impl ChainResolver {
    pub fn new(api: Arc<dyn MarketApi>, config: CacheConfig) -> Self {
        Self {
            api,
            cache: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Resolve the chain for an asset, consulting the cache first. A lookup
    /// failure degrades to the hint; a wrong guess fails cleanly downstream.
    pub async fn resolve(&self, asset: &str, hint: Chain) -> ResolvedChain {
        if is_solana_address(asset) {
            return ResolvedChain {
                chain: Chain::Solana,
                symbol: None,
                confirmed: true,
            };
        }

        if !is_ambiguous_address(asset) {
            // Unrecognized format; trust the hint and let the fetch decide
            return ResolvedChain {
                chain: hint,
                symbol: None,
                confirmed: false,
            };
        }

        if let Some(cached) = self.cached(asset) {
            return cached;
        }

        // Probe the hinted chain first, then the rest of the EVM family
        let mut candidates: Vec<Chain> = Vec::new();
        if hint.is_evm() {
            candidates.push(hint);
        }
        for chain in Chain::evm_chains() {
            if !candidates.contains(chain) {
                candidates.push(*chain);
            }
        }

        for chain in candidates {
            match self.api.token_metadata(asset, chain).await {
                Ok(Some(meta)) => {
                    logger::debug(
                        LogTag::Chains,
                        &format!("{} confirmed on {}", asset, chain),
                    );
                    self.insert(asset, chain, meta.symbol.clone());
                    return ResolvedChain {
                        chain,
                        symbol: meta.symbol,
                        confirmed: true,
                    };
                }
                Ok(None) => continue,
                Err(e) => {
                    // Soft condition: use the hint, the fetch will fail
                    // cleanly if the guess is wrong
                    logger::warning(
                        LogTag::Chains,
                        &format!("metadata lookup failed for {}: {}; using hint {}", asset, e, hint),
                    );
                    return ResolvedChain {
                        chain: hint,
                        symbol: None,
                        confirmed: false,
                    };
                }
            }
        }

        logger::debug(
            LogTag::Chains,
            &format!("{} unknown on every candidate chain; using hint {}", asset, hint),
        );
        ResolvedChain {
            chain: hint,
            symbol: None,
            confirmed: false,
        }
    }

    /// Confirmed chain for an asset, if the resolver has one cached
    pub fn confirmed_chain(&self, asset: &str) -> Option<Chain> {
        self.cached(asset).map(|r| r.chain)
    }

    fn cached(&self, asset: &str) -> Option<ResolvedChain> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.get(asset).and_then(|entry| {
            if entry.resolved_at.elapsed() > self.config.ttl() {
                None
            } else {
                Some(ResolvedChain {
                    chain: entry.chain,
                    symbol: entry.symbol.clone(),
                    confirmed: true,
                })
            }
        })
    }

    fn insert(&self, asset: &str, chain: Chain, symbol: Option<String>) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());

        // Bounded: drop expired entries first, then oldest if still full
        if cache.len() >= self.config.capacity {
            let ttl = self.config.ttl();
            cache.retain(|_, entry| entry.resolved_at.elapsed() <= ttl);
        }
        if cache.len() >= self.config.capacity {
            if let Some(oldest) = cache
                .iter()
                .min_by_key(|(_, entry)| entry.resolved_at)
                .map(|(k, _)| k.clone())
            {
                cache.remove(&oldest);
            }
        }

        cache.insert(
            asset.to_string(),
            ChainCacheEntry {
                chain,
                symbol,
                resolved_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::{ApiError, TokenMeta};
    use crate::candles::types::{Candle, Interval};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
    const EVM_ADDR: &str = "0x1f9840a85d5af5bf1d1762f925bdaddc4201f984";

    struct MetaOnChain {
        chain: Chain,
        lookups: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl MarketApi for MetaOnChain {
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
            Ok(None)
        }

        async fn token_metadata(&self, _asset: &str, chain: Chain) -> Result<Option<TokenMeta>, ApiError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApiError::Transport("connection refused".into()));
            }
            if chain == self.chain {
                Ok(Some(TokenMeta {
                    chain,
                    symbol: Some("UNI".into()),
                }))
            } else {
                Ok(None)
            }
        }
    }

    #[test]
    fn test_address_formats() {
        assert!(is_solana_address(SOL_MINT));
        assert!(!is_solana_address(EVM_ADDR));
        assert!(is_ambiguous_address(EVM_ADDR));
        assert!(!is_ambiguous_address(SOL_MINT));
        assert!(!is_ambiguous_address("0xnothex"));
    }

    #[tokio::test]
    async fn test_solana_bypasses_lookup() {
        let api = Arc::new(MetaOnChain {
            chain: Chain::Base,
            lookups: AtomicUsize::new(0),
            fail: false,
        });
        let resolver = ChainResolver::new(api.clone(), CacheConfig::chain_resolution());

        let resolved = resolver.resolve(SOL_MINT, Chain::Solana).await;
        assert_eq!(resolved.chain, Chain::Solana);
        assert!(resolved.confirmed);
        assert_eq!(api.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolves_and_caches_evm_chain() {
        let api = Arc::new(MetaOnChain {
            chain: Chain::Base,
            lookups: AtomicUsize::new(0),
            fail: false,
        });
        let resolver = ChainResolver::new(api.clone(), CacheConfig::chain_resolution());

        let resolved = resolver.resolve(EVM_ADDR, Chain::Ethereum).await;
        assert_eq!(resolved.chain, Chain::Base);
        assert!(resolved.confirmed);
        assert_eq!(resolved.symbol.as_deref(), Some("UNI"));

        // Second resolve is served from the cache
        let lookups_before = api.lookups.load(Ordering::SeqCst);
        let again = resolver.resolve(EVM_ADDR, Chain::Ethereum).await;
        assert_eq!(again.chain, Chain::Base);
        assert_eq!(api.lookups.load(Ordering::SeqCst), lookups_before);
        assert_eq!(resolver.confirmed_chain(EVM_ADDR), Some(Chain::Base));
    }

    #[tokio::test]
    async fn test_lookup_failure_falls_back_to_hint() {
        let api = Arc::new(MetaOnChain {
            chain: Chain::Base,
            lookups: AtomicUsize::new(0),
            fail: true,
        });
        let resolver = ChainResolver::new(api, CacheConfig::chain_resolution());

        let resolved = resolver.resolve(EVM_ADDR, Chain::Polygon).await;
        assert_eq!(resolved.chain, Chain::Polygon);
        assert!(!resolved.confirmed);
        // Fallbacks are not cached
        assert_eq!(resolver.confirmed_chain(EVM_ADDR), None);
    }
}

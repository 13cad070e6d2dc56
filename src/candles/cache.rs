/// In-process candle window cache
///
/// Bounded, time-expiring memory tier in front of the durable store.
/// LRU eviction by entry count, TTL checked on read. Thread-safe.

use crate::candles::types::{Candle, Interval};
use crate::config::CacheConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Instant;

/// Canonical lookup key for one (asset, interval, window) combination.
///
/// Window bounds are floored to the interval grid so sub-interval jitter
/// collapses to one entry. Partially-overlapping windows stay distinct
/// entries; there is no interval merging.
pub fn window_key(asset: &str, interval: Interval, start: i64, end: i64) -> String {
    let step = interval.seconds();
    let floor = |ts: i64| ts.div_euclid(step) * step;
    format!("{}:{}:{}:{}", asset, interval.as_str(), floor(start), floor(end))
}

struct CacheEntry {
    candles: Vec<Candle>,
    inserted_at: Instant,
}

/// Cache metrics for monitoring
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub inserts: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState {
    data: HashMap<String, CacheEntry>,
    access_order: VecDeque<String>,
    metrics: CacheMetrics,
}

pub struct CandleCache {
    config: CacheConfig,
    state: RwLock<CacheState>,
}

impl CandleCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CacheState {
                data: HashMap::new(),
                access_order: VecDeque::new(),
                metrics: CacheMetrics::default(),
            }),
        }
    }

    /// Get candles for a key. Returns None when missing or expired.
    pub fn get(&self, key: &str) -> Option<Vec<Candle>> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        let expired = match state.data.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.config.ttl(),
            None => {
                state.metrics.misses += 1;
                return None;
            }
        };

        if expired {
            state.data.remove(key);
            state.access_order.retain(|k| k != key);
            state.metrics.misses += 1;
            state.metrics.expirations += 1;
            return None;
        }

        // Move to the back of the access order
        state.access_order.retain(|k| k != key);
        state.access_order.push_back(key.to_string());
        state.metrics.hits += 1;

        state.data.get(key).map(|entry| entry.candles.clone())
    }

    /// Insert candles under a key, evicting the least-recently-used entry
    /// when at capacity.
    pub fn put(&self, key: String, candles: Vec<Candle>) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        if state.data.len() >= self.config.capacity && !state.data.contains_key(&key) {
            if let Some(oldest) = state.access_order.pop_front() {
                state.data.remove(&oldest);
                state.metrics.evictions += 1;
            }
        }

        state.access_order.retain(|k| k != &key);
        state.access_order.push_back(key.clone());
        state.data.insert(
            key,
            CacheEntry {
                candles,
                inserted_at: Instant::now(),
            },
        );
        state.metrics.inserts += 1;
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .map(|s| s.data.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.state
            .read()
            .map(|s| s.metrics.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(1_700_000_000 + (i as i64) * 60, 1.0, 1.1, 0.9, 1.05, 10.0))
            .collect()
    }

    #[test]
    fn test_window_key_deterministic() {
        let a = window_key("So11111111111111111111111111111111111111112", Interval::Minute1, 1000, 2000);
        let b = window_key("So11111111111111111111111111111111111111112", Interval::Minute1, 1000, 2000);
        assert_eq!(a, b);

        // Different windows produce different keys; no merging
        let c = window_key("So11111111111111111111111111111111111111112", Interval::Minute1, 1000, 2060);
        assert_ne!(a, c);
    }

    #[test]
    fn test_window_key_floors_to_grid() {
        let aligned = window_key("mint", Interval::Minute1, 1200, 2400);
        let jittered = window_key("mint", Interval::Minute1, 1230, 2459);
        assert_eq!(aligned, jittered);
    }

    #[test]
    fn test_basic_operations() {
        let cache = CandleCache::new(CacheConfig::custom(60, 100));

        assert!(cache.is_empty());
        cache.put("key1".to_string(), candles(3));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("key1").map(|c| c.len()), Some(3));
        assert_eq!(cache.get("missing"), None);

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
    }

    #[test]
    fn test_ttl_expiration() {
        let cache = CandleCache::new(CacheConfig::custom(1, 100));

        cache.put("key".to_string(), candles(1));
        assert!(cache.get("key").is_some());

        thread::sleep(Duration::from_secs(2));
        assert!(cache.get("key").is_none());
        assert_eq!(cache.metrics().expirations, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = CandleCache::new(CacheConfig::custom(60, 2));

        cache.put("key1".to_string(), candles(1));
        cache.put("key2".to_string(), candles(1));

        // Touch key1 so key2 becomes the eviction candidate
        assert!(cache.get("key1").is_some());
        cache.put("key3".to_string(), candles(1));

        assert!(cache.get("key2").is_none());
        assert!(cache.get("key1").is_some());
        assert!(cache.get("key3").is_some());
        assert_eq!(cache.metrics().evictions, 1);
    }
}

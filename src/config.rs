/// Engine configuration
///
/// TTLs and capacities tuned for the upstream's billing model:
/// - Memory tier: short TTL, closed candles never change so the durable
///   tier carries long-term reuse
/// - Chain cache: long TTL, a token does not move chains
/// - Probe: cheap existence check, ~6x cheaper than a full candle call

use crate::candles::types::Interval;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live for cached entries, seconds
    pub ttl_secs: u64,

    /// Maximum number of entries (LRU eviction when exceeded)
    pub capacity: usize,
}

impl CacheConfig {
    /// Candle window cache (5 minute TTL, bounded by entry count)
    pub fn candle_windows() -> Self {
        Self {
            ttl_secs: 300,
            capacity: 256,
        }
    }

    /// Chain resolution cache (a confirmed chain is stable)
    pub fn chain_resolution() -> Self {
        Self {
            ttl_secs: 3600,
            capacity: 2000,
        }
    }

    /// Custom configuration
    pub fn custom(ttl_secs: u64, capacity: usize) -> Self {
        Self { ttl_secs, capacity }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard per-call row ceiling imposed by the upstream
    pub row_ceiling: usize,

    /// Chunk iteration cap per window, guards against pathological upstreams
    pub max_chunks_per_window: u32,

    /// Interval-periods of look-back before the reference instant
    pub lookback_periods: i64,

    /// Target candle count per interval for history fetches
    pub candles_per_interval: usize,

    /// Intervals fetched by `fetch_history`
    pub intervals: Vec<Interval>,

    /// Consecutive infrastructure failures before the breaker opens
    pub breaker_threshold: u32,

    /// Shortest interval eligible for gap detection, seconds. Shorter
    /// intervals legitimately micro-gap on thin markets.
    pub gap_scan_min_interval_secs: i64,

    pub memory_cache: CacheConfig,
    pub chain_cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            row_ceiling: 5000,
            max_chunks_per_window: 100,
            lookback_periods: 52,
            candles_per_interval: 5000,
            intervals: vec![Interval::Minute1, Interval::Minute5, Interval::Hour1],
            breaker_threshold: 5,
            gap_scan_min_interval_secs: 300,
            memory_cache: CacheConfig::candle_windows(),
            chain_cache: CacheConfig::chain_resolution(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Concurrent workers; 1 keeps the legacy fully-sequential behavior
    pub workers: usize,

    /// Fixed inter-request delay per worker, applied before every request
    /// except the worker's first. Aggregate rate is roughly workers / delay.
    pub request_delay_ms: u64,

    /// Progress log cadence, in completed items
    pub progress_every: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            request_delay_ms: 500,
            progress_every: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,

    /// Per-call timeout, seconds. Applies to every network call; a timed-out
    /// call counts as a breaker failure.
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://public-api.birdeye.so".to_string(),
            api_key: api_key.into(),
            timeout_secs: 30,
        }
    }
}

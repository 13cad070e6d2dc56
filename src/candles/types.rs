// Core types for the candle acquisition engine

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Supported candle intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
}

impl Interval {
    /// Returns the duration in seconds for this interval
    pub fn seconds(&self) -> i64 {
        match self {
            Interval::Minute1 => 60,
            Interval::Minute5 => 300,
            Interval::Minute15 => 900,
            Interval::Hour1 => 3600,
            Interval::Hour4 => 14400,
            Interval::Day1 => 86400,
        }
    }

    /// Returns the upstream API parameter for this interval
    pub fn api_param(&self) -> &'static str {
        self.as_str()
    }

    /// Returns all supported intervals
    pub fn all() -> Vec<Interval> {
        vec![
            Interval::Minute1,
            Interval::Minute5,
            Interval::Minute15,
            Interval::Hour1,
            Interval::Hour4,
            Interval::Day1,
        ]
    }

    pub fn parse(s: &str) -> Option<Interval> {
        match s {
            "1m" => Some(Interval::Minute1),
            "5m" => Some(Interval::Minute5),
            "15m" => Some(Interval::Minute15),
            "1h" => Some(Interval::Hour1),
            "4h" => Some(Interval::Hour4),
            "1d" => Some(Interval::Day1),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Hour1 => "1h",
            Interval::Hour4 => "4h",
            Interval::Day1 => "1d",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Supported chains. Hex-style addresses are shared across the EVM chains
/// and need resolution; base58 addresses are Solana-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Solana,
    Ethereum,
    Base,
    Arbitrum,
    Bsc,
    Polygon,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Ethereum => "ethereum",
            Chain::Base => "base",
            Chain::Arbitrum => "arbitrum",
            Chain::Bsc => "bsc",
            Chain::Polygon => "polygon",
        }
    }

    pub fn parse(s: &str) -> Option<Chain> {
        match s {
            "solana" => Some(Chain::Solana),
            "ethereum" => Some(Chain::Ethereum),
            "base" => Some(Chain::Base),
            "arbitrum" => Some(Chain::Arbitrum),
            "bsc" => Some(Chain::Bsc),
            "polygon" => Some(Chain::Polygon),
            _ => None,
        }
    }

    /// Chains that share the hex address format, in resolution probe order
    pub fn evm_chains() -> &'static [Chain] {
        &[
            Chain::Ethereum,
            Chain::Base,
            Chain::Arbitrum,
            Chain::Bsc,
            Chain::Polygon,
        ]
    }

    pub fn is_evm(&self) -> bool {
        !matches!(self, Chain::Solana)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single OHLCV bar. Timestamps are unix seconds, UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Degenerate bar reconstructed from a single point price
    pub fn flat(timestamp: i64, price: f64) -> Self {
        Self::new(timestamp, price, price, price, price, 0.0)
    }

    /// Validates OHLC containment plus finite, strictly positive prices
    pub fn is_valid(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.volume.is_finite()
            && self.volume >= 0.0
            && self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
    }

    pub fn body_size(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// One acquisition request: a single asset/interval/time-window combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub asset: String,
    pub chain: Chain,
    pub interval: Interval,
    pub start: i64,
    pub end: i64,
}

impl WorkItem {
    pub fn new(asset: impl Into<String>, chain: Chain, interval: Interval, start: i64, end: i64) -> Self {
        Self {
            asset: asset.into(),
            chain,
            interval,
            start,
            end,
        }
    }
}

/// Where the candles in a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Cache,
    Api,
}

/// Outcome of an availability probe. Transient, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub has_data: bool,
    pub satisfied_from_cache: bool,
}

/// Per-WorkItem result returned by the orchestrator and scheduler
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub asset: String,
    pub chain: Chain,
    pub interval: Interval,
    pub candles: Vec<Candle>,
    pub success: bool,
    /// Probe confirmed no data exists; distinct from success with zero candles
    pub skipped: bool,
    pub error: Option<CandleError>,
    pub source: ResultSource,
    pub chunks_fetched: u32,
    pub chunks_from_cache: u32,
    pub chunks_from_api: u32,
    pub repaired_bars: u32,
    pub elapsed_ms: u64,
}

impl FetchResult {
    pub fn skipped(item: &WorkItem, elapsed_ms: u64) -> Self {
        Self {
            asset: item.asset.clone(),
            chain: item.chain,
            interval: item.interval,
            candles: Vec::new(),
            success: false,
            skipped: true,
            error: None,
            source: ResultSource::Api,
            chunks_fetched: 0,
            chunks_from_cache: 0,
            chunks_from_api: 0,
            repaired_bars: 0,
            elapsed_ms,
        }
    }

    pub fn failed(item: &WorkItem, error: CandleError, elapsed_ms: u64) -> Self {
        Self {
            asset: item.asset.clone(),
            chain: item.chain,
            interval: item.interval,
            candles: Vec::new(),
            success: false,
            skipped: false,
            error: Some(error),
            source: ResultSource::Api,
            chunks_fetched: 0,
            chunks_from_cache: 0,
            chunks_from_api: 0,
            repaired_bars: 0,
            elapsed_ms,
        }
    }
}

/// Per-interval bookkeeping for a multi-interval history fetch
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryMeta {
    pub chunks_fetched: u32,
    pub chunks_from_cache: u32,
    pub chunks_from_api: u32,
    pub repaired_bars: u32,
    pub probe_satisfied_from_cache: bool,
    pub token_stored: bool,
}

/// Result of `fetch_history`: one series per requested interval plus metadata
#[derive(Debug, Clone)]
pub struct TokenHistory {
    pub asset: String,
    pub chain: Chain,
    pub symbol: Option<String>,
    pub skipped_no_data: bool,
    pub series: Vec<(Interval, Vec<Candle>)>,
    pub meta: HistoryMeta,
}

/// States a work item moves through inside the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    ChainResolving,
    Probing,
    SkippedNoData,
    ChunkFetching,
    Validating,
    Repairing,
    CacheWriting,
    Done,
    CircuitOpen,
    Failed,
}

impl FetchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchState::ChainResolving => "chain_resolving",
            FetchState::Probing => "probing",
            FetchState::SkippedNoData => "skipped_no_data",
            FetchState::ChunkFetching => "chunk_fetching",
            FetchState::Validating => "validating",
            FetchState::Repairing => "repairing",
            FetchState::CacheWriting => "cache_writing",
            FetchState::Done => "done",
            FetchState::CircuitOpen => "circuit_open",
            FetchState::Failed => "failed",
        }
    }
}

/// Error types for candle acquisition
#[derive(Debug, Clone, Error)]
pub enum CandleError {
    #[error("circuit breaker open after {failures} consecutive failures")]
    CircuitOpen { failures: u32 },

    #[error("upstream does not recognize {asset} on {chain}")]
    InvalidAsset { asset: String, chain: Chain },

    #[error("{asset} resolved to {expected}, not {hinted}; retry with {expected}")]
    WrongChain {
        asset: String,
        hinted: Chain,
        expected: Chain,
    },

    #[error("transient upstream failure: {0}")]
    Transient(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CandleError {
    /// Whether this failure should count against the circuit breaker.
    /// Expected negative answers (unknown asset, wrong chain) never do.
    pub fn trips_breaker(&self) -> bool {
        matches!(self, CandleError::Transient(_))
    }
}

pub type CandleResult<T> = Result<T, CandleError>;

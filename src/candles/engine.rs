// Fetch orchestrator
//
// One explicitly constructed engine instance owns the API client, both cache
// tiers, the chain resolver, the probe and the circuit breaker. Engines
// share nothing, so tests (and parallel deployments) never bleed state into
// each other.
//
// Per work item the flow is a small state machine:
// ChainResolving -> Probing -> (SkippedNoData | ChunkFetching -> Validating
// -> [Repairing] -> CacheWriting -> Done) | CircuitOpen | Failed

use crate::apis::{ApiError, MarketApi};
use crate::candles::breaker::CircuitBreaker;
use crate::candles::cache::{window_key, CacheMetrics, CandleCache};
use crate::candles::chains::ChainResolver;
use crate::candles::planner::ChunkPlanner;
use crate::candles::probe::AvailabilityProbe;
use crate::candles::store::CandleStore;
use crate::candles::types::{
    Candle, CandleError, CandleResult, Chain, FetchResult, FetchState, HistoryMeta, Interval,
    ResultSource, TokenHistory, WorkItem,
};
use crate::candles::validator::{self, ValidationAction};
use crate::config::EngineConfig;
use crate::logger::{self, LogTag};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Options for a multi-interval history fetch; unset fields fall back to the
/// engine configuration.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub intervals: Option<Vec<Interval>>,
    pub lookback_periods: Option<i64>,
    pub candles_per_interval: Option<usize>,
}

#[derive(Default)]
struct EngineCounters {
    api_calls: AtomicU64,
    probe_calls: AtomicU64,
    probe_short_circuits: AtomicU64,
    windows_from_cache: AtomicU64,
    windows_from_api: AtomicU64,
    bars_repaired: AtomicU64,
}

/// Point-in-time engine statistics
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    pub api_calls: u64,
    pub probe_calls: u64,
    pub probe_short_circuits: u64,
    pub windows_from_cache: u64,
    pub windows_from_api: u64,
    pub bars_repaired: u64,
    pub breaker_failures: u32,
    pub memory_cache: CacheMetrics,
}

struct WindowOutcome {
    candles: Vec<Candle>,
    source: ResultSource,
    chunks_fetched: u32,
    chunks_from_cache: u32,
    chunks_from_api: u32,
    repaired_bars: u32,
    stored: bool,
}

pub struct CandleEngine {
    api: Arc<dyn MarketApi>,
    store: Arc<dyn CandleStore>,
    memory: CandleCache,
    chains: ChainResolver,
    probe: AvailabilityProbe,
    breaker: CircuitBreaker,
    config: EngineConfig,
    counters: EngineCounters,
}

impl CandleEngine {
    pub fn new(api: Arc<dyn MarketApi>, store: Arc<dyn CandleStore>, config: EngineConfig) -> Self {
        Self {
            memory: CandleCache::new(config.memory_cache.clone()),
            chains: ChainResolver::new(Arc::clone(&api), config.chain_cache.clone()),
            probe: AvailabilityProbe::new(Arc::clone(&api), Arc::clone(&store)),
            breaker: CircuitBreaker::new(config.breaker_threshold),
            api,
            store,
            config,
            counters: EngineCounters::default(),
        }
    }

    /// Operator action: close an opened circuit
    pub fn reset_breaker(&self) {
        self.breaker.reset();
        logger::info(LogTag::Breaker, "circuit breaker reset");
    }

    pub fn metrics(&self) -> EngineMetrics {
        EngineMetrics {
            api_calls: self.counters.api_calls.load(Ordering::Relaxed),
            probe_calls: self.counters.probe_calls.load(Ordering::Relaxed),
            probe_short_circuits: self.counters.probe_short_circuits.load(Ordering::Relaxed),
            windows_from_cache: self.counters.windows_from_cache.load(Ordering::Relaxed),
            windows_from_api: self.counters.windows_from_api.load(Ordering::Relaxed),
            bars_repaired: self.counters.bars_repaired.load(Ordering::Relaxed),
            breaker_failures: self.breaker.failure_count(),
            memory_cache: self.memory.metrics(),
        }
    }

    /// Acquire one (asset, interval, window) combination
    pub async fn fetch_range(&self, item: &WorkItem) -> FetchResult {
        let started = Instant::now();

        self.transition(&item.asset, FetchState::ChainResolving);
        let resolved = self.chains.resolve(&item.asset, item.chain).await;
        let chain = resolved.chain;

        self.transition(&item.asset, FetchState::Probing);
        self.counters.probe_calls.fetch_add(1, Ordering::Relaxed);
        let probe = self.probe.check(&item.asset, chain, item.start).await;
        if !probe.has_data {
            self.counters
                .probe_short_circuits
                .fetch_add(1, Ordering::Relaxed);
            self.transition(&item.asset, FetchState::SkippedNoData);
            return FetchResult::skipped(item, elapsed_ms(started));
        }

        let target = self.config.candles_per_interval;
        match self
            .fetch_window(&item.asset, chain, item.interval, item.start, item.end, Some(target))
            .await
        {
            Ok(outcome) => {
                self.transition(&item.asset, FetchState::Done);
                FetchResult {
                    asset: item.asset.clone(),
                    chain,
                    interval: item.interval,
                    candles: outcome.candles,
                    success: true,
                    skipped: false,
                    error: None,
                    source: outcome.source,
                    chunks_fetched: outcome.chunks_fetched,
                    chunks_from_cache: outcome.chunks_from_cache,
                    chunks_from_api: outcome.chunks_from_api,
                    repaired_bars: outcome.repaired_bars,
                    elapsed_ms: elapsed_ms(started),
                }
            }
            Err(error) => {
                let error = self.map_chain_error(&item.asset, item.chain, chain, error).await;
                let state = match error {
                    CandleError::CircuitOpen { .. } => FetchState::CircuitOpen,
                    _ => FetchState::Failed,
                };
                self.transition(&item.asset, state);
                FetchResult::failed(item, error, elapsed_ms(started))
            }
        }
    }

    /// Acquire every configured interval for one asset around a reference
    /// instant. A single "no data" probe answer skips all of them, which is
    /// where the probe earns its keep.
    pub async fn fetch_history(
        &self,
        asset: &str,
        chain_hint: Chain,
        reference_time: i64,
        options: &FetchOptions,
    ) -> CandleResult<TokenHistory> {
        let intervals = options
            .intervals
            .clone()
            .unwrap_or_else(|| self.config.intervals.clone());
        let lookback = options
            .lookback_periods
            .unwrap_or(self.config.lookback_periods);
        let target = options
            .candles_per_interval
            .unwrap_or(self.config.candles_per_interval);

        self.transition(asset, FetchState::ChainResolving);
        let resolved = self.chains.resolve(asset, chain_hint).await;
        let chain = resolved.chain;

        self.transition(asset, FetchState::Probing);
        self.counters.probe_calls.fetch_add(1, Ordering::Relaxed);
        let probe = self.probe.check(asset, chain, reference_time).await;
        if !probe.has_data {
            self.counters
                .probe_short_circuits
                .fetch_add(1, Ordering::Relaxed);
            self.transition(asset, FetchState::SkippedNoData);
            logger::info(
                LogTag::Engine,
                &format!("{}: no data upstream, skipping {} intervals", asset, intervals.len()),
            );
            return Ok(TokenHistory {
                asset: asset.to_string(),
                chain,
                symbol: resolved.symbol,
                skipped_no_data: true,
                series: Vec::new(),
                meta: HistoryMeta {
                    probe_satisfied_from_cache: probe.satisfied_from_cache,
                    ..HistoryMeta::default()
                },
            });
        }

        let mut meta = HistoryMeta {
            probe_satisfied_from_cache: probe.satisfied_from_cache,
            ..HistoryMeta::default()
        };
        let mut series = Vec::with_capacity(intervals.len());

        for interval in intervals {
            let step = interval.seconds();
            let start = reference_time - lookback * step;
            let end = reference_time + (target as i64) * step;

            let outcome = self
                .fetch_window(asset, chain, interval, start, end, Some(target))
                .await;

            match outcome {
                Ok(outcome) => {
                    meta.chunks_fetched += outcome.chunks_fetched;
                    meta.chunks_from_cache += outcome.chunks_from_cache;
                    meta.chunks_from_api += outcome.chunks_from_api;
                    meta.repaired_bars += outcome.repaired_bars;
                    meta.token_stored |= outcome.stored;
                    series.push((interval, outcome.candles));
                }
                Err(error) => {
                    let error = self.map_chain_error(asset, chain_hint, chain, error).await;
                    self.transition(asset, FetchState::Failed);
                    return Err(error);
                }
            }
        }

        self.transition(asset, FetchState::Done);
        Ok(TokenHistory {
            asset: asset.to_string(),
            chain,
            symbol: resolved.symbol,
            skipped_no_data: false,
            series,
            meta,
        })
    }

    /// Read-through fetch of one window: memory tier, durable tier, then the
    /// planned chunk sequence with validation and repair.
    async fn fetch_window(
        &self,
        asset: &str,
        chain: Chain,
        interval: Interval,
        start: i64,
        end: i64,
        target_rows: Option<usize>,
    ) -> CandleResult<WindowOutcome> {
        let key = window_key(asset, interval, start, end);

        if let Some(candles) = self.memory.get(&key) {
            self.counters.windows_from_cache.fetch_add(1, Ordering::Relaxed);
            return Ok(WindowOutcome {
                candles,
                source: ResultSource::Cache,
                chunks_fetched: 0,
                chunks_from_cache: 1,
                chunks_from_api: 0,
                repaired_bars: 0,
                stored: false,
            });
        }

        let durable = match self.store.range(asset, chain, interval, start, end) {
            Ok(rows) => rows,
            Err(e) => {
                // A broken durable read is a miss, not a failed item
                logger::warning(
                    LogTag::Store,
                    &format!("durable read failed for {} {}: {}", asset, interval, e),
                );
                Vec::new()
            }
        };
        if !durable.is_empty() {
            self.counters.windows_from_cache.fetch_add(1, Ordering::Relaxed);
            self.memory.put(key, durable.clone());
            return Ok(WindowOutcome {
                candles: durable,
                source: ResultSource::Cache,
                chunks_fetched: 0,
                chunks_from_cache: 1,
                chunks_from_api: 0,
                repaired_bars: 0,
                stored: false,
            });
        }

        self.transition(asset, FetchState::ChunkFetching);
        let mut planner = ChunkPlanner::new(
            interval,
            start,
            end,
            self.config.row_ceiling,
            self.config.max_chunks_per_window,
            target_rows,
        );

        let scan_gaps =
            validator::gap_scan_applies(interval, self.config.gap_scan_min_interval_secs);
        let mut collected: Vec<Candle> = Vec::new();
        let mut chunks_from_api = 0u32;
        let mut repaired_total = 0u32;

        while let Some(window) = planner.next_window() {
            let batch = self
                .fetch_chunk(asset, chain, interval, window.from, window.to)
                .await?;
            chunks_from_api += 1;

            if batch.is_empty() {
                planner.record_result(0, None);
                break;
            }

            let last_ts = batch.iter().map(|c| c.timestamp).max();
            let rows = batch.len();

            self.transition(asset, FetchState::Validating);
            let report = validator::validate_chunk(&batch, interval, scan_gaps);
            let batch = match validator::decide(&report, false) {
                ValidationAction::Accept => batch,
                _ => {
                    logger::debug(
                        LogTag::Engine,
                        &format!(
                            "{} {}: chunk flagged ({} invalid, {} missing), re-fetching",
                            asset,
                            interval,
                            report.invalid.len(),
                            report.missing.len()
                        ),
                    );
                    let retry = self
                        .fetch_chunk(asset, chain, interval, window.from, window.to)
                        .await?;
                    chunks_from_api += 1;

                    // An empty retry repairs the original batch instead
                    let candidate = if retry.is_empty() { batch } else { retry };
                    let retry_report =
                        validator::validate_chunk(&candidate, interval, scan_gaps);
                    match validator::decide(&retry_report, true) {
                        ValidationAction::Accept => candidate,
                        _ => {
                            self.transition(asset, FetchState::Repairing);
                            let (repaired, synthesized) = validator::repair_batch(
                                self.api.as_ref(),
                                asset,
                                chain,
                                candidate,
                                &retry_report,
                            )
                            .await;
                            repaired_total += synthesized;
                            self.counters
                                .bars_repaired
                                .fetch_add(synthesized as u64, Ordering::Relaxed);
                            repaired
                        }
                    }
                }
            };

            collected.extend(batch);
            planner.record_result(rows, last_ts);
        }

        collected.sort_by_key(|c| c.timestamp);
        collected.dedup_by_key(|c| c.timestamp);

        self.transition(asset, FetchState::CacheWriting);
        let stored = match self.store.insert_batch(asset, chain, interval, &collected) {
            Ok(inserted) => inserted > 0,
            Err(e) => {
                // Data in hand still flows to the caller
                logger::warning(
                    LogTag::Store,
                    &format!("durable write failed for {} {}: {}", asset, interval, e),
                );
                false
            }
        };
        self.memory.put(key, collected.clone());
        self.counters.windows_from_api.fetch_add(1, Ordering::Relaxed);

        Ok(WindowOutcome {
            candles: collected,
            source: ResultSource::Api,
            chunks_fetched: planner.chunks_issued(),
            chunks_from_cache: 0,
            chunks_from_api,
            repaired_bars: repaired_total,
            stored,
        })
    }

    /// One upstream candle call behind the breaker, with failure accounting
    async fn fetch_chunk(
        &self,
        asset: &str,
        chain: Chain,
        interval: Interval,
        from: i64,
        to: i64,
    ) -> CandleResult<Vec<Candle>> {
        self.breaker.check()?;

        self.counters.api_calls.fetch_add(1, Ordering::Relaxed);
        match self.api.candle_range(asset, chain, interval, from, to).await {
            Ok(batch) => {
                self.breaker.record_success();
                Ok(batch)
            }
            Err(ApiError::InvalidAsset(_)) => {
                // Expected negative answer, never a breaker failure
                Err(CandleError::InvalidAsset {
                    asset: asset.to_string(),
                    chain,
                })
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(CandleError::Transient(format!("{}", e)))
            }
        }
    }

    /// Turn an InvalidAsset on a guessed chain into an actionable WrongChain
    /// when a late resolution can name the correct one.
    async fn map_chain_error(
        &self,
        asset: &str,
        hinted: Chain,
        used: Chain,
        error: CandleError,
    ) -> CandleError {
        if let CandleError::InvalidAsset { .. } = &error {
            let resolved = self.chains.resolve(asset, used).await;
            if resolved.confirmed && resolved.chain != used {
                return CandleError::WrongChain {
                    asset: asset.to_string(),
                    hinted,
                    expected: resolved.chain,
                };
            }
        }
        error
    }

    fn transition(&self, asset: &str, state: FetchState) {
        logger::verbose(LogTag::Engine, &format!("{} -> {}", asset, state.as_str()));
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

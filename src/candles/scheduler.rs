// Parallel fetch scheduling
//
// A fixed pool of independent workers walks the worklist round-robin. Each
// worker paces itself with its own inter-request delay, so the aggregate
// request rate is roughly workers / delay and must sit under the upstream's
// published limit. Results land at their original worklist index; no merge
// step, no cross-worker ordering.

use crate::candles::engine::CandleEngine;
use crate::candles::types::{FetchResult, WorkItem};
use crate::config::SchedulerConfig;
use crate::logger::{self, LogTag};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct CandleScheduler {
    engine: Arc<CandleEngine>,
    config: SchedulerConfig,
}

impl CandleScheduler {
    pub fn new(engine: Arc<CandleEngine>, config: SchedulerConfig) -> Self {
        Self { engine, config }
    }

    /// Process the worklist to completion and return one result per item,
    /// in worklist order. Item i goes to worker i % N, so each worker owns
    /// a deterministic, disjoint, strictly-increasing subsequence.
    pub async fn run(&self, items: Vec<WorkItem>) -> Vec<FetchResult> {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let workers = self.config.workers.max(1);
        logger::info(
            LogTag::Scheduler,
            &format!("processing {} items across {} workers", total, workers),
        );

        let mut assignments: Vec<Vec<(usize, WorkItem)>> = (0..workers).map(|_| Vec::new()).collect();
        for (index, item) in items.into_iter().enumerate() {
            assignments[index % workers].push((index, item));
        }

        let completed = Arc::new(AtomicUsize::new(0));
        let log_gate = Arc::new(AtomicBool::new(false));
        let delay = Duration::from_millis(self.config.request_delay_ms);
        let progress_every = self.config.progress_every;

        let handles: Vec<_> = assignments
            .into_iter()
            .map(|work| {
                let engine = Arc::clone(&self.engine);
                let completed = Arc::clone(&completed);
                let log_gate = Arc::clone(&log_gate);

                tokio::spawn(async move {
                    let mut results = Vec::with_capacity(work.len());
                    for (position, (index, item)) in work.into_iter().enumerate() {
                        // Rate pacing: every request except the worker's first
                        if position > 0 && !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }

                        let result = engine.fetch_range(&item).await;

                        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                        if progress_every > 0 && done % progress_every == 0 {
                            // Best-effort: a busy gate just drops this report
                            if !log_gate.swap(true, Ordering::SeqCst) {
                                logger::info(
                                    LogTag::Scheduler,
                                    &format!("progress: {}/{} items", done, total),
                                );
                                log_gate.store(false, Ordering::SeqCst);
                            }
                        }

                        results.push((index, result));
                    }
                    results
                })
            })
            .collect();

        let mut slots: Vec<Option<FetchResult>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        for joined in join_all(handles).await {
            match joined {
                Ok(batch) => {
                    for (index, result) in batch {
                        slots[index] = Some(result);
                    }
                }
                Err(e) => {
                    logger::error(LogTag::Scheduler, &format!("worker task failed: {}", e));
                }
            }
        }

        let results: Vec<FetchResult> = slots.into_iter().flatten().collect();
        let failed = results.iter().filter(|r| !r.success && !r.skipped).count();
        let skipped = results.iter().filter(|r| r.skipped).count();
        logger::info(
            LogTag::Scheduler,
            &format!(
                "worklist done: {} ok, {} skipped, {} failed",
                results.len() - failed - skipped,
                skipped,
                failed
            ),
        );

        results
    }
}

// candlevault CLI: run a worklist of candle acquisitions against the
// upstream and persist everything into the durable store.

use anyhow::{bail, Context, Result};
use candlevault::apis::birdeye::BirdeyeClient;
use candlevault::candles::{CandleEngine, CandleScheduler, CandleStore, SqliteCandleStore, WorkItem};
use candlevault::config::{ApiConfig, EngineConfig, SchedulerConfig};
use candlevault::logger::{self, LogTag};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "candlevault",
    about = "Acquire historical candles through the layered cache engine"
)]
struct Args {
    /// JSON worklist: [{"asset", "chain", "interval", "start", "end"}, ...]
    #[arg(long)]
    worklist: PathBuf,

    /// SQLite database for the durable candle tier
    #[arg(long, default_value = "data/candles.db")]
    db: PathBuf,

    /// Upstream API key (falls back to BIRDEYE_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Concurrent workers; keep workers / delay under the upstream limit
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Per-worker delay between requests, milliseconds
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,

    /// Progress log cadence, in completed items
    #[arg(long, default_value_t = 25)]
    progress_every: usize,

    /// Drop stored bars older than this many days before starting
    #[arg(long)]
    prune_days: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();
    let args = Args::parse();

    let api_key = match args.api_key.or_else(|| std::env::var("BIRDEYE_API_KEY").ok()) {
        Some(key) if !key.is_empty() => key,
        _ => bail!("no API key: pass --api-key or set BIRDEYE_API_KEY"),
    };

    let raw = std::fs::read_to_string(&args.worklist)
        .with_context(|| format!("failed to read worklist {}", args.worklist.display()))?;
    let items: Vec<WorkItem> =
        serde_json::from_str(&raw).context("worklist is not valid JSON")?;

    if items.is_empty() {
        logger::warning(LogTag::Cli, "worklist is empty, nothing to do");
        return Ok(());
    }

    if let Some(parent) = args.db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let store = Arc::new(SqliteCandleStore::new(&args.db)?);

    if let Some(days) = args.prune_days {
        let cutoff = chrono::Utc::now().timestamp() - days * 86_400;
        let removed = store.prune_before(cutoff)?;
        logger::info(
            LogTag::Cli,
            &format!("pruned {} bars older than {} days", removed, days),
        );
    }

    let api = Arc::new(BirdeyeClient::new(ApiConfig::new(api_key)));
    let engine = Arc::new(CandleEngine::new(api, store, EngineConfig::default()));

    let scheduler = CandleScheduler::new(
        Arc::clone(&engine),
        SchedulerConfig {
            workers: args.workers,
            request_delay_ms: args.delay_ms,
            progress_every: args.progress_every,
        },
    );

    logger::info(
        LogTag::Cli,
        &format!("starting {} work items ({} workers)", items.len(), args.workers),
    );

    let results = scheduler.run(items).await;

    let ok = results.iter().filter(|r| r.success).count();
    let skipped = results.iter().filter(|r| r.skipped).count();
    let failed = results.len() - ok - skipped;
    let total_candles: usize = results.iter().map(|r| r.candles.len()).sum();

    for result in results.iter().filter(|r| !r.success && !r.skipped) {
        if let Some(error) = &result.error {
            logger::error(
                LogTag::Cli,
                &format!("{} {}: {}", result.asset, result.interval, error),
            );
        }
    }

    let metrics = engine.metrics();
    logger::info(
        LogTag::Cli,
        &format!(
            "{} ok, {} skipped, {} failed; {} candles acquired",
            ok, skipped, failed, total_candles
        ),
    );
    logger::info(
        LogTag::Cli,
        &format!(
            "{} API calls, {} probes ({} short-circuits), {} repaired bars, {:.0}% cache hit rate",
            metrics.api_calls,
            metrics.probe_calls,
            metrics.probe_short_circuits,
            metrics.bars_repaired,
            metrics.memory_cache.hit_rate() * 100.0
        ),
    );

    if failed > 0 {
        bail!("{} work items failed", failed);
    }
    Ok(())
}

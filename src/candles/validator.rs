// Batch validation and repair
//
// The upstream feed is known to return malformed bars (inverted high/low,
// zero or NaN prices) and occasionally large holes. Every fetched chunk is
// inspected; a flagged chunk earns exactly one re-fetch, and whatever is
// still bad after that is reconstructed bar-by-bar from cheap point-price
// lookups, falling back to the nearest surviving bar's close.

use crate::apis::MarketApi;
use crate::candles::types::{Candle, Chain, Interval};
use crate::logger::{self, LogTag};
use std::collections::BTreeSet;

/// What a validation pass found in one chunk
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Timestamps of bars that violate the OHLC invariants
    pub invalid: Vec<i64>,
    /// Expected grid slots with no bar at all (only when the gap scan ran)
    pub missing: Vec<i64>,
    /// Grid slots expected across the observed span
    pub expected: usize,
    /// Significantly incomplete: >50% of expected slots missing
    pub gap_flagged: bool,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty() && !self.gap_flagged
    }
}

/// What to do with a flagged chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationAction {
    Accept,
    Refetch,
    Repair,
}

/// Retry-vs-repair-vs-accept, decided in isolation so it stays testable
pub fn decide(report: &ValidationReport, already_retried: bool) -> ValidationAction {
    if report.is_clean() {
        ValidationAction::Accept
    } else if !already_retried {
        ValidationAction::Refetch
    } else {
        ValidationAction::Repair
    }
}

/// Whether the interval is long enough for the gap scan. Very short
/// intervals legitimately micro-gap on thin markets.
pub fn gap_scan_applies(interval: Interval, min_interval_secs: i64) -> bool {
    interval.seconds() >= min_interval_secs
}

/// Inspect one chunk. The gap scan covers the observed span (first to last
/// returned bar), so windows reaching past the end of available data do not
/// flag falsely.
pub fn validate_chunk(candles: &[Candle], interval: Interval, scan_gaps: bool) -> ValidationReport {
    let mut report = ValidationReport::default();

    for candle in candles {
        if !candle.is_valid() {
            report.invalid.push(candle.timestamp);
        }
    }

    if !scan_gaps || candles.is_empty() {
        return report;
    }

    let step = interval.seconds();
    let first = candles.iter().map(|c| c.timestamp).min().unwrap_or(0);
    let last = candles.iter().map(|c| c.timestamp).max().unwrap_or(0);
    let expected = ((last - first) / step + 1).max(0) as usize;
    report.expected = expected;

    if expected >= 10 {
        let present: BTreeSet<i64> = candles.iter().map(|c| c.timestamp).collect();
        let mut slot = first;
        while slot <= last {
            if !present.contains(&slot) {
                report.missing.push(slot);
            }
            slot += step;
        }
        report.gap_flagged = report.missing.len() * 2 > expected;
    }

    report
}

/// Reconstruct the bad and missing slots of a chunk.
///
/// Valid bars always survive untouched. Each invalid or missing timestamp
/// gets a point-price lookup synthesizing a flat bar; when the lookup has
/// nothing, the nearest surviving bar's close is carried over. Returns the
/// repaired, re-sorted series plus the number of synthesized bars.
pub async fn repair_batch(
    api: &dyn MarketApi,
    asset: &str,
    chain: Chain,
    candles: Vec<Candle>,
    report: &ValidationReport,
) -> (Vec<Candle>, u32) {
    let mut repaired: Vec<Candle> = candles.iter().filter(|c| c.is_valid()).cloned().collect();

    let mut slots: BTreeSet<i64> = report.invalid.iter().copied().collect();
    if report.gap_flagged {
        slots.extend(report.missing.iter().copied());
    }
    // A slot that already has a surviving valid bar needs no work
    let surviving: BTreeSet<i64> = repaired.iter().map(|c| c.timestamp).collect();
    slots.retain(|ts| !surviving.contains(ts));

    let mut synthesized = 0u32;
    for ts in slots {
        let price = match api.price_at(asset, chain, ts).await {
            Ok(Some(price)) => Some(price),
            Ok(None) => nearest_close(&repaired, ts),
            Err(e) => {
                logger::debug(
                    LogTag::Repair,
                    &format!("point price at {} failed ({}); carrying nearest close", ts, e),
                );
                nearest_close(&repaired, ts)
            }
        };

        if let Some(price) = price {
            repaired.push(Candle::flat(ts, price));
            synthesized += 1;
        }
    }

    repaired.sort_by_key(|c| c.timestamp);
    repaired.dedup_by_key(|c| c.timestamp);

    if synthesized > 0 {
        logger::debug(
            LogTag::Repair,
            &format!("{}: synthesized {} bars", asset, synthesized),
        );
    }

    (repaired, synthesized)
}

/// Closing price of the valid bar nearest by absolute timestamp distance
fn nearest_close(valid: &[Candle], ts: i64) -> Option<f64> {
    valid
        .iter()
        .min_by_key(|c| (c.timestamp - ts).abs())
        .map(|c| c.close)
}

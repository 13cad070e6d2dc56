// Durable candle tier: range-queryable reads, idempotent writes

use crate::candles::types::{Candle, CandleError, CandleResult, Chain, Interval};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Narrow interface to the durable store. Concurrent readers and idempotent
/// writers are assumed; everything else is an implementation detail.
pub trait CandleStore: Send + Sync {
    /// All bars for (asset, chain, interval) inside [from, to], ascending.
    fn range(
        &self,
        asset: &str,
        chain: Chain,
        interval: Interval,
        from: i64,
        to: i64,
    ) -> CandleResult<Vec<Candle>>;

    /// Whether any stored bar's interval window covers the given instant.
    fn has_bar_covering(&self, asset: &str, chain: Chain, at: i64) -> CandleResult<bool>;

    /// Idempotent batch write; returns the number of newly inserted rows.
    fn insert_batch(
        &self,
        asset: &str,
        chain: Chain,
        interval: Interval,
        candles: &[Candle],
    ) -> CandleResult<usize>;

    /// Delete bars older than the cutoff timestamp; returns rows removed.
    fn prune_before(&self, cutoff: i64) -> CandleResult<usize>;

    /// Total stored bar count.
    fn bar_count(&self) -> CandleResult<usize>;
}

pub struct SqliteCandleStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCandleStore {
    /// Open (or create) the database and ensure the schema exists
    pub fn new<P: AsRef<Path>>(path: P) -> CandleResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| CandleError::Storage(format!("failed to open database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.create_tables()?;
        Ok(store)
    }

    /// In-memory database, used by tests
    pub fn in_memory() -> CandleResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CandleError::Storage(format!("failed to open database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> CandleResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CandleError::Storage(format!("lock error: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS candles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                asset TEXT NOT NULL,
                chain TEXT NOT NULL,
                interval TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(asset, chain, interval, timestamp)
            );
            CREATE INDEX IF NOT EXISTS idx_candles_lookup
                ON candles(asset, chain, interval, timestamp);
            CREATE INDEX IF NOT EXISTS idx_candles_probe
                ON candles(asset, chain, timestamp DESC);
            "#,
        )
        .map_err(|e| CandleError::Storage(format!("failed to create tables: {}", e)))?;

        Ok(())
    }
}

impl CandleStore for SqliteCandleStore {
    fn range(
        &self,
        asset: &str,
        chain: Chain,
        interval: Interval,
        from: i64,
        to: i64,
    ) -> CandleResult<Vec<Candle>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CandleError::Storage(format!("lock error: {}", e)))?;

        let mut stmt = conn
            .prepare(
                "SELECT timestamp, open, high, low, close, volume FROM candles
                 WHERE asset = ?1 AND chain = ?2 AND interval = ?3
                   AND timestamp >= ?4 AND timestamp <= ?5
                 ORDER BY timestamp ASC",
            )
            .map_err(|e| CandleError::Storage(format!("failed to prepare: {}", e)))?;

        let candles = stmt
            .query_map(
                params![asset, chain.as_str(), interval.as_str(), from, to],
                |row| {
                    Ok(Candle {
                        timestamp: row.get(0)?,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        volume: row.get(5)?,
                    })
                },
            )
            .map_err(|e| CandleError::Storage(format!("query failed: {}", e)))?
            .collect::<SqliteResult<Vec<_>>>()
            .map_err(|e| CandleError::Storage(format!("failed to collect: {}", e)))?;

        Ok(candles)
    }

    fn has_bar_covering(&self, asset: &str, chain: Chain, at: i64) -> CandleResult<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CandleError::Storage(format!("lock error: {}", e)))?;

        // Latest bar at or before the instant, any interval; coverage is
        // decided against that bar's own interval width.
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT interval, timestamp FROM candles
                 WHERE asset = ?1 AND chain = ?2 AND timestamp <= ?3
                 ORDER BY timestamp DESC LIMIT 1",
                params![asset, chain.as_str(), at],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| CandleError::Storage(format!("query failed: {}", e)))?;

        Ok(match row {
            Some((interval_str, timestamp)) => Interval::parse(&interval_str)
                .map(|interval| at < timestamp + interval.seconds())
                .unwrap_or(false),
            None => false,
        })
    }

    fn insert_batch(
        &self,
        asset: &str,
        chain: Chain,
        interval: Interval,
        candles: &[Candle],
    ) -> CandleResult<usize> {
        if candles.is_empty() {
            return Ok(0);
        }

        let conn = self
            .conn
            .lock()
            .map_err(|e| CandleError::Storage(format!("lock error: {}", e)))?;

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| CandleError::Storage(format!("failed to start transaction: {}", e)))?;

        let mut inserted = 0;
        for candle in candles {
            let result = tx.execute(
                "INSERT OR IGNORE INTO candles (asset, chain, interval, timestamp, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    asset,
                    chain.as_str(),
                    interval.as_str(),
                    candle.timestamp,
                    candle.open,
                    candle.high,
                    candle.low,
                    candle.close,
                    candle.volume
                ],
            );

            if let Ok(rows) = result {
                inserted += rows;
            }
        }

        tx.commit()
            .map_err(|e| CandleError::Storage(format!("failed to commit: {}", e)))?;

        Ok(inserted)
    }

    fn prune_before(&self, cutoff: i64) -> CandleResult<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CandleError::Storage(format!("lock error: {}", e)))?;

        let deleted = conn
            .execute("DELETE FROM candles WHERE timestamp < ?1", params![cutoff])
            .map_err(|e| CandleError::Storage(format!("prune failed: {}", e)))?;

        Ok(deleted)
    }

    fn bar_count(&self) -> CandleResult<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CandleError::Storage(format!("lock error: {}", e)))?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM candles", params![], |row| row.get(0))
            .map_err(|e| CandleError::Storage(format!("query failed: {}", e)))?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minute_candles(start: i64, n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(start + (i as i64) * 60, 1.0, 1.2, 0.9, 1.1, 50.0))
            .collect()
    }

    #[test]
    fn test_insert_and_range() {
        let store = SqliteCandleStore::in_memory().unwrap();
        let candles = minute_candles(1_700_000_000, 10);

        let inserted = store
            .insert_batch("mintA", Chain::Solana, Interval::Minute1, &candles)
            .unwrap();
        assert_eq!(inserted, 10);

        let read = store
            .range(
                "mintA",
                Chain::Solana,
                Interval::Minute1,
                1_700_000_000,
                1_700_000_000 + 9 * 60,
            )
            .unwrap();
        assert_eq!(read.len(), 10);
        assert!(read.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        // Other chain or interval sees nothing
        assert!(store
            .range(
                "mintA",
                Chain::Ethereum,
                Interval::Minute1,
                1_700_000_000,
                1_800_000_000
            )
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_idempotent_insert() {
        let store = SqliteCandleStore::in_memory().unwrap();
        let candles = minute_candles(1_700_000_000, 5);

        assert_eq!(
            store
                .insert_batch("mintA", Chain::Solana, Interval::Minute1, &candles)
                .unwrap(),
            5
        );
        // Second write of the same rows inserts nothing
        assert_eq!(
            store
                .insert_batch("mintA", Chain::Solana, Interval::Minute1, &candles)
                .unwrap(),
            0
        );
        assert_eq!(store.bar_count().unwrap(), 5);
    }

    #[test]
    fn test_has_bar_covering() {
        let store = SqliteCandleStore::in_memory().unwrap();
        let candles = minute_candles(1_700_000_000, 3);
        store
            .insert_batch("mintA", Chain::Solana, Interval::Minute1, &candles)
            .unwrap();

        // Inside the last bar's window
        assert!(store
            .has_bar_covering("mintA", Chain::Solana, 1_700_000_000 + 2 * 60 + 30)
            .unwrap());
        // After all bars closed
        assert!(!store
            .has_bar_covering("mintA", Chain::Solana, 1_700_000_000 + 10 * 60)
            .unwrap());
        // Before the first bar
        assert!(!store
            .has_bar_covering("mintA", Chain::Solana, 1_699_999_000)
            .unwrap());
        // Unknown asset
        assert!(!store
            .has_bar_covering("mintB", Chain::Solana, 1_700_000_030)
            .unwrap());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candles.db");

        {
            let store = SqliteCandleStore::new(&path).unwrap();
            store
                .insert_batch(
                    "mintA",
                    Chain::Solana,
                    Interval::Minute5,
                    &minute_candles(1_700_000_000, 4),
                )
                .unwrap();
        }

        let reopened = SqliteCandleStore::new(&path).unwrap();
        assert_eq!(reopened.bar_count().unwrap(), 4);
        assert_eq!(
            reopened
                .range(
                    "mintA",
                    Chain::Solana,
                    Interval::Minute5,
                    1_700_000_000,
                    1_800_000_000
                )
                .unwrap()
                .len(),
            4
        );
    }

    #[test]
    fn test_prune_before() {
        let store = SqliteCandleStore::in_memory().unwrap();
        store
            .insert_batch(
                "mintA",
                Chain::Solana,
                Interval::Minute1,
                &minute_candles(1_700_000_000, 10),
            )
            .unwrap();

        let removed = store.prune_before(1_700_000_000 + 5 * 60).unwrap();
        assert_eq!(removed, 5);
        assert_eq!(store.bar_count().unwrap(), 5);
    }
}

//! SQLite market data store and signal sink.
//!
//! Tables:
//! - `market_data`, keyed by (asset, timeframe, timestamp)
//! - `trade_signals`, keyed by (asset, timeframe, system, timestamp)
//!
//! Market data writes are `INSERT OR REPLACE`. Signal writes upsert on the key
//! and keep a stored `result` or `risk_amount` when the new row leaves it
//! empty, so re-running a pass is idempotent and never erases an outcome.

use crate::domain::error::IctError;
use crate::domain::ohlcv::Bar;
use crate::domain::series::MarketSeries;
use crate::domain::signal::SignalRecord;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::signal_sink::SignalSink;
use chrono::NaiveDateTime;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::str::FromStr;
use tracing::{debug, info};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> IctError {
    IctError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, rusqlite::Error> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            raw.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

fn parse_text<T>(raw: &str) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            raw.len(),
            rusqlite::types::Type::Text,
            e.to_string().into(),
        )
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, IctError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| IctError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| IctError::Database {
                reason: e.to_string(),
            })?;

        info!(path = %db_path, pool_size, "opened sqlite store");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, IctError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| IctError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, IctError> {
        self.pool.get().map_err(|e: r2d2::Error| IctError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), IctError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS market_data (
                asset TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (asset, timeframe, timestamp)
            );
            CREATE TABLE IF NOT EXISTS trade_signals (
                asset TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                system TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_price REAL NOT NULL,
                stop_loss REAL,
                take_profit REAL,
                invalidation_point REAL,
                risk_amount REAL,
                risk_reward REAL,
                result TEXT,
                PRIMARY KEY (asset, timeframe, system, timestamp)
            );
            CREATE INDEX IF NOT EXISTS idx_trade_signals_timestamp ON trade_signals(timestamp);",
        )
        .map_err(query_err)?;

        Ok(())
    }

    pub fn insert_series(&self, series: &MarketSeries) -> Result<(), IctError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for bar in series.bars() {
            tx.execute(
                "INSERT OR REPLACE INTO market_data
                 (asset, timeframe, timestamp, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    series.asset(),
                    series.timeframe().label(),
                    bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        debug!(
            asset = series.asset(),
            timeframe = %series.timeframe(),
            bars = series.len(),
            "stored market data"
        );
        Ok(())
    }
}

impl MarketDataPort for SqliteAdapter {
    fn fetch_series(&self, asset: &str, timeframe: Timeframe) -> Result<MarketSeries, IctError> {
        let conn = self.conn()?;
        let asset = asset.to_uppercase();

        let query = "SELECT timestamp, open, high, low, close, volume
                     FROM market_data
                     WHERE asset = ?1 AND timeframe = ?2
                     ORDER BY timestamp ASC";

        let mut stmt = conn.prepare(query).map_err(query_err)?;
        let rows = stmt
            .query_map(params![asset, timeframe.label()], |row| {
                let ts: String = row.get(0)?;
                Ok(Bar {
                    timestamp: parse_timestamp(&ts)?,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })
            .map_err(query_err)?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(row.map_err(query_err)?);
        }

        MarketSeries::new(&asset, timeframe, bars)
    }

    fn list_assets(&self) -> Result<Vec<String>, IctError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT DISTINCT asset FROM market_data ORDER BY asset")
            .map_err(query_err)?;

        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;

        let mut assets = Vec::new();
        for row in rows {
            assets.push(row.map_err(query_err)?);
        }

        Ok(assets)
    }
}

impl SignalSink for SqliteAdapter {
    fn upsert_signal(&self, signal: &SignalRecord) -> Result<(), IctError> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO trade_signals
             (asset, timeframe, system, timestamp, direction, entry_price, stop_loss,
              take_profit, invalidation_point, risk_amount, risk_reward, result)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(asset, timeframe, system, timestamp) DO UPDATE SET
                direction = excluded.direction,
                entry_price = excluded.entry_price,
                stop_loss = excluded.stop_loss,
                take_profit = excluded.take_profit,
                invalidation_point = excluded.invalidation_point,
                risk_amount = COALESCE(excluded.risk_amount, trade_signals.risk_amount),
                risk_reward = excluded.risk_reward,
                result = COALESCE(excluded.result, trade_signals.result)",
            params![
                signal.asset,
                signal.timeframe.label(),
                signal.system.name(),
                signal.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                signal.direction.as_str(),
                signal.entry_price,
                signal.stop_loss,
                signal.take_profit,
                signal.invalidation_point,
                signal.risk_amount,
                signal.risk_reward,
                signal.result.map(|r| r.as_str()),
            ],
        )
        .map_err(query_err)?;

        Ok(())
    }

    fn load_signals(&self, asset: Option<&str>) -> Result<Vec<SignalRecord>, IctError> {
        let conn = self.conn()?;

        let query = "SELECT asset, timeframe, system, timestamp, direction, entry_price,
                            stop_loss, take_profit, invalidation_point, risk_amount,
                            risk_reward, result
                     FROM trade_signals
                     WHERE ?1 IS NULL OR asset = ?1
                     ORDER BY timestamp ASC, system ASC";

        let mut stmt = conn.prepare(query).map_err(query_err)?;
        let rows = stmt
            .query_map(params![asset.map(str::to_uppercase)], |row| {
                let timeframe: String = row.get(1)?;
                let system: String = row.get(2)?;
                let ts: String = row.get(3)?;
                let direction: String = row.get(4)?;
                let result: Option<String> = row.get(11)?;
                Ok(SignalRecord {
                    asset: row.get(0)?,
                    timeframe: parse_text(&timeframe)?,
                    system: parse_text(&system)?,
                    timestamp: parse_timestamp(&ts)?,
                    direction: parse_text(&direction)?,
                    entry_price: row.get(5)?,
                    stop_loss: row.get(6)?,
                    take_profit: row.get(7)?,
                    invalidation_point: row.get(8)?,
                    risk_amount: row.get(9)?,
                    risk_reward: row.get(10)?,
                    result: result.as_deref().map(parse_text).transpose()?,
                })
            })
            .map_err(query_err)?;

        let mut signals = Vec::new();
        for row in rows {
            signals.push(row.map_err(query_err)?);
        }

        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entry::{Direction, EntryCandidate, EntrySystem, Entries};
    use crate::domain::signal::TradeResult;
    use chrono::NaiveDate;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn keys(&self, _section: &str) -> Vec<String> {
            Vec::new()
        }
    }

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 5)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn store() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn sample_series() -> MarketSeries {
        let bars = vec![
            Bar {
                timestamp: ts(10),
                open: 2001.0,
                high: 2004.0,
                low: 2000.0,
                close: 2003.0,
                volume: 800,
            },
            Bar {
                timestamp: ts(9),
                open: 2000.0,
                high: 2002.0,
                low: 1998.0,
                close: 2001.0,
                volume: 1000,
            },
        ];
        MarketSeries::new("XAUUSD", Timeframe::H1, bars).unwrap()
    }

    fn candidate(system: EntrySystem, hour: u32) -> EntryCandidate {
        EntryCandidate {
            system,
            direction: Direction::Long,
            entry_price: 2003.0,
            stop_loss: 1998.0,
            take_profit: 2013.0,
            invalidation_point: 2000.0,
            timestamp: ts(hour),
        }
    }

    #[test]
    fn from_config_missing_path() {
        let config = EmptyConfig;
        let result = SqliteAdapter::from_config(&config);
        match result {
            Err(IctError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn in_memory_initialization_is_repeatable() {
        let adapter = store();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn market_data_round_trip() {
        let adapter = store();
        adapter.insert_series(&sample_series()).unwrap();

        let fetched = adapter.fetch_series("xauusd", Timeframe::H1).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched.bars()[0].timestamp, ts(9));
        assert_eq!(fetched.last().close, 2003.0);
        assert_eq!(adapter.list_assets().unwrap(), vec!["XAUUSD"]);
    }

    #[test]
    fn fetch_series_without_rows_is_no_data() {
        let adapter = store();
        let err = adapter.fetch_series("NASDAQ", Timeframe::D1).unwrap_err();
        assert!(matches!(err, IctError::NoData { .. }));
    }

    #[test]
    fn insert_series_is_idempotent() {
        let adapter = store();
        adapter.insert_series(&sample_series()).unwrap();
        adapter.insert_series(&sample_series()).unwrap();
        assert_eq!(adapter.fetch_series("XAUUSD", Timeframe::H1).unwrap().len(), 2);
    }

    #[test]
    fn upsert_replaces_same_key() {
        let adapter = store();
        let first = SignalRecord::from_candidate("XAUUSD", Timeframe::H1, &candidate(EntrySystem::Crt, 10));
        adapter.upsert_signal(&first).unwrap();

        let mut second = first.clone();
        second.result = Some(TradeResult::Win);
        second.risk_amount = Some(100.0);
        adapter.upsert_signal(&second).unwrap();

        let stored = adapter.load_signals(None).unwrap();
        assert_eq!(stored, vec![second]);
    }

    #[test]
    fn upsert_keeps_recorded_outcome() {
        let adapter = store();
        let mut closed =
            SignalRecord::from_candidate("XAUUSD", Timeframe::H1, &candidate(EntrySystem::Crt, 10))
                .with_risk_amount(100.0);
        closed.result = Some(TradeResult::Win);
        adapter.upsert_signal(&closed).unwrap();

        // a rerun regenerates the same candidate without outcome or sizing
        let rerun = SignalRecord::from_candidate("XAUUSD", Timeframe::H1, &candidate(EntrySystem::Crt, 10));
        adapter.upsert_signal(&rerun).unwrap();

        let stored = adapter.load_signals(None).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].result, Some(TradeResult::Win));
        assert_eq!(stored[0].risk_amount, Some(100.0));
    }

    #[test]
    fn entries_rerun_keeps_outcome() {
        let adapter = store();
        let mut entries = Entries::new();
        entries.insert(EntrySystem::Crt, candidate(EntrySystem::Crt, 10));
        adapter.upsert_entries("XAUUSD", Timeframe::H1, &entries).unwrap();

        let mut closed = adapter.load_signals(None).unwrap().remove(0);
        closed.result = Some(TradeResult::Loss);
        closed.risk_amount = Some(50.0);
        adapter.upsert_signal(&closed).unwrap();

        adapter.upsert_entries("XAUUSD", Timeframe::H1, &entries).unwrap();
        let stored = adapter.load_signals(None).unwrap();
        assert_eq!(stored, vec![closed]);
    }

    #[test]
    fn upsert_entries_writes_one_row_per_system() {
        let adapter = store();
        let mut entries = Entries::new();
        entries.insert(EntrySystem::Crt, candidate(EntrySystem::Crt, 10));
        entries.insert(EntrySystem::MarketMaker, candidate(EntrySystem::MarketMaker, 10));

        assert_eq!(adapter.upsert_entries("XAUUSD", Timeframe::H1, &entries).unwrap(), 2);
        assert_eq!(adapter.upsert_entries("XAUUSD", Timeframe::H1, &entries).unwrap(), 2);

        let stored = adapter.load_signals(Some("xauusd")).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].system, EntrySystem::Crt);
        assert_eq!(stored[1].system, EntrySystem::MarketMaker);
        assert!(adapter.load_signals(Some("NASDAQ")).unwrap().is_empty());
    }
}

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use ictrader::domain::error::IctError;
pub use ictrader::domain::ohlcv::Bar;
use ictrader::domain::series::MarketSeries;
use ictrader::domain::signal::{SignalKey, SignalRecord};
use ictrader::domain::timeframe::Timeframe;
use ictrader::ports::data_port::MarketDataPort;
use ictrader::ports::signal_sink::SignalSink;
use std::cell::RefCell;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<(String, Timeframe), Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, asset: &str, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        self.data.insert((asset.to_string(), timeframe), bars);
        self
    }

    pub fn with_error(mut self, asset: &str, reason: &str) -> Self {
        self.errors.insert(asset.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_series(&self, asset: &str, timeframe: Timeframe) -> Result<MarketSeries, IctError> {
        if let Some(reason) = self.errors.get(asset) {
            return Err(IctError::Database {
                reason: reason.clone(),
            });
        }
        let bars = self
            .data
            .get(&(asset.to_string(), timeframe))
            .cloned()
            .unwrap_or_default();
        MarketSeries::new(asset, timeframe, bars)
    }

    fn list_assets(&self) -> Result<Vec<String>, IctError> {
        let mut assets: Vec<String> = self.data.keys().map(|(a, _)| a.clone()).collect();
        assets.sort();
        assets.dedup();
        Ok(assets)
    }
}

/// In-memory sink with the same upsert semantics as the sqlite store.
pub struct RecordingSink {
    pub rows: RefCell<Vec<SignalRecord>>,
    pub writes: RefCell<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            rows: RefCell::new(Vec::new()),
            writes: RefCell::new(0),
        }
    }

    pub fn keys(&self) -> Vec<SignalKey> {
        self.rows.borrow().iter().map(SignalRecord::key).collect()
    }
}

impl SignalSink for RecordingSink {
    fn upsert_signal(&self, signal: &SignalRecord) -> Result<(), IctError> {
        *self.writes.borrow_mut() += 1;
        let mut rows = self.rows.borrow_mut();
        let key = signal.key();
        match rows.iter_mut().find(|r| r.key() == key) {
            Some(existing) => {
                let mut merged = signal.clone();
                merged.result = merged.result.or(existing.result);
                merged.risk_amount = merged.risk_amount.or(existing.risk_amount);
                *existing = merged;
            }
            None => rows.push(signal.clone()),
        }
        Ok(())
    }

    fn load_signals(&self, asset: Option<&str>) -> Result<Vec<SignalRecord>, IctError> {
        Ok(self
            .rows
            .borrow()
            .iter()
            .filter(|r| asset.is_none_or(|a| r.asset.eq_ignore_ascii_case(a)))
            .cloned()
            .collect())
    }
}

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn hour(i: usize) -> NaiveDateTime {
    start() + Duration::hours(i as i64)
}

pub fn make_bar(i: usize, open: f64, high: f64, low: f64, close: f64, volume: i64) -> Bar {
    Bar {
        timestamp: hour(i),
        open,
        high,
        low,
        close,
        volume,
    }
}

pub fn flat_bars(n: usize, price: f64, volume: i64) -> Vec<Bar> {
    (0..n)
        .map(|i| make_bar(i, price, price + 1.0, price - 1.0, price, volume))
        .collect()
}

/// 25 bars: flat at 100, an undercut to 95 at bar -3, and a bullish close
/// on ten times the usual volume.
pub fn turtle_soup_long_bars() -> Vec<Bar> {
    let mut bars = flat_bars(22, 100.0, 100);
    bars.push(make_bar(22, 100.0, 100.5, 95.0, 97.0, 100));
    bars.push(make_bar(23, 97.0, 98.5, 96.5, 98.0, 100));
    bars.push(make_bar(24, 98.0, 101.5, 97.5, 101.0, 1000));
    bars
}

/// Quiet 0.1-wide history, a 2-wide regime, then the Turtle Soup pattern.
/// ATR of the last 20 bars exceeds the mean rolling range, so the series is volatile.
pub fn volatile_turtle_soup_bars() -> Vec<Bar> {
    let mut bars: Vec<Bar> = (0..40)
        .map(|i| make_bar(i, 100.0, 100.1, 99.9, 100.0, 100))
        .collect();
    for i in 40..57 {
        bars.push(make_bar(i, 100.0, 101.0, 99.0, 100.0, 100));
    }
    bars.push(make_bar(57, 100.0, 100.5, 95.0, 97.0, 100));
    bars.push(make_bar(58, 97.0, 98.5, 96.5, 98.0, 100));
    bars.push(make_bar(59, 98.0, 101.5, 97.5, 101.0, 1000));
    bars
}

pub fn series(asset: &str, timeframe: Timeframe, bars: Vec<Bar>) -> MarketSeries {
    MarketSeries::new(asset, timeframe, bars).unwrap()
}

pub fn write_bars_csv(path: &std::path::Path, bars: &[Bar]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    std::fs::write(path, content).unwrap();
}

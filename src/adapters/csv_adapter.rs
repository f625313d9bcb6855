//! CSV file market data adapter.
//!
//! One file per series, named `{ASSET}_{timeframe}.csv`, with header
//! `timestamp,open,high,low,close,volume`.

use crate::domain::error::IctError;
use crate::domain::ohlcv::Bar;
use crate::domain::series::MarketSeries;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::MarketDataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, asset: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", asset.to_uppercase(), timeframe))
    }
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, IctError> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|e| IctError::Database {
            reason: format!("invalid timestamp '{}': {}", raw, e),
        })
}

fn parse_price(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, IctError> {
    record
        .get(index)
        .ok_or_else(|| IctError::Database {
            reason: format!("missing {} column", name),
        })?
        .trim()
        .parse()
        .map_err(|e| IctError::Database {
            reason: format!("invalid {} value: {}", name, e),
        })
}

impl MarketDataPort for CsvAdapter {
    fn fetch_series(&self, asset: &str, timeframe: Timeframe) -> Result<MarketSeries, IctError> {
        let path = self.csv_path(asset, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => IctError::NoData {
                asset: asset.to_uppercase(),
                timeframe: timeframe.to_string(),
            },
            _ => IctError::Database {
                reason: format!("failed to read {}: {}", path.display(), e),
            },
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| IctError::Database {
                reason: format!("CSV parse error: {}", e),
            })?;

            let timestamp = parse_timestamp(record.get(0).ok_or_else(|| IctError::Database {
                reason: "missing timestamp column".into(),
            })?)?;

            // Providers may send volume as float text; whole units are kept.
            let volume = parse_price(&record, 5, "volume")?.trunc() as i64;

            bars.push(Bar {
                timestamp,
                open: parse_price(&record, 1, "open")?,
                high: parse_price(&record, 2, "high")?,
                low: parse_price(&record, 3, "low")?,
                close: parse_price(&record, 4, "close")?,
                volume,
            });
        }

        debug!(path = %path.display(), rows = bars.len(), "loaded csv series");
        MarketSeries::new(&asset.to_uppercase(), timeframe, bars)
    }

    fn list_assets(&self) -> Result<Vec<String>, IctError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| IctError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut assets = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| IctError::Database {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            let Some(stem) = name_str.strip_suffix(".csv") else {
                continue;
            };
            let Some((asset, label)) = stem.rsplit_once('_') else {
                continue;
            };
            if label.parse::<Timeframe>().is_ok() {
                assets.push(asset.to_string());
            }
        }

        assets.sort();
        assets.dedup();
        Ok(assets)
    }
}

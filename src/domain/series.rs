//! MarketSeries: the validated, ordered bar store every analysis stage reads from.

use crate::domain::error::IctError;
use crate::domain::ohlcv::Bar;
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone)]
pub struct MarketSeries {
    asset: String,
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl MarketSeries {
    /// Builds a series from raw rows. Rows are sorted by timestamp; duplicate
    /// timestamps, malformed bars and empty input are rejected.
    pub fn new(asset: &str, timeframe: Timeframe, mut bars: Vec<Bar>) -> Result<Self, IctError> {
        if bars.is_empty() {
            return Err(IctError::NoData {
                asset: asset.to_string(),
                timeframe: timeframe.to_string(),
            });
        }

        bars.sort_by_key(|b| b.timestamp);

        for (index, bar) in bars.iter().enumerate() {
            bar.validate()
                .map_err(|reason| IctError::InvalidBar { index, reason })?;
        }

        if let Some(pair) = bars.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
            return Err(IctError::DuplicateTimestamp {
                timestamp: pair[1].timestamp.to_string(),
            });
        }

        Ok(Self {
            asset: asset.to_string(),
            timeframe,
            bars,
        })
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The most recent bar. A series is never empty once built.
    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    /// The last `n` bars, or the whole series when it is shorter.
    pub fn tail(&self, n: usize) -> &[Bar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }

    /// Error describing why a window of `minimum` bars cannot be evaluated.
    pub fn insufficient(&self, minimum: usize) -> IctError {
        IctError::InsufficientData {
            asset: self.asset.clone(),
            timeframe: self.timeframe.to_string(),
            bars: self.bars.len(),
            minimum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn make_bar(day: u32, close: f64) -> Bar {
        Bar {
            timestamp: ts(day),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn new_sorts_bars_ascending() {
        let bars = vec![make_bar(3, 103.0), make_bar(1, 101.0), make_bar(2, 102.0)];
        let series = MarketSeries::new("NASDAQ", Timeframe::D1, bars).unwrap();

        let days: Vec<_> = series.bars().iter().map(|b| b.timestamp).collect();
        assert_eq!(days, vec![ts(1), ts(2), ts(3)]);
        assert!((series.last().close - 103.0).abs() < f64::EPSILON);
    }

    #[test]
    fn new_rejects_empty_input() {
        let err = MarketSeries::new("NASDAQ", Timeframe::D1, vec![]).unwrap_err();
        assert!(matches!(err, IctError::NoData { .. }));
    }

    #[test]
    fn new_rejects_duplicate_timestamps() {
        let bars = vec![make_bar(1, 100.0), make_bar(1, 101.0)];
        let err = MarketSeries::new("NASDAQ", Timeframe::D1, bars).unwrap_err();
        assert!(matches!(err, IctError::DuplicateTimestamp { .. }));
    }

    #[test]
    fn new_rejects_malformed_bar() {
        let mut bad = make_bar(2, 100.0);
        bad.high = 99.0;
        let err = MarketSeries::new("NASDAQ", Timeframe::D1, vec![make_bar(1, 100.0), bad])
            .unwrap_err();
        assert!(matches!(err, IctError::InvalidBar { index: 1, .. }));
    }

    #[test]
    fn tail_clamps_to_length() {
        let bars = (1..=5).map(|d| make_bar(d, 100.0 + d as f64)).collect();
        let series = MarketSeries::new("XAUUSD", Timeframe::H1, bars).unwrap();

        assert_eq!(series.tail(2).len(), 2);
        assert!((series.tail(2)[0].close - 104.0).abs() < f64::EPSILON);
        assert_eq!(series.tail(50).len(), 5);
    }

    #[test]
    fn insufficient_reports_counts() {
        let series = MarketSeries::new("XAUUSD", Timeframe::H1, vec![make_bar(1, 100.0)]).unwrap();
        match series.insufficient(21) {
            IctError::InsufficientData { bars, minimum, .. } => {
                assert_eq!(bars, 1);
                assert_eq!(minimum, 21);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}

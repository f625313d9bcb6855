//! Simple Moving Average of closes and its one-step slope.
//!
//! SLOPE(n) = (SMA[last] - SMA[last-1]) / SMA[last-1]

use crate::domain::indicator_helpers::{relative_change, rolling_mean};
use crate::domain::ohlcv::Bar;

pub fn sma_series(bars: &[Bar], period: usize) -> Vec<f64> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    rolling_mean(&closes, period)
}

/// Relative change of the SMA over its last two values. `None` until two
/// SMA values exist; `Some(0.0)` when the previous SMA is degenerate.
pub fn sma_slope(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }
    let window = &bars[bars.len() - period - 1..];
    let sma = sma_series(window, period);
    match sma.as_slice() {
        [.., prev, last] => Some(relative_change(*last, *prev)),
        _ => None,
    }
}

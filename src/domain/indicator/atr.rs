//! Average True Range.
//!
//! TR[i] = max(H[i] - L[i], |H[i] - C[i-1]|, |L[i] - C[i-1]|)
//! ATR(n) = simple mean of the last n true ranges, evaluated at the last bar.
//! Needs n + 1 bars so every true range in the window has a previous close.

use crate::domain::ohlcv::Bar;

/// True range of every bar that has a predecessor, oldest first.
pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| w[1].true_range(w[0].close))
        .collect()
}

pub fn average_true_range(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }
    let window = &bars[bars.len() - period - 1..];
    let sum: f64 = true_ranges(window).iter().sum();
    Some(sum / period as f64)
}

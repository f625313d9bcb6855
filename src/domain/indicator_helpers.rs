//! Shared rolling-window primitives for indicator and pattern calculations.
//!
//! All helpers scan fixed-length windows over a contiguous bar slice once,
//! so an analysis pass stays linear in the window size.

use crate::domain::ohlcv::Bar;

/// Denominators at or below this magnitude are treated as zero.
pub const DEGENERATE_EPSILON: f64 = 1e-12;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn max_of(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    values.into_iter().fold(None, |acc, v| match acc {
        Some(m) if m >= v => Some(m),
        _ => Some(v),
    })
}

pub fn min_of(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    values.into_iter().fold(None, |acc, v| match acc {
        Some(m) if m <= v => Some(m),
        _ => Some(v),
    })
}

pub fn highest_high(bars: &[Bar]) -> Option<f64> {
    max_of(bars.iter().map(|b| b.high))
}

pub fn lowest_low(bars: &[Bar]) -> Option<f64> {
    min_of(bars.iter().map(|b| b.low))
}

pub fn mean_volume(bars: &[Bar]) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    Some(bars.iter().map(|b| b.volume as f64).sum::<f64>() / bars.len() as f64)
}

/// Simple moving average over every complete window, oldest first.
/// The output has `values.len() - period + 1` entries.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut sum: f64 = values[..period].iter().sum();
    out.push(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out.push(sum / period as f64);
    }
    out
}

/// Mean over all complete windows of (highest high - lowest low).
pub fn rolling_range_mean(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let ranges: Vec<f64> = bars
        .windows(period)
        .filter_map(|w| Some(highest_high(w)? - lowest_low(w)?))
        .collect();
    mean(&ranges)
}

/// (current - previous) / previous, or 0 when `previous` is degenerate.
pub fn relative_change(current: f64, previous: f64) -> f64 {
    if previous.abs() <= DEGENERATE_EPSILON {
        return 0.0;
    }
    (current - previous) / previous
}

//! Technical indicators used by the structure, entry and risk engines.
//!
//! Every indicator here is a stateless function of a bar slice evaluated at
//! the last bar. A result of `None` means the slice is shorter than the
//! indicator's window; callers treat that as "no signal".

pub mod atr;
pub mod sma;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Atr(usize),
    Sma(usize),
    SmaSlope(usize),
}

impl IndicatorType {
    /// Minimum number of bars needed before the indicator has a value.
    pub fn min_bars(&self) -> usize {
        match self {
            IndicatorType::Atr(period) => period + 1,
            IndicatorType::Sma(period) => *period,
            IndicatorType::SmaSlope(period) => period + 1,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::SmaSlope(period) => write!(f, "SMA_SLOPE({})", period),
        }
    }
}

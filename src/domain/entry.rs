//! Entry-pattern engine.
//!
//! Three independent setups are evaluated against the tail of a series:
//! - Turtle Soup: a sweep of the recent low/high followed by a strong reversal bar.
//! - CRT: a breakout from a tight, quiet compression range.
//! - Market Maker Model: a bias-aligned reaction at the Q2 low / Q3 high.
//!
//! Each setup fires at most once per call. Not firing is a normal outcome.

use crate::domain::config::EngineConfig;
use crate::domain::indicator::atr::average_true_range;
use crate::domain::indicator_helpers::{
    DEGENERATE_EPSILON, highest_high, lowest_low, max_of, mean_volume, min_of,
    rolling_range_mean,
};
use crate::domain::ohlcv::Bar;
use crate::domain::series::MarketSeries;
use crate::domain::structure::{Bias, StructureSnapshot};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Last 20 bars plus the two reversal bars.
pub const TURTLE_SOUP_WINDOW: usize = 22;
pub const CRT_RANGE_BARS: usize = 6;
pub const CRT_VOLUME_PERIOD: usize = 20;
pub const CRT_MAX_RANGE: f64 = 0.005;
pub const CRT_MAX_VOLUME_RATIO: f64 = 0.5;
pub const MARKET_MAKER_WINDOW: usize = 3;
pub const STOP_ATR_MULT: f64 = 1.5;
/// Target offset used when no liquidity level lies in the trade direction.
pub const TARGET_FALLBACK_PCT: f64 = 0.02;

const TURTLE_SOUP_VOLUME_MULT: f64 = 2.0;
const MARKET_MAKER_VOLUME_MULT: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySystem {
    TurtleSoup,
    Crt,
    MarketMaker,
}

impl EntrySystem {
    pub const ALL: [EntrySystem; 3] = [
        EntrySystem::TurtleSoup,
        EntrySystem::Crt,
        EntrySystem::MarketMaker,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EntrySystem::TurtleSoup => "turtle_soup",
            EntrySystem::Crt => "crt",
            EntrySystem::MarketMaker => "market_maker",
        }
    }
}

impl fmt::Display for EntrySystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntrySystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntrySystem::ALL
            .into_iter()
            .find(|sys| sys.name() == s)
            .ok_or_else(|| format!("unknown entry system '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(Direction::Long),
            "short" => Ok(Direction::Short),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryCandidate {
    pub system: EntrySystem,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub invalidation_point: f64,
    pub timestamp: NaiveDateTime,
}

impl EntryCandidate {
    /// reward / risk, or 0 when the stop sits on the entry.
    pub fn risk_reward(&self) -> f64 {
        let risk = (self.entry_price - self.stop_loss).abs();
        let reward = (self.take_profit - self.entry_price).abs();
        if risk > 0.0 { reward / risk } else { 0.0 }
    }
}

/// Fired setups keyed by system, iterated in system order.
pub type Entries = BTreeMap<EntrySystem, EntryCandidate>;

pub struct EntryEngine<'a> {
    series: &'a MarketSeries,
    structure: StructureSnapshot,
    config: &'a EngineConfig,
}

impl<'a> EntryEngine<'a> {
    pub fn new(
        series: &'a MarketSeries,
        structure: StructureSnapshot,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            series,
            structure,
            config,
        }
    }

    pub fn series(&self) -> &MarketSeries {
        self.series
    }

    pub fn structure(&self) -> &StructureSnapshot {
        &self.structure
    }

    pub fn atr(&self) -> Option<f64> {
        average_true_range(self.series.bars(), self.config.atr_period)
    }

    /// Current ATR above the mean rolling high-low range of the whole series.
    pub fn is_volatile(&self) -> bool {
        let period = self.config.atr_period;
        match (
            self.atr(),
            rolling_range_mean(self.series.bars(), period),
        ) {
            (Some(atr), Some(avg_range)) => atr > avg_range,
            _ => false,
        }
    }

    /// Closest liquidity level beyond `price` in the trade direction: cluster
    /// highs plus premium for longs, cluster lows plus discount for shorts.
    pub fn find_nearest_liquidity_pool(&self, price: f64, direction: Direction) -> f64 {
        let pools = &self.structure.pools;
        match direction {
            Direction::Long => {
                let levels = pools
                    .clusters
                    .highs
                    .iter()
                    .map(|c| c.price)
                    .chain(std::iter::once(pools.pd_arrays.premium))
                    .filter(|&level| level > price);
                min_of(levels).unwrap_or(price * (1.0 + TARGET_FALLBACK_PCT))
            }
            Direction::Short => {
                let levels = pools
                    .clusters
                    .lows
                    .iter()
                    .map(|c| c.price)
                    .chain(std::iter::once(pools.pd_arrays.discount))
                    .filter(|&level| level < price);
                max_of(levels).unwrap_or(price * (1.0 - TARGET_FALLBACK_PCT))
            }
        }
    }

    fn candidate(
        &self,
        system: EntrySystem,
        direction: Direction,
        entry_price: f64,
        stop_loss: f64,
        invalidation_point: f64,
    ) -> EntryCandidate {
        EntryCandidate {
            system,
            direction,
            entry_price,
            stop_loss,
            take_profit: self.find_nearest_liquidity_pool(entry_price, direction),
            invalidation_point,
            timestamp: self.series.last().timestamp,
        }
    }

    pub fn turtle_soup(&self) -> Option<EntryCandidate> {
        let atr = self.atr()?;
        let window = self.series.tail(TURTLE_SOUP_WINDOW);
        if window.len() < 4 {
            return None;
        }

        let pivot = &window[window.len() - 3];
        let last = &window[window.len() - 1];
        let prior = &window[..window.len() - 3];
        let avg_volume = mean_volume(window)?;
        let heavy = last.volume as f64 > TURTLE_SOUP_VOLUME_MULT * avg_volume;

        if pivot.low < lowest_low(prior)? && last.is_bullish() && heavy {
            return Some(self.candidate(
                EntrySystem::TurtleSoup,
                Direction::Long,
                last.close,
                pivot.low - STOP_ATR_MULT * atr,
                pivot.low,
            ));
        }

        if pivot.high > highest_high(prior)? && last.is_bearish() && heavy {
            return Some(self.candidate(
                EntrySystem::TurtleSoup,
                Direction::Short,
                last.close,
                pivot.high + STOP_ATR_MULT * atr,
                pivot.high,
            ));
        }

        None
    }

    /// Breakout of the last bar out of the compression range formed by the
    /// `CRT_RANGE_BARS` bars before it.
    pub fn crt(&self) -> Option<EntryCandidate> {
        let atr = self.atr()?;
        let window = self.series.tail(CRT_RANGE_BARS + 1);
        if window.len() < CRT_RANGE_BARS + 1 || self.series.len() < CRT_VOLUME_PERIOD {
            return None;
        }

        let (range_bars, breakout) = window.split_at(CRT_RANGE_BARS);
        let last: &Bar = &breakout[0];
        let range_high = highest_high(range_bars)?;
        let range_low = lowest_low(range_bars)?;
        if range_low.abs() <= DEGENERATE_EPSILON {
            return None;
        }

        let baseline_volume = mean_volume(self.series.tail(CRT_VOLUME_PERIOD))?;
        if baseline_volume <= DEGENERATE_EPSILON {
            return None;
        }
        let range_pct = (range_high - range_low) / range_low;
        let volume_ratio = mean_volume(range_bars)? / baseline_volume;

        if range_pct > CRT_MAX_RANGE || volume_ratio >= CRT_MAX_VOLUME_RATIO {
            return None;
        }

        let range_mid = (range_high + range_low) / 2.0;
        if last.close > range_high {
            Some(self.candidate(
                EntrySystem::Crt,
                Direction::Long,
                last.close,
                range_low - STOP_ATR_MULT * atr,
                range_mid,
            ))
        } else if last.close < range_low {
            Some(self.candidate(
                EntrySystem::Crt,
                Direction::Short,
                last.close,
                range_high + STOP_ATR_MULT * atr,
                range_mid,
            ))
        } else {
            None
        }
    }

    pub fn market_maker_model(&self) -> Option<EntryCandidate> {
        let atr = self.atr()?;
        let window = self.series.tail(MARKET_MAKER_WINDOW);
        let last = self.series.last();
        let avg_volume = mean_volume(window)?;
        let heavy = last.volume as f64 > MARKET_MAKER_VOLUME_MULT * avg_volume;
        let levels = &self.structure.quarterly_levels;

        match self.structure.bias {
            Bias::Bullish if last.low <= levels.q2_low && last.is_bullish() && heavy => {
                Some(self.candidate(
                    EntrySystem::MarketMaker,
                    Direction::Long,
                    last.close,
                    levels.q2_low - STOP_ATR_MULT * atr,
                    levels.q2_low,
                ))
            }
            Bias::Bearish if last.high >= levels.q3_high && last.is_bearish() && heavy => {
                Some(self.candidate(
                    EntrySystem::MarketMaker,
                    Direction::Short,
                    last.close,
                    levels.q3_high + STOP_ATR_MULT * atr,
                    levels.q3_high,
                ))
            }
            _ => None,
        }
    }

    /// Turtle Soup only runs in a volatile regime; CRT and the Market Maker
    /// Model always run.
    pub fn generate_entries(&self) -> Entries {
        let mut entries = Entries::new();

        if self.is_volatile() {
            if let Some(entry) = self.turtle_soup() {
                entries.insert(entry.system, entry);
            }
        }
        if let Some(entry) = self.crt() {
            entries.insert(entry.system, entry);
        }
        if let Some(entry) = self.market_maker_model() {
            entries.insert(entry.system, entry);
        }

        debug!(
            asset = self.series.asset(),
            timeframe = %self.series.timeframe(),
            fired = entries.len(),
            "entry systems evaluated"
        );
        entries
    }
}

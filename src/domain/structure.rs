//! Market structure analysis: bias, quarterly levels, liquidity pools and
//! liquidity events derived from one [`MarketSeries`].
//!
//! The analyzer only reads tail windows of the series. Its results are plain
//! values; [`StructureSnapshot`] is what the entry engine consumes.

use crate::domain::config::EngineConfig;
use crate::domain::indicator::sma::sma_slope;
use crate::domain::indicator_helpers::{highest_high, lowest_low, mean_volume};
use crate::domain::ohlcv::Bar;
use crate::domain::series::MarketSeries;
use chrono::{Datelike, Local, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

pub const SMA_SLOPE_PERIOD: usize = 20;
/// Bars preceding a candidate sweep bar whose extreme it must exceed.
pub const SWEEP_LOOKBACK: usize = 20;
/// Extra bars scanned past the lookback so a sweep has a confirming bar.
pub const EVENT_EXTRA_BARS: usize = 3;
/// Closes that must hold inside a newly entered zone to count as a run.
pub const RUN_LENGTH: usize = 5;
pub const MIN_CLUSTER_TOUCHES: usize = 3;

const SWEEP_VOLUME_MULT: f64 = 2.0;
const RUN_VOLUME_MULT: f64 = 1.5;
const PD_ZONE_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

/// Calendar-quarter extremes for one year. Quarters without bars are 0/0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QuarterlyLevels {
    pub q1_high: f64,
    pub q1_low: f64,
    pub q2_high: f64,
    pub q2_low: f64,
    pub q3_high: f64,
    pub q3_low: f64,
    pub q4_high: f64,
    pub q4_low: f64,
}

impl QuarterlyLevels {
    fn set(&mut self, quarter: usize, high: f64, low: f64) {
        match quarter {
            0 => (self.q1_high, self.q1_low) = (high, low),
            1 => (self.q2_high, self.q2_low) = (high, low),
            2 => (self.q3_high, self.q3_low) = (high, low),
            _ => (self.q4_high, self.q4_low) = (high, low),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidityCluster {
    pub price: f64,
    pub count: usize,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Clusters {
    pub highs: Vec<LiquidityCluster>,
    pub lows: Vec<LiquidityCluster>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PdArray {
    pub premium: f64,
    pub equilibrium: f64,
    pub discount: f64,
}

impl PdArray {
    pub fn from_window(bars: &[Bar]) -> Option<Self> {
        let high = highest_high(bars)?;
        let low = lowest_low(bars)?;
        let range = high - low;
        let premium = high - range * PD_ZONE_FRACTION;
        let discount = low + range * PD_ZONE_FRACTION;
        Some(Self {
            premium,
            equilibrium: (premium + discount) / 2.0,
            discount,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidityPools {
    pub clusters: Clusters,
    pub pd_arrays: PdArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Premium,
    Equilibrium,
    Discount,
}

impl Zone {
    /// Zone of a close. The bounds are inclusive here but exclusive in
    /// [`Zone::holds`].
    pub fn classify(close: f64, pd: &PdArray) -> Zone {
        if close >= pd.premium {
            Zone::Premium
        } else if close <= pd.discount {
            Zone::Discount
        } else {
            Zone::Equilibrium
        }
    }

    /// Whether every close stays strictly inside this zone.
    pub fn holds(self, closes: &[f64], pd: &PdArray) -> bool {
        match self {
            Zone::Premium => closes.iter().all(|&c| c > pd.premium),
            Zone::Discount => closes.iter().all(|&c| c < pd.discount),
            Zone::Equilibrium => closes.iter().all(|&c| c < pd.premium && c > pd.discount),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepDirection {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sweep {
    #[serde(rename = "type")]
    pub direction: SweepDirection,
    pub price: f64,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    #[serde(rename = "type")]
    pub zone: Zone,
    pub start_price: f64,
    pub end_price: f64,
    pub start_timestamp: NaiveDateTime,
    pub end_timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiquidityEvents {
    pub sweeps: Vec<Sweep>,
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureReport {
    pub bias: Bias,
    pub liquidity_zones: LiquidityPools,
    pub events: LiquidityEvents,
}

/// Read-only structure results handed to the entry engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureSnapshot {
    pub quarterly_levels: QuarterlyLevels,
    pub bias: Bias,
    pub pools: LiquidityPools,
}

pub struct StructureAnalyzer<'a> {
    series: &'a MarketSeries,
    config: &'a EngineConfig,
    year: i32,
}

impl<'a> StructureAnalyzer<'a> {
    /// Quarterly levels are taken from the current wall-clock year.
    pub fn new(series: &'a MarketSeries, config: &'a EngineConfig) -> Self {
        Self::with_year(series, config, Local::now().year())
    }

    pub fn with_year(series: &'a MarketSeries, config: &'a EngineConfig, year: i32) -> Self {
        Self {
            series,
            config,
            year,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarterly_levels(&self) -> QuarterlyLevels {
        let mut extremes: [Option<(f64, f64)>; 4] = [None; 4];

        for bar in self.series.bars() {
            let date = bar.timestamp.date();
            if date.year() != self.year {
                continue;
            }
            let quarter = date.month0() as usize / 3;
            extremes[quarter] = Some(match extremes[quarter] {
                Some((high, low)) => (high.max(bar.high), low.min(bar.low)),
                None => (bar.high, bar.low),
            });
        }

        let mut levels = QuarterlyLevels::default();
        for (quarter, extreme) in extremes.iter().enumerate() {
            if let Some((high, low)) = extreme {
                levels.set(quarter, *high, *low);
            }
        }
        levels
    }

    pub fn sma_slope(&self) -> f64 {
        sma_slope(self.series.bars(), SMA_SLOPE_PERIOD).unwrap_or(0.0)
    }

    pub fn determine_bias(&self) -> Bias {
        self.bias_from(&self.quarterly_levels())
    }

    fn bias_from(&self, levels: &QuarterlyLevels) -> Bias {
        let close = self.series.last().close;
        let slope = self.sma_slope();

        if close > levels.q2_high && slope > 0.0 {
            Bias::Bullish
        } else if close < levels.q3_low && slope < 0.0 {
            Bias::Bearish
        } else {
            Bias::Neutral
        }
    }

    /// Pools over the configured lookback and tolerance.
    pub fn liquidity_pools(&self) -> LiquidityPools {
        self.find_liquidity_pools(self.config.liquidity_lookback, self.config.liquidity_tolerance)
    }

    pub fn find_liquidity_pools(&self, lookback: usize, tolerance: f64) -> LiquidityPools {
        let window = self.series.tail(lookback.max(1));
        let clusters = Clusters {
            highs: find_clusters(window, tolerance, |b| b.high),
            lows: find_clusters(window, tolerance, |b| b.low),
        };
        // The window always holds at least one bar.
        let pd_arrays = PdArray::from_window(window).unwrap_or(PdArray {
            premium: 0.0,
            equilibrium: 0.0,
            discount: 0.0,
        });

        LiquidityPools {
            clusters,
            pd_arrays,
        }
    }

    pub fn detect_liquidity_events(&self, lookback: usize) -> LiquidityEvents {
        let window = self.series.tail(lookback + EVENT_EXTRA_BARS);
        let Some(avg_volume) = mean_volume(window) else {
            return LiquidityEvents::default();
        };

        let sweeps = detect_sweeps(window, lookback, avg_volume);
        let pd = self
            .find_liquidity_pools(lookback, self.config.liquidity_tolerance)
            .pd_arrays;
        let runs = detect_runs(window, &pd, avg_volume);

        LiquidityEvents { sweeps, runs }
    }

    pub fn generate_signals(&self) -> StructureReport {
        let bias = self.determine_bias();
        let liquidity_zones = self.liquidity_pools();
        let events = self.detect_liquidity_events(self.config.liquidity_lookback);

        debug!(
            asset = self.series.asset(),
            timeframe = %self.series.timeframe(),
            ?bias,
            high_clusters = liquidity_zones.clusters.highs.len(),
            low_clusters = liquidity_zones.clusters.lows.len(),
            sweeps = events.sweeps.len(),
            runs = events.runs.len(),
            "structure analysed"
        );

        StructureReport {
            bias,
            liquidity_zones,
            events,
        }
    }

    pub fn snapshot(&self) -> StructureSnapshot {
        let quarterly_levels = self.quarterly_levels();
        StructureSnapshot {
            bias: self.bias_from(&quarterly_levels),
            quarterly_levels,
            pools: self.liquidity_pools(),
        }
    }
}

/// Levels touched by at least three bars. Bar `i` anchors a cluster counting
/// itself and every later bar within `tolerance` relative distance.
fn find_clusters(
    window: &[Bar],
    tolerance: f64,
    price_of: impl Fn(&Bar) -> f64,
) -> Vec<LiquidityCluster> {
    let mut clusters = Vec::new();

    for i in 0..window.len().saturating_sub(2) {
        let anchor = price_of(&window[i]);
        let matches = window[i + 1..]
            .iter()
            .filter(|b| (price_of(b) - anchor).abs() / anchor <= tolerance)
            .count();
        let count = 1 + matches;
        if count >= MIN_CLUSTER_TOUCHES {
            clusters.push(LiquidityCluster {
                price: anchor,
                count,
                timestamp: window[i].timestamp,
            });
        }
    }

    clusters
}

fn detect_sweeps(window: &[Bar], lookback: usize, avg_volume: f64) -> Vec<Sweep> {
    let mut sweeps = Vec::new();

    for i in lookback..window.len().saturating_sub(1) {
        let prior = &window[i.saturating_sub(SWEEP_LOOKBACK)..i];
        let (Some(prior_high), Some(prior_low)) = (highest_high(prior), lowest_low(prior)) else {
            continue;
        };
        let bar = &window[i];
        let next = &window[i + 1];
        let heavy = bar.volume as f64 > SWEEP_VOLUME_MULT * avg_volume;

        if bar.high > prior_high && next.close < bar.open && heavy {
            sweeps.push(Sweep {
                direction: SweepDirection::Bullish,
                price: bar.high,
                timestamp: bar.timestamp,
            });
        }

        if bar.low < prior_low && next.close > bar.open && heavy {
            sweeps.push(Sweep {
                direction: SweepDirection::Bearish,
                price: bar.low,
                timestamp: bar.timestamp,
            });
        }
    }

    sweeps
}

fn detect_runs(window: &[Bar], pd: &PdArray, avg_volume: f64) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut current: Option<Zone> = None;

    for i in 0..window.len().saturating_sub(RUN_LENGTH) {
        let close = window[i].close;
        let zone = Zone::classify(close, pd);

        if current != Some(zone) {
            let span = &window[i..i + RUN_LENGTH];
            let closes: Vec<f64> = span.iter().map(|b| b.close).collect();
            let span_volume = mean_volume(span).unwrap_or(0.0);

            if zone.holds(&closes, pd) && span_volume > RUN_VOLUME_MULT * avg_volume {
                let end = &span[RUN_LENGTH - 1];
                runs.push(Run {
                    zone,
                    start_price: close,
                    end_price: end.close,
                    start_timestamp: window[i].timestamp,
                    end_timestamp: end.timestamp,
                });
            }
        }

        current = Some(zone);
    }

    runs
}

//! Risk engine: position sizing, ATR stops and portfolio-level risk checks.

use crate::domain::config::EngineConfig;
use crate::domain::entry::{Direction, EntryCandidate, EntryEngine};
use crate::domain::error::IctError;
use crate::domain::indicator::IndicatorType;
use crate::domain::indicator::atr::average_true_range;
use crate::domain::metrics::PortfolioMetrics;
use crate::domain::series::MarketSeries;
use crate::domain::signal::SignalRecord;
use crate::domain::timeframe::Timeframe;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::debug;

pub const SCALPING_ATR_MULT: f64 = 1.5;
pub const SWING_ATR_MULT: f64 = 2.0;
/// Distance of the initial stop before the trailing lock engages.
pub const INITIAL_STOP_ATR_MULT: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSize {
    pub position_size: f64,
    pub risk_amount: f64,
    pub stop_loss_distance: f64,
    pub pip_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub position_size: f64,
    pub risk_amount: f64,
    pub dynamic_stop_loss: f64,
    pub trailing_stop: f64,
    pub risk_reward_ratio: f64,
    pub atr: f64,
    pub pip_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRiskReport {
    pub daily_risk_percent: f64,
    pub risk_limit_exceeded: bool,
    pub remaining_risk: f64,
    pub today_signals: usize,
}

/// Static stop at 1.5 ATR from entry until the trade is one ATR in profit,
/// then breakeven or `current -/+ atr`, whichever is tighter to price.
pub fn trailing_stop(entry_price: f64, current_price: f64, direction: Direction, atr: f64) -> f64 {
    match direction {
        Direction::Long => {
            if current_price - entry_price >= atr {
                entry_price.max(current_price - atr)
            } else {
                entry_price - INITIAL_STOP_ATR_MULT * atr
            }
        }
        Direction::Short => {
            if entry_price - current_price >= atr {
                entry_price.min(current_price + atr)
            } else {
                entry_price + INITIAL_STOP_ATR_MULT * atr
            }
        }
    }
}

/// Trailing stop that only ever tightens across successive price updates.
#[derive(Debug, Clone)]
pub struct TrailingStopTracker {
    entry_price: f64,
    direction: Direction,
    atr: f64,
    stop: Option<f64>,
}

impl TrailingStopTracker {
    pub fn new(entry_price: f64, direction: Direction, atr: f64) -> Self {
        Self {
            entry_price,
            direction,
            atr,
            stop: None,
        }
    }

    pub fn update(&mut self, current_price: f64) -> f64 {
        let candidate = trailing_stop(self.entry_price, current_price, self.direction, self.atr);
        let stop = match (self.direction, self.stop) {
            (_, None) => candidate,
            (Direction::Long, Some(prev)) => prev.max(candidate),
            (Direction::Short, Some(prev)) => prev.min(candidate),
        };
        self.stop = Some(stop);
        stop
    }

    pub fn stop(&self) -> Option<f64> {
        self.stop
    }
}

pub struct RiskEngine<'a> {
    series: &'a MarketSeries,
    config: &'a EngineConfig,
}

impl<'a> RiskEngine<'a> {
    pub fn new(series: &'a MarketSeries, config: &'a EngineConfig) -> Self {
        Self { series, config }
    }

    pub fn atr(&self) -> Option<f64> {
        average_true_range(self.series.bars(), self.config.atr_period)
    }

    fn require_atr(&self) -> Result<f64, IctError> {
        self.atr()
            .ok_or_else(|| self.series.insufficient(IndicatorType::Atr(self.config.atr_period).min_bars()))
    }

    /// Size so that hitting the stop loses `balance * risk_percent`. The risk
    /// percent is capped at `max_risk_per_trade`; a zero stop distance sizes to 0.
    pub fn position_size(
        &self,
        asset: &str,
        entry_price: f64,
        stop_loss: f64,
        balance: Option<f64>,
        risk_percent: Option<f64>,
    ) -> Result<PositionSize, IctError> {
        let pip_value = self.config.pip_value(asset)?;
        let balance = balance.unwrap_or(self.config.default_balance);
        let risk_percent = risk_percent
            .unwrap_or(self.config.default_risk_percent)
            .min(self.config.max_risk_per_trade);

        let risk_amount = balance * risk_percent;
        let stop_loss_distance = (entry_price - stop_loss).abs();
        let per_unit = stop_loss_distance * pip_value;
        let position_size = if per_unit > 0.0 {
            risk_amount / per_unit
        } else {
            0.0
        };

        Ok(PositionSize {
            position_size,
            risk_amount,
            stop_loss_distance,
            pip_value,
        })
    }

    pub fn dynamic_stop_loss(
        &self,
        entry_price: f64,
        direction: Direction,
        timeframe: Timeframe,
    ) -> Result<f64, IctError> {
        let atr = self.require_atr()?;
        let mult = if timeframe.is_scalping() {
            SCALPING_ATR_MULT
        } else {
            SWING_ATR_MULT
        };
        Ok(match direction {
            Direction::Long => entry_price - atr * mult,
            Direction::Short => entry_price + atr * mult,
        })
    }

    pub fn trailing_stop(
        &self,
        entry_price: f64,
        current_price: f64,
        direction: Direction,
        atr: f64,
    ) -> f64 {
        trailing_stop(entry_price, current_price, direction, atr)
    }

    /// Risk read for one candidate, trailing against the series' last close.
    pub fn assess(
        &self,
        candidate: &EntryCandidate,
        timeframe: Timeframe,
        balance: Option<f64>,
    ) -> Result<RiskAssessment, IctError> {
        let atr = self.require_atr()?;
        let position = self.position_size(
            self.series.asset(),
            candidate.entry_price,
            candidate.stop_loss,
            balance,
            None,
        )?;
        let dynamic_stop_loss =
            self.dynamic_stop_loss(candidate.entry_price, candidate.direction, timeframe)?;
        let trailing_stop = self.trailing_stop(
            candidate.entry_price,
            self.series.last().close,
            candidate.direction,
            atr,
        );

        debug!(
            asset = self.series.asset(),
            system = %candidate.system,
            direction = %candidate.direction,
            atr,
            "risk assessed"
        );

        Ok(RiskAssessment {
            position_size: position.position_size,
            risk_amount: position.risk_amount,
            dynamic_stop_loss,
            trailing_stop,
            risk_reward_ratio: candidate.risk_reward(),
            atr,
            pip_value: position.pip_value,
        })
    }

    /// Assesses the first candidate the entry engine produces, in system
    /// order. `Ok(None)` when no system fired.
    pub fn assess_latest(
        &self,
        entries: &EntryEngine<'_>,
        timeframe: Timeframe,
        balance: Option<f64>,
    ) -> Result<Option<(EntryCandidate, RiskAssessment)>, IctError> {
        let Some((_, candidate)) = entries.generate_entries().into_iter().next() else {
            return Ok(None);
        };
        let assessment = self.assess(&candidate, timeframe, balance)?;
        Ok(Some((candidate, assessment)))
    }

    pub fn portfolio_metrics(&self, signals: &[SignalRecord]) -> PortfolioMetrics {
        PortfolioMetrics::compute(signals, self.config.default_balance)
    }

    pub fn daily_risk_limit(&self, signals: &[SignalRecord], balance: Option<f64>) -> DailyRiskReport {
        self.daily_risk_limit_on(signals, balance, Local::now().date_naive())
    }

    pub fn daily_risk_limit_on(
        &self,
        signals: &[SignalRecord],
        balance: Option<f64>,
        today: NaiveDate,
    ) -> DailyRiskReport {
        daily_risk(
            signals,
            balance.unwrap_or(self.config.default_balance),
            today,
            self.config.max_daily_risk,
        )
    }
}

/// Risk committed on `today` against the daily ceiling `max_daily_risk`.
pub fn daily_risk(
    signals: &[SignalRecord],
    balance: f64,
    today: NaiveDate,
    max_daily_risk: f64,
) -> DailyRiskReport {
    let todays: Vec<&SignalRecord> = signals
        .iter()
        .filter(|s| s.timestamp.date() == today)
        .collect();
    let total_risk: f64 = todays.iter().filter_map(|s| s.risk_amount).sum();

    let daily_risk_percent = if balance > 0.0 { total_risk / balance } else { 0.0 };

    DailyRiskReport {
        daily_risk_percent,
        risk_limit_exceeded: daily_risk_percent > max_daily_risk,
        remaining_risk: (max_daily_risk * balance - total_risk).max(0.0),
        today_signals: todays.len(),
    }
}

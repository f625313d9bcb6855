//! Portfolio metrics over a history of signal records.

use super::signal::{SignalRecord, TradeResult};
use crate::domain::indicator_helpers::mean;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub win_rate: f64,
    pub avg_risk_reward: f64,
    pub max_drawdown: f64,
    pub total_trades: usize,
    pub final_equity: f64,
}

impl PortfolioMetrics {
    /// Signals are replayed in the given order. Only signals with a `result`
    /// count as trades; only those also carrying a `risk_amount` move equity.
    pub fn compute(signals: &[SignalRecord], starting_balance: f64) -> Self {
        let mut trades_won = 0usize;
        let mut total_trades = 0usize;
        for signal in signals {
            match signal.result {
                Some(TradeResult::Win) => {
                    trades_won += 1;
                    total_trades += 1;
                }
                Some(TradeResult::Loss) => total_trades += 1,
                None => {}
            }
        }

        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let ratios: Vec<f64> = signals
            .iter()
            .filter_map(SignalRecord::planned_risk_reward)
            .collect();
        let avg_risk_reward = mean(&ratios).unwrap_or(0.0);

        let curve = equity_curve(signals, starting_balance);
        let final_equity = curve.last().copied().unwrap_or(starting_balance);

        PortfolioMetrics {
            win_rate,
            avg_risk_reward,
            max_drawdown: compute_drawdown(&curve),
            total_trades,
            final_equity,
        }
    }
}

/// Equity after each realized signal, replayed from `starting_balance`. The
/// starting balance itself is not a point on the curve.
/// A win credits `risk_amount * risk_reward` (reward 1 when unknown), a loss
/// debits `risk_amount`.
pub fn equity_curve(signals: &[SignalRecord], starting_balance: f64) -> Vec<f64> {
    let mut equity = starting_balance;
    let mut curve = Vec::new();

    for signal in signals {
        let (Some(result), Some(risk_amount)) = (signal.result, signal.risk_amount) else {
            continue;
        };
        match result {
            TradeResult::Win => equity += risk_amount * signal.risk_reward.unwrap_or(1.0),
            TradeResult::Loss => equity -= risk_amount,
        }
        curve.push(equity);
    }

    curve
}

/// Largest (running peak - value) / running peak along the curve.
fn compute_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
        } else if peak > 0.0 {
            let dd = (peak - equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entry::{Direction, EntrySystem};
    use crate::domain::timeframe::Timeframe;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_signal(result: Option<TradeResult>, risk_amount: Option<f64>, rr: Option<f64>) -> SignalRecord {
        SignalRecord {
            asset: "NASDAQ".to_string(),
            timeframe: Timeframe::H1,
            system: EntrySystem::Crt,
            direction: Direction::Long,
            entry_price: 100.0,
            stop_loss: Some(98.0),
            take_profit: Some(104.0),
            invalidation_point: Some(99.0),
            risk_amount,
            risk_reward: rr,
            result,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn metrics_empty_history() {
        let metrics = PortfolioMetrics::compute(&[], 10_000.0);
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.win_rate, 0.0);
        assert_eq!(metrics.avg_risk_reward, 0.0);
        assert_eq!(metrics.max_drawdown, 0.0);
        assert_eq!(metrics.final_equity, 10_000.0);
    }

    #[test]
    fn single_win_credits_risk_times_reward() {
        let signals = vec![make_signal(Some(TradeResult::Win), Some(100.0), Some(2.0))];
        let metrics = PortfolioMetrics::compute(&signals, 10_000.0);

        assert_relative_eq!(metrics.final_equity - 10_000.0, 200.0);
        assert_eq!(metrics.max_drawdown, 0.0);
        assert_eq!(metrics.total_trades, 1);
        assert_relative_eq!(metrics.win_rate, 1.0);
    }

    #[test]
    fn win_without_reward_counts_one_r() {
        let signals = vec![make_signal(Some(TradeResult::Win), Some(50.0), None)];
        assert_relative_eq!(PortfolioMetrics::compute(&signals, 1000.0).final_equity, 1050.0);
    }

    #[test]
    fn win_rate_ignores_open_signals() {
        let signals = vec![
            make_signal(Some(TradeResult::Win), Some(100.0), Some(2.0)),
            make_signal(Some(TradeResult::Loss), Some(100.0), Some(2.0)),
            make_signal(None, Some(100.0), Some(2.0)),
        ];
        let metrics = PortfolioMetrics::compute(&signals, 10_000.0);
        assert_eq!(metrics.total_trades, 2);
        assert_relative_eq!(metrics.win_rate, 0.5);
    }

    #[test]
    fn avg_risk_reward_uses_planned_levels() {
        let mut no_target = make_signal(None, None, None);
        no_target.take_profit = None;
        let signals = vec![make_signal(None, None, None), no_target];
        // (104 - 100) / (100 - 98)
        assert_relative_eq!(PortfolioMetrics::compute(&signals, 10_000.0).avg_risk_reward, 2.0);
    }

    #[test]
    fn realized_signal_without_risk_amount_leaves_equity() {
        let signals = vec![make_signal(Some(TradeResult::Loss), None, None)];
        let curve = equity_curve(&signals, 1000.0);
        assert!(curve.is_empty());
        assert_eq!(PortfolioMetrics::compute(&signals, 1000.0).final_equity, 1000.0);
    }

    #[test]
    fn first_loss_sets_the_peak() {
        let signals = vec![
            make_signal(Some(TradeResult::Loss), Some(100.0), None),
            make_signal(Some(TradeResult::Win), Some(100.0), Some(3.0)),
        ];
        let metrics = PortfolioMetrics::compute(&signals, 1000.0);
        assert_eq!(metrics.max_drawdown, 0.0);
        assert_relative_eq!(metrics.final_equity, 1200.0);

        let single = PortfolioMetrics::compute(&signals[..1], 10_000.0);
        assert_eq!(single.max_drawdown, 0.0);
        assert_relative_eq!(single.final_equity, 9_900.0);
    }

    #[test]
    fn drawdown_measured_from_post_trade_peak() {
        let signals = vec![
            make_signal(Some(TradeResult::Win), Some(100.0), Some(1.0)),
            make_signal(Some(TradeResult::Loss), Some(110.0), None),
        ];
        assert_eq!(equity_curve(&signals, 1000.0), vec![1100.0, 990.0]);
        assert_relative_eq!(PortfolioMetrics::compute(&signals, 1000.0).max_drawdown, 0.1);
    }

    #[test]
    fn metrics_max_drawdown() {
        let equity = vec![100.0, 110.0, 90.0, 95.0, 80.0, 100.0];
        assert!((compute_drawdown(&equity) - (110.0 - 80.0) / 110.0).abs() < 1e-9);
    }
}

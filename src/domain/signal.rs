//! Signal records: the persisted, historical form of an entry candidate.

use crate::domain::entry::{Direction, EntryCandidate, EntrySystem};
use crate::domain::timeframe::Timeframe;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeResult {
    Win,
    Loss,
}

impl TradeResult {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeResult::Win => "win",
            TradeResult::Loss => "loss",
        }
    }
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win" => Ok(TradeResult::Win),
            "loss" => Ok(TradeResult::Loss),
            other => Err(format!("unknown trade result '{}'", other)),
        }
    }
}

/// Idempotent-upsert key of a stored signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalKey {
    pub asset: String,
    pub timeframe: Timeframe,
    pub system: EntrySystem,
    pub timestamp: NaiveDateTime,
}

/// A signal as stored and replayed for metrics. Levels are optional because
/// history may come from sources that never recorded them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub asset: String,
    pub timeframe: Timeframe,
    pub system: EntrySystem,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub invalidation_point: Option<f64>,
    pub risk_amount: Option<f64>,
    pub risk_reward: Option<f64>,
    pub result: Option<TradeResult>,
    pub timestamp: NaiveDateTime,
}

impl SignalRecord {
    pub fn from_candidate(asset: &str, timeframe: Timeframe, candidate: &EntryCandidate) -> Self {
        Self {
            asset: asset.to_uppercase(),
            timeframe,
            system: candidate.system,
            direction: candidate.direction,
            entry_price: candidate.entry_price,
            stop_loss: Some(candidate.stop_loss),
            take_profit: Some(candidate.take_profit),
            invalidation_point: Some(candidate.invalidation_point),
            risk_amount: None,
            risk_reward: Some(candidate.risk_reward()),
            result: None,
            timestamp: candidate.timestamp,
        }
    }

    pub fn with_risk_amount(mut self, risk_amount: f64) -> Self {
        self.risk_amount = Some(risk_amount);
        self
    }

    pub fn key(&self) -> SignalKey {
        SignalKey {
            asset: self.asset.clone(),
            timeframe: self.timeframe,
            system: self.system,
            timestamp: self.timestamp,
        }
    }

    /// reward / risk from the stored levels; `None` when either level is
    /// missing or the stop sits on the entry.
    pub fn planned_risk_reward(&self) -> Option<f64> {
        let stop = self.stop_loss?;
        let target = self.take_profit?;
        let risk = (self.entry_price - stop).abs();
        if risk > 0.0 {
            Some((target - self.entry_price).abs() / risk)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn candidate() -> EntryCandidate {
        EntryCandidate {
            system: EntrySystem::Crt,
            direction: Direction::Short,
            entry_price: 2000.0,
            stop_loss: 2010.0,
            take_profit: 1970.0,
            invalidation_point: 2005.0,
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn from_candidate_copies_levels() {
        let record = SignalRecord::from_candidate("xauusd", Timeframe::M15, &candidate())
            .with_risk_amount(100.0);
        assert_eq!(record.asset, "XAUUSD");
        assert_eq!(record.system, EntrySystem::Crt);
        assert_eq!(record.stop_loss, Some(2010.0));
        assert_eq!(record.risk_amount, Some(100.0));
        assert_eq!(record.result, None);
        assert!((record.risk_reward.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn key_ignores_levels() {
        let a = SignalRecord::from_candidate("XAUUSD", Timeframe::M15, &candidate());
        let mut b = a.clone();
        b.entry_price = 1990.0;
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn planned_risk_reward_requires_both_levels() {
        let mut record = SignalRecord::from_candidate("XAUUSD", Timeframe::M15, &candidate());
        assert!((record.planned_risk_reward().unwrap() - 3.0).abs() < 1e-9);
        record.take_profit = None;
        assert_eq!(record.planned_risk_reward(), None);
    }

    #[test]
    fn deserializes_sparse_history_rows() {
        let json = r#"{
            "asset": "NASDAQ",
            "timeframe": "1h",
            "system": "turtle_soup",
            "direction": "long",
            "entry_price": 15000.0,
            "result": "win",
            "timestamp": "2024-05-01T14:00:00"
        }"#;
        let record: SignalRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.timeframe, Timeframe::H1);
        assert_eq!(record.result, Some(TradeResult::Win));
        assert_eq!(record.risk_amount, None);
    }

    #[test]
    fn trade_result_parses() {
        assert_eq!("loss".parse::<TradeResult>().unwrap(), TradeResult::Loss);
        assert!("draw".parse::<TradeResult>().is_err());
    }
}

//! Engine configuration value object.
//!
//! Every threshold the engines share lives here so call sites and tests can
//! vary them without touching engine logic. Values are read from the
//! `[engine]` and `[pip_values]` INI sections through [`ConfigPort`].

use crate::domain::error::IctError;
use crate::ports::config_port::ConfigPort;
use std::collections::BTreeMap;

pub const DEFAULT_ATR_PERIOD: usize = 20;
pub const DEFAULT_LIQUIDITY_TOLERANCE: f64 = 0.005;
pub const DEFAULT_LIQUIDITY_LOOKBACK: usize = 20;
pub const DEFAULT_MAX_RISK_PER_TRADE: f64 = 0.02;
pub const DEFAULT_MAX_DAILY_RISK: f64 = 0.05;
pub const DEFAULT_BALANCE: f64 = 10_000.0;
pub const DEFAULT_RISK_PERCENT: f64 = 0.01;

/// Assets known out of the box and their pip values.
pub const DEFAULT_PIP_VALUES: [(&str, f64); 2] = [("XAUUSD", 0.01), ("NASDAQ", 1.0)];

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub atr_period: usize,
    pub liquidity_tolerance: f64,
    pub liquidity_lookback: usize,
    pub max_risk_per_trade: f64,
    pub max_daily_risk: f64,
    pub default_balance: f64,
    pub default_risk_percent: f64,
    pub pip_values: BTreeMap<String, f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            atr_period: DEFAULT_ATR_PERIOD,
            liquidity_tolerance: DEFAULT_LIQUIDITY_TOLERANCE,
            liquidity_lookback: DEFAULT_LIQUIDITY_LOOKBACK,
            max_risk_per_trade: DEFAULT_MAX_RISK_PER_TRADE,
            max_daily_risk: DEFAULT_MAX_DAILY_RISK,
            default_balance: DEFAULT_BALANCE,
            default_risk_percent: DEFAULT_RISK_PERCENT,
            pip_values: DEFAULT_PIP_VALUES
                .iter()
                .map(|(asset, value)| (asset.to_string(), *value))
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Builds the config from `[engine]` and `[pip_values]`, falling back to
    /// the defaults for anything not set.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, IctError> {
        let defaults = Self::default();

        let atr_period = config.get_int("engine", "atr_period", defaults.atr_period as i64);
        let lookback = config.get_int(
            "engine",
            "liquidity_lookback",
            defaults.liquidity_lookback as i64,
        );

        let mut pip_values = defaults.pip_values.clone();
        for key in config.keys("pip_values") {
            let raw = config.get_string("pip_values", &key).unwrap_or_default();
            let value: f64 = raw.trim().parse().map_err(|_| IctError::ConfigInvalid {
                section: "pip_values".into(),
                key: key.clone(),
                reason: format!("'{}' is not a number", raw),
            })?;
            pip_values.insert(key.to_uppercase(), value);
        }

        Ok(Self {
            atr_period: usize::try_from(atr_period).map_err(|_| IctError::ConfigInvalid {
                section: "engine".into(),
                key: "atr_period".into(),
                reason: "atr_period must be non-negative".into(),
            })?,
            liquidity_tolerance: config.get_double(
                "engine",
                "liquidity_tolerance",
                defaults.liquidity_tolerance,
            ),
            liquidity_lookback: usize::try_from(lookback).map_err(|_| {
                IctError::ConfigInvalid {
                    section: "engine".into(),
                    key: "liquidity_lookback".into(),
                    reason: "liquidity_lookback must be non-negative".into(),
                }
            })?,
            max_risk_per_trade: config.get_double(
                "engine",
                "max_risk_per_trade",
                defaults.max_risk_per_trade,
            ),
            max_daily_risk: config.get_double("engine", "max_daily_risk", defaults.max_daily_risk),
            default_balance: config.get_double(
                "engine",
                "default_balance",
                defaults.default_balance,
            ),
            default_risk_percent: config.get_double(
                "engine",
                "default_risk_percent",
                defaults.default_risk_percent,
            ),
            pip_values,
        })
    }

    /// Pip value for `asset`. Unknown assets are a configuration error.
    pub fn pip_value(&self, asset: &str) -> Result<f64, IctError> {
        self.pip_values
            .get(&asset.to_uppercase())
            .copied()
            .ok_or_else(|| IctError::UnknownAsset {
                asset: asset.to_string(),
            })
    }

    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.pip_values.keys().map(String::as_str)
    }
}

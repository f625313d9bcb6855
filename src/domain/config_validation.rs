//! Configuration validation.
//!
//! Validates the `[engine]` and `[pip_values]` sections before any engine runs.
//! Missing keys fall back to the engine defaults and are not errors.

use crate::domain::config::{
    DEFAULT_ATR_PERIOD, DEFAULT_BALANCE, DEFAULT_LIQUIDITY_LOOKBACK, DEFAULT_LIQUIDITY_TOLERANCE,
    DEFAULT_MAX_DAILY_RISK, DEFAULT_MAX_RISK_PER_TRADE, DEFAULT_RISK_PERCENT,
};
use crate::domain::error::IctError;
use crate::ports::config_port::ConfigPort;

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), IctError> {
    validate_period(config, "atr_period", DEFAULT_ATR_PERIOD)?;
    validate_period(config, "liquidity_lookback", DEFAULT_LIQUIDITY_LOOKBACK)?;
    validate_tolerance(config)?;
    validate_fraction(config, "max_risk_per_trade", DEFAULT_MAX_RISK_PER_TRADE)?;
    validate_fraction(config, "max_daily_risk", DEFAULT_MAX_DAILY_RISK)?;
    validate_fraction(config, "default_risk_percent", DEFAULT_RISK_PERCENT)?;
    validate_balance(config)?;
    validate_pip_values(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: String) -> IctError {
    IctError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn validate_period(config: &dyn ConfigPort, key: &str, default: usize) -> Result<(), IctError> {
    let value = config.get_int("engine", key, default as i64);
    if value < 1 {
        return Err(invalid("engine", key, format!("{} must be at least 1", key)));
    }
    Ok(())
}

fn validate_tolerance(config: &dyn ConfigPort) -> Result<(), IctError> {
    let value = config.get_double("engine", "liquidity_tolerance", DEFAULT_LIQUIDITY_TOLERANCE);
    if value <= 0.0 || value >= 1.0 {
        return Err(invalid(
            "engine",
            "liquidity_tolerance",
            "liquidity_tolerance must be between 0 and 1 (exclusive)".to_string(),
        ));
    }
    Ok(())
}

fn validate_fraction(config: &dyn ConfigPort, key: &str, default: f64) -> Result<(), IctError> {
    let value = config.get_double("engine", key, default);
    if value <= 0.0 || value > 1.0 {
        return Err(invalid(
            "engine",
            key,
            format!("{} must be in (0, 1]", key),
        ));
    }
    Ok(())
}

fn validate_balance(config: &dyn ConfigPort) -> Result<(), IctError> {
    let value = config.get_double("engine", "default_balance", DEFAULT_BALANCE);
    if value <= 0.0 {
        return Err(invalid(
            "engine",
            "default_balance",
            "default_balance must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_pip_values(config: &dyn ConfigPort) -> Result<(), IctError> {
    for key in config.keys("pip_values") {
        let raw = config.get_string("pip_values", &key).unwrap_or_default();
        match raw.trim().parse::<f64>() {
            Ok(value) if value > 0.0 && value.is_finite() => {}
            _ => {
                return Err(invalid(
                    "pip_values",
                    &key,
                    format!("pip value for {} must be a positive number", key.to_uppercase()),
                ));
            }
        }
    }
    Ok(())
}

//! Core domain types and logic.

pub mod ohlcv;
pub mod timeframe;
pub mod series;
pub mod indicator;
pub mod indicator_helpers;
pub mod structure;
pub mod entry;
pub mod risk;
pub mod metrics;
pub mod signal;
pub mod pipeline;
pub mod config;
pub mod config_validation;
pub mod error;

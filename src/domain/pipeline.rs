//! Signal pipeline: the call contracts exposed to the surrounding service.
//!
//! MarketSeries -> StructureAnalyzer -> EntryEngine -> RiskEngine, with an
//! optional sink receiving the resulting signal records.

use crate::domain::config::EngineConfig;
use crate::domain::entry::{Entries, EntryCandidate, EntryEngine, EntrySystem};
use crate::domain::error::IctError;
use crate::domain::metrics::PortfolioMetrics;
use crate::domain::risk::{DailyRiskReport, RiskAssessment, RiskEngine};
use crate::domain::series::MarketSeries;
use crate::domain::signal::SignalRecord;
use crate::domain::structure::{StructureAnalyzer, StructureReport};
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::MarketDataPort;
use crate::ports::signal_sink::SignalSink;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// `year` pins the calendar year used for quarterly levels; `None` uses the
/// wall-clock year.
pub fn analyzer<'a>(
    series: &'a MarketSeries,
    config: &'a EngineConfig,
    year: Option<i32>,
) -> StructureAnalyzer<'a> {
    match year {
        Some(year) => StructureAnalyzer::with_year(series, config, year),
        None => StructureAnalyzer::new(series, config),
    }
}

pub fn analyze_structure(
    series: &MarketSeries,
    config: &EngineConfig,
    year: Option<i32>,
) -> StructureReport {
    analyzer(series, config, year).generate_signals()
}

pub fn generate_entries(series: &MarketSeries, config: &EngineConfig, year: Option<i32>) -> Entries {
    let snapshot = analyzer(series, config, year).snapshot();
    EntryEngine::new(series, snapshot, config).generate_entries()
}

pub fn assess_risk(
    series: &MarketSeries,
    candidate: &EntryCandidate,
    timeframe: Timeframe,
    balance: Option<f64>,
    config: &EngineConfig,
) -> Result<RiskAssessment, IctError> {
    RiskEngine::new(series, config).assess(candidate, timeframe, balance)
}

/// Metrics over caller-assembled history, replayed from the configured balance.
pub fn portfolio_metrics(history: &[SignalRecord], config: &EngineConfig) -> PortfolioMetrics {
    PortfolioMetrics::compute(history, config.default_balance)
}

pub fn daily_risk_limit(
    history: &[SignalRecord],
    balance: Option<f64>,
    config: &EngineConfig,
) -> DailyRiskReport {
    crate::domain::risk::daily_risk(
        history,
        balance.unwrap_or(config.default_balance),
        chrono::Local::now().date_naive(),
        config.max_daily_risk,
    )
}

/// Everything one pass over an (asset, timeframe) pair produced.
#[derive(Debug, Clone, Serialize)]
pub struct SignalPass {
    pub asset: String,
    pub timeframe: Timeframe,
    pub bars: usize,
    pub structure: StructureReport,
    pub entries: Entries,
    pub risk: BTreeMap<EntrySystem, RiskAssessment>,
    pub stored: usize,
}

/// Pulls a series, runs the full pipeline and hands every candidate, sized
/// with its risk amount, to `sink`. A candidate whose risk read fails (for
/// example because ATR needs more bars) is still stored, without sizing.
pub fn run_signal_pass(
    data: &dyn MarketDataPort,
    sink: Option<&dyn SignalSink>,
    config: &EngineConfig,
    asset: &str,
    timeframe: Timeframe,
    balance: Option<f64>,
    year: Option<i32>,
) -> Result<SignalPass, IctError> {
    let series = data.fetch_series(asset, timeframe)?;
    // Unknown assets fail before any analysis runs.
    config.pip_value(series.asset())?;

    let structure_analyzer = analyzer(&series, config, year);
    let structure = structure_analyzer.generate_signals();
    let engine = EntryEngine::new(&series, structure_analyzer.snapshot(), config);
    let entries = engine.generate_entries();
    let risk_engine = RiskEngine::new(&series, config);

    let mut risk = BTreeMap::new();
    let mut stored = 0usize;
    for (system, candidate) in &entries {
        let mut record = SignalRecord::from_candidate(series.asset(), timeframe, candidate);
        match risk_engine.assess(candidate, timeframe, balance) {
            Ok(assessment) => {
                record = record.with_risk_amount(assessment.risk_amount);
                risk.insert(*system, assessment);
            }
            Err(e) => warn!(system = %system, error = %e, "risk assessment skipped"),
        }
        if let Some(sink) = sink {
            sink.upsert_signal(&record)?;
            stored += 1;
        }
    }

    info!(
        asset = series.asset(),
        timeframe = %timeframe,
        bars = series.len(),
        bias = ?structure.bias,
        entries = entries.len(),
        stored,
        "signal pass complete"
    );

    Ok(SignalPass {
        asset: series.asset().to_string(),
        timeframe,
        bars: series.len(),
        structure,
        entries,
        risk,
        stored,
    })
}

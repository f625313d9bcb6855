//! CLI definition and dispatch.
//!
//! Reports go to stdout as JSON; diagnostics and logs go to stderr.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config::EngineConfig;
use crate::domain::config_validation::validate_engine_config;
use crate::domain::entry::{EntryCandidate, EntryEngine};
use crate::domain::error::IctError;
use crate::domain::metrics::PortfolioMetrics;
use crate::domain::pipeline::{self, SignalPass};
use crate::domain::risk::{DailyRiskReport, RiskAssessment, RiskEngine};
use crate::domain::signal::SignalRecord;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::signal_sink::SignalSink;

#[derive(Parser, Debug)]
#[command(name = "ictrader", about = "ICT trading signal pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Market structure: bias, liquidity zones and events
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        asset: String,
        #[arg(long)]
        timeframe: Timeframe,
        /// Calendar year for quarterly levels (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
    },
    /// Entry candidates from all entry systems
    Entries {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        asset: String,
        #[arg(long)]
        timeframe: Timeframe,
        #[arg(long)]
        year: Option<i32>,
        /// Store the candidates in the sqlite signal table
        #[arg(long)]
        save: bool,
    },
    /// Risk read on the first available entry candidate
    Risk {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        asset: String,
        #[arg(long)]
        timeframe: Timeframe,
        #[arg(long)]
        balance: Option<f64>,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Full pipeline over one asset or every asset the data source knows
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        asset: Option<String>,
        /// Defaults to every timeframe
        #[arg(long)]
        timeframe: Option<Timeframe>,
        #[arg(long)]
        balance: Option<f64>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        save: bool,
    },
    /// Portfolio metrics and daily risk over signal history
    Metrics {
        #[arg(short, long)]
        config: PathBuf,
        /// JSON array of signal records; defaults to the sqlite signal table
        #[arg(long)]
        history: Option<PathBuf>,
        #[arg(long)]
        asset: Option<String>,
        #[arg(long)]
        balance: Option<f64>,
    },
    /// Copy a CSV series into the sqlite market data table
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        asset: String,
        #[arg(long)]
        timeframe: Timeframe,
    },
    /// List assets available from the configured data source
    ListAssets {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate an engine configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Analyze {
            config,
            asset,
            timeframe,
            year,
        } => with_config(&config, |adapter| run_analyze(adapter, &asset, timeframe, year)),
        Command::Entries {
            config,
            asset,
            timeframe,
            year,
            save,
        } => with_config(&config, |adapter| {
            run_entries(adapter, &asset, timeframe, year, save)
        }),
        Command::Risk {
            config,
            asset,
            timeframe,
            balance,
            year,
        } => with_config(&config, |adapter| {
            run_risk(adapter, &asset, timeframe, balance, year)
        }),
        Command::Scan {
            config,
            asset,
            timeframe,
            balance,
            year,
            save,
        } => with_config(&config, |adapter| {
            run_scan(adapter, asset.as_deref(), timeframe, balance, year, save)
        }),
        Command::Metrics {
            config,
            history,
            asset,
            balance,
        } => with_config(&config, |adapter| {
            run_metrics(adapter, history.as_ref(), asset.as_deref(), balance)
        }),
        Command::Import {
            config,
            asset,
            timeframe,
        } => with_config(&config, |adapter| run_import(adapter, &asset, timeframe)),
        Command::ListAssets { config } => with_config(&config, run_list_assets),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = IctError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn with_config(
    path: &PathBuf,
    command: impl FnOnce(&FileConfigAdapter) -> Result<(), IctError>,
) -> ExitCode {
    let adapter = match load_config(path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match command(&adapter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Validated engine settings from `[engine]` and `[pip_values]`.
pub fn build_engine_config(adapter: &dyn ConfigPort) -> Result<EngineConfig, IctError> {
    validate_engine_config(adapter)?;
    EngineConfig::from_config(adapter)
}

/// Data source named by `[data] source`: `csv` (default, reads `[data] path`)
/// or `sqlite` (reads the `[sqlite]` section).
pub fn create_data_port(adapter: &dyn ConfigPort) -> Result<Box<dyn MarketDataPort>, IctError> {
    let source = adapter
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());

    match source.trim().to_lowercase().as_str() {
        "csv" => {
            let path = adapter
                .get_string("data", "path")
                .ok_or_else(|| IctError::ConfigMissing {
                    section: "data".into(),
                    key: "path".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(path))))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            let store = SqliteAdapter::from_config(adapter)?;
            store.initialize_schema()?;
            Ok(Box::new(store))
        }
        other => Err(IctError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("unsupported data source '{}'", other),
        }),
    }
}

#[cfg(feature = "sqlite")]
fn open_signal_store(
    adapter: &dyn ConfigPort,
) -> Result<crate::adapters::sqlite_adapter::SqliteAdapter, IctError> {
    let store = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(adapter)?;
    store.initialize_schema()?;
    Ok(store)
}

/// Signal sink for `--save`; `None` when saving was not requested.
fn create_signal_sink(
    adapter: &dyn ConfigPort,
    save: bool,
) -> Result<Option<Box<dyn SignalSink>>, IctError> {
    if !save {
        return Ok(None);
    }

    #[cfg(feature = "sqlite")]
    {
        Ok(Some(Box::new(open_signal_store(adapter)?)))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = adapter;
        Err(IctError::ConfigInvalid {
            section: "sqlite".into(),
            key: "path".into(),
            reason: "the sqlite feature is required to store signals".into(),
        })
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), IctError> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{}", text);
    Ok(())
}

fn run_analyze(
    adapter: &FileConfigAdapter,
    asset: &str,
    timeframe: Timeframe,
    year: Option<i32>,
) -> Result<(), IctError> {
    let config = build_engine_config(adapter)?;
    let data = create_data_port(adapter)?;
    let series = data.fetch_series(asset, timeframe)?;

    let report = pipeline::analyze_structure(&series, &config, year);
    print_json(&report)
}

fn run_entries(
    adapter: &FileConfigAdapter,
    asset: &str,
    timeframe: Timeframe,
    year: Option<i32>,
    save: bool,
) -> Result<(), IctError> {
    let config = build_engine_config(adapter)?;
    let data = create_data_port(adapter)?;
    let sink = create_signal_sink(adapter, save)?;
    let series = data.fetch_series(asset, timeframe)?;

    let entries = pipeline::generate_entries(&series, &config, year);
    if let Some(sink) = sink.as_deref() {
        let stored = sink.upsert_entries(series.asset(), timeframe, &entries)?;
        info!(stored, "entries saved");
    }
    print_json(&entries)
}

#[derive(Serialize)]
struct RiskReport {
    asset: String,
    timeframe: Timeframe,
    signal: Option<EntryCandidate>,
    risk: Option<RiskAssessment>,
    message: Option<&'static str>,
}

fn run_risk(
    adapter: &FileConfigAdapter,
    asset: &str,
    timeframe: Timeframe,
    balance: Option<f64>,
    year: Option<i32>,
) -> Result<(), IctError> {
    let config = build_engine_config(adapter)?;
    let data = create_data_port(adapter)?;
    let series = data.fetch_series(asset, timeframe)?;

    let snapshot = pipeline::analyzer(&series, &config, year).snapshot();
    let entries = EntryEngine::new(&series, snapshot, &config);
    let latest = RiskEngine::new(&series, &config).assess_latest(&entries, timeframe, balance)?;

    let report = match latest {
        Some((signal, risk)) => RiskReport {
            asset: series.asset().to_string(),
            timeframe,
            signal: Some(signal),
            risk: Some(risk),
            message: None,
        },
        None => RiskReport {
            asset: series.asset().to_string(),
            timeframe,
            signal: None,
            risk: None,
            message: Some("No entry signals available"),
        },
    };
    print_json(&report)
}

fn run_scan(
    adapter: &FileConfigAdapter,
    asset: Option<&str>,
    timeframe: Option<Timeframe>,
    balance: Option<f64>,
    year: Option<i32>,
    save: bool,
) -> Result<(), IctError> {
    let config = build_engine_config(adapter)?;
    let data = create_data_port(adapter)?;
    let sink = create_signal_sink(adapter, save)?;

    let assets = match asset {
        Some(a) => vec![a.to_uppercase()],
        None => data.list_assets()?,
    };
    let timeframes = match timeframe {
        Some(tf) => vec![tf],
        None => Timeframe::ALL.to_vec(),
    };
    // Only an explicit (asset, timeframe) pair surfaces missing data; a sweep skips it.
    let sweep = asset.is_none() || timeframe.is_none();

    let mut passes: Vec<SignalPass> = Vec::new();
    for asset in &assets {
        for &timeframe in &timeframes {
            match pipeline::run_signal_pass(
                data.as_ref(),
                sink.as_deref(),
                &config,
                asset,
                timeframe,
                balance,
                year,
            ) {
                Ok(pass) => passes.push(pass),
                Err(e) if sweep && asset_is_optional(&e) => {
                    warn!(asset = %asset, timeframe = %timeframe, error = %e, "pair skipped");
                }
                Err(e) => return Err(e),
            }
        }
    }

    info!(pairs = passes.len(), "scan complete");
    print_json(&passes)
}

fn asset_is_optional(err: &IctError) -> bool {
    matches!(
        err,
        IctError::NoData { .. } | IctError::UnknownAsset { .. } | IctError::InsufficientData { .. }
    )
}

#[derive(Serialize)]
struct MetricsReport {
    signals: usize,
    portfolio: PortfolioMetrics,
    daily: DailyRiskReport,
}

fn load_history(
    adapter: &FileConfigAdapter,
    history: Option<&PathBuf>,
    asset: Option<&str>,
) -> Result<Vec<SignalRecord>, IctError> {
    if let Some(path) = history {
        let content = fs::read_to_string(path)?;
        let mut signals: Vec<SignalRecord> =
            serde_json::from_str(&content).map_err(|e| IctError::ConfigParse {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;
        if let Some(asset) = asset {
            signals.retain(|s| s.asset.eq_ignore_ascii_case(asset));
        }
        return Ok(signals);
    }

    #[cfg(feature = "sqlite")]
    {
        open_signal_store(adapter)?.load_signals(asset)
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (adapter, asset);
        Err(IctError::ConfigMissing {
            section: "metrics".into(),
            key: "history".into(),
        })
    }
}

fn run_metrics(
    adapter: &FileConfigAdapter,
    history: Option<&PathBuf>,
    asset: Option<&str>,
    balance: Option<f64>,
) -> Result<(), IctError> {
    let config = build_engine_config(adapter)?;
    let signals = load_history(adapter, history, asset)?;

    let mut portfolio_config = config.clone();
    if let Some(balance) = balance {
        portfolio_config.default_balance = balance;
    }

    let report = MetricsReport {
        signals: signals.len(),
        portfolio: pipeline::portfolio_metrics(&signals, &portfolio_config),
        daily: pipeline::daily_risk_limit(&signals, balance, &config),
    };
    print_json(&report)
}

fn run_import(adapter: &FileConfigAdapter, asset: &str, timeframe: Timeframe) -> Result<(), IctError> {
    #[cfg(feature = "sqlite")]
    {
        let path = adapter
            .get_string("data", "path")
            .ok_or_else(|| IctError::ConfigMissing {
                section: "data".into(),
                key: "path".into(),
            })?;
        let series = CsvAdapter::new(PathBuf::from(path)).fetch_series(asset, timeframe)?;
        let store = open_signal_store(adapter)?;
        store.insert_series(&series)?;
        eprintln!(
            "Imported {} bars for {} {}",
            series.len(),
            series.asset(),
            timeframe
        );
        Ok(())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (adapter, asset, timeframe);
        Err(IctError::ConfigInvalid {
            section: "sqlite".into(),
            key: "path".into(),
            reason: "the sqlite feature is required for import".into(),
        })
    }
}

fn run_list_assets(adapter: &FileConfigAdapter) -> Result<(), IctError> {
    let data = create_data_port(adapter)?;
    let assets = data.list_assets()?;

    if assets.is_empty() {
        eprintln!("No assets found");
    } else {
        for asset in &assets {
            println!("{}", asset);
        }
        eprintln!("{} assets found", assets.len());
    }
    Ok(())
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let config = match build_engine_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("  ATR period:         {}", config.atr_period);
    eprintln!("  Liquidity lookback: {}", config.liquidity_lookback);
    eprintln!("  Liquidity tolerance: {}", config.liquidity_tolerance);
    eprintln!("  Max risk per trade: {}", config.max_risk_per_trade);
    eprintln!("  Max daily risk:     {}", config.max_daily_risk);
    for (asset, pip) in &config.pip_values {
        eprintln!("  Pip value {:<8} {}", asset, pip);
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

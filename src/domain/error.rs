//! Domain error types.

/// Top-level error type for ictrader.
#[derive(Debug, thiserror::Error)]
pub enum IctError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no pip value configured for asset {asset}")]
    UnknownAsset { asset: String },

    #[error("unknown timeframe '{label}' (expected one of 1m, 5m, 15m, 1h, 4h, 1d)")]
    UnknownTimeframe { label: String },

    #[error("invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("duplicate bar timestamp {timestamp}")]
    DuplicateTimestamp { timestamp: String },

    #[error("no data for {asset} on {timeframe}")]
    NoData { asset: String, timeframe: String },

    #[error("insufficient data for {asset} on {timeframe}: have {bars} bars, need {minimum}")]
    InsufficientData {
        asset: String,
        timeframe: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&IctError> for std::process::ExitCode {
    fn from(err: &IctError) -> Self {
        let code: u8 = match err {
            IctError::Io(_) => 1,
            IctError::ConfigParse { .. }
            | IctError::ConfigMissing { .. }
            | IctError::ConfigInvalid { .. }
            | IctError::UnknownAsset { .. }
            | IctError::UnknownTimeframe { .. } => 2,
            IctError::Database { .. } | IctError::DatabaseQuery { .. } => 3,
            IctError::InvalidBar { .. }
            | IctError::DuplicateTimestamp { .. }
            | IctError::NoData { .. }
            | IctError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message() {
        let err = IctError::InsufficientData {
            asset: "XAUUSD".into(),
            timeframe: "1h".into(),
            bars: 12,
            minimum: 21,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for XAUUSD on 1h: have 12 bars, need 21"
        );
    }

    #[test]
    fn unknown_asset_message() {
        let err = IctError::UnknownAsset {
            asset: "EURUSD".into(),
        };
        assert_eq!(err.to_string(), "no pip value configured for asset EURUSD");
    }

    #[test]
    fn exit_codes_group_by_kind() {
        let config = IctError::UnknownAsset { asset: "X".into() };
        let data = IctError::NoData {
            asset: "X".into(),
            timeframe: "1d".into(),
        };
        let db = IctError::Database { reason: "x".into() };
        let code = |e: &IctError| format!("{:?}", std::process::ExitCode::from(e));
        assert_eq!(code(&config), format!("{:?}", std::process::ExitCode::from(2)));
        assert_eq!(code(&data), format!("{:?}", std::process::ExitCode::from(5)));
        assert_eq!(code(&db), format!("{:?}", std::process::ExitCode::from(3)));
    }
}

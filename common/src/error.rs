use thiserror::Error;

use crate::types::TimeframeRole;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Insufficient data: need at least {required} bars, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("No candles for {0:?} timeframe")]
    NoData(TimeframeRole),

    #[error("Out-of-order candle on {role:?}: last epoch {last}, got {got}")]
    OutOfOrderCandle {
        role: TimeframeRole,
        last: i64,
        got: i64,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Data loading error: {0}")]
    DataLoadError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parse error: {0}")]
    CsvError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

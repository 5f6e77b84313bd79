pub mod loader;
pub mod resample;
pub mod ring;
pub mod series;
pub mod synthetic;

pub use loader::{load_csv, load_json, validate_candles};
pub use resample::resample;
pub use ring::RingBuffer;
pub use series::{CandleSeries, MarketData, MergeOutcome};
pub use synthetic::{generate_synthetic_candles, generate_wave_candles};

use std::path::Path;

use common::{Candle, EngineError, Result};

/// Load candles from file, detecting format from extension
pub fn load_file(path: &Path) -> Result<Vec<Candle>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        _ => Err(EngineError::DataLoadError(format!(
            "Unsupported file format: {}",
            ext
        ))),
    }
}

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use common::{Candle, EngineError, Result};
use tracing::warn;

/// Load candles from CSV file
///
/// Expected columns: timestamp, open, high, low, close, [volume...]. Extra
/// columns are ignored. The timestamp may be RFC 3339, a common date-time
/// layout, or a unix epoch in seconds or milliseconds.
pub fn load_csv(path: &Path) -> Result<Vec<Candle>> {
    let file = File::open(path).map_err(|e| EngineError::DataLoadError(e.to_string()))?;
    let reader = BufReader::new(file);
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut candles = Vec::new();

    for (row, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| EngineError::CsvError(e.to_string()))?;

        if record.len() < 5 {
            warn!(row = row + 1, fields = record.len(), "skipping short CSV row");
            continue;
        }

        let epoch = parse_timestamp(&record[0])?;
        let field = |i: usize, name: &str| -> Result<f64> {
            record[i].parse().map_err(|_| {
                EngineError::CsvError(format!("Invalid {} price on row {}", name, row + 1))
            })
        };

        candles.push(Candle {
            epoch,
            open: field(1, "open")?,
            high: field(2, "high")?,
            low: field(3, "low")?,
            close: field(4, "close")?,
        });
    }

    validate_candles(&candles)?;
    Ok(candles)
}

/// Load candles from JSON file (array of `{epoch, open, high, low, close}`)
pub fn load_json(path: &Path) -> Result<Vec<Candle>> {
    let file = File::open(path).map_err(|e| EngineError::DataLoadError(e.to_string()))?;
    let reader = BufReader::new(file);
    let candles: Vec<Candle> = serde_json::from_reader(reader)?;
    validate_candles(&candles)?;
    Ok(candles)
}

/// Reject malformed or unordered candles at the boundary
pub fn validate_candles(candles: &[Candle]) -> Result<()> {
    for (i, c) in candles.iter().enumerate() {
        let prices = [c.open, c.high, c.low, c.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(EngineError::DataLoadError(format!(
                "Non-finite price in candle {} (epoch {})",
                i, c.epoch
            )));
        }
        if c.high < c.low || c.high < c.open.max(c.close) || c.low > c.open.min(c.close) {
            return Err(EngineError::DataLoadError(format!(
                "Inconsistent OHLC in candle {} (epoch {})",
                i, c.epoch
            )));
        }
        if i > 0 && c.epoch <= candles[i - 1].epoch {
            return Err(EngineError::DataLoadError(format!(
                "Candles not strictly ordered at {} (epoch {} after {})",
                i,
                c.epoch,
                candles[i - 1].epoch
            )));
        }
    }
    Ok(())
}

/// Parse timestamp from various formats into epoch seconds
fn parse_timestamp(s: &str) -> Result<i64> {
    // Try ISO 8601 format first
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc).timestamp());
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt).timestamp());
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(s, fmt) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&dt).timestamp());
            }
        }
    }

    // Unix timestamp; values this large can only be milliseconds
    if let Ok(ts) = s.parse::<i64>() {
        return Ok(if ts > 100_000_000_000 { ts / 1000 } else { ts });
    }

    Err(EngineError::CsvError(format!(
        "Unable to parse timestamp: {}",
        s
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_timestamp_iso() {
        let ts = parse_timestamp("2024-01-15T09:30:00Z").unwrap();
        assert_eq!(ts, 1_705_311_000);
    }

    #[test]
    fn test_parse_timestamp_common() {
        let ts = parse_timestamp("2024-01-15 09:30:00").unwrap();
        assert_eq!(ts, 1_705_311_000);
    }

    #[test]
    fn test_parse_timestamp_date_only() {
        let ts = parse_timestamp("2024-01-15").unwrap();
        assert_eq!(ts % 86_400, 0);
    }

    #[test]
    fn test_parse_timestamp_unix_millis() {
        assert_eq!(parse_timestamp("1705311000").unwrap(), 1_705_311_000);
        assert_eq!(parse_timestamp("1705311000000").unwrap(), 1_705_311_000);
    }

    #[test]
    fn test_validate_rejects_bad_candles() {
        let inverted = [Candle::new(0, 10.0, 9.0, 11.0, 10.0)];
        assert!(validate_candles(&inverted).is_err());

        let unordered = [
            Candle::new(60, 10.0, 11.0, 9.0, 10.0),
            Candle::new(0, 10.0, 11.0, 9.0, 10.0),
        ];
        assert!(validate_candles(&unordered).is_err());

        let nan = [Candle::new(0, f64::NAN, 11.0, 9.0, 10.0)];
        assert!(validate_candles(&nan).is_err());
    }

    #[test]
    fn test_load_csv_roundtrip_file() {
        let path = std::env::temp_dir()
            .join(format!("structure_engine_loader_{}.csv", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
            writeln!(file, "2024-01-15T09:30:00Z,10,11,9,10.5,100").unwrap();
            writeln!(file, "2024-01-15T09:35:00Z,10.5,12,10,11.5,120").unwrap();
        }

        let candles = load_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].epoch - candles[0].epoch, 300);
        assert_eq!(candles[1].close, 11.5);
    }
}

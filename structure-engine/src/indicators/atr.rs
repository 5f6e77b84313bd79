use common::Candle;

use super::wilder::WilderAverage;

/// Average True Range, ready from index `period - 1`
///
/// The first bar has no previous close, so its true range is its own range.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut avg = WilderAverage::new(period);
    let mut prev_close: Option<f64> = None;

    candles
        .iter()
        .map(|c| {
            let tr = match prev_close {
                Some(close) => true_range(c.high, c.low, close),
                None => c.high - c.low,
            };
            prev_close = Some(c.close);
            avg.update(tr)
        })
        .collect()
}

/// Largest of the bar range and the gaps to the previous close
pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

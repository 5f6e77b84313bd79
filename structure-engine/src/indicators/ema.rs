/// Calculate EMA with SMA as initial seed
///
/// The first `period - 1` values are not ready (`None`); the value at
/// `period - 1` is the SMA of the first `period` prices.
pub fn calculate_ema(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = prices.len();
    let mut ema = vec![None; n];
    if n < period || period == 0 {
        return ema;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    // Use SMA as initial seed
    let mut prev: f64 = prices[..period].iter().sum::<f64>() / period as f64;
    ema[period - 1] = Some(prev);

    for i in period..n {
        prev = (prices[i] - prev) * multiplier + prev;
        ema[i] = Some(prev);
    }

    ema
}

/// Simple moving average; ready from index `period - 1`
pub fn calculate_sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let dense: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
    calculate_sma_of(&dense, period)
}

/// Simple moving average over a series with missing values
///
/// A `None` input restarts the window, so the output is ready `period - 1`
/// bars after the input has been continuously present.
pub fn calculate_sma_of(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let mut run = 0usize;
    let mut sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        let Some(v) = *value else {
            run = 0;
            sum = 0.0;
            continue;
        };
        sum += v;
        run += 1;
        if run > period {
            sum -= values[i - period].unwrap_or_default();
        }
        if run >= period {
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

use super::wilder::WilderAverage;

/// Relative Strength Index over closes
///
/// The first value needs `period` close-to-close changes, so it sits at
/// index `period`. A window without losses reads 100.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut gains = WilderAverage::new(period);
    let mut losses = WilderAverage::new(period);

    let mut rsi = Vec::with_capacity(closes.len());
    rsi.extend(closes.first().map(|_| None));
    for pair in closes.windows(2) {
        let delta = pair[1] - pair[0];
        let gain = gains.update(delta.max(0.0));
        let loss = losses.update((-delta).max(0.0));
        rsi.push(gain.zip(loss).map(|(g, l)| strength_index(g, l)));
    }
    rsi
}

fn strength_index(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

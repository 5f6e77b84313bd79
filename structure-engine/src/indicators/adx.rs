use super::atr::true_range;

/// Calculate the Average Directional Index with Wilder smoothing
///
/// 1. +DM / -DM and True Range from consecutive bars
/// 2. Wilder-smooth them over `period` (first value is the plain sum)
/// 3. +DI, -DI and DX = |+DI - -DI| / (+DI + -DI) * 100
/// 4. ADX = average of the first `period` DX values, then Wilder-smoothed
///
/// The first ADX value sits at index `2 * period - 1`; earlier entries are `None`.
pub fn calculate_adx(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Vec<Option<f64>> {
    let n = highs.len().min(lows.len()).min(closes.len());
    let mut adx = vec![None; highs.len()];
    if period == 0 || n < 2 * period {
        return adx;
    }

    let p = period as f64;
    let mut smoothed_plus_dm = 0.0;
    let mut smoothed_minus_dm = 0.0;
    let mut smoothed_tr = 0.0;
    let mut dx_sum = 0.0;
    let mut prev_adx = 0.0;

    for i in 1..n {
        let up = highs[i] - highs[i - 1];
        let down = lows[i - 1] - lows[i];
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
        let tr = true_range(highs[i], lows[i], closes[i - 1]);

        if i <= period {
            smoothed_plus_dm += plus_dm;
            smoothed_minus_dm += minus_dm;
            smoothed_tr += tr;
            if i < period {
                continue;
            }
        } else {
            smoothed_plus_dm = smoothed_plus_dm - smoothed_plus_dm / p + plus_dm;
            smoothed_minus_dm = smoothed_minus_dm - smoothed_minus_dm / p + minus_dm;
            smoothed_tr = smoothed_tr - smoothed_tr / p + tr;
        }

        let dx = directional_index(smoothed_plus_dm, smoothed_minus_dm, smoothed_tr);

        if i < 2 * period - 1 {
            dx_sum += dx;
        } else if i == 2 * period - 1 {
            dx_sum += dx;
            prev_adx = dx_sum / p;
            adx[i] = Some(prev_adx);
        } else {
            prev_adx = (prev_adx * (p - 1.0) + dx) / p;
            adx[i] = Some(prev_adx);
        }
    }

    adx
}

fn directional_index(plus_dm: f64, minus_dm: f64, tr: f64) -> f64 {
    if tr <= 0.0 {
        return 0.0;
    }
    let plus_di = 100.0 * plus_dm / tr;
    let minus_di = 100.0 * minus_dm / tr;
    let di_sum = plus_di + minus_di;
    if di_sum <= 0.0 {
        0.0
    } else {
        100.0 * (plus_di - minus_di).abs() / di_sum
    }
}

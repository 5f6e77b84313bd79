use common::{Candle, EngineError, Pivot, PivotKind, Result};

/// Detect confirmed pivot highs and lows
///
/// A bar `i` with `left <= i < len - right` is a High pivot when its high is
/// strictly greater than every other high in `[i - left, i + right]`, and a
/// Low pivot on the mirrored condition. Bars closer than the radius to either
/// end are never classified. An outside bar can satisfy both conditions; its
/// High is emitted before its Low.
pub fn detect(candles: &[Candle], left: usize, right: usize) -> Result<Vec<Pivot>> {
    if left == 0 || right == 0 {
        return Err(EngineError::InvalidParameter(
            "swing radius must be at least 1 on both sides".to_string(),
        ));
    }

    let n = candles.len();
    let mut pivots = Vec::new();
    if n < left + right + 1 {
        return Ok(pivots);
    }

    for i in left..(n - right) {
        pivots.extend(pivots_at(candles, i, left, right));
    }

    Ok(pivots)
}

/// Pivots confirmed at bar `i` (High first), empty when `i` lacks context
pub fn pivots_at(candles: &[Candle], i: usize, left: usize, right: usize) -> Vec<Pivot> {
    let mut out = Vec::with_capacity(2);
    if i < left || i + right >= candles.len() {
        return out;
    }

    let bar = &candles[i];
    let window = (i - left)..=(i + right);
    let confirmed_epoch = candles[i + right].epoch;

    let is_high = window
        .clone()
        .filter(|&j| j != i)
        .all(|j| bar.high > candles[j].high);
    let is_low = window
        .filter(|&j| j != i)
        .all(|j| bar.low < candles[j].low);

    if is_high {
        out.push(Pivot {
            index: i,
            epoch: bar.epoch,
            kind: PivotKind::High,
            price: bar.high,
            confirmed_epoch,
        });
    }
    if is_low {
        out.push(Pivot {
            index: i,
            epoch: bar.epoch,
            kind: PivotKind::Low,
            price: bar.low,
            confirmed_epoch,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(i as i64 * 60, c, c, c, c))
            .collect()
    }

    #[test]
    fn test_alternating_closes_radius_one() {
        let candles = flat(&[10.0, 12.0, 8.0, 15.0, 9.0]);
        let pivots = detect(&candles, 1, 1).unwrap();

        let summary: Vec<(usize, PivotKind, f64)> =
            pivots.iter().map(|p| (p.index, p.kind, p.price)).collect();
        assert_eq!(
            summary,
            vec![
                (1, PivotKind::High, 12.0),
                (2, PivotKind::Low, 8.0),
                (3, PivotKind::High, 15.0),
            ]
        );
        // edges never classified
        assert!(pivots.iter().all(|p| p.index != 0 && p.index != 4));
    }

    #[test]
    fn test_confirmation_epoch_is_lookahead_bar() {
        let candles = flat(&[10.0, 12.0, 8.0, 15.0, 9.0]);
        let pivots = detect(&candles, 1, 1).unwrap();
        assert_eq!(pivots[0].confirmed_epoch, candles[2].epoch);
    }

    #[test]
    fn test_equal_highs_are_not_pivots() {
        let candles = flat(&[10.0, 12.0, 12.0, 10.0, 9.0]);
        let pivots = detect(&candles, 1, 1).unwrap();
        assert!(pivots.iter().all(|p| p.kind != PivotKind::High));
    }

    #[test]
    fn test_outside_bar_emits_high_then_low() {
        let candles = vec![
            Candle::new(0, 10.0, 11.0, 9.0, 10.0),
            Candle::new(60, 10.0, 15.0, 5.0, 10.0),
            Candle::new(120, 10.0, 11.0, 9.0, 10.0),
        ];
        let pivots = detect(&candles, 1, 1).unwrap();
        assert_eq!(pivots.len(), 2);
        assert_eq!(pivots[0].kind, PivotKind::High);
        assert_eq!(pivots[1].kind, PivotKind::Low);
    }

    #[test]
    fn test_asymmetric_window() {
        // index 2 is the max within 2 left / 1 right
        let candles = flat(&[1.0, 2.0, 5.0, 3.0, 4.0, 1.0]);
        let pivots = detect(&candles, 2, 1).unwrap();
        assert_eq!(pivots[0].index, 2);
        assert_eq!(pivots[0].kind, PivotKind::High);
    }

    #[test]
    fn test_zero_radius_rejected() {
        assert!(detect(&flat(&[1.0, 2.0, 1.0]), 0, 1).is_err());
    }

    #[test]
    fn test_short_series_has_no_pivots() {
        assert!(detect(&flat(&[1.0, 2.0]), 1, 1).unwrap().is_empty());
    }
}

use common::{Bias, Candle};

/// How much of the previous bar an engulfing bar has to cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngulfingMode {
    /// Body covers the previous body
    Body,
    /// Body covers the previous body and the wicks cover the previous range
    FullRange,
}

/// Bullish bar whose body covers a bearish previous bar's body
pub fn is_bullish_engulfing(curr: &Candle, prev: &Candle, mode: EngulfingMode) -> bool {
    let body = curr.is_bullish()
        && prev.is_bearish()
        && curr.close >= prev.open
        && curr.open <= prev.close;

    match mode {
        EngulfingMode::Body => body,
        EngulfingMode::FullRange => body && covers_range(curr, prev),
    }
}

/// Bearish bar whose body covers a bullish previous bar's body
pub fn is_bearish_engulfing(curr: &Candle, prev: &Candle, mode: EngulfingMode) -> bool {
    let body = curr.is_bearish()
        && prev.is_bullish()
        && curr.open >= prev.close
        && curr.close <= prev.open;

    match mode {
        EngulfingMode::Body => body,
        EngulfingMode::FullRange => body && covers_range(curr, prev),
    }
}

pub fn is_engulfing(curr: &Candle, prev: &Candle, bias: Bias, mode: EngulfingMode) -> bool {
    match bias {
        Bias::Long => is_bullish_engulfing(curr, prev, mode),
        Bias::Short => is_bearish_engulfing(curr, prev, mode),
    }
}

/// Direction of the engulf formed by `curr` over `prev`, if any
pub fn engulfing_direction(curr: &Candle, prev: &Candle, mode: EngulfingMode) -> Option<Bias> {
    if is_bullish_engulfing(curr, prev, mode) {
        Some(Bias::Long)
    } else if is_bearish_engulfing(curr, prev, mode) {
        Some(Bias::Short)
    } else {
        None
    }
}

fn covers_range(curr: &Candle, prev: &Candle) -> bool {
    curr.high >= prev.high && curr.low <= prev.low
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, open, high, low, close)
    }

    #[test]
    fn test_bullish_engulf_both_modes() {
        let prev = bar(10.0, 11.0, 9.0, 9.5);
        let curr = bar(9.0, 12.0, 8.0, 11.0);

        assert!(is_bullish_engulfing(&curr, &prev, EngulfingMode::Body));
        assert!(is_bullish_engulfing(&curr, &prev, EngulfingMode::FullRange));
        assert!(!is_bearish_engulfing(&curr, &prev, EngulfingMode::Body));
        assert_eq!(
            engulfing_direction(&curr, &prev, EngulfingMode::FullRange),
            Some(Bias::Long)
        );
    }

    #[test]
    fn test_full_range_needs_wicks() {
        let prev = bar(10.0, 13.0, 9.0, 9.5);
        let curr = bar(9.0, 12.0, 8.0, 11.0);

        assert!(is_bullish_engulfing(&curr, &prev, EngulfingMode::Body));
        assert!(!is_bullish_engulfing(&curr, &prev, EngulfingMode::FullRange));
    }

    #[test]
    fn test_bearish_engulf_mirror() {
        let prev = bar(9.5, 11.0, 9.0, 10.0);
        let curr = bar(11.0, 12.0, 8.0, 9.0);

        assert!(is_bearish_engulfing(&curr, &prev, EngulfingMode::FullRange));
        assert!(is_engulfing(&curr, &prev, Bias::Short, EngulfingMode::Body));
        assert!(!is_engulfing(&curr, &prev, Bias::Long, EngulfingMode::Body));
    }

    #[test]
    fn test_same_colour_bars_never_engulf() {
        let prev = bar(9.0, 10.5, 8.5, 10.0);
        let curr = bar(8.0, 12.0, 7.0, 11.0);
        assert_eq!(engulfing_direction(&curr, &prev, EngulfingMode::Body), None);
    }

    #[test]
    fn test_doji_is_not_engulfing() {
        let prev = bar(10.0, 11.0, 9.0, 9.5);
        let curr = bar(11.0, 12.0, 8.0, 11.0);
        assert!(!is_bullish_engulfing(&curr, &prev, EngulfingMode::Body));
    }

    #[test]
    fn test_equal_body_edges_count() {
        let prev = bar(10.0, 10.0, 9.0, 9.0);
        let curr = bar(9.0, 10.0, 9.0, 10.0);
        assert!(is_bullish_engulfing(&curr, &prev, EngulfingMode::FullRange));
    }
}

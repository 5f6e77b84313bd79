use common::BandState;

use super::sma::calculate_sma;

/// Bollinger Bands result
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

impl BollingerBands {
    /// Band position of `close` against the bands at `idx`, if ready
    pub fn band_state(&self, idx: usize, close: f64) -> Option<BandState> {
        let upper = self.upper.get(idx).copied().flatten()?;
        let lower = self.lower.get(idx).copied().flatten()?;
        Some(classify_band(close, lower, upper))
    }
}

/// Bollinger Bands around the simple moving average of `prices`
///
/// The band width uses the population standard deviation of the same window.
/// All three bands are `None` until `period` prices are available.
pub fn calculate_bollinger_bands(prices: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    let middle = calculate_sma(prices, period);
    let mut upper = vec![None; prices.len()];
    let mut lower = vec![None; prices.len()];

    for (i, mean) in middle.iter().enumerate() {
        let Some(mean) = *mean else { continue };
        let window = &prices[i + 1 - period..=i];
        let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let width = variance.sqrt() * std_dev;
        upper[i] = Some(mean + width);
        lower[i] = Some(mean - width);
    }

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

/// Touching a band counts as being outside it
pub fn classify_band(close: f64, lower: f64, upper: f64) -> BandState {
    if close >= upper {
        BandState::Overbought
    } else if close <= lower {
        BandState::Oversold
    } else {
        BandState::Inside
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bollinger_bands_basic() {
        let prices = vec![
            22.27, 22.19, 22.08, 22.17, 22.18, 22.13, 22.23, 22.43, 22.24, 22.29, 22.15, 22.39,
            22.38, 22.61, 23.36, 24.05, 23.75, 23.83, 23.95, 23.63,
        ];
        let bb = calculate_bollinger_bands(&prices, 20, 2.0);

        assert_eq!(bb.middle.len(), prices.len());
        assert!(bb.middle[18].is_none());

        // The 20th value (index 19) should be valid
        let middle = bb.middle[19].unwrap();
        assert!(bb.upper[19].unwrap() > middle);
        assert!(bb.lower[19].unwrap() < middle);
    }

    #[test]
    fn test_band_state() {
        let prices = vec![10.0, 10.0, 10.0, 10.0, 14.0];
        let bb = calculate_bollinger_bands(&prices, 5, 1.0);

        // mean 10.8, population std 1.6 -> upper 12.4, lower 9.2
        assert_eq!(bb.band_state(4, 14.0), Some(BandState::Overbought));
        assert_eq!(bb.band_state(4, 9.0), Some(BandState::Oversold));
        assert_eq!(bb.band_state(4, 10.8), Some(BandState::Inside));
        assert_eq!(bb.band_state(3, 10.0), None);
    }

    #[test]
    fn test_classify_band_touch() {
        assert_eq!(classify_band(110.0, 90.0, 110.0), BandState::Overbought);
        assert_eq!(classify_band(90.0, 90.0, 110.0), BandState::Oversold);
        assert_eq!(classify_band(100.0, 90.0, 110.0), BandState::Inside);
    }
}

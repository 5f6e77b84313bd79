pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod rsi;
pub mod sma;
pub mod wilder;

pub use adx::calculate_adx;
pub use atr::{calculate_atr, true_range};
pub use bollinger::{calculate_bollinger_bands, classify_band, BollingerBands};
pub use ema::calculate_ema;
pub use rsi::calculate_rsi;
pub use sma::{calculate_sma, calculate_sma_of};
pub use wilder::WilderAverage;

use common::{BandState, Candle, IndicatorParameters};

/// Indicator values at one bar; `None` while an indicator is warming up
#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorValues {
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub ema_trend: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub atr: Option<f64>,
    pub atr_average: Option<f64>,
    pub adx: Option<f64>,
    pub rsi: Option<f64>,
}

impl IndicatorValues {
    pub fn band_state(&self, close: f64) -> Option<BandState> {
        Some(classify_band(close, self.bb_lower?, self.bb_upper?))
    }
}

/// Pre-computed indicators for all bars of one timeframe, aligned by index
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub ema_fast: Vec<Option<f64>>,
    pub ema_slow: Vec<Option<f64>>,
    pub ema_trend: Vec<Option<f64>>,
    pub bb: BollingerBands,
    pub atr: Vec<Option<f64>>,
    pub atr_average: Vec<Option<f64>>,
    pub adx: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
}

impl IndicatorSet {
    /// Calculate all indicators from candle data
    pub fn calculate(candles: &[Candle], params: &IndicatorParameters) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

        let atr = calculate_atr(candles, params.atr_period);
        let atr_average = calculate_sma_of(&atr, params.atr_average_period);

        Self {
            ema_fast: calculate_ema(&closes, params.ema_fast_period),
            ema_slow: calculate_ema(&closes, params.ema_slow_period),
            ema_trend: calculate_ema(&closes, params.ema_trend_period),
            bb: calculate_bollinger_bands(&closes, params.bb_period, params.bb_std_dev),
            atr,
            atr_average,
            adx: calculate_adx(&highs, &lows, &closes, params.adx_period),
            rsi: calculate_rsi(&closes, params.rsi_period),
        }
    }

    pub fn len(&self) -> usize {
        self.ema_fast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ema_fast.is_empty()
    }

    /// Get indicator values at a specific index
    pub fn get(&self, idx: usize) -> IndicatorValues {
        let at = |v: &[Option<f64>]| v.get(idx).copied().flatten();
        IndicatorValues {
            ema_fast: at(&self.ema_fast),
            ema_slow: at(&self.ema_slow),
            ema_trend: at(&self.ema_trend),
            bb_upper: at(&self.bb.upper),
            bb_middle: at(&self.bb.middle),
            bb_lower: at(&self.bb.lower),
            atr: at(&self.atr),
            atr_average: at(&self.atr_average),
            adx: at(&self.adx),
            rsi: at(&self.rsi),
        }
    }
}

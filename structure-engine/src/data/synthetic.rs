use common::Candle;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate a seeded random walk with alternating trend regimes
///
/// Every `regime_len` bars the drift flips sign, which gives the structure
/// detector real swings to work with.
pub fn generate_synthetic_candles(
    count: usize,
    start_epoch: i64,
    granularity: i64,
    initial_price: f64,
    seed: u64,
) -> Vec<Candle> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut candles = Vec::with_capacity(count);

    let mut price = initial_price;
    let volatility = 0.004;
    let regime_len = 150;

    for i in 0..count {
        let epoch = start_epoch + i as i64 * granularity;
        let drift = if (i / regime_len) % 2 == 0 { 0.0006 } else { -0.0006 };

        let shock: f64 = rng.gen_range(-1.0..1.0);
        let ret = drift + volatility * shock;

        let open = price;
        let close = (price * (1.0 + ret)).max(0.01);

        let range = price * rng.gen_range(0.0005..0.003);
        let high = open.max(close) + range * rng.gen_range(0.0..1.0);
        let low = (open.min(close) - range * rng.gen_range(0.0..1.0)).max(0.005);

        candles.push(Candle {
            epoch,
            open,
            high,
            low,
            close,
        });

        price = close;
    }

    candles
}

/// Deterministic sine-wave candles with optional linear drift
///
/// Closes follow `base + drift*i + amplitude*sin(2πi/period)`; each bar opens
/// at the previous close and wicks `wick` beyond its body.
pub fn generate_wave_candles(
    count: usize,
    start_epoch: i64,
    granularity: i64,
    base: f64,
    amplitude: f64,
    period: f64,
    drift: f64,
) -> Vec<Candle> {
    let wick = amplitude * 0.05;
    let mut prev_close = base;

    (0..count)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / period;
            let close = base + drift * i as f64 + amplitude * phase.sin();
            let open = prev_close;
            prev_close = close;
            Candle {
                epoch: start_epoch + i as i64 * granularity,
                open,
                high: open.max(close) + wick,
                low: open.min(close) - wick,
                close,
            }
        })
        .collect()
}

use common::Candle;

/// Aggregate candles into coarser buckets aligned on `to_secs`
///
/// Bucket start is `epoch - epoch.rem_euclid(to_secs)`. Empty buckets are
/// skipped rather than synthesised. A trailing bucket is emitted even when it
/// is incomplete; callers decide whether it is closed from its epoch.
pub fn resample(candles: &[Candle], from_secs: i64, to_secs: i64) -> Vec<Candle> {
    if to_secs <= from_secs || to_secs <= 0 {
        return candles.to_vec();
    }

    let mut out: Vec<Candle> = Vec::new();

    for c in candles {
        let bucket = c.epoch - c.epoch.rem_euclid(to_secs);
        match out.last_mut() {
            Some(agg) if agg.epoch == bucket => {
                agg.high = agg.high.max(c.high);
                agg.low = agg.low.min(c.low);
                agg.close = c.close;
            }
            _ => out.push(Candle::new(bucket, c.open, c.high, c.low, c.close)),
        }
    }

    out
}

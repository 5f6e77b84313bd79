use common::{Bias, Candle, PullbackParameters, StructureEvent};

/// Outcome of advancing an armed setup by one execution bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetupProgress {
    /// Not inside the retracement window yet
    Waiting { retrace: f64 },
    /// Inside the window; confirmation may be attempted on this bar
    InWindow { retrace: f64 },
    /// Retraced past the maximum before confirming
    Invalidated { retrace: f64 },
    Expired,
}

/// Structure break waiting for a retracement into its leg
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PullbackSetup {
    pub event: StructureEvent,
    /// Execution-bar epoch the setup was armed on
    pub armed_epoch: i64,
    pub bars_elapsed: usize,
}

impl PullbackSetup {
    pub fn new(event: StructureEvent, armed_epoch: i64) -> Self {
        Self {
            event,
            armed_epoch,
            bars_elapsed: 0,
        }
    }

    pub fn bias(&self) -> Bias {
        self.event.kind.bias()
    }

    /// Depth of the bar's counter extreme into the leg, as a fraction of the leg
    ///
    /// Negative when the bar extends the leg instead of retracing it.
    pub fn retrace(&self, bar: &Candle) -> Option<f64> {
        let magnitude = self.event.leg_magnitude;
        if !(magnitude.is_finite() && magnitude > 0.0) {
            return None;
        }
        let extreme = self.event.leg_extreme();
        let depth = match self.bias() {
            Bias::Long => extreme - bar.low,
            Bias::Short => bar.high - extreme,
        };
        Some(depth / magnitude)
    }

    /// Deepest retrace among `bars` from the one that printed the leg extreme
    ///
    /// Bars before the break pivot's epoch, and bars of that pivot that come
    /// before the extreme was reached, are part of the leg and are skipped.
    pub fn deepest_retrace(&self, bars: &[Candle]) -> Option<f64> {
        let extreme = self.event.leg_extreme();
        let start = bars.partition_point(|c| c.epoch < self.event.extreme_epoch);
        let tail = &bars[start..];
        let reached = tail
            .iter()
            .position(|c| match self.bias() {
                Bias::Long => c.high >= extreme,
                Bias::Short => c.low <= extreme,
            })
            .unwrap_or(0);

        tail[reached..]
            .iter()
            .filter_map(|c| self.retrace(c))
            .reduce(f64::max)
    }

    /// Step the setup over the next execution bar
    pub fn advance(&mut self, bar: &Candle, params: &PullbackParameters) -> SetupProgress {
        self.bars_elapsed += 1;
        if self.bars_elapsed > params.max_setup_bars {
            return SetupProgress::Expired;
        }

        let Some(retrace) = self.retrace(bar) else {
            return SetupProgress::Invalidated { retrace: f64::NAN };
        };

        if retrace > params.max_retrace {
            SetupProgress::Invalidated { retrace }
        } else if retrace >= params.min_retrace {
            SetupProgress::InWindow { retrace }
        } else {
            SetupProgress::Waiting { retrace }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Pivot, PivotKind, StructureKind};

    fn bos_up() -> StructureEvent {
        let pivot = |kind, price| Pivot {
            index: 0,
            epoch: 0,
            kind,
            price,
            confirmed_epoch: 0,
        };
        StructureEvent {
            kind: StructureKind::BosUp,
            broken_pivot: pivot(PivotKind::High, 100.0),
            origin_pivot: pivot(PivotKind::Low, 90.0),
            confirming_bar: 0,
            extreme_epoch: 0,
            confirmed_epoch: 0,
            leg_magnitude: 20.0,
            directional_bar_count: 5,
        }
    }

    fn bar_at(epoch: i64, high: f64, low: f64) -> Candle {
        Candle::new(epoch, low, high, low, high)
    }

    #[test]
    fn test_deepest_retrace_since_extreme() {
        let mut event = bos_up();
        event.extreme_epoch = 600;
        let setup = PullbackSetup::new(event, 1500);
        let bars = vec![
            // leg bars before the pivot bar are ignored
            bar_at(0, 95.0, 90.5),
            bar_at(300, 104.0, 94.0),
            // pivot bar: the early dip belongs to the leg
            bar_at(600, 105.0, 96.0),
            bar_at(900, 110.0, 104.0),
            bar_at(1200, 109.0, 97.0),
            bar_at(1500, 108.0, 101.0),
        ];

        let deepest = setup.deepest_retrace(&bars).unwrap();
        assert!((deepest - 0.65).abs() < 1e-9);
        assert_eq!(setup.deepest_retrace(&bars[..2]), None);
    }

    fn bar_with_low(low: f64) -> Candle {
        Candle::new(0, low + 1.0, low + 2.0, low, low + 1.5)
    }

    #[test]
    fn test_retrace_fraction_for_long() {
        let setup = PullbackSetup::new(bos_up(), 0);
        // leg 90 -> 110, low at 100 retraces half
        assert_eq!(setup.retrace(&bar_with_low(100.0)), Some(0.5));
        assert_eq!(setup.retrace(&bar_with_low(110.0)), Some(0.0));
    }

    #[test]
    fn test_advance_through_window() {
        let params = PullbackParameters::default();
        let mut setup = PullbackSetup::new(bos_up(), 0);

        assert!(matches!(
            setup.advance(&bar_with_low(108.0), &params),
            SetupProgress::Waiting { .. }
        ));
        assert!(matches!(
            setup.advance(&bar_with_low(100.0), &params),
            SetupProgress::InWindow { .. }
        ));
        assert!(matches!(
            setup.advance(&bar_with_low(93.0), &params),
            SetupProgress::Invalidated { .. }
        ));
        assert_eq!(setup.bars_elapsed, 3);
    }

    #[test]
    fn test_setup_expires() {
        let params = PullbackParameters {
            max_setup_bars: 2,
            ..Default::default()
        };
        let mut setup = PullbackSetup::new(bos_up(), 0);
        setup.advance(&bar_with_low(109.0), &params);
        setup.advance(&bar_with_low(109.0), &params);
        assert_eq!(
            setup.advance(&bar_with_low(100.0), &params),
            SetupProgress::Expired
        );
    }

    #[test]
    fn test_short_retrace_uses_highs() {
        let mut event = bos_up();
        event.kind = StructureKind::ChochDown;
        event.origin_pivot.price = 110.0;
        let setup = PullbackSetup::new(event, 0);
        // leg 110 -> 90, high at 95 retraces a quarter
        let bar = Candle::new(0, 93.0, 95.0, 92.0, 94.0);
        assert_eq!(setup.retrace(&bar), Some(0.25));
    }
}

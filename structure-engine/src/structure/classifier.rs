use common::{
    Bias, Candle, Pivot, PivotKind, StructureEvent, StructureKind, StructureParameters, TrendState,
};
use tracing::debug;

/// Turns an ordered pivot stream into BOS / CHoCH events
///
/// A break in the direction of the carried trend (or from `Unknown`) is a BOS,
/// a break against it is a CHoCH. The trend follows the latest event. The
/// last seen High/Low are updated after every pivot whether or not it broke
/// anything.
#[derive(Debug, Clone)]
pub struct StructureClassifier {
    min_directional_bars: usize,
    min_leg_magnitude: Option<f64>,
    trend: TrendState,
    last_high: Option<Pivot>,
    last_low: Option<Pivot>,
}

impl StructureClassifier {
    pub fn new(params: &StructureParameters) -> Self {
        Self {
            min_directional_bars: params.min_directional_bars,
            min_leg_magnitude: params.min_leg_magnitude,
            trend: TrendState::Unknown,
            last_high: None,
            last_low: None,
        }
    }

    pub fn trend(&self) -> TrendState {
        self.trend
    }

    pub fn last_high(&self) -> Option<&Pivot> {
        self.last_high.as_ref()
    }

    pub fn last_low(&self) -> Option<&Pivot> {
        self.last_low.as_ref()
    }

    pub fn reset(&mut self) {
        self.trend = TrendState::Unknown;
        self.last_high = None;
        self.last_low = None;
    }

    /// Classify a whole pivot sequence
    ///
    /// Pivots are walked by bar index; a High and a Low on the same bar are
    /// processed High first.
    pub fn classify(&mut self, pivots: &[Pivot], candles: &[Candle]) -> Vec<StructureEvent> {
        let mut ordered = pivots.to_vec();
        ordered.sort_by_key(|p| (p.index, kind_rank(p.kind)));

        ordered
            .iter()
            .filter_map(|pivot| self.process(pivot, candles))
            .collect()
    }

    /// Feed one pivot; returns the event it fires, if any
    pub fn process(&mut self, pivot: &Pivot, candles: &[Candle]) -> Option<StructureEvent> {
        let (previous, origin) = match pivot.kind {
            PivotKind::High => (self.last_high, self.last_low),
            PivotKind::Low => (self.last_low, self.last_high),
        };

        let event = match (previous, origin) {
            (Some(previous), Some(origin))
                if breaks(pivot, &previous) && origin.epoch < pivot.epoch =>
            {
                self.evaluate_leg(pivot, previous, origin, candles)
            }
            _ => None,
        };

        match pivot.kind {
            PivotKind::High => self.last_high = Some(*pivot),
            PivotKind::Low => self.last_low = Some(*pivot),
        }

        event
    }

    fn evaluate_leg(
        &mut self,
        pivot: &Pivot,
        broken: Pivot,
        origin: Pivot,
        candles: &[Candle],
    ) -> Option<StructureEvent> {
        let direction = match pivot.kind {
            PivotKind::High => Bias::Long,
            PivotKind::Low => Bias::Short,
        };
        let leg_magnitude = (pivot.price - origin.price).abs();
        let directional_bar_count =
            directional_closes(candles, origin.epoch, pivot.epoch, direction);

        let by_count = directional_bar_count >= self.min_directional_bars;
        let by_size = self
            .min_leg_magnitude
            .is_some_and(|min| leg_magnitude >= min);
        if !(by_count || by_size) {
            debug!(
                epoch = pivot.epoch,
                leg_magnitude,
                directional_bar_count,
                "break rejected as not impulsive"
            );
            return None;
        }

        let against_trend = matches!(
            (self.trend, direction),
            (TrendState::Bearish, Bias::Long) | (TrendState::Bullish, Bias::Short)
        );
        let kind = match (direction, against_trend) {
            (Bias::Long, false) => StructureKind::BosUp,
            (Bias::Long, true) => StructureKind::ChochUp,
            (Bias::Short, false) => StructureKind::BosDown,
            (Bias::Short, true) => StructureKind::ChochDown,
        };
        self.trend = TrendState::from_bias(direction);

        Some(StructureEvent {
            kind,
            broken_pivot: broken,
            origin_pivot: origin,
            confirming_bar: pivot.index,
            extreme_epoch: pivot.epoch,
            confirmed_epoch: pivot.confirmed_epoch,
            leg_magnitude,
            directional_bar_count,
        })
    }
}

fn kind_rank(kind: PivotKind) -> u8 {
    match kind {
        PivotKind::High => 0,
        PivotKind::Low => 1,
    }
}

fn breaks(pivot: &Pivot, previous: &Pivot) -> bool {
    match pivot.kind {
        PivotKind::High => pivot.price > previous.price,
        PivotKind::Low => pivot.price < previous.price,
    }
}

/// Bar-to-bar closes moving with `direction` strictly after `from` up to `to`
///
/// Bars are located by epoch so the count also works on a window whose
/// start has been evicted; missing leading bars are simply not counted.
pub fn directional_closes(candles: &[Candle], from: i64, to: i64, direction: Bias) -> usize {
    let start = candles.partition_point(|c| c.epoch < from);
    let end = candles.partition_point(|c| c.epoch <= to);
    if end <= start + 1 {
        return 0;
    }

    candles[start..end]
        .windows(2)
        .filter(|w| match direction {
            Bias::Long => w[1].close > w[0].close,
            Bias::Short => w[1].close < w[0].close,
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::swing::detect;

    fn params(min_bars: usize) -> StructureParameters {
        StructureParameters {
            swing_left: 1,
            swing_right: 1,
            min_directional_bars: min_bars,
            min_leg_magnitude: None,
        }
    }

    fn series(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(i as i64 * 60, c, c, c, c))
            .collect()
    }

    fn pivot(candles: &[Candle], index: usize, kind: PivotKind) -> Pivot {
        let c = candles[index];
        Pivot {
            index,
            epoch: c.epoch,
            kind,
            price: c.close,
            confirmed_epoch: c.epoch + 60,
        }
    }

    #[test]
    fn test_higher_high_breaks_up_from_unknown() {
        let candles = series(&[95.0, 100.0, 95.0, 90.0, 94.0, 98.0, 102.0, 105.0, 101.0]);
        let pivots = vec![
            pivot(&candles, 1, PivotKind::High),
            pivot(&candles, 3, PivotKind::Low),
            pivot(&candles, 7, PivotKind::High),
        ];

        let mut classifier = StructureClassifier::new(&params(3));
        let events = classifier.classify(&pivots, &candles);

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.kind, StructureKind::BosUp);
        assert_eq!(event.broken_pivot.price, 100.0);
        assert_eq!(event.origin_pivot.price, 90.0);
        assert_eq!(event.leg_magnitude, 15.0);
        assert_eq!(event.directional_bar_count, 4);
        assert_eq!(event.confirming_bar, 7);
        assert_eq!(classifier.trend(), TrendState::Bullish);
    }

    #[test]
    fn test_break_against_trend_is_choch() {
        let candles = series(&[
            95.0, 100.0, 95.0, 90.0, 94.0, 98.0, 102.0, 105.0, 100.0, 95.0, 90.0, 85.0, 88.0,
        ]);
        let pivots = vec![
            pivot(&candles, 1, PivotKind::High),
            pivot(&candles, 3, PivotKind::Low),
            pivot(&candles, 7, PivotKind::High),
            pivot(&candles, 11, PivotKind::Low),
        ];

        let mut classifier = StructureClassifier::new(&params(3));
        let events = classifier.classify(&pivots, &candles);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, StructureKind::BosUp);
        assert_eq!(events[1].kind, StructureKind::ChochDown);
        assert_eq!(events[1].broken_pivot.price, 90.0);
        assert_eq!(events[1].origin_pivot.price, 105.0);
        assert_eq!(events[1].leg_magnitude, 20.0);
        assert_eq!(classifier.trend(), TrendState::Bearish);
    }

    #[test]
    fn test_continuation_break_is_bos() {
        let candles = series(&[
            95.0, 100.0, 95.0, 90.0, 94.0, 98.0, 102.0, 105.0, 101.0, 99.0, 103.0, 106.0, 108.0,
            110.0, 107.0,
        ]);
        let pivots = vec![
            pivot(&candles, 1, PivotKind::High),
            pivot(&candles, 3, PivotKind::Low),
            pivot(&candles, 7, PivotKind::High),
            pivot(&candles, 9, PivotKind::Low),
            pivot(&candles, 13, PivotKind::High),
        ];

        let mut classifier = StructureClassifier::new(&params(3));
        let events = classifier.classify(&pivots, &candles);

        let kinds: Vec<StructureKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![StructureKind::BosUp, StructureKind::BosUp]);
        // the higher low at 99 does not break the low at 90
        assert_eq!(events[1].origin_pivot.price, 99.0);
    }

    #[test]
    fn test_weak_leg_rejected_but_last_high_updates() {
        let candles = series(&[95.0, 100.0, 95.0, 90.0, 101.0, 99.0]);
        let pivots = vec![
            pivot(&candles, 1, PivotKind::High),
            pivot(&candles, 3, PivotKind::Low),
            pivot(&candles, 4, PivotKind::High),
        ];

        let mut classifier = StructureClassifier::new(&params(3));
        let events = classifier.classify(&pivots, &candles);

        assert!(events.is_empty());
        assert_eq!(classifier.last_high().unwrap().price, 101.0);
        assert_eq!(classifier.trend(), TrendState::Unknown);
    }

    #[test]
    fn test_leg_magnitude_alone_is_enough() {
        let candles = series(&[95.0, 100.0, 95.0, 90.0, 101.0, 99.0]);
        let pivots = vec![
            pivot(&candles, 1, PivotKind::High),
            pivot(&candles, 3, PivotKind::Low),
            pivot(&candles, 4, PivotKind::High),
        ];

        let mut classifier = StructureClassifier::new(&StructureParameters {
            min_leg_magnitude: Some(10.0),
            ..params(3)
        });
        let events = classifier.classify(&pivots, &candles);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].directional_bar_count, 1);
        assert_eq!(events[0].leg_magnitude, 11.0);
    }

    #[test]
    fn test_first_pivots_never_fire() {
        let candles = series(&[1.0, 3.0, 2.0, 0.5, 2.0]);
        let pivots = detect(&candles, 1, 1).unwrap();
        let mut classifier = StructureClassifier::new(&params(1));
        assert!(classifier.classify(&pivots, &candles).is_empty());
    }

    #[test]
    fn test_classification_is_deterministic() {
        let closes: Vec<f64> = (0..200)
            .map(|i| {
                let x = i as f64;
                100.0 + (x * 0.21).sin() * 8.0 + (x * 0.05).cos() * 5.0 + x * 0.02
            })
            .collect();
        let candles = series(&closes);
        let pivots = detect(&candles, 2, 2).unwrap();

        let first = StructureClassifier::new(&params(2)).classify(&pivots, &candles);
        let second = StructureClassifier::new(&params(2)).classify(&pivots, &candles);
        assert!(!first.is_empty());
        assert_eq!(first, second);

        let mut reused = StructureClassifier::new(&params(2));
        reused.classify(&pivots, &candles);
        reused.reset();
        assert_eq!(reused.classify(&pivots, &candles), first);
    }

    #[test]
    fn test_directional_closes_counts_within_leg() {
        let candles = series(&[10.0, 9.0, 11.0, 12.0, 11.5, 13.0]);
        assert_eq!(directional_closes(&candles, 60, 300, Bias::Long), 3);
        assert_eq!(directional_closes(&candles, 60, 300, Bias::Short), 1);
        assert_eq!(directional_closes(&candles, 300, 300, Bias::Long), 0);
    }
}

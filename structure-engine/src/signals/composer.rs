use common::{
    BandState, Bias, Candle, Signal, StrategyModule, StrategyParameters, StructureEvent,
    TimeframeRole, TrendState,
};
use tracing::debug;

use super::pullback::{PullbackSetup, SetupProgress};
use super::strategy::ModuleRules;
use crate::indicators::{IndicatorSet, IndicatorValues};
use crate::patterns::{is_engulfing, EngulfingMode};

/// Closed-bar view of one timeframe at the current replay step
#[derive(Debug, Clone, Copy)]
pub struct TimeframeContext<'a> {
    pub role: TimeframeRole,
    pub candles: &'a [Candle],
    pub indicators: &'a IndicatorSet,
    /// Last closed bar, `None` before the first one closes
    pub index: Option<usize>,
    /// Structure events of this timeframe in confirmation order
    pub events: &'a [StructureEvent],
}

impl<'a> TimeframeContext<'a> {
    pub fn new(
        role: TimeframeRole,
        candles: &'a [Candle],
        indicators: &'a IndicatorSet,
        index: Option<usize>,
    ) -> Self {
        Self {
            role,
            candles,
            indicators,
            index,
            events: &[],
        }
    }

    pub fn with_events(mut self, events: &'a [StructureEvent]) -> Self {
        self.events = events;
        self
    }

    pub fn current(&self) -> Option<&'a Candle> {
        self.candles.get(self.index?)
    }

    pub fn previous(&self) -> Option<&'a Candle> {
        self.candles.get(self.index?.checked_sub(1)?)
    }

    pub fn values(&self) -> IndicatorValues {
        self.index
            .map(|i| self.indicators.get(i))
            .unwrap_or_default()
    }

    /// Events whose confirming bar has closed by the current bar
    fn visible_events(&self) -> &'a [StructureEvent] {
        match self.current() {
            Some(bar) => {
                let end = self.events.partition_point(|e| e.confirmed_epoch <= bar.epoch);
                &self.events[..end]
            }
            None => &[],
        }
    }
}

/// Fuses the three timeframes into at most one signal per execution bar
///
/// Mean reversion and continuation are decided on the higher timeframe and
/// confirmed on the lower one, once per newly closed lower-timeframe bar.
/// Structure pullbacks arm on lower-timeframe breaks and confirm on the
/// execution timeframe. When several modules fire on one bar the order is
/// mean reversion, continuation, structure pullback.
#[derive(Debug, Clone)]
pub struct SignalComposer {
    params: StrategyParameters,
    last_bias_epoch: Option<i64>,
    last_event_key: Option<(i64, u8)>,
    setup: Option<PullbackSetup>,
}

impl SignalComposer {
    pub fn new(params: &StrategyParameters) -> Self {
        Self {
            params: params.clone(),
            last_bias_epoch: None,
            last_event_key: None,
            setup: None,
        }
    }

    pub fn pending_setup(&self) -> Option<&PullbackSetup> {
        self.setup.as_ref()
    }

    pub fn reset(&mut self) {
        self.last_bias_epoch = None;
        self.last_event_key = None;
        self.setup = None;
    }

    pub fn compose(
        &mut self,
        htf: &TimeframeContext,
        ltf: &TimeframeContext,
        etf: &TimeframeContext,
    ) -> Option<Signal> {
        let bar = *etf.current()?;
        let bias_signal = self.evaluate_bias(htf, ltf, &bar);
        let pullback_signal = self.evaluate_pullback(htf, ltf, etf, &bar);
        bias_signal.or(pullback_signal)
    }

    fn evaluate_bias(
        &mut self,
        htf: &TimeframeContext,
        ltf: &TimeframeContext,
        bar: &Candle,
    ) -> Option<Signal> {
        let ltf_bar = ltf.current()?;
        if self.last_bias_epoch == Some(ltf_bar.epoch) {
            return None;
        }
        self.last_bias_epoch = Some(ltf_bar.epoch);

        let htf_bar = htf.current()?;
        let htf_prev = htf.previous()?;
        let values = htf.values();
        let band_state = values.band_state(htf_bar.close)?;
        let band_middle = values.bb_middle?;
        let trend_ema = values.ema_trend?;

        let trend_state = if htf_bar.close > trend_ema {
            TrendState::Bullish
        } else if htf_bar.close < trend_ema {
            TrendState::Bearish
        } else {
            TrendState::Unknown
        };

        let (module, bias) =
            self.htf_candidates(htf_bar, htf_prev, band_state, trend_state, &values)?;

        let ltf_prev = ltf.previous()?;
        if !is_engulfing(ltf_bar, ltf_prev, bias, EngulfingMode::Body) {
            debug!(epoch = ltf_bar.epoch, ?module, ?bias, "lower timeframe did not confirm");
            return None;
        }

        let stop_anchor = match bias {
            Bias::Long => htf_bar.low,
            Bias::Short => htf_bar.high,
        };

        debug!(epoch = bar.epoch, ?module, ?bias, ?band_state, "bias signal");
        Some(Signal {
            timeframe_role: TimeframeRole::Htf,
            module,
            bias,
            reference_bar: *bar,
            band_state,
            trend_state,
            stop_anchor,
            band_middle: Some(band_middle),
            structure_ref: None,
        })
    }

    /// First enabled module whose higher-timeframe conditions hold
    fn htf_candidates(
        &self,
        curr: &Candle,
        prev: &Candle,
        band_state: BandState,
        trend_state: TrendState,
        values: &IndicatorValues,
    ) -> Option<(StrategyModule, Bias)> {
        let candidates = [
            (StrategyModule::MeanReversion, Bias::Short, band_state == BandState::Overbought),
            (StrategyModule::MeanReversion, Bias::Long, band_state == BandState::Oversold),
            (StrategyModule::Continuation, Bias::Long, trend_state == TrendState::Bullish),
            (StrategyModule::Continuation, Bias::Short, trend_state == TrendState::Bearish),
        ];

        candidates
            .into_iter()
            .filter(|(module, _, _)| self.params.is_enabled(*module))
            .find(|&(module, bias, state_ok)| {
                state_ok
                    && is_engulfing(curr, prev, bias, module.engulfing_mode())
                    && (module != StrategyModule::MeanReversion || self.rsi_allows(bias, values))
            })
            .map(|(module, bias, _)| (module, bias))
    }

    fn rsi_allows(&self, bias: Bias, values: &IndicatorValues) -> bool {
        if !self.params.mr_rsi_filter_enabled {
            return true;
        }
        match (values.rsi, bias) {
            (Some(rsi), Bias::Short) => rsi >= self.params.rsi_overbought,
            (Some(rsi), Bias::Long) => rsi <= self.params.rsi_oversold,
            (None, _) => false,
        }
    }

    fn evaluate_pullback(
        &mut self,
        htf: &TimeframeContext,
        ltf: &TimeframeContext,
        etf: &TimeframeContext,
        bar: &Candle,
    ) -> Option<Signal> {
        if !self.params.is_enabled(StrategyModule::StructurePullback) {
            return None;
        }

        if self.arm_from_new_events(htf, ltf, etf, bar) {
            return None;
        }

        let mut setup = self.setup?;
        let progress = setup.advance(bar, &self.params.pullback);
        self.setup = Some(setup);

        match progress {
            SetupProgress::Waiting { .. } => None,
            SetupProgress::Expired => {
                debug!(epoch = bar.epoch, armed = setup.armed_epoch, "pullback setup expired");
                self.setup = None;
                None
            }
            SetupProgress::Invalidated { retrace } => {
                debug!(epoch = bar.epoch, retrace, "pullback retraced too deep, setup invalidated");
                self.setup = None;
                None
            }
            SetupProgress::InWindow { retrace } => {
                let signal = self.confirm_pullback(&setup, etf, bar, retrace)?;
                self.setup = None;
                Some(signal)
            }
        }
    }

    /// Consume events that became visible since the last call; returns true
    /// when a setup was armed on this bar
    fn arm_from_new_events(
        &mut self,
        htf: &TimeframeContext,
        ltf: &TimeframeContext,
        etf: &TimeframeContext,
        bar: &Candle,
    ) -> bool {
        let visible = ltf.visible_events();
        let start = match self.last_event_key {
            Some(key) => visible.partition_point(|e| event_key(e) <= key),
            None => 0,
        };
        let Some(latest) = visible[start..].last() else {
            return false;
        };
        self.last_event_key = Some(event_key(latest));

        // any newer break retires the pending setup
        self.setup = None;

        let bias = latest.kind.bias();
        if !ema_aligned(&htf.values(), bias) || !ema_aligned(&etf.values(), bias) {
            debug!(
                epoch = latest.confirmed_epoch,
                kind = ?latest.kind,
                "break not aligned with fast/slow EMA"
            );
            return false;
        }

        // the retrace may already have gone too deep while the break confirmed
        let setup = PullbackSetup::new(*latest, bar.epoch);
        let seen = etf.index.and_then(|i| etf.candles.get(..=i)).unwrap_or_default();
        if let Some(deepest) = setup.deepest_retrace(seen) {
            if deepest > self.params.pullback.max_retrace {
                debug!(
                    epoch = bar.epoch,
                    kind = ?latest.kind,
                    retrace = deepest,
                    "retraced too deep before confirmation, setup not armed"
                );
                return false;
            }
        }

        debug!(
            epoch = bar.epoch,
            kind = ?latest.kind,
            leg = latest.leg_magnitude,
            "pullback setup armed"
        );
        self.setup = Some(setup);
        true
    }

    fn confirm_pullback(
        &self,
        setup: &PullbackSetup,
        etf: &TimeframeContext,
        bar: &Candle,
        retrace: f64,
    ) -> Option<Signal> {
        let bias = setup.bias();
        let module = StrategyModule::StructurePullback;
        let prev = etf.previous()?;
        if !is_engulfing(bar, prev, bias, module.engulfing_mode()) {
            return None;
        }

        let values = etf.values();
        let volatile = match (values.atr, values.atr_average) {
            (Some(atr), Some(avg)) => Some(atr > avg),
            _ => None,
        };
        let trending = values.adx.map(|adx| adx > self.params.pullback.adx_threshold);
        match (volatile, trending) {
            (None, None) => return None,
            (Some(true), _) | (_, Some(true)) => {}
            _ => {
                debug!(epoch = bar.epoch, retrace, "pullback confirmed without strength");
                return None;
            }
        }

        debug!(epoch = bar.epoch, retrace, ?bias, "structure pullback signal");
        Some(Signal {
            timeframe_role: TimeframeRole::Ltf,
            module,
            bias,
            reference_bar: *bar,
            band_state: values.band_state(bar.close).unwrap_or(BandState::Inside),
            trend_state: TrendState::from_bias(bias),
            stop_anchor: setup.event.leg_origin(),
            band_middle: values.bb_middle,
            structure_ref: Some(setup.event),
        })
    }
}

fn event_key(event: &StructureEvent) -> (i64, u8) {
    let rank = match event.kind.bias() {
        Bias::Long => 0,
        Bias::Short => 1,
    };
    (event.confirmed_epoch, rank)
}

fn ema_aligned(values: &IndicatorValues, bias: Bias) -> bool {
    match (values.ema_fast, values.ema_slow) {
        (Some(fast), Some(slow)) => match bias {
            Bias::Long => fast > slow,
            Bias::Short => fast < slow,
        },
        _ => false,
    }
}

use common::{
    Candle, EngineError, Notification, Pivot, PivotKind, Position, Result, StrategyParameters,
    StructureEvent, TimeframeRole, TradeRecord, TrendState,
};
use tracing::{debug, info};

use crate::data::{MarketData, MergeOutcome, RingBuffer};
use crate::indicators::IndicatorSet;
use crate::signals::{SignalComposer, TimeframeContext};
use crate::simulator::PositionSimulator;
use crate::structure::{detect, StructureClassifier};

/// Structure events kept for pullback arming
const EVENT_CAPACITY: usize = 256;

/// Incremental evaluation over a bounded candle feed
///
/// Each update merges one candle and runs at most one evaluation pass. An
/// execution bar is evaluated once the next one arrives, so in-progress
/// bars never reach the composer. Trend state only reflects pivots seen in
/// the retained window.
pub struct LiveSession {
    params: StrategyParameters,
    data: MarketData,
    classifier: StructureClassifier,
    events: RingBuffer<StructureEvent>,
    last_pivot_key: Option<(i64, u8)>,
    composer: SignalComposer,
    simulator: PositionSimulator,
    last_evaluated: Option<i64>,
}

impl LiveSession {
    /// `capacity` bars are retained per timeframe
    pub fn new(params: StrategyParameters, capacity: usize) -> Result<Self> {
        params.validate()?;
        let required = params.warmup_bars() + 1;
        if capacity < required {
            return Err(EngineError::InvalidParameter(format!(
                "live capacity {} is below the {} bars the indicators need",
                capacity, required
            )));
        }

        Ok(Self {
            data: MarketData::with_capacity(&params.timeframes, capacity),
            classifier: StructureClassifier::new(&params.structure),
            events: RingBuffer::new(EVENT_CAPACITY),
            last_pivot_key: None,
            composer: SignalComposer::new(&params),
            simulator: PositionSimulator::new(params.initial_capital, params.risk.clone()),
            last_evaluated: None,
            params,
        })
    }

    pub fn data(&self) -> &MarketData {
        &self.data
    }

    pub fn ledger(&self) -> &[TradeRecord] {
        self.simulator.ledger()
    }

    pub fn position(&self) -> Option<&Position> {
        self.simulator.position()
    }

    pub fn equity(&self) -> f64 {
        self.simulator.equity()
    }

    pub fn trend(&self) -> TrendState {
        self.classifier.trend()
    }

    pub fn events(&self) -> Vec<StructureEvent> {
        self.events.to_vec()
    }

    /// Merge one candle and evaluate the newest closed execution bar
    pub fn on_candle(&mut self, role: TimeframeRole, candle: Candle) -> Result<Vec<Notification>> {
        let outcome = self.data.append_or_replace(role, candle)?;
        if role == TimeframeRole::Etf && outcome == MergeOutcome::Appended {
            self.evaluate()?;
        }
        Ok(self.simulator.drain_notifications())
    }

    /// Force-close at the last known price
    pub fn close(&mut self) -> Vec<Notification> {
        if let Some(last) = self.data.etf.last().copied() {
            if let Some(trade) = self.simulator.force_close(&last) {
                info!(
                    epoch = last.epoch,
                    pnl = trade.pnl,
                    "live session closed with open position"
                );
            }
        }
        self.simulator.drain_notifications()
    }

    fn evaluate(&mut self) -> Result<()> {
        let etf: Vec<Candle> = self.data.etf.to_vec();
        let Some(closed) = etf.len().checked_sub(2) else {
            return Ok(());
        };
        let bar = etf[closed];
        if self.last_evaluated.is_some_and(|epoch| epoch >= bar.epoch) {
            return Ok(());
        }
        self.last_evaluated = Some(bar.epoch);

        let now = bar.epoch + self.params.timeframes.etf_secs;
        let etf = &etf[..=closed];
        let htf = self.data.htf.closed_candles(now);
        let ltf = self.data.ltf.closed_candles(now);

        self.update_structure(&ltf)?;

        let ind = &self.params.indicators;
        let htf_ind = IndicatorSet::calculate(&htf, ind);
        let ltf_ind = IndicatorSet::calculate(&ltf, ind);
        let etf_ind = IndicatorSet::calculate(etf, ind);
        let events = self.events.to_vec();

        let htf_ctx =
            TimeframeContext::new(TimeframeRole::Htf, &htf, &htf_ind, htf.len().checked_sub(1));
        let ltf_ctx =
            TimeframeContext::new(TimeframeRole::Ltf, &ltf, &ltf_ind, ltf.len().checked_sub(1))
                .with_events(&events);
        let etf_ctx = TimeframeContext::new(TimeframeRole::Etf, etf, &etf_ind, Some(closed));

        self.simulator.roll_session(&bar);
        self.simulator.manage(&bar);
        if let Some(signal) = self.composer.compose(&htf_ctx, &ltf_ctx, &etf_ctx) {
            let decision = self.simulator.try_enter(&signal);
            debug!(epoch = bar.epoch, module = signal.module.label(), ?decision, "live signal");
        }
        Ok(())
    }

    /// Feed pivots not seen before to the persistent classifier
    fn update_structure(&mut self, ltf: &[Candle]) -> Result<()> {
        let st = &self.params.structure;
        let pivots = detect(ltf, st.swing_left, st.swing_right)?;

        for pivot in pivots {
            let key = pivot_key(&pivot);
            if self.last_pivot_key.is_some_and(|last| key <= last) {
                continue;
            }
            self.last_pivot_key = Some(key);
            if let Some(event) = self.classifier.process(&pivot, ltf) {
                debug!(kind = ?event.kind, epoch = event.confirmed_epoch, "structure event");
                self.events.push(event);
            }
        }
        Ok(())
    }
}

fn pivot_key(pivot: &Pivot) -> (i64, u8) {
    let rank = match pivot.kind {
        PivotKind::High => 0,
        PivotKind::Low => 1,
    };
    (pivot.epoch, rank)
}

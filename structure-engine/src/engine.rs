use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{
    BacktestResult, Candle, EngineError, Result, StrategyParameters, StructureEvent, TimeframeRole,
};
use tracing::{debug, info};

use crate::data::MarketData;
use crate::indicators::IndicatorSet;
use crate::metrics::MetricsCalculator;
use crate::signals::{SignalComposer, TimeframeContext};
use crate::simulator::PositionSimulator;
use crate::structure::{detect, StructureClassifier};

/// All mutable state of one replay
#[derive(Debug, Clone)]
pub struct SimulationContext {
    pub composer: SignalComposer,
    pub simulator: PositionSimulator,
}

impl SimulationContext {
    pub fn new(params: &StrategyParameters) -> Self {
        Self {
            composer: SignalComposer::new(params),
            simulator: PositionSimulator::new(params.initial_capital, params.risk.clone()),
        }
    }
}

/// Indicators and structure of one timeframe, computed once per run
struct Prepared {
    candles: Vec<Candle>,
    indicators: IndicatorSet,
    events: Vec<StructureEvent>,
}

impl Prepared {
    fn context(&self, role: TimeframeRole, index: Option<usize>) -> TimeframeContext<'_> {
        TimeframeContext::new(role, &self.candles, &self.indicators, index)
            .with_events(&self.events)
    }
}

/// Chronological replay over the execution timeframe
pub struct BacktestRunner {
    params: StrategyParameters,
}

impl BacktestRunner {
    pub fn new(params: StrategyParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &StrategyParameters {
        &self.params
    }

    /// Run the backtest over `data`
    ///
    /// Every indicator is causal, so it is computed once up front; pivots and
    /// structure events are gated by their confirmation epoch, and the higher
    /// timeframes only expose bars that have closed by the end of the current
    /// execution bar.
    pub fn run(&self, data: &MarketData) -> Result<BacktestResult> {
        let start_time = Instant::now();
        self.params.validate()?;
        self.check_data(data)?;

        let htf = self.prepare(data, TimeframeRole::Htf, false)?;
        let ltf = self.prepare(data, TimeframeRole::Ltf, true)?;
        let etf = self.prepare(data, TimeframeRole::Etf, false)?;
        debug!(
            htf_bars = htf.candles.len(),
            ltf_bars = ltf.candles.len(),
            etf_bars = etf.candles.len(),
            ltf_events = ltf.events.len(),
            "inputs prepared"
        );

        let mut ctx = SimulationContext::new(&self.params);
        let mut equity_curve: Vec<(DateTime<Utc>, f64)> = Vec::with_capacity(etf.candles.len());
        let etf_secs = self.params.timeframes.etf_secs;

        for (i, bar) in etf.candles.iter().enumerate() {
            let now = bar.epoch + etf_secs;
            ctx.simulator.roll_session(bar);
            ctx.simulator.manage(bar);

            let htf_ctx = htf.context(TimeframeRole::Htf, data.htf.last_closed_index(now));
            let ltf_ctx = ltf.context(TimeframeRole::Ltf, data.ltf.last_closed_index(now));
            let etf_ctx = etf.context(TimeframeRole::Etf, Some(i));

            if let Some(signal) = ctx.composer.compose(&htf_ctx, &ltf_ctx, &etf_ctx) {
                let decision = ctx.simulator.try_enter(&signal);
                if !decision.is_opened() {
                    debug!(
                        epoch = bar.epoch,
                        module = signal.module.label(),
                        ?decision,
                        "signal not taken"
                    );
                }
            }

            equity_curve.push((bar.datetime(), ctx.simulator.mark_to_market(bar.close)));
        }

        if let Some(last_bar) = etf.candles.last() {
            ctx.simulator.force_close(last_bar);
            if let Some(point) = equity_curve.last_mut() {
                point.1 = ctx.simulator.equity();
            }
        }
        // no execution collaborator in a replay
        ctx.simulator.drain_notifications();

        let trades = ctx.simulator.ledger().to_vec();
        let metrics =
            MetricsCalculator::calculate(&equity_curve, &trades, self.params.initial_capital);
        let drawdown_curve = MetricsCalculator::calculate_drawdown_curve(&equity_curve);
        let final_equity = ctx.simulator.equity();

        let (start_date, end_date) = match (etf.candles.first(), etf.candles.last()) {
            (Some(first), Some(last)) => (first.date(), last.date()),
            _ => return Err(EngineError::NoData(TimeframeRole::Etf)),
        };

        info!(
            symbol = %self.params.symbol,
            trades = trades.len(),
            final_equity,
            return_pct = metrics.total_return_pct,
            "backtest complete"
        );

        Ok(BacktestResult {
            symbol: self.params.symbol.clone(),
            metrics,
            equity_curve,
            drawdown_curve,
            trades,
            start_date,
            end_date,
            initial_capital: self.params.initial_capital,
            final_equity,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    fn check_data(&self, data: &MarketData) -> Result<()> {
        for role in TimeframeRole::ALL {
            let series = data.series(role);
            if series.is_empty() {
                return Err(EngineError::NoData(role));
            }
            let expected = self.params.timeframes.granularity(role);
            if series.granularity() != expected {
                return Err(EngineError::InvalidParameter(format!(
                    "{:?} series has granularity {}s, parameters say {}s",
                    role,
                    series.granularity(),
                    expected
                )));
            }
        }

        let required = self.params.warmup_bars() + 1;
        let actual = data.etf.len();
        if actual < required {
            return Err(EngineError::InsufficientData { required, actual });
        }
        Ok(())
    }

    fn prepare(
        &self,
        data: &MarketData,
        role: TimeframeRole,
        with_structure: bool,
    ) -> Result<Prepared> {
        let candles = data.series(role).to_vec();
        let indicators = IndicatorSet::calculate(&candles, &self.params.indicators);

        let events = if with_structure {
            let st = &self.params.structure;
            let pivots = detect(&candles, st.swing_left, st.swing_right)?;
            StructureClassifier::new(st).classify(&pivots, &candles)
        } else {
            Vec::new()
        };

        Ok(Prepared {
            candles,
            indicators,
            events,
        })
    }
}

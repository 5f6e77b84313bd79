use common::{Candle, NotificationKind, TimeframeRole, TimeframeSet, TradeRecord};
use structure_engine::{
    generate_synthetic_candles, BacktestRunner, LiveSession, MarketData, StrategyParameters,
};

const START: i64 = 1_704_067_200;

/// Builds in-progress higher timeframe bars from execution bars, the way a
/// feed would publish them.
struct Aggregator {
    granularity: i64,
    current: Option<Candle>,
}

impl Aggregator {
    fn new(granularity: i64) -> Self {
        Self {
            granularity,
            current: None,
        }
    }

    fn update(&mut self, c: &Candle) -> Candle {
        let bucket = c.epoch - c.epoch.rem_euclid(self.granularity);
        let next = match self.current {
            Some(agg) if agg.epoch == bucket => Candle::new(
                bucket,
                agg.open,
                agg.high.max(c.high),
                agg.low.min(c.low),
                c.close,
            ),
            _ => Candle::new(bucket, c.open, c.high, c.low, c.close),
        };
        self.current = Some(next);
        next
    }
}

struct Replay {
    trades: Vec<TradeRecord>,
    kinds: Vec<NotificationKind>,
    last_epoch: i64,
}

fn replay(params: &StrategyParameters, candles: &[Candle]) -> Replay {
    let tf = &params.timeframes;
    let mut live = LiveSession::new(params.clone(), 100_000).unwrap();
    let mut htf = Aggregator::new(tf.htf_secs);
    let mut ltf = Aggregator::new(tf.ltf_secs);
    let mut kinds = Vec::new();

    for c in candles {
        let updates = [
            (TimeframeRole::Htf, htf.update(c)),
            (TimeframeRole::Ltf, ltf.update(c)),
            (TimeframeRole::Etf, *c),
        ];
        for (role, candle) in updates {
            let notes = live.on_candle(role, candle).unwrap();
            kinds.extend(notes.iter().map(|n| n.kind));
        }
        assert!(live.data().etf.len() <= candles.len());
    }
    kinds.extend(live.close().iter().map(|n| n.kind));

    Replay {
        trades: live.ledger().to_vec(),
        kinds,
        last_epoch: candles.last().map(|c| c.epoch).unwrap_or_default(),
    }
}

#[test]
fn notifications_alternate_enter_and_exit() {
    let params = StrategyParameters::default().without_session_limits();
    let candles = generate_synthetic_candles(1500, START, 300, 100.0, 8);
    let run = replay(&params, &candles);

    for (i, kind) in run.kinds.iter().enumerate() {
        let expected = if i % 2 == 0 {
            NotificationKind::Enter
        } else {
            NotificationKind::Exit
        };
        assert_eq!(*kind, expected);
    }
    assert_eq!(run.kinds.len() % 2, 0);
    assert_eq!(run.kinds.len() / 2, run.trades.len());
}

#[test]
fn live_ledger_balances() {
    let params = StrategyParameters::default().without_session_limits();
    let candles = generate_synthetic_candles(1500, START, 300, 100.0, 19);
    let run = replay(&params, &candles);

    let mut equity = params.initial_capital;
    for trade in &run.trades {
        equity += trade.pnl;
        assert!((trade.equity_after - equity).abs() < 1e-6);
    }
    for pair in run.trades.windows(2) {
        assert!(pair[1].entry_time >= pair[0].exit_time);
    }
}

#[test]
fn live_matches_backtest_before_final_bar() {
    let params = StrategyParameters::default().without_session_limits();
    let candles = generate_synthetic_candles(1500, START, 300, 100.0, 4);

    let data = MarketData::from_execution_candles(&TimeframeSet::default(), &candles).unwrap();
    let backtest = BacktestRunner::new(params.clone()).run(&data).unwrap();
    let run = replay(&params, &candles);

    let settled = |trades: &[TradeRecord]| -> Vec<TradeRecord> {
        trades
            .iter()
            .filter(|t| t.exit_time < run.last_epoch)
            .cloned()
            .collect()
    };
    assert_eq!(settled(&backtest.trades), settled(&run.trades));
}

use chrono::{DateTime, Utc};
use common::{ExitReason, PerformanceMetrics, StrategyModule, TradeRecord};

const SECS_PER_HOUR: f64 = 3600.0;

/// Calculate performance metrics from equity curve and trades
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all performance metrics
    pub fn calculate(
        equity_curve: &[(DateTime<Utc>, f64)],
        trades: &[TradeRecord],
        initial_capital: f64,
    ) -> PerformanceMetrics {
        let final_equity = trades
            .last()
            .map(|t| t.equity_after)
            .or_else(|| equity_curve.last().map(|(_, e)| *e))
            .unwrap_or(initial_capital);
        let total_return = final_equity - initial_capital;
        let total_return_pct = if initial_capital > 0.0 {
            (total_return / initial_capital) * 100.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration_bars) = Self::calculate_max_drawdown(equity_curve);
        let stats = Self::calculate_trade_stats(trades);

        let count_reason =
            |reason: ExitReason| trades.iter().filter(|t| t.exit_reason == reason).count() as u32;
        let count_module =
            |module: StrategyModule| trades.iter().filter(|t| t.module == module).count() as u32;

        PerformanceMetrics {
            total_return,
            total_return_pct,
            max_drawdown,
            max_drawdown_duration_bars,
            total_trades: trades.len() as u32,
            winning_trades: stats.winning,
            losing_trades: stats.losing,
            win_rate: stats.win_rate,
            avg_win: stats.avg_win,
            avg_loss: stats.avg_loss,
            profit_factor: stats.profit_factor,
            expectancy: stats.expectancy,
            avg_r_multiple: stats.avg_r_multiple,
            avg_holding_hours: stats.avg_holding_hours,
            best_trade: stats.best,
            worst_trade: stats.worst,
            stop_exits: count_reason(ExitReason::Stop),
            target_exits: count_reason(ExitReason::Target),
            forced_exits: count_reason(ExitReason::ForceClose) + count_reason(ExitReason::NoExit),
            mean_reversion_trades: count_module(StrategyModule::MeanReversion),
            continuation_trades: count_module(StrategyModule::Continuation),
            structure_pullback_trades: count_module(StrategyModule::StructurePullback),
        }
    }

    /// Maximum drawdown (percent) and the bars since the peak it fell from
    pub fn calculate_max_drawdown(equity_curve: &[(DateTime<Utc>, f64)]) -> (f64, i64) {
        let mut worst = (0.0, 0i64);
        for (i, dd) in DrawdownWalk::new(equity_curve).enumerate() {
            if dd.pct > worst.0 {
                worst = (dd.pct, (i - dd.peak_index) as i64);
            }
        }
        worst
    }

    /// Percent below the running peak at every point of the curve
    pub fn calculate_drawdown_curve(
        equity_curve: &[(DateTime<Utc>, f64)],
    ) -> Vec<(DateTime<Utc>, f64)> {
        DrawdownWalk::new(equity_curve)
            .zip(equity_curve)
            .map(|(dd, (ts, _))| (*ts, dd.pct))
            .collect()
    }

    fn calculate_trade_stats(trades: &[TradeRecord]) -> TradeStats {
        if trades.is_empty() {
            return TradeStats::default();
        }

        let n = trades.len() as f64;
        let (wins, losses): (Vec<f64>, Vec<f64>) = trades
            .iter()
            .map(|t| t.pnl)
            .filter(|pnl| *pnl != 0.0)
            .partition(|pnl| *pnl > 0.0);
        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().map(|l| l.abs()).sum();
        let mean = |total: f64, count: usize| if count > 0 { total / count as f64 } else { 0.0 };

        let win_rate = wins.len() as f64 / n;
        let avg_win = mean(gross_profit, wins.len());
        let avg_loss = mean(gross_loss, losses.len());
        let profit_factor = match (gross_profit > 0.0, gross_loss > 0.0) {
            (_, true) => gross_profit / gross_loss,
            (true, false) => f64::INFINITY,
            (false, false) => 0.0,
        };

        TradeStats {
            winning: wins.len() as u32,
            losing: losses.len() as u32,
            win_rate: win_rate * 100.0,
            avg_win,
            avg_loss,
            profit_factor,
            expectancy: win_rate * avg_win - (1.0 - win_rate) * avg_loss,
            avg_r_multiple: trades.iter().map(TradeRecord::r_multiple).sum::<f64>() / n,
            avg_holding_hours: trades.iter().map(|t| t.holding_secs() as f64).sum::<f64>()
                / n
                / SECS_PER_HOUR,
            best: trades.iter().map(|t| t.pnl).fold(f64::MIN, f64::max),
            worst: trades.iter().map(|t| t.pnl).fold(f64::MAX, f64::min),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Drawdown {
    pct: f64,
    peak_index: usize,
}

/// Running peak over an equity curve
struct DrawdownWalk<'a> {
    curve: std::iter::Enumerate<std::slice::Iter<'a, (DateTime<Utc>, f64)>>,
    peak: Option<(usize, f64)>,
}

impl<'a> DrawdownWalk<'a> {
    fn new(curve: &'a [(DateTime<Utc>, f64)]) -> Self {
        Self {
            curve: curve.iter().enumerate(),
            peak: None,
        }
    }
}

impl Iterator for DrawdownWalk<'_> {
    type Item = Drawdown;

    fn next(&mut self) -> Option<Drawdown> {
        let (i, &(_, equity)) = self.curve.next()?;
        let (peak_index, peak) = match self.peak {
            Some(peak) if equity <= peak.1 => peak,
            _ => (i, equity),
        };
        self.peak = Some((peak_index, peak));

        let pct = if peak > 0.0 {
            (peak - equity) / peak * 100.0
        } else {
            0.0
        };
        Some(Drawdown { pct, peak_index })
    }
}

#[derive(Debug, Default)]
struct TradeStats {
    winning: u32,
    losing: u32,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    profit_factor: f64,
    expectancy: f64,
    avg_r_multiple: f64,
    avg_holding_hours: f64,
    best: f64,
    worst: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use common::Bias;

    fn make_equity_curve(values: &[f64]) -> Vec<(DateTime<Utc>, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let ts = DateTime::from_timestamp(i as i64 * 300, 0).unwrap();
                (ts, v)
            })
            .collect()
    }

    fn trade(
        pnl: f64,
        reason: ExitReason,
        module: StrategyModule,
        equity_after: f64,
    ) -> TradeRecord {
        TradeRecord {
            entry_time: 0,
            entry_price: 100.0,
            exit_time: 7200,
            exit_price: 100.0 + pnl / 10.0,
            side: Bias::Long,
            module,
            stop_price: 95.0,
            target_price: 110.0,
            quantity: 10.0,
            exit_reason: reason,
            pnl,
            equity_after,
        }
    }

    #[test]
    fn test_return_without_trades_uses_curve() {
        let equity = make_equity_curve(&[10000.0, 10250.0, 10500.0]);
        let metrics = MetricsCalculator::calculate(&equity, &[], 10000.0);

        assert_eq!(metrics.total_return, 500.0);
        assert_eq!(metrics.total_return_pct, 5.0);
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.profit_factor, 0.0);
    }

    #[test]
    fn test_max_drawdown_and_duration() {
        let equity = make_equity_curve(&[100.0, 120.0, 110.0, 90.0, 125.0, 100.0]);
        let (max_dd, duration) = MetricsCalculator::calculate_max_drawdown(&equity);

        assert_relative_eq!(max_dd, 25.0, epsilon = 1e-9);
        assert_eq!(duration, 2);
        assert_eq!(MetricsCalculator::calculate_max_drawdown(&[]), (0.0, 0));
    }

    #[test]
    fn test_trade_statistics() {
        let trades = vec![
            trade(100.0, ExitReason::Target, StrategyModule::Continuation, 10100.0),
            trade(-50.0, ExitReason::Stop, StrategyModule::StructurePullback, 10050.0),
            trade(20.0, ExitReason::ForceClose, StrategyModule::Continuation, 10070.0),
        ];
        let metrics =
            MetricsCalculator::calculate(&make_equity_curve(&[10000.0]), &trades, 10000.0);

        assert_eq!(metrics.total_trades, 3);
        assert_eq!(metrics.winning_trades, 2);
        assert_eq!(metrics.losing_trades, 1);
        assert_relative_eq!(metrics.total_return, 70.0, epsilon = 1e-9);
        assert_relative_eq!(metrics.profit_factor, 120.0 / 50.0, epsilon = 1e-9);
        assert_relative_eq!(metrics.avg_holding_hours, 2.0, epsilon = 1e-9);
        // risk is 5 * 10 = 50 per trade
        assert_relative_eq!(metrics.avg_r_multiple, 70.0 / 50.0 / 3.0, epsilon = 1e-9);
        assert_eq!(metrics.best_trade, 100.0);
        assert_eq!(metrics.worst_trade, -50.0);
        assert_eq!(metrics.target_exits, 1);
        assert_eq!(metrics.stop_exits, 1);
        assert_eq!(metrics.forced_exits, 1);
        assert_eq!(metrics.continuation_trades, 2);
        assert_eq!(metrics.structure_pullback_trades, 1);
    }

    #[test]
    fn test_flat_trade_counts_as_neither() {
        let trades = vec![
            trade(0.0, ExitReason::NoExit, StrategyModule::MeanReversion, 10000.0),
            trade(40.0, ExitReason::Target, StrategyModule::MeanReversion, 10040.0),
        ];
        let metrics = MetricsCalculator::calculate(&[], &trades, 10000.0);

        assert_eq!(metrics.winning_trades, 1);
        assert_eq!(metrics.losing_trades, 0);
        assert_eq!(metrics.win_rate, 50.0);
        assert!(metrics.profit_factor.is_infinite());
        assert_eq!(metrics.forced_exits, 1);
        assert_eq!(metrics.mean_reversion_trades, 2);
    }

    #[test]
    fn test_drawdown_curve_tracks_running_peak() {
        let equity = make_equity_curve(&[200.0, 250.0, 200.0, 150.0, 300.0]);
        let curve: Vec<f64> = MetricsCalculator::calculate_drawdown_curve(&equity)
            .into_iter()
            .map(|(_, dd)| dd)
            .collect();

        assert_eq!(curve.len(), 5);
        assert_relative_eq!(curve[0], 0.0);
        assert_relative_eq!(curve[1], 0.0);
        assert_relative_eq!(curve[2], 20.0, epsilon = 1e-9);
        assert_relative_eq!(curve[3], 40.0, epsilon = 1e-9);
        assert_relative_eq!(curve[4], 0.0);
    }
}

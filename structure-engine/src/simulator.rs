use common::{
    Bias, Candle, ExitReason, Notification, NotificationKind, Position, RiskParameters,
    SessionState, Signal, TradeRecord,
};
use tracing::{debug, info};

use crate::signals::ModuleRules;

/// What `try_enter` did with a signal
#[derive(Debug, Clone, PartialEq)]
pub enum EntryDecision {
    Opened(Position),
    AlreadyOpen,
    Paused,
    TradeCapReached,
    /// Stop/target on the wrong side of entry or not computable
    InvalidLevels,
    /// Risk per unit or quantity not finite and positive
    InvalidSizing,
}

impl EntryDecision {
    pub fn is_opened(&self) -> bool {
        matches!(self, EntryDecision::Opened(_))
    }
}

/// Single-position state machine with session gating
///
/// Flat until a signal opens a position, open until stop, target or a forced
/// close, then flat again. Equity only changes on realized exits; the
/// drawdown figures track realized equity.
#[derive(Debug, Clone)]
pub struct PositionSimulator {
    risk: RiskParameters,
    initial_equity: f64,
    equity: f64,
    peak_equity: f64,
    max_drawdown: f64,
    position: Option<Position>,
    session: SessionState,
    ledger: Vec<TradeRecord>,
    outbox: Vec<Notification>,
}

impl PositionSimulator {
    pub fn new(initial_equity: f64, risk: RiskParameters) -> Self {
        Self {
            risk,
            initial_equity,
            equity: initial_equity,
            peak_equity: initial_equity,
            max_drawdown: 0.0,
            position: None,
            session: SessionState::default(),
            ledger: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn initial_equity(&self) -> f64 {
        self.initial_equity
    }

    /// Realized equity plus the open position valued at `price`
    pub fn mark_to_market(&self, price: f64) -> f64 {
        self.equity
            + self
                .position
                .as_ref()
                .map(|p| p.unrealized_pnl(price))
                .unwrap_or(0.0)
    }

    /// Largest realized peak-to-trough drop, in percent
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Closed trades in exit order
    pub fn ledger(&self) -> &[TradeRecord] {
        &self.ledger
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    /// Reset the daily trade counter when `bar` opens on a later UTC date
    pub fn roll_session(&mut self, bar: &Candle) {
        let date = bar.date();
        if self.session.last_trade_date.map_or(true, |last| date > last) {
            if self.session.trades_today > 0 {
                debug!(%date, "new session, daily trade count reset");
            }
            self.session.trades_today = 0;
            self.session.last_trade_date = Some(date);
        }
    }

    pub fn try_enter(&mut self, signal: &Signal) -> EntryDecision {
        let bar = signal.reference_bar;
        self.roll_session(&bar);

        if self.position.is_some() {
            return EntryDecision::AlreadyOpen;
        }
        if self.session.paused {
            return EntryDecision::Paused;
        }
        if let Some(cap) = self.risk.max_trades_per_day {
            if self.session.trades_today >= cap {
                debug!(epoch = bar.epoch, cap, "daily trade cap reached");
                return EntryDecision::TradeCapReached;
            }
        }

        let Some(levels) = signal.module.exit_levels(signal, self.risk.exit_mode) else {
            debug!(
                epoch = bar.epoch,
                module = signal.module.label(),
                anchor = signal.stop_anchor,
                "exit levels inconsistent with entry"
            );
            return EntryDecision::InvalidLevels;
        };

        let risk_per_unit = levels.risk_per_unit();
        if !(risk_per_unit.is_finite() && risk_per_unit > 0.0) {
            debug!(epoch = bar.epoch, risk_per_unit, "invalid risk per unit");
            return EntryDecision::InvalidSizing;
        }
        let quantity = self.equity * self.risk.risk_fraction / risk_per_unit;
        if !(quantity.is_finite() && quantity > 0.0) {
            debug!(epoch = bar.epoch, quantity, "invalid position size");
            return EntryDecision::InvalidSizing;
        }

        let position = Position {
            side: signal.bias,
            entry_price: levels.entry,
            entry_time: bar.epoch,
            stop_price: levels.stop,
            target_price: levels.target,
            quantity,
            module: signal.module,
            structure_ref: signal.structure_ref,
        };

        info!(
            epoch = bar.epoch,
            module = signal.module.label(),
            side = ?signal.bias,
            entry = levels.entry,
            stop = levels.stop,
            target = levels.target,
            quantity,
            "position opened"
        );

        self.session.trades_today += 1;
        self.outbox.push(Notification {
            kind: NotificationKind::Enter,
            side: position.side,
            price: position.entry_price,
            quantity,
            module: position.module,
            epoch: bar.epoch,
            exit_reason: None,
        });
        self.position = Some(position.clone());
        EntryDecision::Opened(position)
    }

    /// Check stop and target against the bar's range, stop first
    pub fn manage(&mut self, bar: &Candle) -> Option<TradeRecord> {
        let position = self.position.as_ref()?;
        // the entry bar itself is not monitored
        if bar.epoch <= position.entry_time {
            return None;
        }

        let (stop_hit, target_hit) = match position.side {
            Bias::Long => (bar.low <= position.stop_price, bar.high >= position.target_price),
            Bias::Short => (bar.high >= position.stop_price, bar.low <= position.target_price),
        };

        if stop_hit {
            let price = position.stop_price;
            self.close(price, bar.epoch, ExitReason::Stop)
        } else if target_hit {
            let price = position.target_price;
            self.close(price, bar.epoch, ExitReason::Target)
        } else {
            None
        }
    }

    /// Close whatever is open at `bar.close`
    ///
    /// A position opened on `bar` itself never had a bar to be monitored on
    /// and is unwound at its entry price with reason `NoExit`.
    pub fn force_close(&mut self, bar: &Candle) -> Option<TradeRecord> {
        let position = self.position.as_ref()?;
        if position.entry_time >= bar.epoch {
            let price = position.entry_price;
            self.close(price, bar.epoch, ExitReason::NoExit)
        } else {
            self.close(bar.close, bar.epoch, ExitReason::ForceClose)
        }
    }

    fn close(&mut self, price: f64, epoch: i64, reason: ExitReason) -> Option<TradeRecord> {
        let position = self.position.take()?;
        let pnl = position.unrealized_pnl(price);

        self.equity += pnl;
        self.peak_equity = self.peak_equity.max(self.equity);
        if self.peak_equity > 0.0 {
            let drawdown = (self.peak_equity - self.equity) / self.peak_equity * 100.0;
            self.max_drawdown = self.max_drawdown.max(drawdown);
        }

        if pnl < 0.0 {
            self.session.consecutive_losses += 1;
        } else {
            self.session.consecutive_losses = 0;
        }
        if let Some(limit) = self.risk.max_consecutive_losses {
            if !self.session.paused && self.session.consecutive_losses >= limit {
                info!(
                    epoch,
                    streak = self.session.consecutive_losses,
                    "loss streak reached, entries paused"
                );
                self.session.paused = true;
            }
        }

        let trade = TradeRecord {
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            exit_time: epoch,
            exit_price: price,
            side: position.side,
            module: position.module,
            stop_price: position.stop_price,
            target_price: position.target_price,
            quantity: position.quantity,
            exit_reason: reason,
            pnl,
            equity_after: self.equity,
        };

        info!(
            epoch,
            module = position.module.label(),
            reason = ?reason,
            exit = price,
            pnl,
            equity = self.equity,
            "position closed"
        );

        self.outbox.push(Notification {
            kind: NotificationKind::Exit,
            side: position.side,
            price,
            quantity: position.quantity,
            module: position.module,
            epoch,
            exit_reason: Some(reason),
        });
        self.ledger.push(trade.clone());
        Some(trade)
    }
}

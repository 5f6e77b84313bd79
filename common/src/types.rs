use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// OHLC bar keyed by its opening epoch (seconds, UTC)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub epoch: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(epoch: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            epoch,
            open,
            high,
            low,
            close,
        }
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.epoch, 0).unwrap_or_default()
    }

    /// UTC calendar date the bar opened on
    pub fn date(&self) -> NaiveDate {
        self.datetime().date_naive()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Role a timeframe plays in a multi-timeframe evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeframeRole {
    /// Higher timeframe: bands, trend EMA, bias
    Htf,
    /// Lower timeframe: alignment confirmation and structure breaks
    Ltf,
    /// Execution timeframe: the finest series, drives the replay
    Etf,
}

impl TimeframeRole {
    pub const ALL: [TimeframeRole; 3] =
        [TimeframeRole::Htf, TimeframeRole::Ltf, TimeframeRole::Etf];
}

/// Directional bias of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Long,
    Short,
}

impl Bias {
    /// +1 for long, -1 for short
    pub fn sign(self) -> f64 {
        match self {
            Bias::Long => 1.0,
            Bias::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Bias::Long => Bias::Short,
            Bias::Short => Bias::Long,
        }
    }
}

/// Trend state carried by the structure classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendState {
    Bullish,
    Bearish,
    #[default]
    Unknown,
}

impl TrendState {
    pub fn from_bias(bias: Bias) -> Self {
        match bias {
            Bias::Long => TrendState::Bullish,
            Bias::Short => TrendState::Bearish,
        }
    }
}

/// Close position relative to the Bollinger envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandState {
    Overbought,
    Oversold,
    Inside,
}

/// Strategy module a signal (and the resulting position) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyModule {
    MeanReversion,
    Continuation,
    StructurePullback,
}

impl StrategyModule {
    pub const ALL: [StrategyModule; 3] = [
        StrategyModule::MeanReversion,
        StrategyModule::Continuation,
        StrategyModule::StructurePullback,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StrategyModule::MeanReversion => "mean_reversion",
            StrategyModule::Continuation => "continuation",
            StrategyModule::StructurePullback => "structure_pullback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotKind {
    High,
    Low,
}

/// Confirmed swing point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub index: usize,
    pub epoch: i64,
    pub kind: PivotKind,
    pub price: f64,
    /// Epoch of the bar that completes the lookahead window
    pub confirmed_epoch: i64,
}

/// A break with the trend, or from an unknown trend, is a BOS; a break against it is a CHoCH
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructureKind {
    BosUp,
    BosDown,
    ChochUp,
    ChochDown,
}

impl StructureKind {
    pub fn bias(&self) -> Bias {
        match self {
            StructureKind::BosUp | StructureKind::ChochUp => Bias::Long,
            StructureKind::BosDown | StructureKind::ChochDown => Bias::Short,
        }
    }

    pub fn is_choch(&self) -> bool {
        matches!(self, StructureKind::ChochUp | StructureKind::ChochDown)
    }
}

/// Break of a prior pivot by an impulsive leg
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureEvent {
    pub kind: StructureKind,
    /// Pivot whose level was broken
    pub broken_pivot: Pivot,
    /// Opposite pivot the breaking leg started from
    pub origin_pivot: Pivot,
    /// Bar index of the new pivot that broke the level
    pub confirming_bar: usize,
    /// Epoch of that pivot's bar, where the leg peaked
    pub extreme_epoch: i64,
    pub confirmed_epoch: i64,
    pub leg_magnitude: f64,
    pub directional_bar_count: usize,
}

impl StructureEvent {
    /// Extreme of the leg the break was made from (stop anchor for pullbacks)
    pub fn leg_origin(&self) -> f64 {
        self.origin_pivot.price
    }

    /// Extreme the leg reached
    pub fn leg_extreme(&self) -> f64 {
        match self.kind.bias() {
            Bias::Long => self.origin_pivot.price + self.leg_magnitude,
            Bias::Short => self.origin_pivot.price - self.leg_magnitude,
        }
    }
}

/// Directional trade signal produced by one evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub timeframe_role: TimeframeRole,
    pub module: StrategyModule,
    pub bias: Bias,
    /// Execution bar the signal was confirmed on; entry fills at its close
    pub reference_bar: Candle,
    pub band_state: BandState,
    pub trend_state: TrendState,
    /// Price the module anchors its protective stop to
    pub stop_anchor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band_middle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_ref: Option<StructureEvent>,
}

/// Open position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Bias,
    pub entry_price: f64,
    pub entry_time: i64,
    pub stop_price: f64,
    pub target_price: f64,
    pub quantity: f64,
    pub module: StrategyModule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_ref: Option<StructureEvent>,
}

impl Position {
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.side.sign() * self.quantity
    }

    pub fn risk_per_unit(&self) -> f64 {
        (self.entry_price - self.stop_price).abs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Stop,
    Target,
    ForceClose,
    NoExit,
}

/// Closed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub entry_time: i64,
    pub entry_price: f64,
    pub exit_time: i64,
    pub exit_price: f64,
    pub side: Bias,
    pub module: StrategyModule,
    pub stop_price: f64,
    pub target_price: f64,
    pub quantity: f64,
    pub exit_reason: ExitReason,
    pub pnl: f64,
    pub equity_after: f64,
}

impl TradeRecord {
    pub fn holding_secs(&self) -> i64 {
        self.exit_time - self.entry_time
    }

    /// Realized multiple of the initial risk
    pub fn r_multiple(&self) -> f64 {
        let risk = (self.entry_price - self.stop_price).abs() * self.quantity;
        if risk > 0.0 {
            self.pnl / risk
        } else {
            0.0
        }
    }
}

/// Per-day trade counter and loss-streak gate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub trades_today: u32,
    pub last_trade_date: Option<NaiveDate>,
    pub consecutive_losses: u32,
    pub paused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Enter,
    Exit,
}

/// Enter/exit notice for an order-execution collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub side: Bias,
    pub price: f64,
    pub quantity: f64,
    pub module: StrategyModule,
    pub epoch: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<ExitReason>,
}

/// Performance metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // Returns
    pub total_return: f64,
    pub total_return_pct: f64,
    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_duration_bars: i64,
    // Trade statistics
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub avg_r_multiple: f64,
    pub avg_holding_hours: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    // Breakdown
    pub stop_exits: u32,
    pub target_exits: u32,
    pub forced_exits: u32,
    pub mean_reversion_trades: u32,
    pub continuation_trades: u32,
    pub structure_pullback_trades: u32,
}

/// Backtest result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub metrics: PerformanceMetrics,
    pub equity_curve: Vec<(DateTime<Utc>, f64)>,
    pub drawdown_curve: Vec<(DateTime<Utc>, f64)>,
    pub trades: Vec<TradeRecord>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub execution_time_ms: u64,
}

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::{StrategyModule, TimeframeRole};

/// Granularities (seconds) of the three timeframe roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeSet {
    pub htf_secs: i64,
    pub ltf_secs: i64,
    /// Finest granularity; the replay steps over this series
    pub etf_secs: i64,
}

impl Default for TimeframeSet {
    fn default() -> Self {
        Self {
            htf_secs: 3600,
            ltf_secs: 900,
            etf_secs: 300,
        }
    }
}

impl TimeframeSet {
    pub fn granularity(&self, role: TimeframeRole) -> i64 {
        match role {
            TimeframeRole::Htf => self.htf_secs,
            TimeframeRole::Ltf => self.ltf_secs,
            TimeframeRole::Etf => self.etf_secs,
        }
    }
}

/// Indicator periods used on every timeframe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParameters {
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    /// Long EMA the HTF close is compared against for continuation bias
    pub ema_trend_period: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub atr_period: usize,
    /// Rolling window of the ATR average used by the strength re-check
    pub atr_average_period: usize,
    pub adx_period: usize,
    pub rsi_period: usize,
}

impl Default for IndicatorParameters {
    fn default() -> Self {
        Self {
            ema_fast_period: 9,
            ema_slow_period: 21,
            ema_trend_period: 50,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr_period: 14,
            atr_average_period: 20,
            adx_period: 14,
            rsi_period: 14,
        }
    }
}

/// Swing detection and BOS/CHoCH impulsiveness filter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureParameters {
    pub swing_left: usize,
    pub swing_right: usize,
    /// Minimum count of closes moving with the leg
    pub min_directional_bars: usize,
    /// Alternative impulsiveness criterion on absolute leg size
    pub min_leg_magnitude: Option<f64>,
}

impl Default for StructureParameters {
    fn default() -> Self {
        Self {
            swing_left: 2,
            swing_right: 2,
            min_directional_bars: 3,
            min_leg_magnitude: None,
        }
    }
}

/// Retracement window and strength re-check for structure pullbacks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PullbackParameters {
    pub min_retrace: f64,
    pub max_retrace: f64,
    pub adx_threshold: f64,
    /// Execution bars after which an unconfirmed setup expires
    pub max_setup_bars: usize,
}

impl Default for PullbackParameters {
    fn default() -> Self {
        Self {
            min_retrace: 0.382,
            max_retrace: 0.786,
            adx_threshold: 20.0,
            max_setup_bars: 48,
        }
    }
}

/// How stop and target are placed relative to entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExitMode {
    /// Stop at the module's structural anchor, target at a multiple of the risk
    RiskMultiple { reward_risk: f64 },
    /// Fixed price distances from entry
    FixedDistance { stop: f64, target: f64 },
}

impl Default for ExitMode {
    fn default() -> Self {
        ExitMode::RiskMultiple { reward_risk: 2.0 }
    }
}

/// Sizing and session gating
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParameters {
    pub risk_fraction: f64,
    pub max_trades_per_day: Option<u32>,
    /// Loss streak that pauses entries for the rest of the run
    pub max_consecutive_losses: Option<u32>,
    pub exit_mode: ExitMode,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            risk_fraction: 0.01,
            max_trades_per_day: Some(3),
            max_consecutive_losses: Some(3),
            exit_mode: ExitMode::default(),
        }
    }
}

/// Strategy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyParameters {
    pub symbol: String,
    pub initial_capital: f64,
    #[serde(default)]
    pub timeframes: TimeframeSet,
    #[serde(default)]
    pub indicators: IndicatorParameters,
    #[serde(default)]
    pub structure: StructureParameters,
    #[serde(default)]
    pub pullback: PullbackParameters,
    #[serde(default)]
    pub risk: RiskParameters,
    #[serde(default = "default_modules")]
    pub enabled_modules: Vec<StrategyModule>,
    // RSI confirmation for mean reversion
    #[serde(default)]
    pub mr_rsi_filter_enabled: bool,
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,
    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: f64,
}

fn default_modules() -> Vec<StrategyModule> {
    StrategyModule::ALL.to_vec()
}

fn default_rsi_overbought() -> f64 {
    70.0
}

fn default_rsi_oversold() -> f64 {
    30.0
}

impl Default for StrategyParameters {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            initial_capital: 10000.0,
            timeframes: TimeframeSet::default(),
            indicators: IndicatorParameters::default(),
            structure: StructureParameters::default(),
            pullback: PullbackParameters::default(),
            risk: RiskParameters::default(),
            enabled_modules: default_modules(),
            mr_rsi_filter_enabled: false,
            rsi_overbought: default_rsi_overbought(),
            rsi_oversold: default_rsi_oversold(),
        }
    }
}

impl StrategyParameters {
    /// Load parameters from a TOML file and validate them
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let params: Self =
            toml::from_str(text).map_err(|e| EngineError::ConfigError(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn with_capital(mut self, capital: f64) -> Self {
        self.initial_capital = capital;
        self
    }

    pub fn with_risk_fraction(mut self, fraction: f64) -> Self {
        self.risk.risk_fraction = fraction;
        self
    }

    pub fn with_swing_radius(mut self, radius: usize) -> Self {
        self.structure.swing_left = radius;
        self.structure.swing_right = radius;
        self
    }

    pub fn with_exit_mode(mut self, mode: ExitMode) -> Self {
        self.risk.exit_mode = mode;
        self
    }

    pub fn with_modules(mut self, modules: &[StrategyModule]) -> Self {
        self.enabled_modules = modules.to_vec();
        self
    }

    pub fn with_timeframes(mut self, timeframes: TimeframeSet) -> Self {
        self.timeframes = timeframes;
        self
    }

    pub fn without_session_limits(mut self) -> Self {
        self.risk.max_trades_per_day = None;
        self.risk.max_consecutive_losses = None;
        self
    }

    pub fn is_enabled(&self, module: StrategyModule) -> bool {
        self.enabled_modules.contains(&module)
    }

    /// Largest warm-up any indicator needs, in bars
    pub fn warmup_bars(&self) -> usize {
        let ind = &self.indicators;
        [
            ind.ema_slow_period,
            ind.ema_trend_period,
            ind.bb_period,
            ind.atr_period + ind.atr_average_period,
            2 * ind.adx_period,
            ind.rsi_period + 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        fn invalid<T>(msg: impl Into<String>) -> Result<T> {
            Err(EngineError::InvalidParameter(msg.into()))
        }

        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return invalid("initial_capital must be positive");
        }

        let tf = &self.timeframes;
        if tf.etf_secs <= 0 || tf.ltf_secs <= 0 || tf.htf_secs <= 0 {
            return invalid("timeframe granularities must be positive");
        }
        if tf.ltf_secs < tf.etf_secs || tf.htf_secs < tf.ltf_secs {
            return invalid("timeframes must satisfy htf >= ltf >= etf");
        }
        if tf.ltf_secs % tf.etf_secs != 0 || tf.htf_secs % tf.etf_secs != 0 {
            return invalid("htf and ltf granularities must be multiples of etf");
        }

        let ind = &self.indicators;
        let periods = [
            ("ema_fast_period", ind.ema_fast_period),
            ("ema_slow_period", ind.ema_slow_period),
            ("ema_trend_period", ind.ema_trend_period),
            ("bb_period", ind.bb_period),
            ("atr_period", ind.atr_period),
            ("atr_average_period", ind.atr_average_period),
            ("adx_period", ind.adx_period),
            ("rsi_period", ind.rsi_period),
        ];
        for (name, period) in periods {
            if period == 0 {
                return invalid(format!("{} must be at least 1", name));
            }
        }
        if ind.ema_fast_period >= ind.ema_slow_period {
            return invalid("ema_fast_period must be shorter than ema_slow_period");
        }
        if !(ind.bb_std_dev.is_finite() && ind.bb_std_dev > 0.0) {
            return invalid("bb_std_dev must be positive");
        }

        let st = &self.structure;
        if st.swing_left == 0 || st.swing_right == 0 {
            return invalid("swing radius must be at least 1 on both sides");
        }
        if let Some(min_leg) = st.min_leg_magnitude {
            if !(min_leg.is_finite() && min_leg > 0.0) {
                return invalid("min_leg_magnitude must be positive when set");
            }
        }

        let pb = &self.pullback;
        if !(0.0..=1.0).contains(&pb.min_retrace)
            || !(0.0..=1.0).contains(&pb.max_retrace)
            || pb.min_retrace > pb.max_retrace
        {
            return invalid("retracement window must satisfy 0 <= min <= max <= 1");
        }
        if pb.max_setup_bars == 0 {
            return invalid("max_setup_bars must be at least 1");
        }

        let risk = &self.risk;
        if !(risk.risk_fraction > 0.0 && risk.risk_fraction < 1.0) {
            return invalid("risk_fraction must be in (0, 1)");
        }
        match risk.exit_mode {
            ExitMode::RiskMultiple { reward_risk } => {
                if !(reward_risk.is_finite() && reward_risk > 0.0) {
                    return invalid("reward_risk must be positive");
                }
            }
            ExitMode::FixedDistance { stop, target } => {
                if !(stop.is_finite() && stop > 0.0 && target.is_finite() && target > 0.0) {
                    return invalid("fixed stop/target distances must be positive");
                }
            }
        }

        if self.enabled_modules.is_empty() {
            return invalid("at least one strategy module must be enabled");
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return invalid("rsi_oversold must be below rsi_overbought");
        }

        Ok(())
    }
}

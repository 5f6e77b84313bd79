use common::{Bias, ExitMode, Signal, StrategyModule};

use crate::patterns::EngulfingMode;

/// Protective stop and profit target of a prospective position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitLevels {
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
}

impl ExitLevels {
    /// Stop and target sit on opposite sides of entry, in the right order for `side`
    pub fn is_consistent(&self, side: Bias) -> bool {
        let finite = self.entry.is_finite() && self.stop.is_finite() && self.target.is_finite();
        finite
            && match side {
                Bias::Long => self.stop < self.entry && self.entry < self.target,
                Bias::Short => self.stop > self.entry && self.entry > self.target,
            }
    }

    pub fn risk_per_unit(&self) -> f64 {
        (self.entry - self.stop).abs()
    }
}

/// Per-module confirmation strictness and exit placement
pub trait ModuleRules {
    /// Engulfing strictness required on the bar that sets the bias
    fn engulfing_mode(&self) -> EngulfingMode;

    /// Stop/target for `signal` filled at its reference bar close, `None`
    /// when the levels would be inconsistent with the side
    fn exit_levels(&self, signal: &Signal, exit_mode: ExitMode) -> Option<ExitLevels>;
}

impl ModuleRules for StrategyModule {
    fn engulfing_mode(&self) -> EngulfingMode {
        match self {
            StrategyModule::MeanReversion => EngulfingMode::FullRange,
            StrategyModule::Continuation | StrategyModule::StructurePullback => EngulfingMode::Body,
        }
    }

    fn exit_levels(&self, signal: &Signal, exit_mode: ExitMode) -> Option<ExitLevels> {
        let entry = signal.reference_bar.close;
        let sign = signal.bias.sign();

        let (stop, target) = match exit_mode {
            ExitMode::FixedDistance { stop, target } => {
                (entry - sign * stop, entry + sign * target)
            }
            ExitMode::RiskMultiple { reward_risk } => {
                let stop = signal.stop_anchor;
                let target = match self {
                    StrategyModule::MeanReversion => signal.band_middle?,
                    StrategyModule::Continuation | StrategyModule::StructurePullback => {
                        entry + sign * reward_risk * (entry - stop).abs()
                    }
                };
                (stop, target)
            }
        };

        let levels = ExitLevels { entry, stop, target };
        levels.is_consistent(signal.bias).then_some(levels)
    }
}

use common::{ExitMode, PerformanceMetrics, Result, StrategyParameters};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::data::MarketData;
use crate::engine::BacktestRunner;

/// Values swept for each parameter; the grid is their cartesian product
#[derive(Debug, Clone)]
pub struct ParamGrid {
    pub risk_fractions: Vec<f64>,
    pub swing_radii: Vec<usize>,
    pub reward_risks: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            risk_fractions: vec![0.005, 0.01, 0.02],
            swing_radii: vec![2, 3, 5],
            reward_risks: vec![1.5, 2.0, 3.0],
        }
    }
}

impl ParamGrid {
    pub fn size(&self) -> usize {
        self.risk_fractions.len() * self.swing_radii.len() * self.reward_risks.len()
    }

    /// Every combination applied on top of `base`, invalid ones skipped
    pub fn generate(&self, base: &StrategyParameters) -> Vec<StrategyParameters> {
        let mut out = Vec::with_capacity(self.size());
        for &fraction in &self.risk_fractions {
            for &radius in &self.swing_radii {
                for &reward_risk in &self.reward_risks {
                    let params = base
                        .clone()
                        .with_risk_fraction(fraction)
                        .with_swing_radius(radius)
                        .with_exit_mode(ExitMode::RiskMultiple { reward_risk });
                    if params.validate().is_ok() {
                        out.push(params);
                    }
                }
            }
        }
        out
    }
}

/// One grid point and how it did
#[derive(Debug, Clone, Serialize)]
pub struct SweepRow {
    pub risk_fraction: f64,
    pub swing_radius: usize,
    pub reward_risk: f64,
    pub final_equity: f64,
    pub metrics: PerformanceMetrics,
}

/// Runs independent backtests over a parameter grid
pub struct SweepRunner {
    parallel: bool,
}

impl Default for SweepRunner {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl SweepRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Rows in grid order
    pub fn sweep(
        &self,
        grid: &ParamGrid,
        base: &StrategyParameters,
        data: &MarketData,
    ) -> Result<Vec<SweepRow>> {
        let configs = grid.generate(base);
        info!(runs = configs.len(), parallel = self.parallel, "starting sweep");

        let run_one = |params: &StrategyParameters| -> Result<SweepRow> {
            let result = BacktestRunner::new(params.clone()).run(data)?;
            let reward_risk = match params.risk.exit_mode {
                ExitMode::RiskMultiple { reward_risk } => reward_risk,
                ExitMode::FixedDistance { .. } => 0.0,
            };
            Ok(SweepRow {
                risk_fraction: params.risk.risk_fraction,
                swing_radius: params.structure.swing_left,
                reward_risk,
                final_equity: result.final_equity,
                metrics: result.metrics,
            })
        };

        if self.parallel {
            configs.par_iter().map(run_one).collect()
        } else {
            configs.iter().map(run_one).collect()
        }
    }
}

/// Row with the highest total return
pub fn best_by_return(rows: &[SweepRow]) -> Option<&SweepRow> {
    rows.iter()
        .max_by(|a, b| a.metrics.total_return.total_cmp(&b.metrics.total_return))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generate_synthetic_candles;
    use common::TimeframeSet;

    #[test]
    fn test_grid_size_and_overrides() {
        let grid = ParamGrid {
            risk_fractions: vec![0.01, 0.02],
            swing_radii: vec![2, 3],
            reward_risks: vec![2.0],
        };
        let configs = grid.generate(&StrategyParameters::default());

        assert_eq!(grid.size(), 4);
        assert_eq!(configs.len(), 4);
        assert_eq!(configs[3].risk.risk_fraction, 0.02);
        assert_eq!(configs[3].structure.swing_right, 3);
    }

    #[test]
    fn test_invalid_points_skipped() {
        let grid = ParamGrid {
            risk_fractions: vec![0.01, 1.5],
            swing_radii: vec![0, 2],
            reward_risks: vec![2.0],
        };
        assert_eq!(grid.generate(&StrategyParameters::default()).len(), 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let candles = generate_synthetic_candles(1500, 1_704_067_200, 300, 100.0, 11);
        let data = MarketData::from_execution_candles(&TimeframeSet::default(), &candles).unwrap();
        let grid = ParamGrid {
            risk_fractions: vec![0.01],
            swing_radii: vec![2, 3],
            reward_risks: vec![1.5, 2.0],
        };
        let base = StrategyParameters::default();

        let parallel = SweepRunner::new().sweep(&grid, &base, &data).unwrap();
        let sequential = SweepRunner::new()
            .with_parallelism(false)
            .sweep(&grid, &base, &data)
            .unwrap();

        assert_eq!(parallel.len(), 4);
        for (p, s) in parallel.iter().zip(&sequential) {
            assert_eq!(p.final_equity, s.final_equity);
            assert_eq!(p.swing_radius, s.swing_radius);
        }
        assert!(best_by_return(&parallel).is_some());
    }
}

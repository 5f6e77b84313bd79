pub mod data;
pub mod engine;
pub mod indicators;
pub mod live;
pub mod metrics;
pub mod patterns;
pub mod signals;
pub mod simulator;
pub mod structure;
pub mod sweep;

pub use data::{generate_synthetic_candles, load_file, MarketData};
pub use engine::{BacktestRunner, SimulationContext};
pub use live::LiveSession;
pub use metrics::MetricsCalculator;
pub use patterns::EngulfingMode;
pub use signals::{SignalComposer, TimeframeContext};
pub use simulator::{EntryDecision, PositionSimulator};
pub use structure::StructureClassifier;
pub use sweep::{ParamGrid, SweepRow, SweepRunner};

// Re-export common types
pub use common::{
    BacktestResult, Candle, EngineError, PerformanceMetrics, Result, Signal, StrategyModule,
    StrategyParameters, StructureEvent, TimeframeRole, TradeRecord,
};

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    ExitMode, IndicatorParameters, PullbackParameters, RiskParameters, StrategyParameters,
    StructureParameters, TimeframeSet,
};
pub use error::{EngineError, Result};
pub use types::*;

pub mod composer;
pub mod pullback;
pub mod strategy;

pub use composer::{SignalComposer, TimeframeContext};
pub use pullback::{PullbackSetup, SetupProgress};
pub use strategy::{ExitLevels, ModuleRules};

pub mod classifier;
pub mod swing;

pub use classifier::{directional_closes, StructureClassifier};
pub use swing::{detect, pivots_at};

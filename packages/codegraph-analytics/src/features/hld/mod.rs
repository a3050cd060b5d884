//! Heavy-light decomposition and forest

mod decomposition;
mod forest;

pub use decomposition::HeavyLightDecomposition;
pub use forest::{ForestOptions, HldForest};

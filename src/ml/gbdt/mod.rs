//! Gradient-boosted decision stumps for multi-class classification.

mod model;
mod train;

pub use model::{GbdtModel, Stump};
pub use train::{GbdtOptions, train_gbdt};

mod calculator;
mod scoring;

pub use calculator::GrowthCalculator;
pub use scoring::{rank, QualityScorer};

mod generator;
mod summary;

pub use generator::{ReportGenerator, ReportOutcome};

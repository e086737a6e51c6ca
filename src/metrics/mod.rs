pub mod engine;
pub mod stats;

pub use engine::ScanMetrics;

//! Market scan bot primitives.
//!
//! A fixed grid of instruments × timeframes is scanned on a timer. Each cell's
//! latest candle is scored by a three-check heuristic, signals are sized
//! against a shared capital, and results are pushed to every subscriber.
//! Runs of empty cycles are throttled into a single "no signal" notice.

pub mod config;
pub mod dispatch;
pub mod events;
pub mod grid;
pub mod handler;
pub mod metrics;
pub mod provider;
pub mod scanner;
pub mod state;
pub mod strategy;
pub mod transport;
pub mod types;

pub use crate::config::{ScanConfig, ThrottleScope};
pub use crate::scanner::{run_periodic, CycleReport, Scanner};
pub use crate::state::SharedState;

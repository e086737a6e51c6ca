//! Signal layer: score a candle series, then size the proposed trade.

pub mod candle_score;
pub mod risk;

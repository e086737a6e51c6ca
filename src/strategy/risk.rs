use serde::{Deserialize, Serialize};

use crate::types::Side;

/// Take-profit / stop-loss distance from the reference price.
pub const LEVEL_OFFSET: f64 = 0.02;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskLevels {
    pub take_profit: f64,
    pub stop_loss: f64,
    pub position_size: f64,
}

/// Price levels rounded to 5 decimals, size to 2 decimals.
///
/// Every signal proposes `capital * risk_fraction` on its own; nothing caps
/// the total across signals emitted in the same cycle.
pub fn size_position(reference_price: f64, side: Side, capital: f64, risk_fraction: f64) -> RiskLevels {
    let offset = LEVEL_OFFSET * side.sign();
    let take_profit = reference_price * (1.0 + offset);
    let stop_loss = reference_price * (1.0 - offset);
    RiskLevels {
        take_profit: round_to(take_profit, 5),
        stop_loss: round_to(stop_loss, 5),
        position_size: round_to(capital * risk_fraction, 2),
    }
}

/// Scale, round half away from zero, unscale. Exact ties go away from zero
/// (`0.125` at two decimals is `0.13`, not the half-even `0.12`).
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_levels_for_round_numbers() {
        let levels = size_position(100.0, Side::Buy, 1_000.0, 0.02);
        assert_eq!(
            levels,
            RiskLevels {
                take_profit: 102.0,
                stop_loss: 98.0,
                position_size: 20.0,
            }
        );
    }

    #[test]
    fn sell_levels_are_mirrored() {
        let levels = size_position(100.0, Side::Sell, 1_000.0, 0.02);
        assert_eq!(levels.take_profit, 98.0);
        assert_eq!(levels.stop_loss, 102.0);
        assert_eq!(levels.position_size, 20.0);
    }

    #[test]
    fn rounds_fx_prices_to_five_decimals() {
        let levels = size_position(1.0845678, Side::Buy, 1_234.567, 0.02);
        assert_eq!(levels.take_profit, 1.10626);
        assert_eq!(levels.stop_loss, 1.06288);
        assert_eq!(levels.position_size, 24.69);
    }

    #[test]
    fn exact_ties_round_away_from_zero() {
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(-0.125, 2), -0.13);
        assert_eq!(round_to(2.5, 0), 3.0);
    }
}

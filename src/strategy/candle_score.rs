//! Three-check candle score on the most recent bar.
//!
//! - bullish body: close > open
//! - volume above its trailing SMA
//! - close above its trailing SMA
//!
//! Each met check is one point out of three. The denominator stays at three
//! even when the series is too short for the SMAs, so short series can never
//! score above 1/3. Any score above zero is reported as a buy.

use serde::{Deserialize, Serialize};

use crate::types::{Series, Side};

pub const CHECKS: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreChecks {
    pub bullish: bool,
    pub volume_above_sma: bool,
    pub close_above_sma: bool,
}

impl ScoreChecks {
    pub fn points(&self) -> u32 {
        [self.bullish, self.volume_above_sma, self.close_above_sma]
            .into_iter()
            .filter(|met| *met)
            .count() as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub side: Option<Side>,
    /// One of 0, 1/3, 2/3, 1.
    pub confidence: f64,
    pub reference_price: f64,
    pub checks: ScoreChecks,
}

/// Score the last candle of `series`. `None` only for an empty series.
pub fn evaluate(series: &Series, sma_period: usize) -> Option<Evaluation> {
    let last = series.last()?;

    let volume_sma = trailing_sma(&series.volumes(), sma_period);
    let close_sma = trailing_sma(&series.closes(), sma_period);

    let checks = ScoreChecks {
        bullish: last.is_bullish(),
        volume_above_sma: volume_sma.is_some_and(|avg| last.volume > avg),
        close_above_sma: close_sma.is_some_and(|avg| last.close > avg),
    };

    let confidence = f64::from(checks.points()) / f64::from(CHECKS);
    let side = (confidence > 0.0).then_some(Side::Buy);

    Some(Evaluation {
        side,
        confidence,
        reference_price: last.close,
        checks,
    })
}

/// Mean of the last `period` values (window ends at the last value, inclusive).
///
/// `None` when fewer than `period` values exist or the window holds a
/// non-finite value; an unavailable average counts as an unmet check.
pub fn trailing_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    if window.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(window.iter().sum::<f64>() / (period as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candle;
    use chrono::{Duration, TimeZone, Utc};

    fn candle(i: i64, open: f64, close: f64, volume: f64) -> Candle {
        Candle {
            ts: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(i),
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume,
        }
    }

    fn flat(n: usize) -> Vec<Candle> {
        (0..n as i64).map(|i| candle(i, 100.0, 100.0, 1_000.0)).collect()
    }

    #[test]
    fn short_bullish_series_scores_one_third() {
        let mut candles = flat(4);
        candles.push(candle(4, 100.0, 101.0, 50_000.0));
        let eval = evaluate(&Series::new(candles), 20).unwrap();

        assert_eq!(eval.side, Some(Side::Buy));
        assert!((eval.confidence - 1.0 / 3.0).abs() < 1e-12);
        assert!(!eval.checks.volume_above_sma);
        assert!(!eval.checks.close_above_sma);
        assert_eq!(eval.reference_price, 101.0);
    }

    #[test]
    fn short_bearish_series_has_no_signal() {
        let mut candles = flat(9);
        candles.push(candle(9, 101.0, 100.0, 9_999.0));
        let eval = evaluate(&Series::new(candles), 20).unwrap();
        assert_eq!(eval.side, None);
        assert_eq!(eval.confidence, 0.0);
    }

    #[test]
    fn long_series_can_meet_every_check() {
        let mut candles = flat(24);
        candles.push(candle(24, 100.0, 105.0, 5_000.0));
        let eval = evaluate(&Series::new(candles), 20).unwrap();
        assert_eq!(eval.confidence, 1.0);
        assert_eq!(eval.side, Some(Side::Buy));
    }

    #[test]
    fn two_of_three_when_volume_is_light() {
        let mut candles = flat(24);
        candles.push(candle(24, 100.0, 105.0, 10.0));
        let eval = evaluate(&Series::new(candles), 20).unwrap();
        assert!((eval.confidence - 2.0 / 3.0).abs() < 1e-12);
        assert!(eval.checks.close_above_sma);
        assert!(!eval.checks.volume_above_sma);
    }

    #[test]
    fn sma_window_includes_the_last_candle() {
        // Last close is the only non-100 value; SMA(20) = 100 + 20/20 = 101 < 120.
        let values: Vec<f64> = std::iter::repeat(100.0).take(19).chain([120.0]).collect();
        assert_eq!(trailing_sma(&values, 20), Some(101.0));
        assert_eq!(trailing_sma(&values[..19], 20), None);
    }

    #[test]
    fn non_finite_window_counts_as_unmet() {
        let mut candles = flat(24);
        candles[22].volume = f64::NAN;
        candles.push(candle(24, 100.0, 105.0, 5_000.0));
        let eval = evaluate(&Series::new(candles), 20).unwrap();
        assert!(!eval.checks.volume_above_sma);
        assert!(eval.checks.close_above_sma);
    }

    #[test]
    fn confidence_is_always_a_third_multiple() {
        for n in [1usize, 5, 19, 20, 21, 40] {
            for (open, close, volume) in [(1.0, 2.0, 1.0), (2.0, 1.0, 1e9), (1.0, 1.0, 0.0)] {
                let mut candles = flat(n - 1);
                candles.push(candle(n as i64, open, close, volume));
                let eval = evaluate(&Series::new(candles), 20).unwrap();
                let thirds = eval.confidence * 3.0;
                assert!((thirds - thirds.round()).abs() < 1e-12, "{eval:?}");
                assert_eq!(eval.side.is_some(), eval.confidence > 0.0);
                assert_ne!(eval.side, Some(Side::Sell));
            }
        }
    }

    #[test]
    fn evaluation_is_deterministic() {
        let mut candles = flat(30);
        candles.push(candle(30, 100.0, 103.0, 2_000.0));
        let series = Series::new(candles);
        assert_eq!(evaluate(&series, 20), evaluate(&series, 20));
    }

    #[test]
    fn empty_series_is_not_evaluable() {
        assert_eq!(evaluate(&Series::default(), 20), None);
    }
}

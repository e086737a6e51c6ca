use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;

use super::{lookback_seconds, FetchError, MarketDataProvider};
use crate::types::{Candle, Series, Timeframe};

/// Random-walk candles for demos and dry runs without network access.
pub struct SyntheticProvider {
    /// Cap on candles per series (a 5d window at 1m would otherwise be 7200 bars).
    pub max_candles: usize,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self { max_candles: 300 }
    }
}

#[async_trait]
impl MarketDataProvider for SyntheticProvider {
    async fn fetch(&self, symbol: &str, lookback: &str, timeframe: Timeframe) -> Result<Series, FetchError> {
        let window = lookback_seconds(lookback)?;
        let n = ((window / timeframe.seconds()) as usize).min(self.max_candles);
        if n == 0 {
            return Err(FetchError::Empty {
                symbol: symbol.to_string(),
                timeframe,
            });
        }
        Ok(random_walk(symbol, n, timeframe, Utc::now()))
    }
}

fn random_walk(symbol: &str, n: usize, timeframe: Timeframe, end: DateTime<Utc>) -> Series {
    let mut rng = rand::thread_rng();
    // Per-symbol starting level so instruments don't all print the same price.
    let seed = symbol.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    let mut last = 10.0 + f64::from(seed % 5_000);
    let step = chrono::Duration::seconds(timeframe.seconds());
    let start = end - step * (n as i32);

    let candles = (0..n)
        .map(|i| {
            let open = last;
            let close = open * (1.0 + rng.gen_range(-0.004..=0.004));
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..=0.002));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..=0.002));
            last = close;
            Candle {
                ts: start + step * (i as i32),
                open,
                high,
                low,
                close,
                volume: rng.gen_range(100.0..=10_000.0),
            }
        })
        .collect();
    Series::new(candles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn produces_bounded_well_formed_series() {
        let provider = SyntheticProvider { max_candles: 50 };
        let series = provider.fetch("BTC-USD", "5d", Timeframe::M1).await.unwrap();
        assert_eq!(series.len(), 50);
        for c in series.candles() {
            assert!(c.low <= c.open.min(c.close) && c.high >= c.open.max(c.close));
        }

        let series = provider.fetch("BTC-USD", "5d", Timeframe::H4).await.unwrap();
        assert_eq!(series.len(), 30);
    }

    #[tokio::test]
    async fn rejects_bad_lookback() {
        let provider = SyntheticProvider::default();
        let err = provider.fetch("X", "five days", Timeframe::H1).await.unwrap_err();
        assert!(matches!(err, FetchError::Lookback(_)));
    }
}

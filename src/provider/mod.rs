use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Series, Timeframe};

pub mod fixture;
pub mod synthetic;
pub mod yahoo;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status} for {symbol}")]
    Status { symbol: String, status: u16 },
    #[error("provider error: {0}")]
    Api(String),
    #[error("unexpected response shape: {0}")]
    Decode(String),
    #[error("no data for {symbol} {timeframe}")]
    Empty { symbol: String, timeframe: Timeframe },
    #[error("unsupported lookback `{0}`")]
    Lookback(String),
}

/// OHLCV source. `lookback` is a window such as `5d`; the returned series is
/// oldest-first and may be shorter than the window.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch(&self, symbol: &str, lookback: &str, timeframe: Timeframe) -> Result<Series, FetchError>;
}

/// Parse a lookback such as `5d`, `12h` or `90m` into seconds.
pub fn lookback_seconds(lookback: &str) -> Result<i64, FetchError> {
    let s = lookback.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| FetchError::Lookback(lookback.to_string()))?;
    let (n, unit) = s.split_at(split);
    let n: i64 = n.parse().map_err(|_| FetchError::Lookback(lookback.to_string()))?;
    let unit_secs = match unit {
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "wk" => 7 * 24 * 60 * 60,
        _ => return Err(FetchError::Lookback(lookback.to_string())),
    };
    n.checked_mul(unit_secs)
        .ok_or_else(|| FetchError::Lookback(lookback.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lookbacks() {
        assert_eq!(lookback_seconds("5d").unwrap(), 5 * 86_400);
        assert_eq!(lookback_seconds("12h").unwrap(), 12 * 3_600);
        assert_eq!(lookback_seconds("90m").unwrap(), 90 * 60);
        assert!(matches!(lookback_seconds("d"), Err(FetchError::Lookback(_))));
        assert!(matches!(lookback_seconds("5y"), Err(FetchError::Lookback(_))));
    }

    #[test]
    fn oversized_lookback_is_rejected() {
        let huge = format!("{}wk", i64::MAX / 2);
        assert!(matches!(lookback_seconds(&huge), Err(FetchError::Lookback(_))));
    }
}

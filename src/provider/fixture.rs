use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{FetchError, MarketDataProvider};
use crate::types::{Series, Timeframe};

#[derive(Clone, Debug)]
enum Canned {
    Series(Series),
    Error(String),
}

/// In-memory provider serving canned series per (symbol, timeframe).
/// Unknown cells answer [`FetchError::Empty`]. Counts every call.
#[derive(Debug, Default)]
pub struct StaticProvider {
    canned: HashMap<(String, Timeframe), Canned>,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: &str, timeframe: Timeframe, series: Series) -> Self {
        self.canned
            .insert((symbol.to_string(), timeframe), Canned::Series(series));
        self
    }

    pub fn with_error(mut self, symbol: &str, timeframe: Timeframe, message: &str) -> Self {
        self.canned
            .insert((symbol.to_string(), timeframe), Canned::Error(message.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for StaticProvider {
    async fn fetch(&self, symbol: &str, _lookback: &str, timeframe: Timeframe) -> Result<Series, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.canned.get(&(symbol.to_string(), timeframe)) {
            Some(Canned::Series(series)) => Ok(series.clone()),
            Some(Canned::Error(message)) => Err(FetchError::Api(message.clone())),
            None => Err(FetchError::Empty {
                symbol: symbol.to_string(),
                timeframe,
            }),
        }
    }
}

//! Yahoo Finance v8 chart API provider.
//!
//! Yahoo has no native 4h interval: those series are fetched at 1h and folded
//! into 4-hour candles aligned on UTC multiples of four hours.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use super::{FetchError, MarketDataProvider};
use crate::types::{Candle, Series, Timeframe};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::Client,
    base_url: url::Url,
}

impl YahooProvider {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = url::Url::parse(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (X11; Linux x86_64)")
            .build()?;
        Ok(Self { client, base_url })
    }

    fn chart_url(&self, symbol: &str, lookback: &str, interval: &str) -> Result<url::Url, FetchError> {
        let mut url = self
            .base_url
            .join(&format!("v8/finance/chart/{symbol}"))
            .map_err(|e| FetchError::Decode(format!("bad chart url for {symbol}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("range", lookback)
            .append_pair("interval", interval);
        Ok(url)
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    async fn fetch(&self, symbol: &str, lookback: &str, timeframe: Timeframe) -> Result<Series, FetchError> {
        let interval = native_interval(timeframe);
        let url = self.chart_url(symbol, lookback, interval.as_str())?;

        tracing::debug!(%symbol, %timeframe, %url, "fetching chart");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                symbol: symbol.to_string(),
                status: status.as_u16(),
            });
        }
        let body: ChartResponse = resp.json().await?;
        let candles = parse_chart(body)?;

        let candles = if interval == timeframe {
            candles
        } else {
            aggregate(&candles, timeframe)
        };
        if candles.is_empty() {
            return Err(FetchError::Empty {
                symbol: symbol.to_string(),
                timeframe,
            });
        }
        Ok(Series::new(candles))
    }
}

fn native_interval(timeframe: Timeframe) -> Timeframe {
    match timeframe {
        Timeframe::H4 => Timeframe::H1,
        other => other,
    }
}

fn parse_chart(resp: ChartResponse) -> Result<Vec<Candle>, FetchError> {
    if let Some(err) = resp.chart.error {
        return Err(FetchError::Api(format!("{}: {}", err.code, err.description)));
    }
    let data = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| FetchError::Decode("empty result array".into()))?;

    // Closed markets come back without timestamps.
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Decode("no quote data".into()))?;

    let mut candles = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) =
            (field(&quote.open), field(&quote.high), field(&quote.low), field(&quote.close))
        else {
            continue;
        };
        let Some(ts) = DateTime::<Utc>::from_timestamp(ts, 0) else {
            return Err(FetchError::Decode(format!("invalid timestamp {ts}")));
        };
        candles.push(Candle {
            ts,
            open,
            high,
            low,
            close,
            volume: field(&quote.volume).unwrap_or(0.0),
        });
    }
    Ok(candles)
}

/// Fold finer candles into `target` buckets aligned on UTC epoch multiples.
pub fn aggregate(candles: &[Candle], target: Timeframe) -> Vec<Candle> {
    let width = target.seconds();
    let mut out: Vec<Candle> = Vec::new();
    let mut current_bucket: Option<i64> = None;

    for c in candles {
        let bucket = c.ts.timestamp().div_euclid(width);
        if current_bucket == Some(bucket) {
            if let Some(agg) = out.last_mut() {
                agg.high = agg.high.max(c.high);
                agg.low = agg.low.min(c.low);
                agg.close = c.close;
                agg.volume += c.volume;
                continue;
            }
        }
        let ts = DateTime::<Utc>::from_timestamp(bucket * width, 0).unwrap_or(c.ts);
        out.push(Candle { ts, ..*c });
        current_bucket = Some(bucket);
    }
    out
}

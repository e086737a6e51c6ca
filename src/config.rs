//! Scanner configuration: the instrument map, timeframes and every tunable
//! constant of the scan/notify loop. Loaded from TOML; all keys are optional.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::ScanGrid;
use crate::types::{Instrument, Timeframe};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config: {0}")]
    Parse(String),
    #[error("configuration invalid: {0}")]
    Validation(String),
}

/// How the "no signal" counter is kept across subscribers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThrottleScope {
    /// One process-wide counter; every subscriber is notified on the same tick.
    #[default]
    Shared,
    /// One counter per active subscriber.
    PerSubscriber,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ScanConfig {
    pub instruments: Vec<Instrument>,
    pub timeframes: Vec<Timeframe>,
    /// Fraction of capital proposed per signal.
    pub risk_fraction: f64,
    /// Scans are skipped from this UTC hour until midnight. 24 disables the cutoff.
    pub cutoff_hour_utc: u32,
    pub scan_period_secs: u64,
    pub first_delay_secs: u64,
    /// Empty cycles before a "no signal" notice goes out.
    pub throttle_threshold: u32,
    pub throttle_scope: ThrottleScope,
    /// Provider lookback window, e.g. `5d`.
    pub lookback: String,
    /// Shorter series are skipped.
    pub min_candles: usize,
    pub sma_period: usize,
    pub max_concurrent_fetches: usize,
    /// Stripped from capital input and appended to sizes in messages.
    pub currency: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            instruments: default_instruments(),
            timeframes: Timeframe::ALL.to_vec(),
            risk_fraction: 0.02,
            cutoff_hour_utc: 22,
            scan_period_secs: 60,
            first_delay_secs: 10,
            throttle_threshold: 10,
            throttle_scope: ThrottleScope::Shared,
            lookback: "5d".to_string(),
            min_candles: 5,
            sma_period: 20,
            max_concurrent_fetches: 4,
            currency: "€".to_string(),
        }
    }
}

fn default_instruments() -> Vec<Instrument> {
    [
        ("SP500", "^GSPC"),
        ("NASDAQ", "^IXIC"),
        ("DJIA", "^DJI"),
        ("BTCUSD", "BTC-USD"),
        ("ETHUSD", "ETH-USD"),
        ("EURUSD", "EURUSD=X"),
        ("USDJPY", "JPY=X"),
    ]
    .into_iter()
    .map(|(name, symbol)| Instrument::new(name, symbol))
    .collect()
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::Validation(
                "at least one instrument must be defined".into(),
            ));
        }
        if let Some(bad) = self
            .instruments
            .iter()
            .find(|i| i.name.trim().is_empty() || i.symbol.trim().is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "instrument entries need a name and a symbol (got {bad:?})"
            )));
        }
        if self.timeframes.is_empty() {
            return Err(ConfigError::Validation(
                "at least one timeframe must be defined".into(),
            ));
        }
        if !(self.risk_fraction > 0.0 && self.risk_fraction <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "risk fraction must be in (0, 1], got {}",
                self.risk_fraction
            )));
        }
        if self.cutoff_hour_utc > 24 {
            return Err(ConfigError::Validation(format!(
                "cutoff hour must be within 0..=24, got {}",
                self.cutoff_hour_utc
            )));
        }
        if self.scan_period_secs == 0 {
            return Err(ConfigError::Validation(
                "scan period must be greater than zero".into(),
            ));
        }
        if self.throttle_threshold == 0 {
            return Err(ConfigError::Validation(
                "throttle threshold must be greater than zero".into(),
            ));
        }
        if self.min_candles == 0 || self.sma_period == 0 {
            return Err(ConfigError::Validation(
                "min-candles and sma-period must be greater than zero".into(),
            ));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::Validation(
                "max-concurrent-fetches must be greater than zero".into(),
            ));
        }
        if self.lookback.trim().is_empty() {
            return Err(ConfigError::Validation("lookback must not be empty".into()));
        }
        Ok(())
    }

    pub fn grid(&self) -> ScanGrid {
        ScanGrid::new(self.instruments.clone(), self.timeframes.clone())
    }

    pub fn scan_period(&self) -> Duration {
        Duration::from_secs(self.scan_period_secs)
    }

    pub fn first_delay(&self) -> Duration {
        Duration::from_secs(self.first_delay_secs)
    }
}

pub fn load_config(path: &Path) -> Result<ScanConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<ScanConfig, ConfigError> {
    let config: ScanConfig =
        toml::from_str(contents).map_err(|err| ConfigError::Parse(err.to_string()))?;
    config.validate()?;
    Ok(config)
}

//! Scan cycle driver.
//!
//! One cycle: gate (market window, subscribers, capital) -> fetch and score
//! every grid cell -> dispatch. Cycles are serialized: the periodic timer and
//! on-demand scans share one lock, so throttle updates and notifications
//! never interleave.

use chrono::{DateTime, Timelike, Utc};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;

use crate::config::ScanConfig;
use crate::dispatch::Dispatcher;
use crate::grid::{GridCell, ScanGrid};
use crate::metrics::ScanMetrics;
use crate::provider::{FetchError, MarketDataProvider};
use crate::state::SharedState;
use crate::strategy::{candle_score, risk};
use crate::transport::Transport;
use crate::types::ScanResult;

#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// Provider answered with no candles.
    Empty,
    /// Fewer candles than the configured minimum.
    TooShort { len: usize },
}

/// What happened to one grid cell. Skips and failures are expected and
/// never reach subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum CellOutcome {
    Signal(ScanResult),
    NoSignal,
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateSkip {
    MarketClosed { hour: u32 },
    NoSubscribers,
    NoCapital,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleReport {
    /// Set when the cycle stopped before fetching anything.
    pub skipped: Option<GateSkip>,
    pub results: Vec<ScanResult>,
    pub cells: usize,
    pub cells_skipped: usize,
    pub cells_failed: usize,
    pub messages_sent: usize,
    pub send_failures: usize,
}

#[derive(Clone, Copy, Debug)]
struct CellParams {
    capital: f64,
    risk_fraction: f64,
    min_candles: usize,
    sma_period: usize,
}

pub struct Scanner {
    config: Arc<ScanConfig>,
    grid: ScanGrid,
    state: SharedState,
    provider: Arc<dyn MarketDataProvider>,
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    metrics: ScanMetrics,
    cycle_lock: Mutex<()>,
}

impl Scanner {
    pub fn new(
        config: ScanConfig,
        state: SharedState,
        provider: Arc<dyn MarketDataProvider>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let dispatcher = Dispatcher::new(config.throttle_threshold, config.currency.clone());
        Self {
            grid: config.grid(),
            config: Arc::new(config),
            state,
            provider,
            transport,
            dispatcher,
            metrics: ScanMetrics::new(),
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    /// Run one full cycle as of `now`. Waits for any cycle already in flight.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let _cycle = self.cycle_lock.lock().await;
        let started = Instant::now();

        let gate = self.state.gate();
        let skip = if now.hour() >= self.config.cutoff_hour_utc {
            Some(GateSkip::MarketClosed { hour: now.hour() })
        } else if gate.subscribers.is_empty() {
            Some(GateSkip::NoSubscribers)
        } else if gate.capital <= 0.0 {
            Some(GateSkip::NoCapital)
        } else {
            None
        };
        if let Some(skip) = skip {
            tracing::debug!(?skip, "scan cycle skipped");
            self.metrics.record_cycle(Some(&skip));
            return CycleReport {
                skipped: Some(skip),
                ..Default::default()
            };
        }

        let params = CellParams {
            capital: gate.capital,
            risk_fraction: self.config.risk_fraction,
            min_candles: self.config.min_candles,
            sma_period: self.config.sma_period,
        };
        let outcomes = self.scan_grid(params).await;

        let mut report = CycleReport {
            cells: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                CellOutcome::Signal(result) => report.results.push(result),
                CellOutcome::NoSignal => {}
                CellOutcome::Skipped(_) => report.cells_skipped += 1,
                CellOutcome::Failed(_) => report.cells_failed += 1,
            }
        }

        // Subscribers are read again: anyone who joined during the fetch is included.
        let subscribers = self.state.active_subscribers();
        let plan = self.dispatcher.plan(&report.results, &subscribers, &self.state);
        for out in &plan {
            match self.transport.send(out.subscriber, &out.text).await {
                Ok(()) => report.messages_sent += 1,
                Err(err) => {
                    report.send_failures += 1;
                    tracing::warn!(subscriber = %out.subscriber, error = %err, "delivery failed");
                }
            }
        }

        self.metrics.record_cycle(None);
        self.metrics
            .record_delivery(report.messages_sent as u64, report.send_failures as u64);
        tracing::info!(
            cells = report.cells,
            signals = report.results.len(),
            skipped = report.cells_skipped,
            failed = report.cells_failed,
            subscribers = subscribers.len(),
            messages = report.messages_sent,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan cycle finished"
        );
        tracing::debug!(metrics = ?self.metrics.snapshot_kv(), "scan metrics");
        report
    }

    async fn scan_grid(&self, params: CellParams) -> Vec<CellOutcome> {
        let cells: Vec<GridCell> = self.grid.cells().collect();
        let lookback: Arc<str> = Arc::from(self.config.lookback.as_str());

        stream::iter(cells)
            .map(|cell| {
                let provider = Arc::clone(&self.provider);
                let lookback = Arc::clone(&lookback);
                let metrics = self.metrics.clone();
                async move {
                    let started = Instant::now();
                    // A panicking cell only loses itself.
                    let task = tokio::spawn({
                        let cell = cell.clone();
                        async move { evaluate_cell(provider.as_ref(), &cell, &lookback, params).await }
                    });
                    let outcome = match task.await {
                        Ok(outcome) => outcome,
                        Err(err) => CellOutcome::Failed(format!("cell task aborted: {err}")),
                    };
                    log_outcome(&cell, &outcome);
                    metrics.record_cell(&cell.instrument.name, cell.timeframe, &outcome, started.elapsed());
                    outcome
                }
            })
            .buffered(self.config.max_concurrent_fetches)
            .collect::<Vec<_>>()
            .await
    }
}

async fn evaluate_cell(
    provider: &dyn MarketDataProvider,
    cell: &GridCell,
    lookback: &str,
    params: CellParams,
) -> CellOutcome {
    let series = match provider
        .fetch(&cell.instrument.symbol, lookback, cell.timeframe)
        .await
    {
        Ok(series) => series,
        Err(FetchError::Empty { .. }) => return CellOutcome::Skipped(SkipReason::Empty),
        Err(err) => return CellOutcome::Failed(err.to_string()),
    };
    if series.is_empty() {
        return CellOutcome::Skipped(SkipReason::Empty);
    }
    if series.len() < params.min_candles {
        return CellOutcome::Skipped(SkipReason::TooShort { len: series.len() });
    }

    let Some(eval) = candle_score::evaluate(&series, params.sma_period) else {
        return CellOutcome::Skipped(SkipReason::Empty);
    };
    let Some(side) = eval.side else {
        return CellOutcome::NoSignal;
    };
    let levels = risk::size_position(eval.reference_price, side, params.capital, params.risk_fraction);
    CellOutcome::Signal(ScanResult {
        instrument: cell.instrument.name.clone(),
        timeframe: cell.timeframe,
        side,
        confidence: eval.confidence,
        reference_price: eval.reference_price,
        take_profit: levels.take_profit,
        stop_loss: levels.stop_loss,
        position_size: levels.position_size,
    })
}

fn log_outcome(cell: &GridCell, outcome: &CellOutcome) {
    let instrument = cell.instrument.name.as_str();
    let timeframe = cell.timeframe.as_str();
    match outcome {
        CellOutcome::Signal(r) => {
            tracing::debug!(instrument, timeframe, confidence = r.confidence, "signal")
        }
        CellOutcome::NoSignal => tracing::trace!(instrument, timeframe, "no signal"),
        CellOutcome::Skipped(reason) => {
            tracing::debug!(instrument, timeframe, ?reason, "cell skipped")
        }
        CellOutcome::Failed(error) => {
            tracing::warn!(instrument, timeframe, %error, "cell fetch failed")
        }
    }
}

/// Drive `scanner` every `period`, first after `first_delay`, until `shutdown`
/// flips to `true` (or its sender is dropped). A started cycle always completes.
pub async fn run_periodic<C>(
    scanner: Arc<Scanner>,
    period: Duration,
    first_delay: Duration,
    clock: C,
    mut shutdown: watch::Receiver<bool>,
) where
    C: Fn() -> DateTime<Utc> + Send,
{
    let start = tokio::time::Instant::now() + first_delay;
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        period_secs = period.as_secs(),
        first_delay_secs = first_delay.as_secs(),
        "periodic scanner started"
    );
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                scanner.run_cycle(clock()).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::info!("periodic scanner stopped");
}

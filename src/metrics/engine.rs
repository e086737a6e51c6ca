use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::metrics::stats::CellStats;
use crate::scanner::{CellOutcome, GateSkip, SkipReason};
use crate::types::Timeframe;

type CellKey = (String, Timeframe);

/// In-memory scan statistics. Cheap to clone; clones share the same counters.
#[derive(Clone, Debug, Default)]
pub struct ScanMetrics {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Cell stats are touched by concurrent fetch tasks; a per-cell mutex keeps it simple.
    cells: DashMap<CellKey, Arc<Mutex<CellStats>>>,
    cycles_completed: AtomicU64,
    cycles_market_closed: AtomicU64,
    cycles_no_subscribers: AtomicU64,
    cycles_no_capital: AtomicU64,
    notices_sent: AtomicU64,
    send_failures: AtomicU64,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cell(&self, instrument: &str, timeframe: Timeframe, outcome: &CellOutcome, latency: Duration) {
        let stats = self.cell_stats(instrument, timeframe);
        let mut s = stats.lock();
        s.fetch_latency_ms.record(latency.as_millis() as u64);
        match outcome {
            CellOutcome::Signal(result) => {
                s.outcomes.evaluated += 1;
                s.outcomes.signals += 1;
                let thirds = (result.confidence * 3.0).round().clamp(0.0, 3.0) as usize;
                s.confidence_thirds[thirds] += 1;
            }
            CellOutcome::NoSignal => {
                s.outcomes.evaluated += 1;
                s.confidence_thirds[0] += 1;
            }
            CellOutcome::Skipped(SkipReason::TooShort { .. }) => s.outcomes.too_short += 1,
            CellOutcome::Skipped(SkipReason::Empty) => s.outcomes.empty += 1,
            CellOutcome::Failed(_) => s.outcomes.failed += 1,
        }
    }

    pub fn record_cycle(&self, skipped: Option<&GateSkip>) {
        let counter = match skipped {
            None => &self.inner.cycles_completed,
            Some(GateSkip::MarketClosed { .. }) => &self.inner.cycles_market_closed,
            Some(GateSkip::NoSubscribers) => &self.inner.cycles_no_subscribers,
            Some(GateSkip::NoCapital) => &self.inner.cycles_no_capital,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery(&self, messages: u64, failures: u64) {
        self.inner.notices_sent.fetch_add(messages, Ordering::Relaxed);
        self.inner.send_failures.fetch_add(failures, Ordering::Relaxed);
    }

    pub fn cell(&self, instrument: &str, timeframe: Timeframe) -> Option<CellStats> {
        self.inner
            .cells
            .get(&(instrument.to_string(), timeframe))
            .map(|s| s.lock().clone())
    }

    pub fn cycles_completed(&self) -> u64 {
        self.inner.cycles_completed.load(Ordering::Relaxed)
    }

    /// Flat, sorted summary for logs and operators.
    pub fn snapshot_kv(&self) -> BTreeMap<String, String> {
        let mut kv = BTreeMap::new();
        let counters = [
            ("cycles.completed", &self.inner.cycles_completed),
            ("cycles.skipped.market_closed", &self.inner.cycles_market_closed),
            ("cycles.skipped.no_subscribers", &self.inner.cycles_no_subscribers),
            ("cycles.skipped.no_capital", &self.inner.cycles_no_capital),
            ("messages.sent", &self.inner.notices_sent),
            ("messages.failed", &self.inner.send_failures),
        ];
        for (key, counter) in counters {
            kv.insert(key.to_string(), counter.load(Ordering::Relaxed).to_string());
        }

        for entry in self.inner.cells.iter() {
            let (instrument, timeframe) = entry.key();
            let s = entry.value().lock();
            let prefix = format!("cell|{instrument}|{timeframe}");
            kv.insert(format!("{prefix}|attempts"), s.outcomes.attempts().to_string());
            kv.insert(format!("{prefix}|signal_rate"), format!("{:.4}", s.outcomes.signal_rate()));
            kv.insert(format!("{prefix}|failure_rate"), format!("{:.4}", s.outcomes.failure_rate()));
            if s.fetch_latency_ms.count() > 0 {
                kv.insert(
                    format!("{prefix}|fetch_ms"),
                    format!(
                        "p50={} p95={} max={}",
                        s.fetch_latency_ms.p50(),
                        s.fetch_latency_ms.p95(),
                        s.fetch_latency_ms.max()
                    ),
                );
            }
        }
        kv
    }

    fn cell_stats(&self, instrument: &str, timeframe: Timeframe) -> Arc<Mutex<CellStats>> {
        self.inner
            .cells
            .entry((instrument.to_string(), timeframe))
            .or_insert_with(|| Arc::new(Mutex::new(CellStats::default())))
            .clone()
    }
}

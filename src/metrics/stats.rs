use hdrhistogram::Histogram;

/// Per-cell outcome counters across cycles.
#[derive(Clone, Debug, Default)]
pub struct OutcomeCounters {
    pub evaluated: u64,
    pub signals: u64,
    pub too_short: u64,
    pub empty: u64,
    pub failed: u64,
}

impl OutcomeCounters {
    pub fn attempts(&self) -> u64 {
        self.evaluated + self.too_short + self.empty + self.failed
    }

    pub fn signal_rate(&self) -> f64 {
        if self.evaluated == 0 {
            return 0.0;
        }
        (self.signals as f64) / (self.evaluated as f64)
    }

    pub fn failure_rate(&self) -> f64 {
        let denom = self.attempts();
        if denom == 0 {
            return 0.0;
        }
        (self.failed as f64) / (denom as f64)
    }
}

#[derive(Clone, Debug)]
pub struct Histo {
    /// Values stored as integers (milliseconds here).
    inner: Histogram<u64>,
}

impl Default for Histo {
    fn default() -> Self {
        Self {
            inner: Histogram::new(3).expect("histo"),
        }
    }
}

impl Histo {
    pub fn record(&mut self, v: u64) {
        let _ = self.inner.record(v.max(1));
    }

    pub fn p50(&self) -> u64 {
        self.inner.value_at_quantile(0.50)
    }

    pub fn p95(&self) -> u64 {
        self.inner.value_at_quantile(0.95)
    }

    pub fn max(&self) -> u64 {
        self.inner.max()
    }

    pub fn count(&self) -> u64 {
        self.inner.len()
    }
}

#[derive(Clone, Debug, Default)]
pub struct CellStats {
    pub outcomes: OutcomeCounters,
    /// Provider round trip, including failed fetches.
    pub fetch_latency_ms: Histo,
    /// Confidence of evaluated series, in thirds (0..=3).
    pub confidence_thirds: [u64; 4],
}

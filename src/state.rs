//! Process-wide mutable state shared by the scheduler and the inbound event
//! path: subscriber registry, capital and the "no signal" throttle.
//!
//! Everything sits behind a single mutex so every mutation is linearizable
//! with respect to the others. The lock is never held across an `.await`.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::ThrottleScope;
use crate::types::SubscriberId;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ThrottleState {
    scope: ThrottleScope,
    shared: u32,
    per_subscriber: BTreeMap<SubscriberId, u32>,
}

impl ThrottleState {
    pub fn new(scope: ThrottleScope) -> Self {
        Self {
            scope,
            ..Default::default()
        }
    }

    pub fn scope(&self) -> ThrottleScope {
        self.scope
    }

    /// Current count for `subscriber` (the shared count in shared scope).
    pub fn count(&self, subscriber: SubscriberId) -> u32 {
        match self.scope {
            ThrottleScope::Shared => self.shared,
            ThrottleScope::PerSubscriber => {
                self.per_subscriber.get(&subscriber).copied().unwrap_or(0)
            }
        }
    }

    /// A cycle produced at least one signal.
    pub fn reset(&mut self) {
        self.shared = 0;
        self.per_subscriber.clear();
    }

    /// A cycle produced nothing. Returns the subscribers due for a notice;
    /// their counters are reset.
    pub fn record_empty(&mut self, subscribers: &[SubscriberId], threshold: u32) -> Vec<SubscriberId> {
        match self.scope {
            ThrottleScope::Shared => {
                self.shared += 1;
                if self.shared >= threshold {
                    self.shared = 0;
                    subscribers.to_vec()
                } else {
                    Vec::new()
                }
            }
            ThrottleScope::PerSubscriber => {
                let mut due = Vec::new();
                for &id in subscribers {
                    let count = self.per_subscriber.entry(id).or_insert(0);
                    *count += 1;
                    if *count >= threshold {
                        *count = 0;
                        due.push(id);
                    }
                }
                due
            }
        }
    }

    fn forget(&mut self, subscriber: SubscriberId) {
        self.per_subscriber.remove(&subscriber);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CapitalInput {
    Accepted(f64),
    Invalid,
    /// The subscriber was not asked for capital; the text is a plain message.
    NotAwaiting,
}

#[derive(Clone, Debug, Default)]
pub struct BotState {
    active: BTreeSet<SubscriberId>,
    awaiting_capital: BTreeSet<SubscriberId>,
    /// 0 means "not configured yet".
    capital: f64,
    throttle: ThrottleState,
}

/// What a cycle needs to know before fetching anything.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanGate {
    pub subscribers: Vec<SubscriberId>,
    pub capital: f64,
}

/// Cloneable handle to the shared [`BotState`].
#[derive(Clone, Debug, Default)]
pub struct SharedState {
    inner: Arc<Mutex<BotState>>,
}

impl SharedState {
    pub fn new(scope: ThrottleScope) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BotState {
                throttle: ThrottleState::new(scope),
                ..Default::default()
            })),
        }
    }

    /// First contact (or a restart of the conversation): subscribe and ask for capital.
    pub fn begin(&self, subscriber: SubscriberId) {
        let mut state = self.inner.lock();
        state.active.insert(subscriber);
        state.awaiting_capital.insert(subscriber);
    }

    pub fn submit_capital(&self, subscriber: SubscriberId, text: &str, currency: &str) -> CapitalInput {
        let mut state = self.inner.lock();
        if !state.awaiting_capital.contains(&subscriber) {
            return CapitalInput::NotAwaiting;
        }
        match parse_capital(text, currency) {
            Some(value) => {
                state.capital = value;
                state.awaiting_capital.remove(&subscriber);
                CapitalInput::Accepted(value)
            }
            None => CapitalInput::Invalid,
        }
    }

    /// Unsubscribe. Returns whether the subscriber was active.
    pub fn stop(&self, subscriber: SubscriberId) -> bool {
        let mut state = self.inner.lock();
        state.awaiting_capital.remove(&subscriber);
        state.throttle.forget(subscriber);
        state.active.remove(&subscriber)
    }

    pub fn capital(&self) -> f64 {
        self.inner.lock().capital
    }

    pub fn active_subscribers(&self) -> Vec<SubscriberId> {
        self.inner.lock().active.iter().copied().collect()
    }

    pub fn is_active(&self, subscriber: SubscriberId) -> bool {
        self.inner.lock().active.contains(&subscriber)
    }

    pub fn is_awaiting_capital(&self, subscriber: SubscriberId) -> bool {
        self.inner.lock().awaiting_capital.contains(&subscriber)
    }

    pub fn throttle_count(&self, subscriber: SubscriberId) -> u32 {
        self.inner.lock().throttle.count(subscriber)
    }

    pub fn gate(&self) -> ScanGate {
        let state = self.inner.lock();
        ScanGate {
            subscribers: state.active.iter().copied().collect(),
            capital: state.capital,
        }
    }

    /// Fold a finished cycle into the throttle. Returns who gets a "no signal" notice.
    pub fn record_cycle(&self, subscribers: &[SubscriberId], had_results: bool, threshold: u32) -> Vec<SubscriberId> {
        let mut state = self.inner.lock();
        if had_results {
            state.throttle.reset();
            Vec::new()
        } else {
            state.throttle.record_empty(subscribers, threshold)
        }
    }
}

/// Parse a free-text capital amount: the currency symbol and surrounding
/// whitespace are ignored. Negative and non-finite amounts are rejected.
pub fn parse_capital(text: &str, currency: &str) -> Option<f64> {
    let cleaned = if currency.is_empty() {
        text.to_string()
    } else {
        text.replace(currency, "")
    };
    let value: f64 = cleaned.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

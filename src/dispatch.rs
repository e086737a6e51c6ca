//! Turns a finished cycle into per-subscriber messages and folds it into the
//! "no signal" throttle.

use crate::state::SharedState;
use crate::types::{ScanResult, SubscriberId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    pub subscriber: SubscriberId,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct Dispatcher {
    threshold: u32,
    currency: String,
}

impl Dispatcher {
    pub fn new(threshold: u32, currency: impl Into<String>) -> Self {
        Self {
            threshold,
            currency: currency.into(),
        }
    }

    /// Messages to send for this cycle, grouped by subscriber in `subscribers` order.
    ///
    /// Non-empty results reset the throttle and go to every subscriber. Empty
    /// results count one empty cycle; subscribers whose counter reaches the
    /// threshold get a single notice.
    pub fn plan(&self, results: &[ScanResult], subscribers: &[SubscriberId], state: &SharedState) -> Vec<Outbound> {
        if subscribers.is_empty() {
            return Vec::new();
        }
        let due = state.record_cycle(subscribers, !results.is_empty(), self.threshold);

        if !results.is_empty() {
            let texts: Vec<String> = results
                .iter()
                .map(|r| format_result(r, &self.currency))
                .collect();
            return subscribers
                .iter()
                .flat_map(|&subscriber| {
                    texts.iter().map(move |text| Outbound {
                        subscriber,
                        text: text.clone(),
                    })
                })
                .collect();
        }

        due.into_iter()
            .map(|subscriber| Outbound {
                subscriber,
                text: no_signal_notice(self.threshold),
            })
            .collect()
    }
}

pub fn format_result(result: &ScanResult, currency: &str) -> String {
    format!(
        "📊 Market: {}\n\
         ⏱ Timeframe: {}\n\
         📈 Signal: {}\n\
         🎯 Confidence: {:.1}%\n\
         Current price: {:?}\n\
         TP: {:?}\n\
         SL: {:?}\n\
         Position size: {:.2} {}",
        result.instrument,
        result.timeframe,
        result.side.label(),
        result.confidence * 100.0,
        result.reference_price,
        result.take_profit,
        result.stop_loss,
        result.position_size,
        currency,
    )
}

pub fn no_signal_notice(scans: u32) -> String {
    format!("🕒 {scans} scans completed, no signal found.\nStay patient.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThrottleScope;
    use crate::types::{Side, Timeframe};
    use pretty_assertions::assert_eq;

    fn result() -> ScanResult {
        ScanResult {
            instrument: "BTCUSD".into(),
            timeframe: Timeframe::H1,
            side: Side::Buy,
            confidence: 2.0 / 3.0,
            reference_price: 100.0,
            take_profit: 102.0,
            stop_loss: 98.0,
            position_size: 20.0,
        }
    }

    #[test]
    fn formats_every_field() {
        assert_eq!(
            format_result(&result(), "€"),
            "📊 Market: BTCUSD\n⏱ Timeframe: 1h\n📈 Signal: BUY\n🎯 Confidence: 66.7%\n\
             Current price: 100.0\nTP: 102.0\nSL: 98.0\nPosition size: 20.00 €"
        );
    }

    #[test]
    fn fans_out_results_to_every_subscriber() {
        let state = SharedState::new(ThrottleScope::Shared);
        let dispatcher = Dispatcher::new(10, "€");
        let subs = [SubscriberId(1), SubscriberId(2)];
        let plan = dispatcher.plan(&[result(), result()], &subs, &state);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0].subscriber, SubscriberId(1));
        assert_eq!(plan[3].subscriber, SubscriberId(2));
    }

    #[test]
    fn notice_fires_on_threshold_then_resets() {
        let state = SharedState::new(ThrottleScope::Shared);
        let dispatcher = Dispatcher::new(3, "€");
        let subs = [SubscriberId(1), SubscriberId(2)];

        assert!(dispatcher.plan(&[], &subs, &state).is_empty());
        assert!(dispatcher.plan(&[], &subs, &state).is_empty());
        let plan = dispatcher.plan(&[], &subs, &state);
        assert_eq!(
            plan,
            vec![
                Outbound {
                    subscriber: SubscriberId(1),
                    text: no_signal_notice(3),
                },
                Outbound {
                    subscriber: SubscriberId(2),
                    text: no_signal_notice(3),
                },
            ]
        );
        assert_eq!(state.throttle_count(SubscriberId(1)), 0);
    }

    #[test]
    fn no_subscribers_leaves_throttle_untouched() {
        let state = SharedState::new(ThrottleScope::Shared);
        let dispatcher = Dispatcher::new(3, "€");
        assert!(dispatcher.plan(&[], &[], &state).is_empty());
        assert_eq!(state.throttle_count(SubscriberId(1)), 0);
    }
}

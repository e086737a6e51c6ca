//! Inbound subscriber events: subscription, capital input, on-demand scans.

use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

use crate::events::{EventKind, InboundEvent};
use crate::scanner::{CycleReport, Scanner};
use crate::state::CapitalInput;
use crate::transport::EventSource;
use crate::types::SubscriberId;

#[derive(Clone, Debug, PartialEq)]
pub enum Handled {
    Subscribed,
    CapitalSet(f64),
    CapitalRejected,
    Help,
    CapitalMissing,
    Scanned(CycleReport),
    Unsubscribed,
}

pub struct EventHandler {
    scanner: Arc<Scanner>,
}

impl EventHandler {
    pub fn new(scanner: Arc<Scanner>) -> Self {
        Self { scanner }
    }

    pub async fn handle(&self, event: InboundEvent, now: DateTime<Utc>) -> anyhow::Result<Handled> {
        let subscriber = event.subscriber;
        let state = self.scanner.state();
        let currency = self.scanner.config().currency.as_str();
        tracing::debug!(%subscriber, kind = ?event.kind, "inbound event");

        let handled = match event.kind {
            EventKind::Begin => {
                state.begin(subscriber);
                self.reply(
                    subscriber,
                    &format!("Hi! Send me your capital in {currency} (just the number):"),
                )
                .await?;
                Handled::Subscribed
            }
            EventKind::Text(text) => match state.submit_capital(subscriber, &text, currency) {
                CapitalInput::Accepted(value) => {
                    tracing::info!(%subscriber, capital = value, "capital configured");
                    self.reply(subscriber, &format!("Got it, capital set to {value:?} {currency}."))
                        .await?;
                    Handled::CapitalSet(value)
                }
                CapitalInput::Invalid => {
                    self.reply(subscriber, "Error: just type a number for your capital.")
                        .await?;
                    Handled::CapitalRejected
                }
                CapitalInput::NotAwaiting => {
                    self.reply(
                        subscriber,
                        "You can send /signal or wait for the automatic signals.",
                    )
                    .await?;
                    Handled::Help
                }
            },
            EventKind::ScanNow => {
                if state.capital() <= 0.0 {
                    self.reply(subscriber, "Set your capital first with /start!")
                        .await?;
                    Handled::CapitalMissing
                } else {
                    let report = self.scanner.run_cycle(now).await;
                    tracing::info!(%subscriber, signals = report.results.len(), skipped = ?report.skipped, "on-demand scan done");
                    self.reply(subscriber, "Immediate scan finished, check your messages!")
                        .await?;
                    Handled::Scanned(report)
                }
            }
            EventKind::Stop => {
                state.stop(subscriber);
                self.reply(
                    subscriber,
                    "You are unsubscribed. Send /start to subscribe again.",
                )
                .await?;
                Handled::Unsubscribed
            }
        };
        Ok(handled)
    }

    async fn reply(&self, subscriber: SubscriberId, text: &str) -> anyhow::Result<()> {
        self.scanner
            .transport()
            .send(subscriber, text)
            .await
            .with_context(|| format!("reply to {subscriber}"))
    }
}

/// Feed events from `source` into `handler` until the source closes or
/// `shutdown` flips to `true`. Handler errors are logged per event.
pub async fn serve_events<S, C>(
    handler: &EventHandler,
    source: &mut S,
    clock: C,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    S: EventSource + ?Sized,
    C: Fn() -> DateTime<Utc>,
{
    loop {
        let batch = tokio::select! {
            batch = source.next_batch() => batch?,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(());
                }
                continue;
            }
        };
        let Some(events) = batch else {
            tracing::info!("event source closed");
            return Ok(());
        };
        for event in events {
            let subscriber = event.subscriber;
            if let Err(err) = handler.handle(event, clock()).await {
                tracing::warn!(%subscriber, error = %format!("{err:#}"), "event handling failed");
            }
        }
    }
}

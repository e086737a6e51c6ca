use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;

use super::Transport;
use crate::types::SubscriberId;

/// Records every outbound message instead of delivering it.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<(SubscriberId, String)>>,
    unreachable: BTreeSet<SubscriberId>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends to `subscriber` fail (the message is not recorded).
    pub fn with_unreachable(mut self, subscriber: SubscriberId) -> Self {
        self.unreachable.insert(subscriber);
        self
    }

    pub fn sent(&self) -> Vec<(SubscriberId, String)> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, subscriber: SubscriberId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| *id == subscriber)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Drain recorded messages.
    pub fn take(&self) -> Vec<(SubscriberId, String)> {
        std::mem::take(&mut *self.sent.lock())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, subscriber: SubscriberId, text: &str) -> anyhow::Result<()> {
        if self.unreachable.contains(&subscriber) {
            anyhow::bail!("subscriber {subscriber} unreachable");
        }
        self.sent.lock().push((subscriber, text.to_string()));
        Ok(())
    }
}

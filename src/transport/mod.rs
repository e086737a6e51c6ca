use async_trait::async_trait;

use crate::events::InboundEvent;
use crate::types::SubscriberId;

pub mod console;
pub mod memory;
pub mod telegram;

/// Outbound text delivery to one subscriber.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, subscriber: SubscriberId, text: &str) -> anyhow::Result<()>;
}

/// Inbound side of a transport.
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next batch of events. `Ok(None)` once the source is closed.
    async fn next_batch(&mut self) -> anyhow::Result<Option<Vec<InboundEvent>>>;
}

use serde::{Deserialize, Serialize};

use crate::types::SubscriberId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Subscribe and (re)start the capital prompt.
    Begin,
    /// Free text that is not a command.
    Text(String),
    /// Run a scan cycle right now.
    ScanNow,
    /// Unsubscribe.
    Stop,
}

/// Everything a transport feeds into the bot flows through this type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub subscriber: SubscriberId,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn new(subscriber: SubscriberId, kind: EventKind) -> Self {
        Self { subscriber, kind }
    }

    /// Map a chat line to an event. `/start`, `/signal` (alias `/scan`) and
    /// `/stop` are commands; other `/...` commands are ignored; anything else is text.
    pub fn from_chat_text(subscriber: SubscriberId, text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let kind = if let Some(command) = trimmed.strip_prefix('/') {
            // Group chats suffix commands with the bot name: `/signal@my_bot`.
            let name = command
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .split('@')
                .next()
                .unwrap_or_default();
            match name.to_ascii_lowercase().as_str() {
                "start" => EventKind::Begin,
                "signal" | "scan" => EventKind::ScanNow,
                "stop" => EventKind::Stop,
                _ => return None,
            }
        } else {
            EventKind::Text(text.to_string())
        };
        Some(Self::new(subscriber, kind))
    }
}

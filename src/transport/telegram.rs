//! Telegram Bot API transport: `sendMessage` for outbound text and
//! `getUpdates` long polling for inbound messages.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::{EventSource, Transport};
use crate::events::InboundEvent;
use crate::types::SubscriberId;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("telegram request failed: {0}")]
    Http(reqwest::Error),
    #[error("telegram api error in {method}: {description}")]
    Api { method: &'static str, description: String },
    #[error("invalid telegram endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

// Request URLs embed the bot token; keep them out of error messages and logs.
impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        TelegramError::Http(err.without_url())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Chat {
    pub id: i64,
}

pub struct TelegramClient {
    client: reqwest::Client,
    /// `{api_base}/bot{token}/`
    endpoint: url::Url,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str, poll_timeout: Duration) -> Result<Self, TelegramError> {
        // Tokens look like `123:abc`; the `./` keeps `bot123:` from parsing as a scheme.
        let endpoint = url::Url::parse(api_base)?.join(&format!("./bot{token}/"))?;
        // Long polls hold the connection for `poll_timeout`; leave headroom.
        let client = reqwest::Client::builder()
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()?;
        Ok(Self { client, endpoint })
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &'static str,
        body: serde_json::Value,
    ) -> Result<T, TelegramError> {
        let url = self.endpoint.join(method)?;
        let resp: ApiResponse<T> = self.client.post(url).json(&body).send().await?.json().await?;
        match (resp.ok, resp.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api {
                method,
                description: resp.description.unwrap_or_else(|| "no description".into()),
            }),
        }
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout.as_secs(),
                "allowed_updates": ["message"],
            }),
        )
        .await
    }
}

/// Outbound half; cheap to share with the scanner.
#[derive(Clone)]
pub struct TelegramTransport {
    client: Arc<TelegramClient>,
}

impl TelegramTransport {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, subscriber: SubscriberId, text: &str) -> anyhow::Result<()> {
        self.client
            .send_message(subscriber.0, text)
            .await
            .with_context(|| format!("sendMessage to {subscriber}"))
    }
}

/// Inbound half: long-polls `getUpdates` and acknowledges by advancing the offset.
pub struct TelegramUpdates {
    client: Arc<TelegramClient>,
    offset: i64,
    poll_timeout: Duration,
    retry_backoff: Duration,
}

impl TelegramUpdates {
    pub fn new(client: Arc<TelegramClient>, poll_timeout: Duration) -> Self {
        Self {
            client,
            offset: 0,
            poll_timeout,
            retry_backoff: Duration::from_secs(3),
        }
    }
}

#[async_trait]
impl EventSource for TelegramUpdates {
    async fn next_batch(&mut self) -> anyhow::Result<Option<Vec<InboundEvent>>> {
        match self.client.get_updates(self.offset, self.poll_timeout).await {
            Ok(updates) => {
                if let Some(last) = updates.iter().map(|u| u.update_id).max() {
                    self.offset = last + 1;
                }
                Ok(Some(events_from_updates(&updates)))
            }
            Err(err) => {
                // Polling must survive network blips; the caller just sees an empty batch.
                tracing::warn!(error = %err, "getUpdates failed; backing off");
                tokio::time::sleep(self.retry_backoff).await;
                Ok(Some(Vec::new()))
            }
        }
    }
}

pub fn events_from_updates(updates: &[Update]) -> Vec<InboundEvent> {
    updates
        .iter()
        .filter_map(|u| {
            let message = u.message.as_ref()?;
            let text = message.text.as_deref()?;
            InboundEvent::from_chat_text(SubscriberId(message.chat.id), text)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn maps_updates_to_events() {
        let body = r#"{
            "ok": true,
            "result": [
                {"update_id": 7, "message": {"chat": {"id": 11}, "text": "/start"}},
                {"update_id": 8, "message": {"chat": {"id": 11}, "text": "1500 €"}},
                {"update_id": 9, "message": {"chat": {"id": 12}}},
                {"update_id": 10, "message": {"chat": {"id": 12}, "text": "/unknown"}},
                {"update_id": 11}
            ]
        }"#;
        let resp: ApiResponse<Vec<Update>> = serde_json::from_str(body).unwrap();
        let events = events_from_updates(&resp.result.unwrap());
        assert_eq!(
            events,
            vec![
                InboundEvent::new(SubscriberId(11), EventKind::Begin),
                InboundEvent::new(SubscriberId(11), EventKind::Text("1500 €".into())),
            ]
        );
    }

    #[test]
    fn builds_method_urls_under_the_token() {
        let client = TelegramClient::new(DEFAULT_API_BASE, "123:abc", Duration::from_secs(30)).unwrap();
        assert_eq!(
            client.endpoint.join("sendMessage").unwrap().as_str(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }
}

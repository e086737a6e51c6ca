//! Local single-subscriber transport: lines from stdin are chat messages from
//! [`CONSOLE_SUBSCRIBER`], outbound messages are printed to stdout.

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use super::{EventSource, Transport};
use crate::events::InboundEvent;
use crate::types::SubscriberId;

pub const CONSOLE_SUBSCRIBER: SubscriberId = SubscriberId(0);

#[derive(Debug, Default)]
pub struct ConsoleTransport {
    // Serializes writes so multi-line messages never interleave.
    out: Mutex<()>,
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send(&self, subscriber: SubscriberId, text: &str) -> anyhow::Result<()> {
        let _guard = self.out.lock().await;
        let mut stdout = tokio::io::stdout();
        let framed = format!("--- to {subscriber} ---\n{text}\n");
        stdout
            .write_all(framed.as_bytes())
            .await
            .context("write stdout")?;
        stdout.flush().await.context("flush stdout")?;
        Ok(())
    }
}

pub struct ConsoleEvents {
    lines: Lines<BufReader<Stdin>>,
}

impl ConsoleEvents {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for ConsoleEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for ConsoleEvents {
    async fn next_batch(&mut self) -> anyhow::Result<Option<Vec<InboundEvent>>> {
        let Some(line) = self.lines.next_line().await.context("read stdin")? else {
            return Ok(None);
        };
        if line.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        Ok(Some(
            InboundEvent::from_chat_text(CONSOLE_SUBSCRIBER, &line)
                .into_iter()
                .collect(),
        ))
    }
}

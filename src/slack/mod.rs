// src/slack/mod.rs — Chat transport boundary (Slack Web API + Events API)

pub mod client;
pub mod events;
pub mod signature;

use async_trait::async_trait;
use serde::Serialize;

pub use client::SlackClient;
pub use events::{ChatEvent, ChatEvents, ChatHandler};

/// One outbound chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Also show a threaded reply in the channel.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reply_broadcast: bool,
}

impl OutgoingMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn in_thread(mut self, thread_id: Option<&str>) -> Self {
        self.thread_id = thread_id.map(String::from);
        self
    }

    pub fn broadcast(mut self, reply_broadcast: bool) -> Self {
        self.reply_broadcast = reply_broadcast;
        self
    }
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Short transport name for status display.
    fn name(&self) -> &'static str;

    async fn send(&self, message: &OutgoingMessage) -> anyhow::Result<()>;

    async fn send_message(
        &self,
        channel: &str,
        text: &str,
        thread_id: Option<&str>,
    ) -> anyhow::Result<()> {
        self.send(&OutgoingMessage::new(channel, text).in_thread(thread_id))
            .await
    }

    /// The bot's own user id, if the platform reports one.
    async fn identify(&self) -> anyhow::Result<Option<String>>;
}

/// Transport that drops every message. Used when no bot token is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

#[async_trait]
impl ChatTransport for NullTransport {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn send(&self, message: &OutgoingMessage) -> anyhow::Result<()> {
        tracing::debug!(channel = %message.channel, "Dropping outbound message (no transport)");
        Ok(())
    }

    async fn identify(&self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outgoing_message_serialization_skips_defaults() {
        let msg = OutgoingMessage::new("C1", "hi");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"channel": "C1", "text": "hi"})
        );

        let threaded = OutgoingMessage::new("C1", "hi")
            .in_thread(Some("171.1"))
            .broadcast(true);
        assert_eq!(
            serde_json::to_value(&threaded).unwrap(),
            json!({"channel": "C1", "text": "hi", "thread_id": "171.1", "reply_broadcast": true})
        );
    }

    #[tokio::test]
    async fn test_null_transport_accepts_everything() {
        let t = NullTransport;
        t.send_message("C1", "hello", None).await.unwrap();
        assert_eq!(t.identify().await.unwrap(), None);
        assert_eq!(t.name(), "null");
    }
}

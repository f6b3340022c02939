// src/slack/client.rs — Slack Web API client
//
// Only the two methods the bot needs: chat.postMessage and auth.test.
// See https://api.slack.com/methods.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{ChatTransport, OutgoingMessage};

const SLACK_API_BASE: &str = "https://slack.com/api";

pub struct SlackClient {
    client: Client,
    bot_token: String,
    base_url: String,
}

impl SlackClient {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            bot_token: bot_token.into(),
            base_url: SLACK_API_BASE.into(),
        }
    }

    /// Point the client at another API root (a local stub server in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Authenticated POST to a Web API method.
    async fn api_post<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> anyhow::Result<T> {
        let url = format!("{}/{method}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.bot_token)
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("Slack API {method} returned {}", resp.status());
        }

        let body: T = resp.json().await?;
        Ok(body)
    }

    /// Call auth.test and return the identity the token belongs to.
    pub async fn auth_test(&self) -> anyhow::Result<AuthInfo> {
        let resp: AuthTestResp = self.api_post("auth.test", &serde_json::json!({})).await?;
        if !resp.ok {
            anyhow::bail!(
                "Slack auth failed: {}",
                resp.error.unwrap_or_else(|| "unknown".into())
            );
        }
        Ok(AuthInfo {
            user_id: resp.user_id,
            user: resp.user,
            team: resp.team,
        })
    }
}

/// Who the bot token authenticates as.
#[derive(Debug, Clone, Default)]
pub struct AuthInfo {
    pub user_id: Option<String>,
    pub user: Option<String>,
    pub team: Option<String>,
}

// -- Slack API response types --

#[derive(Deserialize)]
struct AuthTestResp {
    ok: bool,
    user_id: Option<String>,
    user: Option<String>,
    team: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChatPostMessageResp {
    ok: bool,
    error: Option<String>,
}

fn post_message_body(message: &OutgoingMessage) -> serde_json::Value {
    let mut body = serde_json::json!({
        "channel": message.channel,
        "text": message.text,
    });
    if let Some(ref thread_ts) = message.thread_id {
        body["thread_ts"] = serde_json::json!(thread_ts);
        if message.reply_broadcast {
            body["reply_broadcast"] = serde_json::json!(true);
        }
    }
    body
}

#[async_trait]
impl ChatTransport for SlackClient {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, message: &OutgoingMessage) -> anyhow::Result<()> {
        let resp: ChatPostMessageResp = self
            .api_post("chat.postMessage", &post_message_body(message))
            .await?;
        if !resp.ok {
            anyhow::bail!(
                "Slack send failed: {}",
                resp.error.unwrap_or_else(|| "unknown".into())
            );
        }
        Ok(())
    }

    async fn identify(&self) -> anyhow::Result<Option<String>> {
        let info = self.auth_test().await?;
        tracing::info!(
            "Authenticated as {} in {}",
            info.user.as_deref().unwrap_or_default(),
            info.team.as_deref().unwrap_or_default()
        );
        Ok(info.user_id)
    }
}

// src/slack/events.rs — Inbound chat event listeners
//
// Plugins subscribe here directly; the plugin manager is not involved in
// inbound delivery. Every matching listener for one event runs concurrently
// and a failing listener never affects the others.

use futures::future::{join_all, BoxFuture};
use regex::Regex;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinSet;

/// Message subtypes that still count as ordinary messages for pattern
/// listeners.
const PLAIN_MESSAGE_SUBTYPES: &[&str] = &["bot_message", "file_share", "thread_broadcast"];

/// An inbound event from the platform (the inner `event` object of an
/// Events API callback).
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEvent {
    pub payload: Value,
}

impl ChatEvent {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    pub fn event_type(&self) -> &str {
        self.str_field("type").unwrap_or_default()
    }

    pub fn subtype(&self) -> Option<&str> {
        self.str_field("subtype")
    }

    pub fn text(&self) -> Option<&str> {
        self.str_field("text")
    }

    pub fn user(&self) -> Option<&str> {
        self.str_field("user")
    }

    pub fn channel(&self) -> Option<&str> {
        self.str_field("channel")
    }

    /// Thread to reply into: the parent thread if any, else the message itself.
    pub fn reply_thread(&self) -> Option<&str> {
        self.str_field("thread_ts").or_else(|| self.str_field("ts"))
    }

    /// Whether the message was posted by a bot (any bot, or this one).
    pub fn is_from_bot(&self, bot_user_id: Option<&str>) -> bool {
        if self.payload.get("bot_id").is_some_and(|v| !v.is_null()) {
            return true;
        }
        matches!((self.user(), bot_user_id), (Some(u), Some(b)) if u == b)
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(Value::as_str)
    }
}

pub type ChatHandler =
    Arc<dyn Fn(ChatEvent) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Debug, Clone)]
enum Matcher {
    Event(String),
    Subtype { event_type: String, subtype: String },
    Message(Regex),
}

impl Matcher {
    fn matches(&self, event: &ChatEvent) -> bool {
        match self {
            Matcher::Event(event_type) => event.event_type() == event_type,
            Matcher::Subtype {
                event_type,
                subtype,
            } => event.event_type() == event_type && event.subtype() == Some(subtype.as_str()),
            Matcher::Message(pattern) => {
                event.event_type() == "message"
                    && event
                        .subtype()
                        .is_none_or(|s| PLAIN_MESSAGE_SUBTYPES.contains(&s))
                    && event.text().is_some_and(|t| pattern.is_match(t))
            }
        }
    }
}

#[derive(Clone)]
struct Listener {
    owner: String,
    matcher: Matcher,
    handler: ChatHandler,
}

/// Registry of inbound listeners plus what the bot knows about itself.
#[derive(Default)]
pub struct ChatEvents {
    listeners: RwLock<Vec<Listener>>,
    bot_user_id: RwLock<Option<String>>,
    /// Deliveries started by the webhook and not yet awaited.
    inflight: Mutex<JoinSet<()>>,
}

impl ChatEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for every event of `event_type`.
    pub fn on_event<F, Fut>(&self, owner: &str, event_type: &str, handler: F)
    where
        F: Fn(ChatEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.push(owner, Matcher::Event(event_type.to_string()), handler);
    }

    /// Listen for `event_type` events carrying `subtype`.
    pub fn on_subtype<F, Fut>(&self, owner: &str, event_type: &str, subtype: &str, handler: F)
    where
        F: Fn(ChatEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.push(
            owner,
            Matcher::Subtype {
                event_type: event_type.to_string(),
                subtype: subtype.to_string(),
            },
            handler,
        );
    }

    /// Listen for plain messages whose text matches `pattern`.
    pub fn on_message<F, Fut>(&self, owner: &str, pattern: Regex, handler: F)
    where
        F: Fn(ChatEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.push(owner, Matcher::Message(pattern), handler);
    }

    fn push<F, Fut>(&self, owner: &str, matcher: Matcher, handler: F)
    where
        F: Fn(ChatEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: ChatHandler = Arc::new(move |event| Box::pin(handler(event)));
        self.listeners
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(Listener {
                owner: owner.to_string(),
                matcher,
                handler,
            });
    }

    /// Run every matching listener. Returns how many listeners matched.
    pub async fn deliver(&self, event: ChatEvent) -> usize {
        let matching: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|l| l.matcher.matches(&event))
            .cloned()
            .collect();

        if matching.is_empty() {
            tracing::trace!(event_type = event.event_type(), "No listeners for chat event");
            return 0;
        }

        let runs = matching.iter().map(|l| (l.handler)(event.clone()));
        let results = join_all(runs).await;
        for (listener, result) in matching.iter().zip(results) {
            if let Err(e) = result {
                tracing::error!(
                    plugin = %listener.owner,
                    event_type = event.event_type(),
                    error = %format!("{e:#}"),
                    "Chat listener failed"
                );
            }
        }
        matching.len()
    }

    /// Deliver on a background task. Shutdown waits for these via `drain`.
    pub fn spawn_delivery(self: &Arc<Self>, event: ChatEvent) {
        let chat = self.clone();
        let mut inflight = self.inflight.lock().unwrap_or_else(|p| p.into_inner());
        while inflight.try_join_next().is_some() {}
        inflight.spawn(async move {
            chat.deliver(event).await;
        });
    }

    /// Wait for background deliveries. Whatever is still running after
    /// `grace` is aborted and then awaited. Returns how many were aborted.
    pub async fn drain(&self, grace: Duration) -> usize {
        let mut inflight = std::mem::take(
            &mut *self.inflight.lock().unwrap_or_else(|p| p.into_inner()),
        );
        let finished = tokio::time::timeout(grace, async {
            while inflight.join_next().await.is_some() {}
        })
        .await;
        if finished.is_ok() {
            return 0;
        }

        let aborted = inflight.len();
        tracing::warn!(aborted, "Aborting chat deliveries still running at shutdown");
        inflight.abort_all();
        // cancellation errors are expected here
        while inflight.join_next().await.is_some() {}
        aborted
    }

    pub fn bot_user_id(&self) -> Option<String> {
        self.bot_user_id
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn set_bot_user_id(&self, id: Option<String>) {
        *self.bot_user_id.write().unwrap_or_else(|p| p.into_inner()) = id;
    }
}

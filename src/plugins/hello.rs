// src/plugins/hello.rs — Greets users who say hello

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Form, Json};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use tracing::Instrument;

use crate::api::types::ErrorResponse;
use crate::core::context::PluginContext;
use crate::core::events::EventRouter;
use crate::core::plugin::{Plugin, PluginDescriptor};
use crate::dashboard::AdminTab;
use crate::security::auth::Identity;
use crate::security::validation::{sanitize_greeting_template, GREETING_TEMPLATE_MAX};
use crate::slack::{ChatEvent, ChatEvents, ChatTransport, OutgoingMessage};
use crate::storage::Storage;

const NAMESPACE: &str = "hello";
const SETTINGS_KEY: &str = "settings";
const COUNTER_KEY: &str = "greetings_sent";
const SETTINGS_ROUTE: &str = "/admin/tabs/hello/settings";

pub const DEFAULT_GREETING: &str = "Hey there {mention}!";

/// Internal event dispatched after every greeting: `{user, channel}`.
pub const GREETED_EVENT: &str = "greeted";

const TEMPLATES: &[(&str, &str)] = &[("tab.html", include_str!("../../templates/hello/tab.html"))];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelloSettings {
    pub greeting_template: String,
    pub broadcast: bool,
}

impl Default for HelloSettings {
    fn default() -> Self {
        Self {
            greeting_template: DEFAULT_GREETING.into(),
            broadcast: false,
        }
    }
}

impl HelloSettings {
    /// The greeting for `user`, with `{mention}` and `{user}` filled in.
    pub fn render(&self, user: &str) -> String {
        let mention = format!("<@{user}>");
        self.greeting_template
            .replace("{mention}", &mention)
            .replace("{user}", &mention)
    }
}

/// Settings form. An unchecked checkbox is simply absent.
#[derive(Debug, Default, Deserialize)]
pub struct HelloSettingsForm {
    #[serde(default)]
    pub greeting_template: Option<String>,
    #[serde(default)]
    pub broadcast: Option<String>,
}

pub async fn load_settings(storage: &dyn Storage) -> anyhow::Result<HelloSettings> {
    let stored = storage.get(NAMESPACE, SETTINGS_KEY).await?;
    Ok(stored
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

pub async fn greetings_sent(storage: &dyn Storage) -> anyhow::Result<u64> {
    let stored = storage.get(NAMESPACE, COUNTER_KEY).await?;
    Ok(stored.and_then(|v| v.as_u64()).unwrap_or(0))
}

struct Greeter {
    storage: Arc<dyn Storage>,
    transport: Arc<dyn ChatTransport>,
    events: Arc<EventRouter>,
    chat: Weak<ChatEvents>,
}

impl Greeter {
    async fn handle(&self, event: ChatEvent) -> anyhow::Result<()> {
        let bot_user_id = self.chat.upgrade().and_then(|chat| chat.bot_user_id());
        if event.is_from_bot(bot_user_id.as_deref()) {
            return Ok(());
        }
        let Some(channel) = event.channel() else {
            return Ok(());
        };
        let user = event.user().unwrap_or("someone");

        let settings = load_settings(self.storage.as_ref()).await?;
        let message = OutgoingMessage::new(channel, settings.render(user))
            .in_thread(event.reply_thread())
            .broadcast(settings.broadcast);
        self.transport.send(&message).await?;
        tracing::debug!("Responded to hello from {}", user);

        let count = greetings_sent(self.storage.as_ref()).await?;
        self.storage
            .set(NAMESPACE, COUNTER_KEY, json!(count + 1))
            .await?;

        let payload = json!({ "user": user, "channel": channel });
        if let Err(e) = self.events.dispatch(GREETED_EVENT, payload).await {
            tracing::warn!("A greeted subscriber failed: {:#}", e);
        }
        Ok(())
    }
}

pub struct HelloPlugin;

impl HelloPlugin {
    pub const DESCRIPTOR: PluginDescriptor = PluginDescriptor::new("hello", "Hello Responder")
        .with_description("Greets users when they say hello.");
}

#[async_trait]
impl Plugin for HelloPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        Self::DESCRIPTOR
    }

    fn register(&self, ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
        let key = Self::DESCRIPTOR.key;
        ctx.dashboard.add_embedded(key, TEMPLATES);

        let greeter = Arc::new(Greeter {
            storage: ctx.storage.clone(),
            transport: ctx.transport.clone(),
            events: ctx.events.clone(),
            chat: Arc::downgrade(&ctx.chat),
        });
        let span = ctx.get_logger(key);
        let pattern = Regex::new(r"(?i)\bhello\b")?;
        ctx.chat.on_message(key, pattern, move |event| {
            let greeter = greeter.clone();
            async move { greeter.handle(event).await }.instrument(span.clone())
        });

        let tab = AdminTab::new(key, "Hello Plugin", "hello/tab.html")
            .with_description("Monitor greetings sent by the Hello responder.")
            .with_order(10)
            .with_provider(|_request, ctx| async move {
                let count = greetings_sent(ctx.storage.as_ref()).await?;
                let settings = load_settings(ctx.storage.as_ref()).await?;
                Ok(json!({
                    "stats": { "greetings_sent": count },
                    "settings": settings,
                }))
            });
        ctx.dashboard.register_tab(tab)?;
        Ok(())
    }

    fn register_routes(&self, ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
        let storage = ctx.storage.clone();
        ctx.routes.register_route(
            Self::DESCRIPTOR.key,
            Method::POST,
            SETTINGS_ROUTE,
            move |Extension(user): Extension<Identity>, Form(form): Form<HelloSettingsForm>| {
                let storage = storage.clone();
                async move { update_settings(storage.as_ref(), &user, form).await }
            },
        )?;
        Ok(())
    }
}

async fn update_settings(storage: &dyn Storage, user: &Identity, form: HelloSettingsForm) -> Response {
    let raw = form.greeting_template.unwrap_or_default();
    // blank falls back to the default rather than failing
    let greeting_template = if raw.trim().is_empty() {
        DEFAULT_GREETING.to_string()
    } else {
        match sanitize_greeting_template(&raw, GREETING_TEMPLATE_MAX) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(user = user.display(), "Invalid greeting template: {}", e);
                return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string())))
                    .into_response();
            }
        }
    };
    let settings = HelloSettings {
        greeting_template,
        broadcast: form.broadcast.as_deref() == Some("on"),
    };

    let saved: anyhow::Result<()> = async {
        let value: Value = serde_json::to_value(&settings)?;
        storage.set(NAMESPACE, SETTINGS_KEY, value).await
    }
    .await;
    if let Err(e) = saved {
        tracing::error!(error = %format!("{e:#}"), "Failed to update hello settings");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Failed to save settings")),
        )
            .into_response();
    }
    tracing::info!(user = user.display(), broadcast = settings.broadcast, "Updated hello settings");
    Redirect::to("/admin/tabs/hello").into_response()
}

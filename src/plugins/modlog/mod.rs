// src/plugins/modlog/mod.rs — Forward moderation events to a log channel

pub mod format;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Form, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::Instrument;

use crate::api::types::ErrorResponse;
use crate::core::context::PluginContext;
use crate::core::plugin::{Plugin, PluginDescriptor};
use crate::dashboard::AdminTab;
use crate::security::auth::Identity;
use crate::security::validation::{
    sanitize_channel_input, validate_channel_identifier, CHANNEL_INPUT_MAX,
};
use crate::slack::{ChatEvent, ChatTransport};
use crate::storage::Storage;

use format::*;

const NAMESPACE: &str = "modlog";
const SETTINGS_KEY: &str = "settings";
const SETTINGS_ROUTE: &str = "/admin/tabs/modlog/settings";

const TEMPLATES: &[(&str, &str)] = &[("tab.html", include_str!("../../../templates/modlog/tab.html"))];

type Formatter = fn(&Value) -> Option<String>;

/// Plain event types and how each is rendered.
const EVENT_FORMATTERS: &[(&str, Formatter)] = &[
    ("team_join", format_team_join_event),
    ("user_change", format_user_change_event),
    ("channel_created", format_channel_created_event),
    ("channel_rename", format_channel_rename_event),
    ("channel_deleted", format_channel_deleted_event),
    ("channel_archive", format_archived),
    ("channel_unarchive", format_unarchived),
];

fn format_archived(event: &Value) -> Option<String> {
    format_channel_archive_event(event, true)
}

fn format_unarchived(event: &Value) -> Option<String> {
    format_channel_archive_event(event, false)
}

/// `message` subtypes and how each is rendered.
const MESSAGE_FORMATTERS: &[(&str, Formatter)] = &[
    ("message_deleted", format_message_deleted_event),
    ("message_changed", format_message_changed_event),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModLogSettings {
    pub channel_id: String,
}

pub async fn load_settings(storage: &dyn Storage) -> anyhow::Result<ModLogSettings> {
    let stored = storage.get(NAMESPACE, SETTINGS_KEY).await?;
    Ok(stored
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

/// Posts formatted events to the configured channel.
struct ModLogger {
    storage: Arc<dyn Storage>,
    transport: Arc<dyn ChatTransport>,
}

impl ModLogger {
    async fn post(&self, text: Option<String>) -> anyhow::Result<()> {
        let Some(text) = text else {
            return Ok(());
        };
        let settings = load_settings(self.storage.as_ref()).await?;
        let channel = settings.channel_id.trim();
        if channel.is_empty() {
            tracing::debug!("Skipping mod log message because no channel is configured");
            return Ok(());
        }
        if let Err(e) = self.transport.send_message(channel, &text, None).await {
            tracing::warn!("Failed to send moderation log message: {:#}", e);
        }
        Ok(())
    }
}

pub struct ModLogPlugin;

impl ModLogPlugin {
    pub const DESCRIPTOR: PluginDescriptor = PluginDescriptor::new("modlog", "Moderation Log")
        .with_description(
            "Captures key moderation events and forwards them to a configured channel.",
        );
}

#[async_trait]
impl Plugin for ModLogPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        Self::DESCRIPTOR
    }

    fn register(&self, ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
        let key = Self::DESCRIPTOR.key;
        ctx.dashboard.add_embedded(key, TEMPLATES);

        let logger = Arc::new(ModLogger {
            storage: ctx.storage.clone(),
            transport: ctx.transport.clone(),
        });
        let span = ctx.get_logger(key);

        for &(event_type, formatter) in EVENT_FORMATTERS {
            let logger = logger.clone();
            let span = span.clone();
            ctx.chat.on_event(key, event_type, move |event: ChatEvent| {
                let logger = logger.clone();
                async move { logger.post(formatter(&event.payload)).await }.instrument(span.clone())
            });
        }
        for &(subtype, formatter) in MESSAGE_FORMATTERS {
            let logger = logger.clone();
            let span = span.clone();
            ctx.chat.on_subtype(key, "message", subtype, move |event: ChatEvent| {
                let logger = logger.clone();
                async move { logger.post(formatter(&event.payload)).await }.instrument(span.clone())
            });
        }

        let tab = AdminTab::new(key, "Mod Log", "modlog/tab.html")
            .with_description("Configure moderation event logging.")
            .with_order(30)
            .with_provider(|_request, ctx| async move {
                let settings = load_settings(ctx.storage.as_ref()).await?;
                let preview = Some(settings.channel_id.as_str())
                    .filter(|c| !c.is_empty())
                    .map(|c| format_channel_reference(Some(c), None));
                Ok(json!({
                    "settings": settings,
                    "channel_preview": preview,
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
            move |Extension(user): Extension<Identity>, Form(form): Form<ModLogSettings>| {
                let storage = storage.clone();
                async move { update_settings(storage.as_ref(), &user, form).await }
            },
        )?;
        Ok(())
    }
}

async fn update_settings(storage: &dyn Storage, user: &Identity, form: ModLogSettings) -> Response {
    let channel_id = match sanitize_channel_input(&form.channel_id, CHANNEL_INPUT_MAX)
        .map(|raw| normalize_channel_identifier(&raw))
        .and_then(|id| validate_channel_identifier(&id).map(|()| id))
    {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(user = user.display(), "Invalid modlog channel input: {}", e);
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string())))
                .into_response();
        }
    };

    let mut settings = match load_settings(storage).await {
        Ok(settings) => settings,
        Err(e) => return storage_error(e),
    };
    settings.channel_id = channel_id;
    let value = match serde_json::to_value(&settings) {
        Ok(value) => value,
        Err(e) => return storage_error(e.into()),
    };
    if let Err(e) = storage.set(NAMESPACE, SETTINGS_KEY, value).await {
        return storage_error(e);
    }
    tracing::info!(user = user.display(), channel = %settings.channel_id, "Updated modlog channel");
    Redirect::to("/admin/tabs/modlog").into_response()
}

fn storage_error(e: anyhow::Error) -> Response {
    tracing::error!(error = %format!("{e:#}"), "Failed to update modlog settings");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Failed to save settings")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    fn operator() -> Identity {
        Identity {
            uid: "op".into(),
            email: None,
        }
    }

    #[tokio::test]
    async fn test_settings_default_when_missing_or_malformed() {
        let storage = InMemoryStorage::new();
        assert_eq!(load_settings(&storage).await.unwrap(), ModLogSettings::default());
        storage
            .set(NAMESPACE, SETTINGS_KEY, json!("not an object"))
            .await
            .unwrap();
        assert_eq!(load_settings(&storage).await.unwrap().channel_id, "");
    }

    #[tokio::test]
    async fn test_update_settings_normalizes_channel() {
        let storage = InMemoryStorage::new();
        let form = ModLogSettings {
            channel_id: "<#C0123ABC|mod-log>".into(),
        };
        let resp = update_settings(&storage, &operator(), form).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(load_settings(&storage).await.unwrap().channel_id, "C0123ABC");
    }

    #[tokio::test]
    async fn test_update_settings_rejects_bad_channel() {
        let storage = InMemoryStorage::new();
        let form = ModLogSettings {
            channel_id: "#bad channel!".into(),
        };
        let resp = update_settings(&storage, &operator(), form).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(storage.get(NAMESPACE, SETTINGS_KEY).await.unwrap(), None);

        let form = ModLogSettings {
            channel_id: "x".repeat(60),
        };
        let resp = update_settings(&storage, &operator(), form).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_blank_channel_clears_setting() {
        let storage = InMemoryStorage::new();
        storage
            .set(NAMESPACE, SETTINGS_KEY, json!({"channel_id": "C1"}))
            .await
            .unwrap();
        let resp = update_settings(&storage, &operator(), ModLogSettings::default()).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(load_settings(&storage).await.unwrap().channel_id, "");
    }
}

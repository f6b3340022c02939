// src/core/plugin.rs — The contract every plugin implements

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::core::context::PluginContext;

/// Static identity of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    /// Unique, URL-safe slug. Also the conventional storage namespace.
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub version: &'static str,
    pub enabled_by_default: bool,
}

impl PluginDescriptor {
    pub const fn new(key: &'static str, name: &'static str) -> Self {
        Self {
            key,
            name,
            description: "",
            version: "0.1.0",
            enabled_by_default: true,
        }
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    pub const fn disabled_by_default(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }
}

/// Non-empty and made of ASCII letters, digits, `-` and `_`.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// A pluggable unit of bot behavior.
///
/// `register` and `register_routes` run synchronously during boot and must not
/// block on I/O; failures there abort startup. `on_startup` failures are logged
/// and leave the plugin unstarted. `on_shutdown` may run even if `on_startup`
/// never completed, and may run more than once.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn descriptor(&self) -> PluginDescriptor;

    /// Wire chat listeners, internal event subscriptions and dashboard tabs.
    fn register(&self, _ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Wire HTTP endpoints, by convention under `/admin/tabs/<key>/`.
    fn register_routes(&self, _ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_startup(&self, _ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_shutdown(&self, _ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
        Ok(())
    }
}

// src/core/context.rs — Collaborator handles shared with every plugin

use std::sync::Arc;
use tracing::Span;

use crate::api::routes::WebRouter;
use crate::core::events::EventRouter;
use crate::dashboard::{DashboardRegistry, TemplateRenderer};
use crate::infra::config::Config;
use crate::infra::logger;
use crate::security::rate_limit::RateLimiter;
use crate::slack::{ChatEvents, ChatTransport};
use crate::storage::Storage;

/// Built once before any plugin registers and never reshaped afterwards.
/// The handles themselves are independently mutable collaborators.
pub struct PluginContext {
    pub config: Arc<Config>,
    /// Outbound chat messages.
    pub transport: Arc<dyn ChatTransport>,
    /// Inbound chat listeners.
    pub chat: Arc<ChatEvents>,
    pub routes: Arc<WebRouter>,
    pub storage: Arc<dyn Storage>,
    pub events: Arc<EventRouter>,
    pub dashboard: Arc<DashboardRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl PluginContext {
    pub fn new(
        config: Config,
        transport: Arc<dyn ChatTransport>,
        storage: Arc<dyn Storage>,
    ) -> Arc<Self> {
        let rate_limiter = Arc::new(RateLimiter::from_config(&config.admin.rate_limit));
        let ctx = Arc::new(Self {
            config: Arc::new(config),
            transport,
            chat: Arc::new(ChatEvents::new()),
            routes: Arc::new(WebRouter::new()),
            storage,
            events: Arc::new(EventRouter::new()),
            dashboard: Arc::new(DashboardRegistry::new(TemplateRenderer::new())),
            rate_limiter,
        });
        ctx.dashboard.attach_context(&ctx);
        ctx
    }

    /// Logging span for `plugins.<key>`.
    pub fn get_logger(&self, key: &str) -> Span {
        logger::plugin_span(key)
    }
}

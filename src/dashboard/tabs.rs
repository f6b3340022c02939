// src/dashboard/tabs.rs — Admin tab definitions

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use crate::core::context::PluginContext;
use crate::security::auth::Identity;

pub const DEFAULT_TAB_ORDER: i32 = 100;

/// Produces the template variables for one tab render. Must yield a JSON
/// object.
pub type TabDataProvider = Arc<
    dyn Fn(TabRequest, Arc<PluginContext>) -> BoxFuture<'static, anyhow::Result<Value>>
        + Send
        + Sync,
>;

/// The parts of an HTTP request a tab may look at. Also exposed to
/// templates as `request`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TabRequest {
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub user: Option<Identity>,
}

impl TabRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct AdminTab {
    pub slug: String,
    pub label: String,
    /// `namespace/file.html`
    pub template: String,
    pub description: String,
    pub icon: Option<String>,
    pub order: i32,
    pub data_provider: Option<TabDataProvider>,
}

impl AdminTab {
    pub fn new(
        slug: impl Into<String>,
        label: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            label: label.into(),
            template: template.into(),
            description: String::new(),
            icon: None,
            order: DEFAULT_TAB_ORDER,
            data_provider: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_provider<F, Fut>(mut self, provider: F) -> Self
    where
        F: Fn(TabRequest, Arc<PluginContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.data_provider = Some(Arc::new(move |req, ctx| Box::pin(provider(req, ctx))));
        self
    }

    /// Sort key: order, then label ignoring case.
    pub(crate) fn sort_key(&self) -> (i32, String) {
        (self.order, self.label.to_lowercase())
    }

    pub fn view(&self) -> TabView {
        TabView {
            slug: self.slug.clone(),
            label: self.label.clone(),
            template: self.template.clone(),
            description: self.description.clone(),
            icon: self.icon.clone(),
            order: self.order,
        }
    }
}

impl std::fmt::Debug for AdminTab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminTab")
            .field("slug", &self.slug)
            .field("label", &self.label)
            .field("order", &self.order)
            .field("has_provider", &self.data_provider.is_some())
            .finish()
    }
}

/// Template-facing view of a tab (`tabs` and `active_tab`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabView {
    pub slug: String,
    pub label: String,
    pub template: String,
    pub description: String,
    pub icon: Option<String>,
    pub order: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_defaults() {
        let tab = AdminTab::new("hello", "Hello Plugin", "hello/tab.html");
        assert_eq!(tab.order, DEFAULT_TAB_ORDER);
        assert!(tab.data_provider.is_none());
        assert!(tab.icon.is_none());
    }

    #[test]
    fn test_sort_key_ignores_case() {
        let a = AdminTab::new("a", "alpha", "x").with_order(20);
        let b = AdminTab::new("b", "Beta", "x").with_order(20);
        assert!(a.sort_key() < b.sort_key());
    }

    #[test]
    fn test_view_carries_display_fields() {
        let view = AdminTab::new("modlog", "Mod Log", "modlog/tab.html")
            .with_order(30)
            .with_icon("shield")
            .with_description("Configure moderation event logging.")
            .view();
        assert_eq!(view.slug, "modlog");
        assert_eq!(view.order, 30);
        assert_eq!(view.icon.as_deref(), Some("shield"));
    }
}

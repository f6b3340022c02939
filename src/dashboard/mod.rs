// src/dashboard/mod.rs — Admin dashboard tab registry
//
// Plugins register self-describing tabs during `register`. Tabs are kept
// sorted by (order, lowercase label); the first one doubles as the index.

pub mod tabs;
pub mod templates;

use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock, Weak};

use crate::core::context::PluginContext;
use crate::infra::errors::BotError;

pub use tabs::{AdminTab, TabDataProvider, TabRequest, TabView, DEFAULT_TAB_ORDER};
pub use templates::TemplateRenderer;

pub const INDEX_TEMPLATE: &str = "admin/index.html";

pub struct DashboardRegistry {
    renderer: TemplateRenderer,
    tabs: RwLock<Vec<AdminTab>>,
    context: OnceLock<Weak<PluginContext>>,
}

impl DashboardRegistry {
    pub fn new(renderer: TemplateRenderer) -> Self {
        Self {
            renderer,
            tabs: RwLock::new(Vec::new()),
            context: OnceLock::new(),
        }
    }

    /// Bind the context handed to data providers. Only the first call counts.
    pub fn attach_context(&self, ctx: &Arc<PluginContext>) {
        if self.context.set(Arc::downgrade(ctx)).is_err() {
            tracing::debug!("Dashboard context already attached");
        }
    }

    /// Add a tab. A duplicate slug is rejected and leaves the registry as it was.
    pub fn register_tab(&self, tab: AdminTab) -> Result<(), BotError> {
        let mut tabs = self.tabs.write().unwrap_or_else(|p| p.into_inner());
        if tabs.iter().any(|t| t.slug == tab.slug) {
            return Err(BotError::DuplicateTabSlug { slug: tab.slug });
        }
        tracing::debug!(slug = %tab.slug, order = tab.order, "Registered dashboard tab");
        tabs.push(tab);
        tabs.sort_by_cached_key(AdminTab::sort_key);
        Ok(())
    }

    /// Tabs in display order.
    pub fn tabs(&self) -> Vec<TabView> {
        self.tabs
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(AdminTab::view)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tabs.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add_template_dir(&self, namespace: &str, path: &Path) -> Result<(), BotError> {
        self.renderer.add_template_dir(namespace, path)
    }

    pub fn add_embedded(&self, namespace: &str, templates: &[(&'static str, &'static str)]) {
        self.renderer.add_embedded(namespace, templates)
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// The first tab, or the empty shell when no tab is registered.
    pub async fn render_index(&self, request: TabRequest) -> Result<String, BotError> {
        let first = self
            .tabs
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .first()
            .map(|t| t.slug.clone());

        match first {
            Some(slug) => self.render_tab(&slug, request).await,
            None => self.renderer.render(
                INDEX_TEMPLATE,
                serde_json::json!({ "request": request, "tabs": [] }),
            ),
        }
    }

    pub async fn render_tab(&self, slug: &str, request: TabRequest) -> Result<String, BotError> {
        let tab = self
            .tabs
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .find(|t| t.slug == slug)
            .cloned()
            .ok_or_else(|| BotError::TabNotFound {
                slug: slug.to_string(),
            })?;

        let mut data = self.resolve_data(&tab, &request).await?;
        data.insert("request".into(), to_json(&request)?);
        data.insert("tabs".into(), to_json(self.tabs())?);
        data.insert("active_tab".into(), to_json(tab.view())?);

        self.renderer.render(&tab.template, Value::Object(data))
    }

    async fn resolve_data(
        &self,
        tab: &AdminTab,
        request: &TabRequest,
    ) -> Result<Map<String, Value>, BotError> {
        let Some(provider) = tab.data_provider.clone() else {
            return Ok(Map::new());
        };
        let ctx = self
            .context
            .get()
            .and_then(Weak::upgrade)
            .ok_or(BotError::MissingContext)?;

        match provider(request.clone(), ctx).await? {
            Value::Object(map) => Ok(map),
            _ => Err(BotError::InvalidTabData {
                slug: tab.slug.clone(),
            }),
        }
    }
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, BotError> {
    serde_json::to_value(value).map_err(|e| BotError::Other(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> DashboardRegistry {
        DashboardRegistry::new(TemplateRenderer::new())
    }

    fn slugs(reg: &DashboardRegistry) -> Vec<String> {
        reg.tabs().into_iter().map(|t| t.slug).collect()
    }

    #[test]
    fn test_tabs_sorted_by_order_then_label() {
        let reg = registry();
        reg.register_tab(AdminTab::new("x", "Zeta", "admin/index.html").with_order(20))
            .unwrap();
        reg.register_tab(AdminTab::new("y", "Alpha", "admin/index.html").with_order(20))
            .unwrap();
        reg.register_tab(AdminTab::new("z", "Last", "admin/index.html")).unwrap();
        reg.register_tab(AdminTab::new("w", "first", "admin/index.html").with_order(0))
            .unwrap();
        assert_eq!(slugs(&reg), vec!["w", "y", "x", "z"]);
    }

    #[test]
    fn test_duplicate_slug_leaves_registry_unchanged() {
        let reg = registry();
        reg.register_tab(AdminTab::new("hello", "Hello", "hello/tab.html"))
            .unwrap();
        let err = reg
            .register_tab(AdminTab::new("hello", "Other", "other/tab.html").with_order(1))
            .unwrap_err();
        assert!(matches!(err, BotError::DuplicateTabSlug { ref slug } if slug == "hello"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.tabs()[0].label, "Hello");
    }

    #[tokio::test]
    async fn test_empty_registry_renders_shell() {
        let reg = registry();
        let html = reg.render_index(TabRequest::new("/admin")).await.unwrap();
        assert!(html.contains("No dashboard tabs"));
    }

    #[tokio::test]
    async fn test_unknown_slug_is_not_found() {
        let reg = registry();
        let err = reg
            .render_tab("missing", TabRequest::new("/admin/tabs/missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::TabNotFound { .. }));
    }

    #[tokio::test]
    async fn test_provider_without_context_fails() {
        let reg = registry();
        reg.register_tab(
            AdminTab::new("p", "P", "admin/index.html")
                .with_provider(|_req, _ctx| async { Ok(serde_json::json!({})) }),
        )
        .unwrap();
        let err = reg.render_tab("p", TabRequest::new("/")).await.unwrap_err();
        assert!(matches!(err, BotError::MissingContext));
    }
}

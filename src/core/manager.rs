// src/core/manager.rs — Plugin lifecycle orchestration
//
// Three phases, each strictly sequential in discovery order:
//   register: register + register_routes, first failure aborts boot
//   startup: on_startup, failures logged and isolated
//   shutdown: on_shutdown, always attempted, failures logged

use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

use crate::core::context::PluginContext;
use crate::core::discovery::LoadedPlugin;
use crate::infra::errors::BotError;
use crate::infra::logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    Unregistered,
    Registered,
    Started,
    StartFailed,
    Stopped,
}

impl PluginState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Registered => "registered",
            Self::Started => "started",
            Self::StartFailed => "start_failed",
            Self::Stopped => "stopped",
        }
    }
}

struct ManagedPlugin {
    plugin: LoadedPlugin,
    state: Mutex<PluginState>,
}

impl ManagedPlugin {
    fn state(&self) -> PluginState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, state: PluginState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }
}

/// Serializable view of one plugin for the CLI and the overview tab.
#[derive(Debug, Clone, Serialize)]
pub struct PluginSummary {
    pub key: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub source: String,
    pub state: PluginState,
}

/// Outcome of a best-effort phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LifecycleReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl LifecycleReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns the loaded plugin set for the process lifetime. The set never
/// changes after construction.
pub struct PluginManager {
    plugins: Vec<ManagedPlugin>,
}

impl PluginManager {
    pub fn new(plugins: Vec<LoadedPlugin>) -> Self {
        Self {
            plugins: plugins
                .into_iter()
                .map(|plugin| ManagedPlugin {
                    plugin,
                    state: Mutex::new(PluginState::Unregistered),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Keys in lifecycle order.
    pub fn keys(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|m| m.plugin.key()).collect()
    }

    pub fn state_of(&self, key: &str) -> Option<PluginState> {
        self.plugins
            .iter()
            .find(|m| m.plugin.key() == key)
            .map(ManagedPlugin::state)
    }

    /// Call `register` then `register_routes` on every plugin.
    pub fn register_all(&self, ctx: &Arc<PluginContext>) -> Result<(), BotError> {
        for managed in &self.plugins {
            let key = managed.plugin.key();
            let span = logger::plugin_span(key);
            let _entered = span.enter();
            let instance = managed.plugin.instance();

            instance
                .register(ctx)
                .and_then(|()| instance.register_routes(ctx))
                .map_err(|source| {
                    error!(plugin = %key, error = %source, "Plugin registration failed");
                    BotError::Registration {
                        key: key.to_string(),
                        source,
                    }
                })?;

            managed.set_state(PluginState::Registered);
            info!(plugin = %key, "Plugin registered");
        }
        Ok(())
    }

    /// Await `on_startup` on each registered plugin. A failing plugin is left
    /// unstarted and the remaining plugins still start.
    pub async fn startup(&self, ctx: &Arc<PluginContext>) -> LifecycleReport {
        let mut report = LifecycleReport::default();
        for managed in &self.plugins {
            let key = managed.plugin.key();
            if managed.state() != PluginState::Registered {
                warn!(plugin = %key, state = managed.state().as_str(), "Skipping startup");
                continue;
            }

            let start = Instant::now();
            let result = managed
                .plugin
                .instance()
                .on_startup(ctx)
                .instrument(logger::plugin_span(key))
                .await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(()) => {
                    managed.set_state(PluginState::Started);
                    info!(plugin = %key, elapsed_ms, "Plugin started");
                    report.succeeded.push(key.to_string());
                }
                Err(e) => {
                    managed.set_state(PluginState::StartFailed);
                    error!(plugin = %key, elapsed_ms, error = %format!("{e:#}"), "Plugin startup failed");
                    report.failed.push(key.to_string());
                }
            }
        }
        report
    }

    /// Await `on_shutdown` on every plugin, whatever state it reached.
    /// Calling this twice re-runs the hooks; plugins must tolerate that.
    pub async fn shutdown(&self, ctx: &Arc<PluginContext>) -> LifecycleReport {
        let mut report = LifecycleReport::default();
        for managed in &self.plugins {
            let key = managed.plugin.key();
            let result = managed
                .plugin
                .instance()
                .on_shutdown(ctx)
                .instrument(logger::plugin_span(key))
                .await;

            managed.set_state(PluginState::Stopped);
            match result {
                Ok(()) => {
                    info!(plugin = %key, "Plugin stopped");
                    report.succeeded.push(key.to_string());
                }
                Err(e) => {
                    error!(plugin = %key, error = %format!("{e:#}"), "Plugin shutdown failed");
                    report.failed.push(key.to_string());
                }
            }
        }
        report
    }

    pub fn summaries(&self) -> Vec<PluginSummary> {
        self.plugins
            .iter()
            .map(|m| {
                let d = &m.plugin.descriptor;
                PluginSummary {
                    key: d.key.to_string(),
                    name: d.name.to_string(),
                    description: d.description.to_string(),
                    version: d.version.to_string(),
                    source: m.plugin.source.clone(),
                    state: m.state(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plugin::{Plugin, PluginDescriptor};
    use crate::infra::config::Config;
    use crate::slack::NullTransport;
    use crate::storage::InMemoryStorage;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct Recording {
        descriptor: PluginDescriptor,
        log: CallLog,
        fail_register: bool,
        fail_startup: bool,
        fail_shutdown: bool,
    }

    impl Recording {
        fn new(key: &'static str, log: &CallLog) -> Self {
            Self {
                descriptor: PluginDescriptor::new(key, key),
                log: log.clone(),
                fail_register: false,
                fail_startup: false,
                fail_shutdown: false,
            }
        }

        fn push(&self, hook: &str) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{hook}", self.descriptor.key));
        }
    }

    #[async_trait]
    impl Plugin for Recording {
        fn descriptor(&self) -> PluginDescriptor {
            self.descriptor
        }

        fn register(&self, _ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
            self.push("register");
            if self.fail_register {
                anyhow::bail!("bad wiring");
            }
            Ok(())
        }

        fn register_routes(&self, _ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
            self.push("routes");
            Ok(())
        }

        async fn on_startup(&self, _ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
            self.push("startup");
            if self.fail_startup {
                anyhow::bail!("cannot start");
            }
            Ok(())
        }

        async fn on_shutdown(&self, _ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
            self.push("shutdown");
            if self.fail_shutdown {
                anyhow::bail!("cannot stop");
            }
            Ok(())
        }
    }

    fn context() -> Arc<PluginContext> {
        PluginContext::new(
            Config::default(),
            Arc::new(NullTransport),
            Arc::new(InMemoryStorage::new()),
        )
    }

    fn manager(plugins: Vec<Recording>) -> PluginManager {
        PluginManager::new(
            plugins
                .into_iter()
                .map(|p| LoadedPlugin::new("builtin", Arc::new(p)))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_phases_run_in_order() {
        let log: CallLog = Arc::default();
        let mgr = manager(vec![Recording::new("a", &log), Recording::new("b", &log)]);
        let ctx = context();

        mgr.register_all(&ctx).unwrap();
        assert!(mgr.startup(&ctx).await.is_clean());
        assert!(mgr.shutdown(&ctx).await.is_clean());

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:register", "a:routes", "b:register", "b:routes", "a:startup", "b:startup",
                "a:shutdown", "b:shutdown",
            ]
        );
        assert_eq!(mgr.state_of("a"), Some(PluginState::Stopped));
    }

    #[tokio::test]
    async fn test_register_failure_aborts() {
        let log: CallLog = Arc::default();
        let mut bad = Recording::new("a", &log);
        bad.fail_register = true;
        let mgr = manager(vec![bad, Recording::new("b", &log)]);

        let err = mgr.register_all(&context()).unwrap_err();
        assert!(matches!(err, BotError::Registration { ref key, .. } if key == "a"));
        assert_eq!(*log.lock().unwrap(), vec!["a:register"]);
        assert_eq!(mgr.state_of("b"), Some(PluginState::Unregistered));
    }

    #[tokio::test]
    async fn test_startup_failure_is_isolated() {
        let log: CallLog = Arc::default();
        let mut bad = Recording::new("a", &log);
        bad.fail_startup = true;
        let mgr = manager(vec![bad, Recording::new("b", &log)]);
        let ctx = context();
        mgr.register_all(&ctx).unwrap();

        let report = mgr.startup(&ctx).await;
        assert_eq!(report.failed, vec!["a".to_string()]);
        assert_eq!(report.succeeded, vec!["b".to_string()]);
        assert_eq!(mgr.state_of("a"), Some(PluginState::StartFailed));
        assert_eq!(mgr.state_of("b"), Some(PluginState::Started));
    }

    #[tokio::test]
    async fn test_shutdown_is_best_effort_and_repeatable() {
        let log: CallLog = Arc::default();
        let mut bad = Recording::new("a", &log);
        bad.fail_shutdown = true;
        let mgr = manager(vec![bad, Recording::new("b", &log)]);
        let ctx = context();

        // never started: shutdown still reaches every plugin
        let first = mgr.shutdown(&ctx).await;
        assert_eq!(first.failed, vec!["a".to_string()]);
        assert_eq!(first.succeeded, vec!["b".to_string()]);

        let second = mgr.shutdown(&ctx).await;
        assert_eq!(second, first);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:shutdown", "b:shutdown", "a:shutdown", "b:shutdown"]
        );
    }

    #[tokio::test]
    async fn test_startup_skips_unregistered() {
        let log: CallLog = Arc::default();
        let mgr = manager(vec![Recording::new("a", &log)]);
        let report = mgr.startup(&context()).await;
        assert!(report.succeeded.is_empty());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_summaries() {
        let log: CallLog = Arc::default();
        let mgr = manager(vec![Recording::new("hello", &log)]);
        let summaries = mgr.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].key, "hello");
        assert_eq!(summaries[0].source, "builtin");
        assert_eq!(summaries[0].state, PluginState::Unregistered);
        assert_eq!(mgr.keys(), vec!["hello"]);
    }
}

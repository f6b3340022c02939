// tests/plugin_lifecycle_test.rs — Integration test: discovery → register → startup → shutdown

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};

use zabot::core::discovery::{discover, DiscoveryOptions, PluginCatalog, PluginSource, PluginUnit};
use zabot::core::{Plugin, PluginContext, PluginDescriptor, PluginManager, PluginState};
use zabot::infra::config::{Config, DuplicateKeyPolicy};
use zabot::infra::errors::BotError;
use zabot::slack::NullTransport;
use zabot::storage::InMemoryStorage;

type Journal = Arc<Mutex<Vec<String>>>;

/// Records every hook call into a shared journal.
struct Probe {
    descriptor: PluginDescriptor,
    journal: Journal,
    fail_startup: bool,
    fail_register: bool,
}

impl Probe {
    fn new(key: &'static str, journal: &Journal) -> Self {
        Self {
            descriptor: PluginDescriptor::new(key, key),
            journal: journal.clone(),
            fail_startup: false,
            fail_register: false,
        }
    }

    fn log(&self, hook: &str) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:{hook}", self.descriptor.key));
    }
}

#[async_trait]
impl Plugin for Probe {
    fn descriptor(&self) -> PluginDescriptor {
        self.descriptor
    }

    fn register(&self, _ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
        self.log("register");
        if self.fail_register {
            anyhow::bail!("listener wiring failed");
        }
        Ok(())
    }

    fn register_routes(&self, _ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
        self.log("routes");
        Ok(())
    }

    async fn on_startup(&self, _ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
        self.log("startup");
        if self.fail_startup {
            anyhow::bail!("could not reach upstream");
        }
        Ok(())
    }

    async fn on_shutdown(&self, _ctx: &Arc<PluginContext>) -> anyhow::Result<()> {
        self.log("shutdown");
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

fn options(enabled: &[&str]) -> DiscoveryOptions {
    DiscoveryOptions {
        sources: vec!["local".into()],
        enabled: enabled.iter().map(|s| s.to_string()).collect(),
        on_duplicate_key: DuplicateKeyPolicy::Error,
    }
}

fn catalog_of(probes: Vec<Probe>) -> PluginCatalog {
    let source = probes.into_iter().fold(PluginSource::new("local"), |src, probe| {
        let key = probe.descriptor.key;
        let plugin: Arc<dyn Plugin> = Arc::new(probe);
        src.with_candidate(key, move || Ok(PluginUnit::instance(plugin.clone())))
    });
    PluginCatalog::new().with_source(source)
}

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

#[test]
fn test_enabled_by_default_scenario() {
    let j = journal();
    let mut b = Probe::new("b", &j);
    b.descriptor = b.descriptor.disabled_by_default();
    let catalog = catalog_of(vec![Probe::new("a", &j), b, Probe::new("c", &j)]);

    let loaded = discover(&catalog, &options(&[])).unwrap();
    let keys: Vec<_> = loaded.iter().map(|p| p.key()).collect();
    assert_eq!(keys, vec!["a", "c"]);
}

#[test]
fn test_allow_list_overrides_enabled_by_default() {
    let j = journal();
    let mut hello = Probe::new("hello", &j);
    hello.descriptor = hello.descriptor.disabled_by_default();
    let catalog = catalog_of(vec![Probe::new("other", &j), hello]);

    let loaded = discover(&catalog, &options(&["hello"])).unwrap();
    let keys: Vec<_> = loaded.iter().map(|p| p.key()).collect();
    assert_eq!(keys, vec!["hello"]);
}

#[test]
fn test_duplicate_key_policies() {
    let j = journal();
    let local = PluginSource::new("local").with_candidate("dup", {
        let j = j.clone();
        move || Ok(PluginUnit::instance(Arc::new(Probe::new("dup", &j))))
    });
    let vendor = PluginSource::new("vendor").with_candidate("dup", {
        let j = j.clone();
        move || Ok(PluginUnit::instance(Arc::new(Probe::new("dup", &j))))
    });
    let catalog = PluginCatalog::new().with_source(local).with_source(vendor);

    let mut opts = options(&[]);
    opts.sources = vec!["local".into(), "vendor".into()];
    let err = discover(&catalog, &opts).unwrap_err();
    assert!(matches!(err, BotError::DuplicatePluginKey { ref source_name, .. } if source_name == "local"));

    opts.on_duplicate_key = DuplicateKeyPolicy::Warn;
    let loaded = discover(&catalog, &opts).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].source, "local");
}

#[tokio::test]
async fn test_full_lifecycle_order_and_fault_isolation() {
    let j = journal();
    let mut a = Probe::new("a", &j);
    a.fail_startup = true;
    let catalog = catalog_of(vec![a, Probe::new("b", &j)]);
    let manager = PluginManager::new(discover(&catalog, &options(&[])).unwrap());
    let ctx = context();

    manager.register_all(&ctx).unwrap();
    let report = manager.startup(&ctx).await;
    assert_eq!(report.failed, vec!["a"]);
    assert_eq!(report.succeeded, vec!["b"]);
    assert_eq!(manager.state_of("a"), Some(PluginState::StartFailed));
    assert_eq!(manager.state_of("b"), Some(PluginState::Started));

    manager.shutdown(&ctx).await;
    // a second shutdown re-runs the hooks without failing
    assert!(manager.shutdown(&ctx).await.is_clean());

    assert_eq!(
        j.lock().unwrap().clone(),
        vec![
            "a:register", "a:routes", "b:register", "b:routes",
            "a:startup", "b:startup",
            "a:shutdown", "b:shutdown",
            "a:shutdown", "b:shutdown",
        ]
    );
}

#[tokio::test]
async fn test_registration_failure_aborts_boot() {
    let j = journal();
    let mut a = Probe::new("a", &j);
    a.fail_register = true;
    let catalog = catalog_of(vec![a, Probe::new("b", &j)]);
    let manager = PluginManager::new(discover(&catalog, &options(&[])).unwrap());

    let err = manager.register_all(&context()).unwrap_err();
    assert!(matches!(err, BotError::Registration { ref key, .. } if key == "a"));
    assert!(err.is_configuration());
    assert_eq!(j.lock().unwrap().clone(), vec!["a:register"]);
    assert_eq!(manager.state_of("b"), Some(PluginState::Unregistered));
}

#[tokio::test]
async fn test_greeted_subscribers_run_in_subscription_order() {
    let ctx = context();
    let calls: Journal = journal();
    for name in ["h1", "h2"] {
        let calls = calls.clone();
        ctx.events.subscribe("greeted", move |_, payload| {
            calls.lock().unwrap().push(format!("{name}({payload})"));
            async { Ok::<(), anyhow::Error>(()) }
        });
    }

    ctx.events.dispatch("greeted", json!({"user": "U1"})).await.unwrap();
    assert_eq!(
        calls.lock().unwrap().clone(),
        vec![r#"h1({"user":"U1"})"#, r#"h2({"user":"U1"})"#]
    );
    ctx.events.dispatch("nobody-listens", json!(null)).await.unwrap();
}

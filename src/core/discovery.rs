// src/core/discovery.rs — Locate, load and filter plugin candidates
//
// Plugins are compiled in. Each source is a named catalog of candidate units;
// a unit's loader may fail, and a loaded unit offers a plugin as a ready
// instance, a no-argument constructor, or a fallible factory (checked in that
// order). Broken candidates are logged and skipped; discovery never aborts
// over a single plugin except for a duplicate key under the `error` policy.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::plugin::{is_valid_key, Plugin, PluginDescriptor};
use crate::infra::config::{DuplicateKeyPolicy, PluginsConfig};
use crate::infra::errors::BotError;

pub type UnitLoader = Arc<dyn Fn() -> anyhow::Result<PluginUnit> + Send + Sync>;
pub type PluginConstructor = Box<dyn Fn() -> Arc<dyn Plugin> + Send + Sync>;
pub type PluginFactory = Box<dyn Fn() -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync>;

/// What a loaded candidate exposes.
#[derive(Default)]
pub struct PluginUnit {
    instance: Option<Arc<dyn Plugin>>,
    constructor: Option<PluginConstructor>,
    factory: Option<PluginFactory>,
}

impl PluginUnit {
    /// A unit exposing nothing; extraction will fail.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn instance(plugin: Arc<dyn Plugin>) -> Self {
        Self::empty().with_instance(plugin)
    }

    pub fn constructor<F>(f: F) -> Self
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        Self::empty().with_constructor(f)
    }

    pub fn factory<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        Self::empty().with_factory(f)
    }

    pub fn with_instance(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.instance = Some(plugin);
        self
    }

    pub fn with_constructor<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        self.constructor = Some(Box::new(f));
        self
    }

    pub fn with_factory<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        self.factory = Some(Box::new(f));
        self
    }

    /// First conforming plugin: instance, then constructor, then factory.
    fn extract(self, unit_name: &str) -> Option<Arc<dyn Plugin>> {
        if let Some(plugin) = self.instance {
            return Some(plugin);
        }
        if let Some(constructor) = self.constructor {
            return Some(constructor());
        }
        if let Some(factory) = self.factory {
            match factory() {
                Ok(plugin) => return Some(plugin),
                Err(e) => warn!("Plugin factory in {} failed: {:#}", unit_name, e),
            }
        }
        None
    }
}

/// A candidate unit inside a source.
#[derive(Clone)]
pub struct PluginCandidate {
    pub name: String,
    loader: UnitLoader,
}

/// A named collection of candidates, enumerated in insertion order.
#[derive(Clone)]
pub struct PluginSource {
    pub name: String,
    candidates: Vec<PluginCandidate>,
}

impl PluginSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            candidates: Vec::new(),
        }
    }

    /// Add a candidate. Names starting with `_` are private and never loaded.
    pub fn with_candidate<F>(mut self, name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<PluginUnit> + Send + Sync + 'static,
    {
        self.candidates.push(PluginCandidate {
            name: name.into(),
            loader: Arc::new(loader),
        });
        self
    }

    pub fn candidates(&self) -> &[PluginCandidate] {
        &self.candidates
    }
}

/// Every source the binary knows about.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    sources: Vec<PluginSource>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: PluginSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source(&self, name: &str) -> Option<&PluginSource> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// A descriptor bound to its live instance. Owned by the manager for the
/// process lifetime.
#[derive(Clone)]
pub struct LoadedPlugin {
    pub descriptor: PluginDescriptor,
    /// Source the plugin was discovered in.
    pub source: String,
    instance: Arc<dyn Plugin>,
}

impl LoadedPlugin {
    pub fn new(source: impl Into<String>, instance: Arc<dyn Plugin>) -> Self {
        Self {
            descriptor: instance.descriptor(),
            source: source.into(),
            instance,
        }
    }

    pub fn key(&self) -> &'static str {
        self.descriptor.key
    }

    pub fn instance(&self) -> &Arc<dyn Plugin> {
        &self.instance
    }
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("key", &self.descriptor.key)
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    pub sources: Vec<String>,
    /// Authoritative when non-empty.
    pub enabled: Vec<String>,
    pub on_duplicate_key: DuplicateKeyPolicy,
}

impl DiscoveryOptions {
    pub fn from_config(config: &PluginsConfig) -> Self {
        Self {
            sources: config.sources.clone(),
            enabled: config.enabled.clone(),
            on_duplicate_key: config.on_duplicate_key,
        }
    }
}

/// Load the enabled plugins in traversal order (source order, then candidate
/// order within each source).
pub fn discover(
    catalog: &PluginCatalog,
    options: &DiscoveryOptions,
) -> Result<Vec<LoadedPlugin>, BotError> {
    let enabled: HashSet<&str> = options.enabled.iter().map(String::as_str).collect();
    let mut loaded: Vec<LoadedPlugin> = Vec::new();
    let mut seen: HashMap<&'static str, String> = HashMap::new();

    for source_name in &options.sources {
        let Some(source) = catalog.source(source_name) else {
            warn!("Plugin source {} is not registered; skipping discovery", source_name);
            continue;
        };

        for candidate in source.candidates() {
            if candidate.name.starts_with('_') {
                debug!("Skipping private plugin unit {}.{}", source.name, candidate.name);
                continue;
            }
            let unit_name = format!("{}.{}", source.name, candidate.name);

            let unit = match (candidate.loader)() {
                Ok(unit) => unit,
                Err(e) => {
                    warn!("Skipping plugin {}: {:#}", unit_name, e);
                    continue;
                }
            };

            let Some(plugin) = unit.extract(&unit_name) else {
                warn!("Unit {} does not expose a plugin instance", unit_name);
                continue;
            };

            let descriptor = plugin.descriptor();
            if !is_valid_key(descriptor.key) {
                let err = BotError::InvalidPluginKey {
                    key: descriptor.key.to_string(),
                };
                warn!("Skipping plugin {}: {}", unit_name, err);
                continue;
            }

            if !enabled.is_empty() && !enabled.contains(descriptor.key) {
                info!("Plugin {} disabled via configuration", descriptor.key);
                continue;
            }
            if enabled.is_empty() && !descriptor.enabled_by_default {
                info!("Plugin {} disabled by default", descriptor.key);
                continue;
            }

            if let Some(first_source) = seen.get(descriptor.key) {
                let err = BotError::DuplicatePluginKey {
                    key: descriptor.key.to_string(),
                    source_name: first_source.clone(),
                };
                match options.on_duplicate_key {
                    DuplicateKeyPolicy::Error => return Err(err),
                    DuplicateKeyPolicy::Warn => {
                        warn!("Ignoring {}: {}", unit_name, err);
                        continue;
                    }
                }
            }

            info!("Loaded plugin {} ({})", descriptor.key, descriptor.name);
            seen.insert(descriptor.key, source.name.clone());
            loaded.push(LoadedPlugin::new(source.name.clone(), plugin));
        }
    }

    for key in &options.enabled {
        if !seen.contains_key(key.as_str()) {
            warn!("Enabled plugin {} was not found in any source", key);
        }
    }

    Ok(loaded)
}

// src/core/mod.rs — Plugin lifecycle and internal event routing

pub mod context;
pub mod discovery;
pub mod events;
pub mod manager;
pub mod plugin;

pub use context::PluginContext;
pub use discovery::{discover, DiscoveryOptions, LoadedPlugin, PluginCatalog, PluginSource, PluginUnit};
pub use events::EventRouter;
pub use manager::{LifecycleReport, PluginManager, PluginState, PluginSummary};
pub use plugin::{Plugin, PluginDescriptor};

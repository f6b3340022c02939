// src/plugins/mod.rs — Plugins compiled into the binary
//
// The `builtin` source lists every bundled plugin. Discovery decides which of
// them actually load.

pub mod hello;
pub mod modlog;

use std::sync::Arc;

use crate::core::discovery::{PluginCatalog, PluginSource, PluginUnit};
use crate::core::plugin::Plugin;

pub use hello::HelloPlugin;
pub use modlog::ModLogPlugin;

pub const BUILTIN_SOURCE: &str = "builtin";

pub fn builtin_source() -> PluginSource {
    PluginSource::new(BUILTIN_SOURCE)
        .with_candidate("hello", || Ok(PluginUnit::instance(Arc::new(HelloPlugin))))
        .with_candidate("modlog", || {
            Ok(PluginUnit::constructor(|| Arc::new(ModLogPlugin) as Arc<dyn Plugin>))
        })
}

/// Every source this binary can discover from.
pub fn catalog() -> PluginCatalog {
    PluginCatalog::new().with_source(builtin_source())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::discovery::{discover, DiscoveryOptions};
    use crate::infra::config::PluginsConfig;

    #[test]
    fn test_builtin_plugins_discovered_in_order() {
        let options = DiscoveryOptions::from_config(&PluginsConfig::default());
        let loaded = discover(&catalog(), &options).unwrap();
        let keys: Vec<_> = loaded.iter().map(|p| p.key()).collect();
        assert_eq!(keys, vec!["hello", "modlog"]);
        assert!(loaded.iter().all(|p| p.source == BUILTIN_SOURCE));
    }

    #[test]
    fn test_allow_list_selects_builtin() {
        let options = DiscoveryOptions {
            sources: vec![BUILTIN_SOURCE.into()],
            enabled: vec!["modlog".into()],
            ..Default::default()
        };
        let loaded = discover(&catalog(), &options).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].descriptor.name, "Moderation Log");
    }
}

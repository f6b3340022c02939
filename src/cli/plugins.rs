// src/cli/plugins.rs — `zabot plugins`: show what discovery would load

use crate::core::discovery::{discover, DiscoveryOptions, LoadedPlugin};
use crate::infra::config::Config;
use crate::plugins;

pub fn run_plugins(config: &Config) -> anyhow::Result<()> {
    let options = DiscoveryOptions::from_config(&config.plugins);
    let loaded = discover(&plugins::catalog(), &options)?;

    if loaded.is_empty() {
        println!("No plugins enabled (sources: {})", options.sources.join(", "));
        return Ok(());
    }
    for line in render_table(&loaded) {
        println!("{line}");
    }
    Ok(())
}

fn render_table(loaded: &[LoadedPlugin]) -> Vec<String> {
    let key_width = loaded
        .iter()
        .map(|p| p.key().len())
        .max()
        .unwrap_or(0)
        .max("KEY".len());

    let mut lines = vec![format!("{:<key_width$}  {:<8}  {:<10}  NAME", "KEY", "VERSION", "SOURCE")];
    lines.extend(loaded.iter().map(|p| {
        format!(
            "{:<key_width$}  {:<8}  {:<10}  {}",
            p.key(),
            p.descriptor.version,
            p.source,
            p.descriptor.name
        )
    }));
    lines
}

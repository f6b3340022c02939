// src/infra/logger.rs — Structured logging with tracing

use tracing::Span;
use tracing_subscriber::{fmt, EnvFilter};

/// Target shared by every per-plugin span.
pub const PLUGIN_TARGET: &str = "plugins";

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_ascii_lowercase()));

    // try_init: tests and the CLI may both get here
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}

/// Span scoping log lines to one plugin (`plugins.<key>`).
pub fn plugin_span(key: &str) -> Span {
    tracing::info_span!(
        target: PLUGIN_TARGET,
        "plugin",
        plugin = %key,
        logger = %format!("{PLUGIN_TARGET}.{key}")
    )
}

// src/infra/errors.rs — Error types for zabot

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    // Plugin configuration errors (fatal at startup)
    #[error("Plugin key '{key}' is already loaded (from source '{source_name}')")]
    DuplicatePluginKey { key: String, source_name: String },

    #[error("Plugin key '{key}' is not a URL-safe slug")]
    InvalidPluginKey { key: String },

    #[error("Plugin '{key}' failed to register: {source}")]
    Registration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    // Dashboard errors
    #[error("Dashboard tab with slug '{slug}' already registered")]
    DuplicateTabSlug { slug: String },

    #[error("Dashboard tab '{slug}' not found")]
    TabNotFound { slug: String },

    #[error("Data provider for tab '{slug}' must return a key/value mapping")]
    InvalidTabData { slug: String },

    #[error("Dashboard registry has no plugin context attached")]
    MissingContext,

    #[error("Template directory {path} does not exist")]
    TemplateDirMissing { path: String },

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    // Web routing
    #[error("Route {method} {path} is already registered")]
    DuplicateRoute { method: String, path: String },

    #[error("HTTP method {method} cannot be routed")]
    UnsupportedMethod { method: String },

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BotError {
    /// Configuration defects must be fixed before deployment; they abort boot.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BotError::DuplicatePluginKey { .. }
                | BotError::InvalidPluginKey { .. }
                | BotError::Registration { .. }
                | BotError::DuplicateTabSlug { .. }
                | BotError::DuplicateRoute { .. }
                | BotError::UnsupportedMethod { .. }
                | BotError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_slug_is_configuration() {
        let err = BotError::DuplicateTabSlug {
            slug: "hello".into(),
        };
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Dashboard tab with slug 'hello' already registered"
        );
    }

    #[test]
    fn test_tab_not_found_is_not_configuration() {
        let err = BotError::TabNotFound { slug: "x".into() };
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_registration_wraps_source() {
        let err = BotError::Registration {
            key: "modlog".into(),
            source: anyhow::anyhow!("boom"),
        };
        assert_eq!(err.to_string(), "Plugin 'modlog' failed to register: boom");
    }
}

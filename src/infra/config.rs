// src/infra/config.rs — Configuration loading (TOML + environment overrides)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "zabot.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `production` turns on secure cookies.
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            environment: default_environment(),
            server: ServerConfig::default(),
            slack: SlackConfig::default(),
            plugins: PluginsConfig::default(),
            storage: StorageConfig::default(),
            admin: AdminConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_environment() -> String {
    "development".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackConfig {
    pub bot_token: Option<String>,
    pub app_token: Option<String>,
    pub signing_secret: Option<String>,
    /// Shown on the overview tab.
    pub team_name: Option<String>,
}

/// What discovery does when two plugins claim the same key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateKeyPolicy {
    /// Abort startup.
    #[default]
    Error,
    /// Keep the first-loaded plugin and log the duplicate.
    Warn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Plugin sources, scanned in order.
    #[serde(default = "default_plugin_sources")]
    pub sources: Vec<String>,
    /// Explicit allow-list; when non-empty it overrides `enabled_by_default`.
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub on_duplicate_key: DuplicateKeyPolicy,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            sources: default_plugin_sources(),
            enabled: Vec::new(),
            on_duplicate_key: DuplicateKeyPolicy::default(),
        }
    }
}

fn default_plugin_sources() -> Vec<String> {
    vec!["builtin".into()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: Some("sqlite://bot.db".into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub users: Vec<AdminUser>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// An operator allowed into the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUser {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Hex SHA-256 digest of the operator's access token.
    pub token_sha256: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    pub lockout_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_seconds: 900,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Extra template directories keyed by namespace (`hello` → `./templates/hello`).
    #[serde(default)]
    pub template_dirs: BTreeMap<String, PathBuf>,
}

impl Config {
    /// Load `path` (or `./zabot.toml` when present), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Overlay environment variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = non_empty(lookup("SLACK_BOT_TOKEN")) {
            self.slack.bot_token = Some(v);
        }
        if let Some(v) = non_empty(lookup("SLACK_APP_TOKEN")) {
            self.slack.app_token = Some(v);
        }
        if let Some(v) = non_empty(lookup("SLACK_SIGNING_SECRET")) {
            self.slack.signing_secret = Some(v);
        }
        if let Some(v) = non_empty(lookup("SLACK_TEAM_NAME")) {
            self.slack.team_name = Some(v);
        }
        if let Some(v) = non_empty(lookup("LOG_LEVEL")) {
            self.log_level = v;
        }
        if let Some(v) = lookup("PLUGIN_SOURCES") {
            self.plugins.sources = split_list(&v);
        }
        if let Some(v) = lookup("ENABLED_PLUGINS") {
            self.plugins.enabled = split_list(&v);
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.storage.database_url = non_empty(Some(v));
        }
        if let Some(v) = non_empty(lookup("ENVIRONMENT")) {
            self.environment = v;
        }
        if let Some(v) = non_empty(lookup("HOST")) {
            self.server.host = v;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.trim().parse().ok()) {
            self.server.port = port;
        }
    }

    /// Check settings the server cannot run without.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut missing = Vec::new();
        if self.slack.bot_token.as_deref().is_none_or(str::is_empty) {
            missing.push("SLACK_BOT_TOKEN");
        }
        if !missing.is_empty() {
            anyhow::bail!("Missing required settings: {}", missing.join(", "));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

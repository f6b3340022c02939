// src/storage/mod.rs — Plugin key/value settings storage
//
// Plugins persist small JSON settings under `(namespace, key)` pairs, where the
// namespace is conventionally the plugin key. The core treats values as opaque.

pub mod memory;
pub mod schema;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub use memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

/// Durable storage shared by every plugin. Implementations must tolerate
/// concurrent calls.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Prepare the backend (tables, connections). Called once at startup.
    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> anyhow::Result<Option<Value>>;

    async fn set(&self, namespace: &str, key: &str, value: Value) -> anyhow::Result<()>;

    async fn delete(&self, namespace: &str, key: &str) -> anyhow::Result<()>;

    /// Release backend resources. Called once at shutdown.
    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Short backend name for status display.
    fn backend(&self) -> &'static str;
}

/// Pick a backend from a `DATABASE_URL`-style string.
///
/// `sqlite://path`, `sqlite:path` and `sqlite::memory:` select SQLite; no URL
/// selects memory; anything else falls back to memory with a warning.
pub fn open_storage(database_url: Option<&str>) -> anyhow::Result<Arc<dyn Storage>> {
    let Some(url) = database_url.map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(Arc::new(InMemoryStorage::new()));
    };

    match sqlite_target(url) {
        Some(SqliteTarget::Memory) => Ok(Arc::new(SqliteStorage::in_memory()?)),
        Some(SqliteTarget::File(path)) => Ok(Arc::new(SqliteStorage::open(path)?)),
        None => {
            let scheme = url.split(':').next().unwrap_or_default();
            tracing::warn!(
                "Unsupported DATABASE_URL backend '{}'; falling back to in-memory storage",
                scheme
            );
            Ok(Arc::new(InMemoryStorage::new()))
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SqliteTarget<'a> {
    Memory,
    File(&'a str),
}

fn sqlite_target(url: &str) -> Option<SqliteTarget<'_>> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    if rest.is_empty() || rest == ":memory:" {
        Some(SqliteTarget::Memory)
    } else {
        Some(SqliteTarget::File(rest))
    }
}

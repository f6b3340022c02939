// src/storage/sqlite.rs — SQLite-backed plugin settings

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{schema, Storage};

/// Settings table on a single SQLite connection. Blocking calls run on the
/// tokio blocking pool; the connection mutex is never held across an await.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStorage {
    /// Open (or create) the database file.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self::from_connection(conn))
    }

    /// Private in-memory database (for testing).
    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> anyhow::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<T> {
            let guard = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("storage connection lock poisoned"))?;
            let conn = guard
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("storage is closed"))?;
            f(conn)
        })
        .await?
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> anyhow::Result<()> {
        self.with_conn(schema::run_migrations).await
    }

    async fn get(&self, namespace: &str, key: &str) -> anyhow::Result<Option<Value>> {
        let (namespace, key) = (namespace.to_string(), key.to_string());
        self.with_conn(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT value FROM plugin_settings WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key],
                    |r| r.get(0),
                )
                .optional()?;
            match raw {
                Some(text) => Ok(Some(serde_json::from_str(&text)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> anyhow::Result<()> {
        let (namespace, key) = (namespace.to_string(), key.to_string());
        let text = serde_json::to_string(&value)?;
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO plugin_settings (namespace, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(namespace, key) DO UPDATE SET
                    value = excluded.value, updated_at = excluded.updated_at",
                params![namespace, key, text, now],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, namespace: &str, key: &str) -> anyhow::Result<()> {
        let (namespace, key) = (namespace.to_string(), key.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM plugin_settings WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> anyhow::Result<()> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let taken = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("storage connection lock poisoned"))?
                .take();
            if let Some(conn) = taken {
                conn.close().map_err(|(_, e)| e)?;
            }
            Ok(())
        })
        .await?
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_storage() -> SqliteStorage {
        let storage = SqliteStorage::in_memory().unwrap();
        storage.init().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_set_and_get_roundtrip() {
        let storage = test_storage().await;
        storage
            .set("modlog", "settings", json!({"channel_id": "C123"}))
            .await
            .unwrap();
        assert_eq!(
            storage.get("modlog", "settings").await.unwrap(),
            Some(json!({"channel_id": "C123"}))
        );
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let storage = test_storage().await;
        storage.set("hello", "greetings_sent", json!(1)).await.unwrap();
        storage.set("hello", "greetings_sent", json!(2)).await.unwrap();
        assert_eq!(
            storage.get("hello", "greetings_sent").await.unwrap(),
            Some(json!(2))
        );
    }

    #[tokio::test]
    async fn test_delete_removes_value() {
        let storage = test_storage().await;
        storage.set("hello", "settings", json!({})).await.unwrap();
        storage.delete("hello", "settings").await.unwrap();
        assert!(storage.get("hello", "settings").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let storage = test_storage().await;
        storage.close().await.unwrap();
        assert!(storage.get("hello", "settings").await.is_err());
        // closing again is harmless
        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");

        let storage = SqliteStorage::open(&path).unwrap();
        storage.init().await.unwrap();
        storage.set("hello", "count", json!(7)).await.unwrap();
        storage.close().await.unwrap();

        let reopened = SqliteStorage::open(&path).unwrap();
        reopened.init().await.unwrap();
        assert_eq!(reopened.get("hello", "count").await.unwrap(), Some(json!(7)));
    }
}

// src/storage/memory.rs — In-memory storage for development and tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::Storage;

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    data: Mutex<HashMap<(String, String), Value>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get(&self, namespace: &str, key: &str) -> anyhow::Result<Option<Value>> {
        let data = self.data.lock().await;
        Ok(data.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> anyhow::Result<()> {
        let mut data = self.data.lock().await;
        data.insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> anyhow::Result<()> {
        let mut data = self.data.lock().await;
        data.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let storage = InMemoryStorage::new();
        assert!(storage.get("hello", "settings").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let storage = InMemoryStorage::new();
        storage
            .set("hello", "settings", json!({"broadcast": true}))
            .await
            .unwrap();
        assert_eq!(
            storage.get("hello", "settings").await.unwrap(),
            Some(json!({"broadcast": true}))
        );

        storage.delete("hello", "settings").await.unwrap();
        assert!(storage.get("hello", "settings").await.unwrap().is_none());

        // deleting twice is fine
        storage.delete("hello", "settings").await.unwrap();
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let storage = InMemoryStorage::new();
        storage.set("hello", "count", json!(1)).await.unwrap();
        storage.set("modlog", "count", json!(2)).await.unwrap();
        assert_eq!(storage.get("hello", "count").await.unwrap(), Some(json!(1)));
        assert_eq!(storage.get("modlog", "count").await.unwrap(), Some(json!(2)));
    }
}

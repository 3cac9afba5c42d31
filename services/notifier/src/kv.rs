//! Device-local key-value storage
//!
//! Holds the cached push token and the user preferences entry.
//! The Redis backend reuses the shared [`RedisStore`]; the in-memory backend
//! is the default for a single device session.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use common::cache::RedisStore;
use tokio::sync::Mutex;

/// Key under which the device push token is cached
pub const PUSH_TOKEN_KEY: &str = "expoPushToken";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;
    async fn remove_item(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryKeyValueStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items.lock().await.remove(key);
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key).await?)
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        Ok(self.set(key, value, None).await?)
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        Ok(self.delete(key).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_sets_reads_and_removes() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.get_item(PUSH_TOKEN_KEY).await.unwrap(), None);

        store
            .set_item(PUSH_TOKEN_KEY, "ExponentPushToken[abc]")
            .await
            .unwrap();
        assert_eq!(
            store.get_item(PUSH_TOKEN_KEY).await.unwrap().as_deref(),
            Some("ExponentPushToken[abc]")
        );

        store.remove_item(PUSH_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get_item(PUSH_TOKEN_KEY).await.unwrap(), None);
    }
}

//! Redis key-value store
//!
//! Backs the device-local key-value storage (cached push token, preference
//! blobs) when the notifier runs against a shared Redis instead of its
//! in-memory store. Every key is namespaced under a configurable prefix so
//! several device sessions can share one Redis.

use crate::error::{CacheError, CacheResult};
use redis::{AsyncCommands, Client};
use tracing::info;

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Namespace prepended to every key
    pub key_prefix: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    /// - `REDIS_KEY_PREFIX`: key namespace (default: "device")
    pub fn from_env() -> Self {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let key_prefix =
            std::env::var("REDIS_KEY_PREFIX").unwrap_or_else(|_| "device".to_string());

        RedisConfig { url, key_prefix }
    }
}

/// Namespaced Redis store
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    key_prefix: String,
}

impl RedisStore {
    /// Create the Redis client. No connection is opened until the first command.
    pub fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.clone()).map_err(CacheError::Connection)?;
        info!(url = %config.url, prefix = %config.key_prefix, "Redis client initialized");
        Ok(RedisStore {
            client,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        namespaced_key(&self.key_prefix, key)
    }

    async fn connection(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(CacheError::Connection)
    }

    /// Set a key-value pair with optional TTL
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let key = self.namespaced(key);

        if let Some(ttl) = ttl_seconds {
            let _: () = conn
                .set_ex(&key, value, ttl)
                .await
                .map_err(CacheError::Command)?;
        } else {
            let _: () = conn.set(&key, value).await.map_err(CacheError::Command)?;
        }

        Ok(())
    }

    /// Get a value by key
    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn
            .get(self.namespaced(key))
            .await
            .map_err(CacheError::Command)?;
        Ok(value)
    }

    /// Delete a key
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let _: u64 = conn
            .del(self.namespaced(key))
            .await
            .map_err(CacheError::Command)?;
        Ok(())
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::Command)?;
        Ok(pong == "PONG")
    }
}

fn namespaced_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_keys_are_namespaced() {
        assert_eq!(namespaced_key("device", "expoPushToken"), "device:expoPushToken");
        assert_eq!(namespaced_key("", "expoPushToken"), "expoPushToken");
    }

    #[test]
    #[serial]
    fn test_redis_config_defaults() {
        unsafe {
            std::env::remove_var("REDIS_URL");
            std::env::remove_var("REDIS_KEY_PREFIX");
        }

        let config = RedisConfig::from_env();
        assert_eq!(config.url, "redis://localhost:6379");
        assert_eq!(config.key_prefix, "device");
    }

    #[test]
    fn test_client_rejects_invalid_url() {
        let config = RedisConfig {
            url: "not a url".to_string(),
            key_prefix: "device".to_string(),
        };

        assert!(matches!(
            RedisStore::new(&config),
            Err(CacheError::Connection(_))
        ));
    }
}

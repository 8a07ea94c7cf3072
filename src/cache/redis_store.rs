/// Redis-backed expiring store
use super::ExpiringStore;
use crate::error::{DeskError, DeskResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Redis client with key prefixing
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    /// Connect and verify the server answers
    pub async fn connect(redis_url: &str, key_prefix: &str) -> DeskResult<Self> {
        info!("Connecting to Redis at {}", redis_url);

        let client = Client::open(redis_url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            DeskError::Cache(format!("Redis client creation failed: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            DeskError::Cache(format!("Redis connection failed: {}", e))
        })?;

        let store = Self {
            connection,
            key_prefix: key_prefix.to_string(),
        };
        store.ping().await?;

        info!("Redis connection established");
        Ok(store)
    }

    /// Build a key with prefix
    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Ping Redis to check connection
    pub async fn ping(&self) -> DeskResult<()> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;

        if pong != "PONG" {
            return Err(DeskError::Cache("Unexpected Redis PING response".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl ExpiringStore for RedisStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> DeskResult<()> {
        let cache_key = self.build_key(key);
        // SET EX has whole-second resolution
        let secs = ttl.as_secs().max(1);

        debug!("Store SET: {} (TTL: {}s)", cache_key, secs);

        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(&cache_key, value, secs)
            .await
            .map_err(|e| {
                warn!("Redis SET failed for {}: {}", cache_key, e);
                DeskError::from(e)
            })
    }

    async fn get(&self, key: &str) -> DeskResult<Option<String>> {
        let cache_key = self.build_key(key);

        let mut conn = self.connection.clone();
        let result: Option<String> = conn.get(&cache_key).await.map_err(|e| {
            warn!("Redis GET failed for {}: {}", cache_key, e);
            DeskError::from(e)
        })?;

        debug!(
            "Store {}: {}",
            if result.is_some() { "HIT" } else { "MISS" },
            cache_key
        );
        Ok(result)
    }

    async fn take(&self, key: &str) -> DeskResult<Option<String>> {
        let cache_key = self.build_key(key);

        let mut conn = self.connection.clone();
        conn.get_del(&cache_key).await.map_err(|e| {
            warn!("Redis GETDEL failed for {}: {}", cache_key, e);
            DeskError::from(e)
        })
    }

    async fn delete(&self, key: &str) -> DeskResult<()> {
        let cache_key = self.build_key(key);

        debug!("Store DELETE: {}", cache_key);

        let mut conn = self.connection.clone();
        conn.del::<_, ()>(&cache_key).await.map_err(|e| {
            warn!("Redis DELETE failed for {}: {}", cache_key, e);
            DeskError::from(e)
        })
    }
}

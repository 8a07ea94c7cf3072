/// Expiring key-value storage
///
/// One-time codes and pending challenge state live here. Two backends:
/// - [`MemoryStore`]: in-process map, good for a single instance and for tests
/// - [`RedisStore`]: shared Redis, for several instances behind a balancer
///
/// Every backend must make `set` on one key linearizable (last write wins)
/// and must treat an entry past its TTL as absent.
mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::{config::CacheConfig, error::DeskResult};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::info;

#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Store `value` under `key` for `ttl`, replacing any previous value
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> DeskResult<()>;

    /// Read a live value
    async fn get(&self, key: &str) -> DeskResult<Option<String>>;

    /// Read and remove a live value in one step
    async fn take(&self, key: &str) -> DeskResult<Option<String>>;

    /// Remove a value; missing keys are fine
    async fn delete(&self, key: &str) -> DeskResult<()>;

    /// Drop expired entries, returning how many went away.
    /// Backends with native expiry have nothing to do.
    async fn purge_expired(&self) -> DeskResult<u64> {
        Ok(0)
    }
}

/// Build the store selected by configuration
pub async fn connect(config: &CacheConfig) -> DeskResult<Arc<dyn ExpiringStore>> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisStore::connect(url, &config.key_prefix).await?;
            Ok(Arc::new(store))
        }
        None => {
            info!("No Redis configured, using in-process code store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Key namespaces
pub mod categories {
    pub const LOGIN_CODE: &str = "login_code:";
    pub const REGISTRATION_CODE: &str = "registration_code:";
    pub const PENDING_LOGIN: &str = "pending:login:";
    pub const PENDING_REGISTRATION: &str = "pending:registration:";
}

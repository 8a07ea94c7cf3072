/// In-process expiring store
use super::ExpiringStore;
use crate::error::DeskResult;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Map of key to (value, deadline) behind a mutex.
///
/// Deadlines use the tokio clock so tests can pause and advance time.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock cannot leave an entry half-written
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of entries, expired or not
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ExpiringStore for MemoryStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> DeskResult<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.lock().insert(key.to_string(), entry);
        debug!(key, ttl_secs = ttl.as_secs(), "Store SET");
        Ok(())
    }

    async fn get(&self, key: &str) -> DeskResult<Option<String>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn take(&self, key: &str) -> DeskResult<Option<String>> {
        let entry = self.lock().remove(key);
        Ok(entry
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value))
    }

    async fn delete(&self, key: &str) -> DeskResult<()> {
        self.lock().remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> DeskResult<u64> {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        // Deleting again is a no-op
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = MemoryStore::new();
        store.set("k", "first", Duration::from_secs(60)).await.unwrap();
        store.set("k", "second", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_secs(300)).await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.take("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_take_removes() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.take("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.take("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store.set("short", "1", Duration::from_secs(10)).await.unwrap();
        store.set("long", "2", Duration::from_secs(1000)).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }
}

/// What a holder is in the middle of, kept between start and verify
use crate::{
    cache::{categories, ExpiringStore},
    error::{DeskError, DeskResult},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLogin {
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub identifier: String,
    pub display_name: String,
}

pub struct PendingStore {
    store: Arc<dyn ExpiringStore>,
    ttl: Duration,
}

impl PendingStore {
    pub fn new(store: Arc<dyn ExpiringStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Fresh opaque holder id
    pub fn new_holder() -> String {
        Uuid::new_v4().to_string()
    }

    async fn put<T: Serialize>(&self, prefix: &str, holder: &str, value: &T) -> DeskResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| DeskError::Internal(format!("Failed to encode pending state: {}", e)))?;
        self.store
            .set(&format!("{}{}", prefix, holder), &json, self.ttl)
            .await
    }

    async fn load<T: DeserializeOwned>(&self, prefix: &str, holder: &str) -> DeskResult<Option<T>> {
        let Some(json) = self.store.get(&format!("{}{}", prefix, holder)).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // Unreadable state is treated as no state
                tracing::warn!(holder, "Discarding unreadable pending state: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn set_login(&self, holder: &str, pending: &PendingLogin) -> DeskResult<()> {
        self.put(categories::PENDING_LOGIN, holder, pending).await
    }

    pub async fn login(&self, holder: &str) -> DeskResult<Option<PendingLogin>> {
        self.load(categories::PENDING_LOGIN, holder).await
    }

    pub async fn clear_login(&self, holder: &str) -> DeskResult<()> {
        self.store
            .delete(&format!("{}{}", categories::PENDING_LOGIN, holder))
            .await
    }

    pub async fn set_registration(
        &self,
        holder: &str,
        pending: &PendingRegistration,
    ) -> DeskResult<()> {
        self.put(categories::PENDING_REGISTRATION, holder, pending)
            .await
    }

    pub async fn registration(&self, holder: &str) -> DeskResult<Option<PendingRegistration>> {
        self.load(categories::PENDING_REGISTRATION, holder).await
    }

    pub async fn clear_registration(&self, holder: &str) -> DeskResult<()> {
        self.store
            .delete(&format!("{}{}", categories::PENDING_REGISTRATION, holder))
            .await
    }
}

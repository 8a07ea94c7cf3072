/// Time-bounded one-time codes on top of an [`ExpiringStore`]
use crate::{
    cache::ExpiringStore,
    config::ChallengeConfig,
    error::{DeskError, DeskResult},
};
use rand::Rng;
use std::{sync::Arc, time::Duration};
use subtle::ConstantTimeEq;

pub struct CodeStore {
    store: Arc<dyn ExpiringStore>,
    ttl: Duration,
    digits: u32,
}

impl CodeStore {
    pub fn new(store: Arc<dyn ExpiringStore>, ttl: Duration, digits: u32) -> Self {
        Self { store, ttl, digits }
    }

    pub fn from_config(store: Arc<dyn ExpiringStore>, config: &ChallengeConfig) -> Self {
        Self::new(store, Duration::from_secs(config.code_ttl), config.code_digits)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Uniform over every `digits`-wide decimal string, leading zeros included
    fn generate(&self) -> String {
        let upper = 10u32.pow(self.digits);
        let n = rand::thread_rng().gen_range(0..upper);
        format!("{:0width$}", n, width = self.digits as usize)
    }

    /// Generate a fresh code for `key`, replacing any previous one
    pub async fn issue(&self, key: &str) -> DeskResult<String> {
        let code = self.generate();
        self.store.set(key, &code, self.ttl).await?;
        tracing::debug!(key, "Issued one-time code");
        Ok(code)
    }

    /// Current code for `key`, if one is live
    pub async fn peek(&self, key: &str) -> DeskResult<Option<String>> {
        self.store.get(key).await
    }

    /// Consume the code for `key` and compare it with `submitted`.
    ///
    /// The code is gone afterwards whether or not it matched, so two
    /// concurrent redeems cannot both succeed.
    pub async fn redeem(&self, key: &str, submitted: &str) -> DeskResult<()> {
        let stored = self.store.take(key).await?.ok_or(DeskError::Expired)?;

        if bool::from(submitted.as_bytes().ct_eq(stored.as_bytes())) {
            Ok(())
        } else {
            tracing::debug!(key, "One-time code mismatch, code burned");
            Err(DeskError::InvalidCode)
        }
    }

    /// Remove the code for `key`; missing keys are fine
    pub async fn invalidate(&self, key: &str) -> DeskResult<()> {
        self.store.delete(key).await
    }
}

/// Application context and dependency injection
use crate::{
    account::AccountManager,
    cache::{self, ExpiringStore},
    challenge::{CodeStore, LoginFlow, PendingStore, RegistrationFlow},
    config::ServerConfig,
    db,
    error::{DeskError, DeskResult},
    mailer::{Mailer, Notifier},
    rate_limit::RateLimiter,
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub account_db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    // Codes and pending challenge state
    pub store: Arc<dyn ExpiringStore>,
    pub login_flow: Arc<LoginFlow>,
    pub registration_flow: Arc<RegistrationFlow>,
    // Rate limiter
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> DeskResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        // Initialize account database
        let account_db =
            db::create_pool(&config.storage.account_db, db::DatabaseOptions::default()).await?;

        // Run migrations
        db::run_migrations(&account_db).await?;

        // Test connection
        db::test_connection(&account_db).await?;

        // Codes live in Redis when configured, otherwise in-process
        let store = cache::connect(&config.cache).await?;

        // Initialize mailer
        let mailer = Mailer::new(&config.email);
        if !mailer.is_configured() {
            tracing::warn!("Email is not fully configured; challenges will fail with DeliveryFailed");
        }

        Ok(Self::from_parts(config, account_db, store, Arc::new(mailer)))
    }

    /// Wire the services around an existing pool, store and notifier
    pub fn from_parts(
        config: ServerConfig,
        account_db: SqlitePool,
        store: Arc<dyn ExpiringStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let config = Arc::new(config);

        // Initialize account manager
        let account_manager = Arc::new(AccountManager::new(account_db.clone(), config.clone()));

        let codes = Arc::new(CodeStore::from_config(store.clone(), &config.challenge));
        let pending = Arc::new(PendingStore::new(
            store.clone(),
            Duration::from_secs(config.challenge.pending_ttl),
        ));

        let login_flow = Arc::new(LoginFlow::new(
            account_manager.clone(),
            codes.clone(),
            pending.clone(),
            notifier.clone(),
        ));
        let registration_flow = Arc::new(RegistrationFlow::new(
            account_manager.clone(),
            codes,
            pending,
            notifier,
        ));

        // Initialize rate limiter
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Self {
            config,
            account_db,
            account_manager,
            store,
            login_flow,
            registration_flow,
            rate_limiter,
        }
    }

    /// In-memory database and store, unconfigured mailer
    #[cfg(test)]
    pub async fn for_tests(config: ServerConfig) -> DeskResult<Self> {
        let account_db = db::memory_pool().await?;
        let store: Arc<dyn ExpiringStore> = Arc::new(cache::MemoryStore::new());
        let mailer = Arc::new(Mailer::new(&config.email));
        Ok(Self::from_parts(config, account_db, store, mailer))
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> DeskResult<()> {
        let dir = &config.storage.data_directory;
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                DeskError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}

use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        // Spawn cleanup tasks
        tokio::spawn(Self::expired_session_cleanup_job(Arc::clone(&self)));
        tokio::spawn(Self::expired_code_purge_job(Arc::clone(&self)));
        tokio::spawn(Self::rate_limiter_shrink_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Cleanup expired sessions (runs every hour)
    async fn expired_session_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600)); // Every hour

        loop {
            interval.tick().await;
            info!("Running expired session cleanup");

            if let Err(e) = tasks::cleanup_expired_sessions(&scheduler.context).await {
                error!("Failed to cleanup expired sessions: {}", e);
            }
        }
    }

    /// Drop expired codes and pending state from the in-process store (every 5 minutes)
    async fn expired_code_purge_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            match tasks::purge_expired_codes(&scheduler.context).await {
                Ok(count) if count > 0 => debug!("Purged {} expired store entries", count),
                Ok(_) => {}
                Err(e) => error!("Failed to purge expired store entries: {}", e),
            }
        }
    }

    /// Forget idle rate-limit keys (every 10 minutes)
    async fn rate_limiter_shrink_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(600));

        loop {
            interval.tick().await;
            scheduler.context.rate_limiter.shrink();
        }
    }
}

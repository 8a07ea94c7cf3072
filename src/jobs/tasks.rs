/// Background task implementations
use crate::{context::AppContext, error::DeskResult};

/// Cleanup expired sessions
pub async fn cleanup_expired_sessions(ctx: &AppContext) -> DeskResult<u64> {
    ctx.account_manager.cleanup_expired_sessions().await
}

/// Drop expired codes and pending challenge state
pub async fn purge_expired_codes(ctx: &AppContext) -> DeskResult<u64> {
    ctx.store.purge_expired().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{account::NewAccount, cache::ExpiringStore, config::ServerConfig};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_cleanup_tasks() {
        let ctx = AppContext::for_tests(ServerConfig::for_tests()).await.unwrap();
        let account = ctx
            .account_manager
            .create_account(NewAccount::customer("a@x.com", "alice"))
            .await
            .unwrap();

        let past = Utc::now() - Duration::minutes(5);
        sqlx::query(
            "INSERT INTO session (id, account_id, token, created_at, expires_at)
             VALUES ('s1', ?1, 't1', ?2, ?2)",
        )
        .bind(account.id)
        .bind(past)
        .execute(&ctx.account_db)
        .await
        .unwrap();

        assert_eq!(cleanup_expired_sessions(&ctx).await.unwrap(), 1);

        ctx.store
            .set("login_code:a@x.com", "123456", std::time::Duration::from_secs(60))
            .await
            .unwrap();
        // Nothing has expired yet
        assert_eq!(purge_expired_codes(&ctx).await.unwrap(), 0);
    }
}

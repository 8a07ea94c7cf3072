/// Account manager implementation using runtime queries
/// This version uses sqlx runtime query building instead of compile-time macros
/// to avoid needing DATABASE_URL during compilation

use crate::{
    access::Role,
    account::{AdminUserUpdate, ProfileUpdate, ValidatedSession},
    config::{BootstrapConfig, ServerConfig},
    db::account::{Account, Session, ACCOUNT_COLUMNS},
    error::{DeskError, DeskResult},
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidateEmail};

/// Fields needed to create an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub identifier: String,
    pub display_name: String,
    pub role: Role,
    pub is_staff: bool,
}

impl NewAccount {
    /// Ordinary self-registered customer
    pub fn customer(identifier: &str, display_name: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            display_name: display_name.to_string(),
            role: Role::Client,
            is_staff: false,
        }
    }
}

/// Trim and lowercase the domain part, then check it is an email address
pub fn normalize_identifier(raw: &str) -> DeskResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DeskError::Validation("Email is required".to_string()));
    }

    let normalized = match trimmed.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => trimmed.to_string(),
    };

    if !normalized.validate_email() {
        return Err(DeskError::Validation("Invalid email format".to_string()));
    }

    Ok(normalized)
}

/// Trim and bound a proposed display name
pub fn validate_display_name(raw: &str) -> DeskResult<String> {
    let name = raw.trim();
    let len = name.chars().count();

    if len == 0 {
        return Err(DeskError::Validation("Display name is required".to_string()));
    }
    if len < 3 {
        return Err(DeskError::Validation(
            "Display name must be at least 3 characters".to_string(),
        ));
    }
    if len > 150 {
        return Err(DeskError::Validation("Display name is too long".to_string()));
    }

    Ok(name.to_string())
}

/// Turn unique-constraint failures into conflicts naming the taken field
fn map_unique_violation(e: sqlx::Error) -> DeskError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let message = db_err.message();
            if message.contains("display_name") {
                return DeskError::Conflict("Display name already taken".to_string());
            }
            if message.contains("identifier") {
                return DeskError::Conflict(
                    "An account with this email already exists".to_string(),
                );
            }
            return DeskError::Conflict("Account already exists".to_string());
        }
    }
    DeskError::Database(e)
}

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Create a new account
    ///
    /// Uniqueness of identifier and display name is enforced by the table,
    /// so concurrent creations with the same values cannot both succeed.
    pub async fn create_account(&self, new: NewAccount) -> DeskResult<Account> {
        let identifier = normalize_identifier(&new.identifier)?;
        let display_name = validate_display_name(&new.display_name)?;

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO account (identifier, display_name, role, preferred_contact_method,
                                  is_active, is_staff, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'email', 1, ?4, ?5, ?5)",
        )
        .bind(&identifier)
        .bind(&display_name)
        .bind(new.role.as_str())
        .bind(new.is_staff)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(map_unique_violation)?;

        let id = result.last_insert_rowid();
        tracing::info!(account_id = id, role = %new.role, "Account created");

        Ok(Account {
            id,
            identifier,
            display_name,
            phone_number: None,
            address: None,
            role: new.role,
            job_title: None,
            department: None,
            work_schedule: None,
            preferred_contact_method: Default::default(),
            is_active: true,
            is_staff: new.is_staff,
            created_at: now,
            updated_at: now,
        })
    }

    /// Privileged creation outside the code flow (operators, first admin)
    pub async fn provision(
        &self,
        identifier: &str,
        display_name: &str,
        role: Role,
        is_staff: bool,
    ) -> DeskResult<Account> {
        self.create_account(NewAccount {
            identifier: identifier.to_string(),
            display_name: display_name.to_string(),
            role,
            is_staff,
        })
        .await
    }

    /// Provision the configured admin unless it already exists
    pub async fn ensure_bootstrap_admin(&self, bootstrap: &BootstrapConfig) -> DeskResult<()> {
        let Some((identifier, display_name)) = &bootstrap.admin else {
            return Ok(());
        };

        if self.identifier_exists(identifier).await? {
            tracing::debug!("Bootstrap admin already present");
            return Ok(());
        }

        let account = self
            .provision(identifier, display_name, Role::Admin, true)
            .await?;
        tracing::info!(account_id = account.id, "Provisioned bootstrap admin");
        Ok(())
    }

    /// Get account by id
    pub async fn get_account(&self, id: i64) -> DeskResult<Account> {
        let row = sqlx::query(&format!("SELECT {} FROM account WHERE id = ?1", ACCOUNT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| DeskError::NotFound("Account not found".to_string()))?;

        Account::from_row(&row)
    }

    /// Find account by its login identifier
    pub async fn find_by_identifier(&self, identifier: &str) -> DeskResult<Option<Account>> {
        let identifier = normalize_identifier(identifier)?;
        let row = sqlx::query(&format!(
            "SELECT {} FROM account WHERE identifier = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(&identifier)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Account::from_row).transpose()
    }

    /// Check if an identifier is taken
    pub async fn identifier_exists(&self, identifier: &str) -> DeskResult<bool> {
        let identifier = normalize_identifier(identifier)?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE identifier = ?1")
            .bind(&identifier)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// Check if a display name is taken
    pub async fn display_name_exists(&self, display_name: &str) -> DeskResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE display_name = ?1")
                .bind(display_name.trim())
                .fetch_one(&self.db)
                .await?;

        Ok(count > 0)
    }

    /// List all accounts, newest first
    pub async fn list_accounts(&self) -> DeskResult<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM account ORDER BY created_at DESC, id DESC",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Account::from_row).collect()
    }

    /// Self-service profile edit
    pub async fn update_profile(&self, id: i64, update: ProfileUpdate) -> DeskResult<Account> {
        update.validate()?;
        let display_name = update
            .display_name
            .as_deref()
            .map(validate_display_name)
            .transpose()?;

        let result = sqlx::query(
            "UPDATE account
             SET display_name = COALESCE(?1, display_name),
                 phone_number = COALESCE(?2, phone_number),
                 address = COALESCE(?3, address),
                 preferred_contact_method = COALESCE(?4, preferred_contact_method),
                 updated_at = ?5
             WHERE id = ?6",
        )
        .bind(display_name)
        .bind(update.phone_number)
        .bind(update.address)
        .bind(update.preferred_contact_method.map(|m| m.as_str()))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound("Account not found".to_string()));
        }

        self.get_account(id).await
    }

    /// Staff edit of any account, including its role
    pub async fn admin_update(&self, id: i64, update: AdminUserUpdate) -> DeskResult<Account> {
        update.validate()?;
        let display_name = update
            .display_name
            .as_deref()
            .map(validate_display_name)
            .transpose()?;

        let result = sqlx::query(
            "UPDATE account
             SET display_name = COALESCE(?1, display_name),
                 phone_number = COALESCE(?2, phone_number),
                 address = COALESCE(?3, address),
                 role = COALESCE(?4, role),
                 job_title = COALESCE(?5, job_title),
                 department = COALESCE(?6, department),
                 work_schedule = COALESCE(?7, work_schedule),
                 preferred_contact_method = COALESCE(?8, preferred_contact_method),
                 updated_at = ?9
             WHERE id = ?10",
        )
        .bind(display_name)
        .bind(update.phone_number)
        .bind(update.address)
        .bind(update.role.map(|r| r.as_str()))
        .bind(update.job_title)
        .bind(update.department)
        .bind(update.work_schedule)
        .bind(update.preferred_contact_method.map(|m| m.as_str()))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound("Account not found".to_string()));
        }

        self.get_account(id).await
    }

    /// Flip the active flag, returning the new value
    pub async fn toggle_active(&self, id: i64) -> DeskResult<bool> {
        let is_active: bool = sqlx::query_scalar(
            "UPDATE account SET is_active = NOT is_active, updated_at = ?1
             WHERE id = ?2
             RETURNING is_active",
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DeskError::NotFound("Account not found".to_string()))?;

        if !is_active {
            // A deactivated account loses its sessions immediately
            sqlx::query("DELETE FROM session WHERE account_id = ?1")
                .bind(id)
                .execute(&self.db)
                .await?;
        }

        tracing::info!(account_id = id, is_active, "Account activation toggled");
        Ok(is_active)
    }

    /// Create a session for an account
    pub async fn create_session(&self, account_id: i64) -> DeskResult<Session> {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.authentication.session_ttl as i64);

        let token = self.generate_access_token(account_id, &session_id, now, expires_at)?;

        sqlx::query(
            "INSERT INTO session (id, account_id, token, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&session_id)
        .bind(account_id)
        .bind(&token)
        .bind(now)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        tracing::debug!(account_id, session_id = %session_id, "Session established");

        Ok(Session {
            id: session_id,
            account_id,
            token,
            created_at: now,
            expires_at,
        })
    }

    /// Validate access token and return session info
    pub async fn validate_session(&self, token: &str) -> DeskResult<ValidatedSession> {
        let row = sqlx::query("SELECT id, account_id, expires_at FROM session WHERE token = ?1")
            .bind(token)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| DeskError::Authentication("Invalid or expired session".to_string()))?;

        let session_id: String = row.try_get("id")?;
        let account_id: i64 = row.try_get("account_id")?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;

        // Check expiration
        if Utc::now() > expires_at {
            return Err(DeskError::Authentication("Session expired".to_string()));
        }

        let account = self.get_account(account_id).await.map_err(|e| match e {
            DeskError::NotFound(_) => DeskError::Authentication("Invalid session".to_string()),
            other => other,
        })?;

        if !account.is_active {
            return Err(DeskError::Authentication("Account is deactivated".to_string()));
        }

        Ok(ValidatedSession {
            session_id,
            account,
        })
    }

    /// Delete a session (logout)
    pub async fn delete_session(&self, session_id: &str) -> DeskResult<()> {
        sqlx::query("DELETE FROM session WHERE id = ?1")
            .bind(session_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Generate access JWT token
    fn generate_access_token(
        &self,
        account_id: i64,
        session_id: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DeskResult<String> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        use serde::{Deserialize, Serialize};

        #[derive(Debug, Serialize, Deserialize)]
        struct Claims {
            sub: String,
            sid: String,
            iat: i64,
            exp: i64,
        }

        let claims = Claims {
            sub: account_id.to_string(),
            sid: session_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
        )
        .map_err(|e| DeskError::Jwt(format!("Failed to generate token: {}", e)))
    }

    /// Cleanup expired sessions
    ///
    /// Called periodically by the job scheduler.
    pub async fn cleanup_expired_sessions(&self) -> DeskResult<u64> {
        let result = sqlx::query("DELETE FROM session WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        let sessions_deleted = result.rows_affected();
        if sessions_deleted > 0 {
            tracing::info!(sessions_deleted, "Cleaned up expired sessions");
        } else {
            tracing::debug!("Session cleanup: no expired sessions found");
        }

        Ok(sessions_deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{account::ContactMethod, memory_pool};

    async fn create_test_manager() -> AccountManager {
        let db = memory_pool().await.unwrap();
        AccountManager::new(db, Arc::new(ServerConfig::for_tests()))
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(
            normalize_identifier("  Alice@Example.COM ").unwrap(),
            "Alice@example.com"
        );
        assert!(normalize_identifier("").is_err());
        assert!(normalize_identifier("no-at-sign").is_err());
    }

    #[test]
    fn test_validate_display_name() {
        assert_eq!(validate_display_name("  bob  ").unwrap(), "bob");
        assert!(validate_display_name("ab").is_err());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(151)).is_err());
        assert!(validate_display_name(&"x".repeat(150)).is_ok());
    }

    #[tokio::test]
    async fn test_create_and_find_account() {
        let manager = create_test_manager().await;

        let account = manager
            .create_account(NewAccount::customer("a@x.com", "alice"))
            .await
            .unwrap();
        assert_eq!(account.role, Role::Client);
        assert!(account.is_active);
        assert!(!account.is_staff);

        let found = manager.find_by_identifier("a@X.com").await.unwrap().unwrap();
        assert_eq!(found.id, account.id);
        assert_eq!(found.display_name, "alice");
        assert_eq!(found.preferred_contact_method, ContactMethod::Email);

        assert!(manager.identifier_exists("a@x.com").await.unwrap());
        assert!(manager.display_name_exists("alice").await.unwrap());
        assert!(manager.find_by_identifier("z@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_identifier_conflicts() {
        let manager = create_test_manager().await;
        manager
            .create_account(NewAccount::customer("a@x.com", "alice"))
            .await
            .unwrap();

        let err = manager
            .create_account(NewAccount::customer("a@x.com", "alice2"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Conflict(ref m) if m.contains("email")));
    }

    #[tokio::test]
    async fn test_duplicate_display_name_conflicts() {
        let manager = create_test_manager().await;
        manager
            .create_account(NewAccount::customer("a@x.com", "alice"))
            .await
            .unwrap();

        let err = manager
            .create_account(NewAccount::customer("b@x.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Conflict(ref m) if m.contains("Display name")));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let manager = create_test_manager().await;
        let account = manager
            .create_account(NewAccount::customer("a@x.com", "alice"))
            .await
            .unwrap();

        let updated = manager
            .update_profile(
                account.id,
                ProfileUpdate {
                    phone_number: Some("+1 555 0100".to_string()),
                    preferred_contact_method: Some(ContactMethod::Phone),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.display_name, "alice");
        assert_eq!(updated.phone_number.as_deref(), Some("+1 555 0100"));
        assert_eq!(updated.preferred_contact_method, ContactMethod::Phone);
    }

    #[tokio::test]
    async fn test_update_profile_name_conflict() {
        let manager = create_test_manager().await;
        manager
            .create_account(NewAccount::customer("a@x.com", "alice"))
            .await
            .unwrap();
        let bob = manager
            .create_account(NewAccount::customer("b@x.com", "bob"))
            .await
            .unwrap();

        let err = manager
            .update_profile(
                bob.id,
                ProfileUpdate {
                    display_name: Some("alice".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_admin_update_changes_role() {
        let manager = create_test_manager().await;
        let account = manager
            .create_account(NewAccount::customer("e@x.com", "eve"))
            .await
            .unwrap();

        let updated = manager
            .admin_update(
                account.id,
                AdminUserUpdate {
                    role: Some(Role::Engineer),
                    job_title: Some("Senior engineer".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Engineer);
        assert_eq!(updated.job_title.as_deref(), Some("Senior engineer"));

        let missing = manager.admin_update(9999, AdminUserUpdate::default()).await;
        assert!(matches!(missing, Err(DeskError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_toggle_active_revokes_sessions() {
        let manager = create_test_manager().await;
        let account = manager
            .create_account(NewAccount::customer("a@x.com", "alice"))
            .await
            .unwrap();
        let session = manager.create_session(account.id).await.unwrap();

        assert!(!manager.toggle_active(account.id).await.unwrap());
        assert!(manager.validate_session(&session.token).await.is_err());

        assert!(manager.toggle_active(account.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let manager = create_test_manager().await;
        let account = manager
            .create_account(NewAccount::customer("a@x.com", "alice"))
            .await
            .unwrap();

        let session = manager.create_session(account.id).await.unwrap();
        let validated = manager.validate_session(&session.token).await.unwrap();
        assert_eq!(validated.account.id, account.id);
        assert_eq!(validated.session_id, session.id);

        manager.delete_session(&session.id).await.unwrap();
        assert!(matches!(
            manager.validate_session(&session.token).await,
            Err(DeskError::Authentication(_))
        ));

        // Logging out twice is fine
        manager.delete_session(&session.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let manager = create_test_manager().await;
        let account = manager
            .create_account(NewAccount::customer("a@x.com", "alice"))
            .await
            .unwrap();
        let live = manager.create_session(account.id).await.unwrap();

        let past = Utc::now() - Duration::hours(2);
        sqlx::query(
            "INSERT INTO session (id, account_id, token, created_at, expires_at)
             VALUES ('old', ?1, 'old-token', ?2, ?3)",
        )
        .bind(account.id)
        .bind(past - Duration::hours(1))
        .bind(past)
        .execute(&manager.db)
        .await
        .unwrap();

        assert!(matches!(
            manager.validate_session("old-token").await,
            Err(DeskError::Authentication(ref m)) if m.contains("expired")
        ));

        assert_eq!(manager.cleanup_expired_sessions().await.unwrap(), 1);
        assert_eq!(manager.cleanup_expired_sessions().await.unwrap(), 0);
        assert!(manager.validate_session(&live.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let manager = create_test_manager().await;
        let bootstrap = BootstrapConfig {
            admin: Some(("root@desk.test".to_string(), "root".to_string())),
        };

        manager.ensure_bootstrap_admin(&bootstrap).await.unwrap();
        manager.ensure_bootstrap_admin(&bootstrap).await.unwrap();

        let admin = manager
            .find_by_identifier("root@desk.test")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.is_staff);
        assert_eq!(manager.list_accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_accounts_newest_first() {
        let manager = create_test_manager().await;
        let first = manager
            .create_account(NewAccount::customer("a@x.com", "alice"))
            .await
            .unwrap();
        let second = manager
            .create_account(NewAccount::customer("b@x.com", "bob"))
            .await
            .unwrap();

        let ids: Vec<i64> = manager
            .list_accounts()
            .await
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }
}

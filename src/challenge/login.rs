/// Login by emailed code
use super::{CodeStore, PendingLogin, PendingStore};
use crate::{
    account::{normalize_identifier, AccountManager, ChallengeStartedResponse, SessionResponse},
    cache::categories,
    error::{DeskError, DeskResult},
    mailer::{Notifier, Purpose},
};
use std::sync::Arc;

pub struct LoginFlow {
    accounts: Arc<AccountManager>,
    codes: Arc<CodeStore>,
    pending: Arc<PendingStore>,
    notifier: Arc<dyn Notifier>,
}

fn code_key(identifier: &str) -> String {
    format!("{}{}", categories::LOGIN_CODE, identifier)
}

impl LoginFlow {
    pub fn new(
        accounts: Arc<AccountManager>,
        codes: Arc<CodeStore>,
        pending: Arc<PendingStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            accounts,
            codes,
            pending,
            notifier,
        }
    }

    /// Mail a login code to an existing account
    pub async fn start(&self, holder: &str, identifier: &str) -> DeskResult<ChallengeStartedResponse> {
        let identifier = normalize_identifier(identifier)?;

        let account = self
            .accounts
            .find_by_identifier(&identifier)
            .await?
            .ok_or_else(|| DeskError::NotFound("No account with this email".to_string()))?;

        if !account.is_active {
            return Err(DeskError::Authorization("Account is deactivated".to_string()));
        }

        let key = code_key(&identifier);
        let code = self.codes.issue(&key).await?;

        if let Err(e) = self
            .notifier
            .send_code(&identifier, &code, Purpose::Login)
            .await
        {
            tracing::warn!(account_id = account.id, "Login code delivery failed: {}", e);
            self.codes.invalidate(&key).await?;
            return Err(e.into());
        }

        self.pending
            .set_login(holder, &PendingLogin {
                identifier: identifier.clone(),
            })
            .await?;

        tracing::info!(account_id = account.id, "Login challenge started");

        Ok(ChallengeStartedResponse {
            destination: identifier,
            expires_in: self.codes.ttl().as_secs(),
        })
    }

    /// Redeem the code for this holder's pending login and open a session
    pub async fn verify(&self, holder: &str, submitted: &str) -> DeskResult<SessionResponse> {
        let pending = self
            .pending
            .login(holder)
            .await?
            .ok_or(DeskError::NoPendingChallenge)?;

        let key = code_key(&pending.identifier);
        if let Err(e) = self.codes.redeem(&key, submitted.trim()).await {
            if matches!(e, DeskError::InvalidCode) {
                self.pending.clear_login(holder).await?;
            }
            return Err(e);
        }
        self.pending.clear_login(holder).await?;

        let account = self
            .accounts
            .find_by_identifier(&pending.identifier)
            .await?
            .ok_or_else(|| DeskError::NotFound("No account with this email".to_string()))?;

        if !account.is_active {
            return Err(DeskError::Authorization("Account is deactivated".to_string()));
        }

        let session = self.accounts.create_session(account.id).await?;
        tracing::info!(account_id = account.id, "Login verified");

        Ok(SessionResponse {
            token: session.token,
            expires_at: session.expires_at,
            account,
        })
    }
}

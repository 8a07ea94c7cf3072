/// Registration by emailed code
use super::{CodeStore, PendingRegistration, PendingStore};
use crate::{
    account::{
        normalize_identifier, validate_display_name, AccountManager, ChallengeStartedResponse,
        NewAccount, SessionResponse,
    },
    cache::categories,
    error::{DeskError, DeskResult},
    mailer::{Notifier, Purpose},
};
use std::sync::Arc;

pub struct RegistrationFlow {
    accounts: Arc<AccountManager>,
    codes: Arc<CodeStore>,
    pending: Arc<PendingStore>,
    notifier: Arc<dyn Notifier>,
}

fn code_key(identifier: &str) -> String {
    format!("{}{}", categories::REGISTRATION_CODE, identifier)
}

impl RegistrationFlow {
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

    async fn ensure_available(&self, identifier: &str, display_name: &str) -> DeskResult<()> {
        if self.accounts.identifier_exists(identifier).await? {
            return Err(DeskError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }
        if self.accounts.display_name_exists(display_name).await? {
            return Err(DeskError::Conflict("Display name already taken".to_string()));
        }
        Ok(())
    }

    /// Mail a registration code for a not yet existing account
    pub async fn start(
        &self,
        holder: &str,
        identifier: &str,
        display_name: &str,
    ) -> DeskResult<ChallengeStartedResponse> {
        let identifier = normalize_identifier(identifier)?;
        let display_name = validate_display_name(display_name)?;

        self.ensure_available(&identifier, &display_name).await?;

        let key = code_key(&identifier);
        let code = self.codes.issue(&key).await?;

        if let Err(e) = self
            .notifier
            .send_code(&identifier, &code, Purpose::Registration)
            .await
        {
            tracing::warn!("Registration code delivery failed: {}", e);
            self.codes.invalidate(&key).await?;
            return Err(e.into());
        }

        self.pending
            .set_registration(holder, &PendingRegistration {
                identifier: identifier.clone(),
                display_name,
            })
            .await?;

        tracing::info!("Registration challenge started");

        Ok(ChallengeStartedResponse {
            destination: identifier,
            expires_in: self.codes.ttl().as_secs(),
        })
    }

    /// Redeem the code, create the account and open a session
    ///
    /// Uniqueness is checked again here, and the insert itself is guarded by
    /// unique columns, so a name taken since `start` ends in `Conflict`.
    pub async fn verify(&self, holder: &str, submitted: &str) -> DeskResult<SessionResponse> {
        let pending = self
            .pending
            .registration(holder)
            .await?
            .ok_or(DeskError::NoPendingChallenge)?;

        let key = code_key(&pending.identifier);
        if let Err(e) = self.codes.redeem(&key, submitted.trim()).await {
            if matches!(e, DeskError::InvalidCode) {
                self.pending.clear_registration(holder).await?;
            }
            return Err(e);
        }
        self.pending.clear_registration(holder).await?;

        self.ensure_available(&pending.identifier, &pending.display_name)
            .await?;

        let account = self
            .accounts
            .create_account(NewAccount::customer(
                &pending.identifier,
                &pending.display_name,
            ))
            .await?;

        let session = self.accounts.create_session(account.id).await?;
        tracing::info!(account_id = account.id, "Registration verified");

        Ok(SessionResponse {
            token: session.token,
            expires_at: session.expires_at,
            account,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        access::Role,
        challenge::testing::{FailingNotifier, Harness, RecordingNotifier},
    };
    use std::time::Duration;

    #[tokio::test]
    async fn test_registration_creates_client_account() {
        let harness = Harness::new().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let flow = harness.registration_flow(notifier.clone());

        flow.start("h", "b@Y.com", "  bob ").await.unwrap();
        let code = notifier.last_code_for("b@y.com").unwrap();

        let session = flow.verify("h", &code).await.unwrap();
        assert_eq!(session.account.identifier, "b@y.com");
        assert_eq!(session.account.display_name, "bob");
        assert_eq!(session.account.role, Role::Client);
        assert!(session.account.is_active);
        assert!(!session.account.is_staff);

        assert!(matches!(
            flow.verify("h", &code).await,
            Err(DeskError::NoPendingChallenge)
        ));
    }

    #[tokio::test]
    async fn test_start_rejects_taken_values() {
        let harness = Harness::new().await;
        harness
            .accounts
            .create_account(NewAccount::customer("a@x.com", "alice"))
            .await
            .unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let flow = harness.registration_flow(notifier.clone());

        assert!(matches!(
            flow.start("h", "a@x.com", "someone").await,
            Err(DeskError::Conflict(_))
        ));
        assert!(matches!(
            flow.start("h", "new@x.com", "alice").await,
            Err(DeskError::Conflict(_))
        ));
        assert!(matches!(
            flow.start("h", "new@x.com", "al").await,
            Err(DeskError::Validation(_))
        ));
        assert!(matches!(
            flow.start("h", "not-an-email", "someone").await,
            Err(DeskError::Validation(_))
        ));
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_name_taken_before_verify() {
        let harness = Harness::new().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let flow = harness.registration_flow(notifier.clone());

        flow.start("h", "b@y.com", "bob").await.unwrap();
        let code = notifier.last_code_for("b@y.com").unwrap();

        harness
            .accounts
            .create_account(NewAccount::customer("other@z.com", "bob"))
            .await
            .unwrap();

        assert!(matches!(flow.verify("h", &code).await, Err(DeskError::Conflict(_))));
        // Pending state is gone, the user must start over
        assert!(harness.pending.registration("h").await.unwrap().is_none());
        assert!(harness.accounts.find_by_identifier("b@y.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identifier_taken_before_verify() {
        let harness = Harness::new().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let flow = harness.registration_flow(notifier.clone());

        flow.start("h", "c@y.com", "carol").await.unwrap();
        let code = notifier.last_code_for("c@y.com").unwrap();

        harness
            .accounts
            .create_account(NewAccount::customer("c@y.com", "someone"))
            .await
            .unwrap();

        assert!(matches!(flow.verify("h", &code).await, Err(DeskError::Conflict(_))));
        assert!(harness.pending.registration("h").await.unwrap().is_none());
        assert!(!harness.accounts.display_name_exists("carol").await.unwrap());
    }

    #[tokio::test]
    async fn test_late_code_is_expired() {
        let harness = Harness::with_code_ttl(Duration::from_millis(50)).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let flow = harness.registration_flow(notifier.clone());

        flow.start("h", "d@y.com", "dave").await.unwrap();
        let code = notifier.last_code_for("d@y.com").unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(matches!(flow.verify("h", &code).await, Err(DeskError::Expired)));
        assert!(harness.accounts.find_by_identifier("d@y.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_same_display_name() {
        let harness = Harness::new().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let flow = harness.registration_flow(notifier.clone());

        flow.start("h1", "one@x.com", "bob").await.unwrap();
        flow.start("h2", "two@x.com", "bob").await.unwrap();
        let first = notifier.last_code_for("one@x.com").unwrap();
        let second = notifier.last_code_for("two@x.com").unwrap();

        let (a, b) = tokio::join!(flow.verify("h1", &first), flow.verify("h2", &second));
        let outcomes = [a, b];

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(DeskError::Conflict(_))))
                .count(),
            1
        );
        assert_eq!(harness.accounts.list_accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_code_clears_pending() {
        let harness = Harness::new().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let flow = harness.registration_flow(notifier.clone());

        flow.start("h", "b@y.com", "bob").await.unwrap();
        let code = notifier.last_code_for("b@y.com").unwrap();
        let wrong = if code == "999999" { "888888" } else { "999999" };

        assert!(matches!(flow.verify("h", wrong).await, Err(DeskError::InvalidCode)));
        assert!(matches!(
            flow.verify("h", &code).await,
            Err(DeskError::NoPendingChallenge)
        ));
        assert!(!harness.accounts.identifier_exists("b@y.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_delivery_failure_invalidates() {
        let harness = Harness::new().await;
        let flow = harness.registration_flow(Arc::new(FailingNotifier));

        let err = flow.start("h", "b@y.com", "bob").await.unwrap_err();
        assert!(matches!(err, DeskError::DeliveryFailed(_)));
        assert_eq!(
            harness.codes.peek("registration_code:b@y.com").await.unwrap(),
            None
        );
        assert!(harness.pending.registration("h").await.unwrap().is_none());
    }
}

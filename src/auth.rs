/// Authentication extractors
use crate::{
    access::{authorize_resolved, RoleSet, Subject},
    account::ValidatedSession,
    api::middleware::extract_bearer_token,
    context::AppContext,
    error::DeskError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated context - extracts and validates session from request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub session: ValidatedSession,
}

impl AuthContext {
    pub fn account_id(&self) -> i64 {
        self.session.account.id
    }

    /// Run the access gate for this caller.
    ///
    /// The account is read again so a role change or deactivation since the
    /// session was validated is seen; any failure to read it denies.
    pub async fn require(&self, ctx: &AppContext, required: RoleSet) -> Result<Subject, DeskError> {
        let subject = ctx
            .account_manager
            .get_account(self.account_id())
            .await
            .and_then(|account| {
                if account.is_active {
                    Ok(account.subject())
                } else {
                    Err(DeskError::Authentication("Account is deactivated".to_string()))
                }
            });

        authorize_resolved(subject, required)
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = DeskError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        // Extract bearer token from Authorization header
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| DeskError::Authentication("Missing authorization header".to_string()))?;

        let session = state.account_manager.validate_session(&token).await?;

        Ok(AuthContext { session })
    }
}

/// Account management system
///
/// Handles account persistence, uniqueness, sessions and the request and
/// response shapes of the account endpoints.

mod manager;

pub use manager::{normalize_identifier, validate_display_name, AccountManager, NewAccount};

use crate::{
    access::Role,
    db::account::{Account, ContactMethod},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Start login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartLoginRequest {
    pub identifier: String,
}

/// Start registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRegistrationRequest {
    pub identifier: String,
    pub display_name: String,
}

/// Code submission for either flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyCodeRequest {
    pub code: String,
}

/// Returned when a code has been mailed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeStartedResponse {
    pub destination: String,
    /// Seconds until the code expires
    pub expires_in: u64,
}

/// Returned when a session is established
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub account: Account,
}

/// Validated session from bearer token
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub session_id: String,
    pub account: Account,
}

/// Self-service profile edit; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(min = 3, max = 150))]
    pub display_name: Option<String>,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub preferred_contact_method: Option<ContactMethod>,
}

/// Staff edit of another account; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserUpdate {
    #[validate(length(min = 3, max = 150))]
    pub display_name: Option<String>,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub role: Option<Role>,
    #[validate(length(max = 100))]
    pub job_title: Option<String>,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    pub work_schedule: Option<String>,
    pub preferred_contact_method: Option<ContactMethod>,
}

/// Result of an activation toggle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleActiveResponse {
    pub id: i64,
    pub is_active: bool,
}

/// User listing for the CRM panel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<Account>,
}

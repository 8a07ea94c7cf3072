/// Account database models
use crate::{
    access::{Role, Subject},
    error::{DeskError, DeskResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};
use std::str::FromStr;

/// Columns selected for every account read
pub const ACCOUNT_COLUMNS: &str = "id, identifier, display_name, phone_number, address, role, \
     job_title, department, work_schedule, preferred_contact_method, is_active, is_staff, \
     created_at, updated_at";

/// How a customer prefers to be notified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactMethod {
    #[default]
    Email,
    Phone,
}

impl ContactMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactMethod::Email => "email",
            ContactMethod::Phone => "phone",
        }
    }
}

impl FromStr for ContactMethod {
    type Err = DeskError;

    fn from_str(s: &str) -> DeskResult<Self> {
        match s {
            "email" => Ok(ContactMethod::Email),
            "phone" => Ok(ContactMethod::Phone),
            _ => Err(DeskError::Validation(format!(
                "Invalid contact method: {}",
                s
            ))),
        }
    }
}

/// Account record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    /// Email address, the login key
    pub identifier: String,
    pub display_name: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub role: Role,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub work_schedule: Option<String>,
    pub preferred_contact_method: ContactMethod,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn from_row(row: &SqliteRow) -> DeskResult<Self> {
        let role: String = row.try_get("role")?;
        let contact: String = row.try_get("preferred_contact_method")?;

        Ok(Account {
            id: row.try_get("id")?,
            identifier: row.try_get("identifier")?,
            display_name: row.try_get("display_name")?,
            phone_number: row.try_get("phone_number")?,
            address: row.try_get("address")?,
            role: role.parse()?,
            job_title: row.try_get("job_title")?,
            department: row.try_get("department")?,
            work_schedule: row.try_get("work_schedule")?,
            preferred_contact_method: contact.parse()?,
            is_active: row.try_get("is_active")?,
            is_staff: row.try_get("is_staff")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// What the access gate sees
    pub fn subject(&self) -> Subject {
        Subject {
            account_id: self.id,
            role: self.role,
            is_staff: self.is_staff,
        }
    }
}

/// Session record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub account_id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

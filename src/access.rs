/// Role-based access control for staff operations
use crate::error::{DeskError, DeskResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account roles in the service center
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Customer bringing devices in for repair
    #[default]
    Client,
    /// Diagnoses and repairs devices
    Engineer,
    /// Handles tickets and customer communication
    Manager,
    /// Full access to the system
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Client, Role::Engineer, Role::Manager, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Engineer => "engineer",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DeskError;

    fn from_str(s: &str) -> DeskResult<Self> {
        match s.to_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "engineer" => Ok(Role::Engineer),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            _ => Err(DeskError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

/// A set of roles, one bit per [`Role`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleSet(u8);

impl RoleSet {
    pub const EMPTY: RoleSet = RoleSet(0);

    pub const fn of(roles: &[Role]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < roles.len() {
            bits |= roles[i].bit();
            i += 1;
        }
        RoleSet(bits)
    }

    pub const fn contains(&self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        Role::ALL.into_iter().filter(|r| self.contains(*r))
    }
}

/// Required roles for each protected operation
pub mod operations {
    use super::{Role, RoleSet};

    /// Open the CRM panel and list users
    pub const CRM_PANEL: RoleSet = RoleSet::of(&[Role::Engineer, Role::Manager, Role::Admin]);
    /// Read a single user's record
    pub const USER_READ: RoleSet = RoleSet::of(&[Role::Manager, Role::Admin]);
    /// Edit another user's record, including role
    pub const USER_UPDATE: RoleSet = RoleSet::of(&[Role::Manager, Role::Admin]);
    /// Activate or deactivate an account
    pub const USER_TOGGLE: RoleSet = RoleSet::of(&[Role::Admin]);
}

/// What the gate needs to know about a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject {
    pub account_id: i64,
    pub role: Role,
    /// Elevated access regardless of role
    pub is_staff: bool,
}

/// Allow iff the subject is staff or holds one of the required roles
pub fn authorize(subject: &Subject, required: RoleSet) -> DeskResult<()> {
    if subject.is_staff || required.contains(subject.role) {
        return Ok(());
    }

    tracing::debug!(
        account_id = subject.account_id,
        role = %subject.role,
        "access denied"
    );
    Err(DeskError::Authorization("Access denied".to_string()))
}

/// Gate for a subject that may have failed to resolve; any failure denies
pub fn authorize_resolved(subject: DeskResult<Subject>, required: RoleSet) -> DeskResult<Subject> {
    match subject {
        Ok(subject) => authorize(&subject, required).map(|_| subject),
        Err(e) => {
            tracing::warn!("Could not resolve caller, denying: {}", e);
            Err(DeskError::Authorization("Access denied".to_string()))
        }
    }
}

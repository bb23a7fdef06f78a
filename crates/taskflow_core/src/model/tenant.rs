//! Tenant boundary: organizations, users and caller identity.
//!
//! # Invariants
//! - A user belongs to exactly one organization.
//! - Email is unique across all organizations.
//! - `Identity` is supplied by the authentication collaborator and trusted as-is.

use super::{OrganizationId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Isolation boundary for every other entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

/// Organization-wide role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Member,
}

impl Role {
    /// Stable storage and wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Member => "member",
        }
    }

    /// Parses a role name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Some(Self::Admin),
            "manager" => Some(Self::Manager),
            "member" | "user" => Some(Self::Member),
            _ => None,
        }
    }

    /// Admin and Manager share project/user management rights.
    pub fn is_privileged(self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Opaque credential produced by the authentication collaborator.
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub organization_id: OrganizationId,
}

/// Insert model for users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
    pub full_name: String,
    pub role: Role,
    pub organization_id: OrganizationId,
}

/// Authenticated caller. Request-scoped; never stored globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: UserId, organization_id: OrganizationId, role: Role) -> Self {
        Self {
            user_id,
            organization_id,
            role,
        }
    }

    /// Builds the identity a persisted user would authenticate as.
    pub fn of(user: &User) -> Self {
        Self::new(user.id, user.organization_id, user.role)
    }
}

/// Lightweight structural check; real verification belongs to the auth collaborator.
pub fn looks_like_email(value: &str) -> bool {
    let trimmed = value.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !trimmed.contains(char::is_whitespace)
        }
        None => false,
    }
}

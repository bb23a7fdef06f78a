//! Project and membership records.
//!
//! # Invariants
//! - Project names are unique only within one organization, and looked up by
//!   fragment match.
//! - `ProjectMember` has no lifecycle of its own; it cascades with the project.

use super::{OrganizationId, ProjectId, UserId};
use serde::Serialize;

/// Persisted project row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub organization_id: OrganizationId,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

/// Insert model for projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub organization_id: OrganizationId,
}

/// Composite `(project_id, user_id)` membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProjectMember {
    pub project_id: ProjectId,
    pub user_id: UserId,
}

//! Fuzzy entity lookup for free-text references.
//!
//! # Responsibility
//! - Turn partial names into store rows for the assistant.
//!
//! # Invariants
//! - Every lookup is scoped to the resolver's organization; a fragment that
//!   only matches another organization's rows resolves to `None`.
//! - Matching is case-insensitive substring (ASCII case folding).
//! - Tie-break: the first match in ascending id order wins. No ranking.
//! - `resolve_project` falls back to the organization's first project when
//!   the fragment is empty or matches nothing. `find_project` never falls back.

use crate::model::project::Project;
use crate::model::task::Task;
use crate::model::tenant::User;
use crate::model::OrganizationId;
use crate::repo::{DomainStore, RepoResult};

pub struct EntityResolver<'s, S: DomainStore + ?Sized> {
    store: &'s S,
    organization_id: OrganizationId,
}

impl<'s, S: DomainStore + ?Sized> EntityResolver<'s, S> {
    pub fn new(store: &'s S, organization_id: OrganizationId) -> Self {
        Self {
            store,
            organization_id,
        }
    }

    /// Fragment match with first-project fallback.
    ///
    /// Returns `None` only when the organization has no projects.
    pub fn resolve_project(&self, fragment: Option<&str>) -> RepoResult<Option<Project>> {
        if let Some(project) = self.find_project(fragment.unwrap_or_default())? {
            return Ok(Some(project));
        }
        Ok(self
            .store
            .list_projects(self.organization_id, Some(1))?
            .into_iter()
            .next())
    }

    /// Strict fragment match: empty or unmatched fragments resolve to `None`.
    pub fn find_project(&self, fragment: &str) -> RepoResult<Option<Project>> {
        if fragment.trim().is_empty() {
            return Ok(None);
        }
        Ok(self
            .store
            .search_projects(self.organization_id, fragment, Some(1))?
            .into_iter()
            .next())
    }

    /// Matches display name OR email.
    pub fn resolve_user(&self, fragment: &str) -> RepoResult<Option<User>> {
        if fragment.trim().is_empty() {
            return Ok(None);
        }
        Ok(self
            .store
            .search_users(self.organization_id, fragment, Some(1))?
            .into_iter()
            .next())
    }

    /// Matches task title, scoped through the task's project.
    pub fn resolve_task(&self, fragment: &str) -> RepoResult<Option<Task>> {
        if fragment.trim().is_empty() {
            return Ok(None);
        }
        Ok(self
            .store
            .search_tasks_by_title(self.organization_id, fragment, Some(1))?
            .into_iter()
            .next())
    }
}

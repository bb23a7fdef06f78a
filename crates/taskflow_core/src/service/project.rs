//! Project use-case service.
//!
//! # Invariants
//! - Creating a project enrolls its creator as a member.
//! - Project names are unique within one organization.
//! - Members only see projects they belong to; Admin/Manager see all.

use super::error::{ServiceError, ServiceResult};
use super::guard::{project_in_scope, require, user_in_scope, NOT_ENOUGH_PERMISSIONS};
use crate::model::project::{NewProject, Project, ProjectMember};
use crate::model::task::{StatusCounts, Task};
use crate::model::tenant::Identity;
use crate::model::{ProjectId, UserId};
use crate::policy::{PolicyAction, ResourceContext};
use crate::repo::{DomainStore, TaskListQuery};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

/// Partial project update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Task counts grouped by status for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub project: Project,
    pub counts: StatusCounts,
}

/// Project with its membership size and task breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDetail {
    pub project: Project,
    pub member_count: u32,
    pub counts: StatusCounts,
}

pub struct ProjectService<'s, S: DomainStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: DomainStore + ?Sized> ProjectService<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn create(
        &self,
        identity: &Identity,
        name: &str,
        description: Option<&str>,
    ) -> ServiceResult<Project> {
        require(
            identity,
            PolicyAction::CreateProject,
            &ResourceContext::actor(identity.user_id),
            NOT_ENOUGH_PERMISSIONS,
        )?;

        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::invalid("Project name is required"));
        }
        if self
            .store
            .find_project_by_name(identity.organization_id, name)?
            .is_some()
        {
            return Err(ServiceError::conflict(format!(
                "Project '{name}' already exists"
            )));
        }

        let project = self.store.create_project(&NewProject {
            name: name.to_string(),
            description: description
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string),
            organization_id: identity.organization_id,
        })?;
        self.store.add_member(project.id, identity.user_id)?;

        info!(
            "event=project_created module=service status=ok project_id={}",
            project.id
        );
        Ok(project)
    }

    pub fn update(
        &self,
        identity: &Identity,
        project_id: ProjectId,
        patch: &ProjectPatch,
    ) -> ServiceResult<Project> {
        let mut project = project_in_scope(self.store, identity, project_id)?;
        require(
            identity,
            PolicyAction::UpdateProject,
            &ResourceContext::actor(identity.user_id),
            NOT_ENOUGH_PERMISSIONS,
        )?;

        let mut changed = false;
        if let Some(name) = patch.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            if name != project.name {
                if let Some(existing) = self
                    .store
                    .find_project_by_name(identity.organization_id, name)?
                {
                    if existing.id != project.id {
                        return Err(ServiceError::conflict(format!(
                            "Project '{name}' already exists"
                        )));
                    }
                }
            }
            project.name = name.to_string();
            changed = true;
        }
        if let Some(description) = patch.description.as_deref() {
            let description = description.trim();
            project.description = (!description.is_empty()).then(|| description.to_string());
            changed = true;
        }
        if !changed {
            return Err(ServiceError::invalid("No updates provided"));
        }

        self.store.update_project(&project)?;
        project_in_scope(self.store, identity, project_id)
    }

    /// Adds a same-organization user to a project.
    pub fn add_member(
        &self,
        identity: &Identity,
        project_id: ProjectId,
        user_id: UserId,
    ) -> ServiceResult<ProjectMember> {
        let project = project_in_scope(self.store, identity, project_id)?;
        require(
            identity,
            PolicyAction::AddProjectMember,
            &ResourceContext::actor(identity.user_id),
            NOT_ENOUGH_PERMISSIONS,
        )?;
        let user = user_in_scope(self.store, identity, user_id)?;
        if self.store.is_member(project.id, user.id)? {
            return Err(ServiceError::conflict("User already in project"));
        }
        Ok(self.store.add_member(project.id, user.id)?)
    }

    pub fn get(&self, identity: &Identity, project_id: ProjectId) -> ServiceResult<ProjectDetail> {
        let project = project_in_scope(self.store, identity, project_id)?;
        Ok(ProjectDetail {
            member_count: self.store.member_count(project.id)?,
            counts: self.store.count_tasks_by_status(project.id)?,
            project,
        })
    }

    pub fn list(&self, identity: &Identity) -> ServiceResult<Vec<Project>> {
        if identity.role.is_privileged() {
            return Ok(self.store.list_projects(identity.organization_id, None)?);
        }
        Ok(self
            .store
            .list_member_projects(identity.organization_id, identity.user_id)?)
    }

    pub fn stats(&self, identity: &Identity, project_id: ProjectId) -> ServiceResult<ProjectStats> {
        let project = project_in_scope(self.store, identity, project_id)?;
        Ok(ProjectStats {
            counts: self.store.count_tasks_by_status(project.id)?,
            project,
        })
    }

    /// Tasks past due and not done in one project.
    pub fn overdue(
        &self,
        identity: &Identity,
        project_id: ProjectId,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<Task>> {
        let project = project_in_scope(self.store, identity, project_id)?;
        Ok(self.store.list_tasks(
            identity.organization_id,
            &TaskListQuery {
                project_id: Some(project.id),
                overdue_at: Some(now.timestamp_millis()),
                ..TaskListQuery::default()
            },
        )?)
    }
}

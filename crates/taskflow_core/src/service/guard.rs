//! Shared scope and permission checks used by every service.
//!
//! Scope checks run before permission checks so foreign rows surface as
//! `NotFound`, never `Forbidden`.

use super::error::{ServiceError, ServiceResult};
use crate::model::project::Project;
use crate::model::task::Task;
use crate::model::tenant::{Identity, User};
use crate::model::{ProjectId, TaskId, UserId};
use crate::policy::{allowed, PolicyAction, ResourceContext};
use crate::repo::DomainStore;

pub(crate) const NOT_ENOUGH_PERMISSIONS: &str = "Not enough permissions";
pub(crate) const NOT_A_PROJECT_MEMBER: &str = "Not a member of this project";
pub(crate) const CREATE_USER_DENIED: &str = "You don't have permission to create users";
pub(crate) const UPDATE_USER_DENIED: &str = "You don't have permission to update users";
pub(crate) const LIST_USERS_DENIED: &str = "Only admins can list users";
pub(crate) const SELF_ASSIGN_ONLY: &str = "Members can only assign tasks to themselves";

/// Fails with `Forbidden(message)` unless policy allows the action.
pub(crate) fn require(
    identity: &Identity,
    action: PolicyAction,
    resource: &ResourceContext,
    message: &str,
) -> ServiceResult<()> {
    if allowed(Some(identity.role), action, resource) {
        return Ok(());
    }
    log::info!(
        "event=policy_denied module=service action={} role={}",
        action.as_str(),
        identity.role
    );
    Err(ServiceError::forbidden(message))
}

pub(crate) fn project_in_scope<S: DomainStore + ?Sized>(
    store: &S,
    identity: &Identity,
    project_id: ProjectId,
) -> ServiceResult<Project> {
    store
        .get_project(identity.organization_id, project_id)?
        .ok_or(ServiceError::NotFound("Project"))
}

pub(crate) fn task_in_scope<S: DomainStore + ?Sized>(
    store: &S,
    identity: &Identity,
    task_id: TaskId,
) -> ServiceResult<Task> {
    store
        .get_task(identity.organization_id, task_id)?
        .ok_or(ServiceError::NotFound("Task"))
}

pub(crate) fn user_in_scope<S: DomainStore + ?Sized>(
    store: &S,
    identity: &Identity,
    user_id: UserId,
) -> ServiceResult<User> {
    store
        .get_user(identity.organization_id, user_id)?
        .ok_or(ServiceError::NotFound("User"))
}

/// Membership-aware check for task writes inside one project.
pub(crate) fn require_project_access<S: DomainStore + ?Sized>(
    store: &S,
    identity: &Identity,
    project_id: ProjectId,
    action: PolicyAction,
) -> ServiceResult<()> {
    let is_member = if identity.role.is_privileged() {
        false
    } else {
        store.is_member(project_id, identity.user_id)?
    };
    require(
        identity,
        action,
        &ResourceContext::actor(identity.user_id).with_membership(is_member),
        NOT_A_PROJECT_MEMBER,
    )
}

/// Assignment guard followed by the assignee scope check.
///
/// Forbidden wins over NotFound: a Member naming anyone else is rejected
/// before the assignee is looked up.
pub(crate) fn require_assignable<S: DomainStore + ?Sized>(
    store: &S,
    identity: &Identity,
    assignee_id: UserId,
) -> ServiceResult<User> {
    require(
        identity,
        PolicyAction::AssignTask,
        &ResourceContext::actor(identity.user_id).with_assignee(Some(assignee_id)),
        SELF_ASSIGN_ONLY,
    )?;
    user_in_scope(store, identity, assignee_id)
}

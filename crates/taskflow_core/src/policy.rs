//! Role-based authorization decisions.
//!
//! # Responsibility
//! - Decide whether a role may perform one operation on one resource.
//!
//! # Invariants
//! - Pure: no store access, no logging, no errors. Callers report denials.
//! - `None` role means an unauthenticated caller; it may only bootstrap an
//!   organization.
//! - Cross-organization checks happen before policy (resolution returns
//!   "not found"), so policy never sees foreign resources.

use crate::model::tenant::Role;
use crate::model::UserId;

/// Operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyAction {
    RegisterOrganization,
    CreateProject,
    UpdateProject,
    AddProjectMember,
    CreateUser,
    UpdateUser,
    ViewUser,
    ListUsers,
    /// Listing tasks filtered to one project.
    ViewProjectTasks,
    CreateTask,
    UpdateTask,
    AssignTask,
    CommentTask,
    AttachToTask,
}

impl PolicyAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegisterOrganization => "register_organization",
            Self::CreateProject => "create_project",
            Self::UpdateProject => "update_project",
            Self::AddProjectMember => "add_project_member",
            Self::CreateUser => "create_user",
            Self::UpdateUser => "update_user",
            Self::ViewUser => "view_user",
            Self::ListUsers => "list_users",
            Self::ViewProjectTasks => "view_project_tasks",
            Self::CreateTask => "create_task",
            Self::UpdateTask => "update_task",
            Self::AssignTask => "assign_task",
            Self::CommentTask => "comment_task",
            Self::AttachToTask => "attach_to_task",
        }
    }
}

/// Facts about the target resource the decision depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceContext {
    /// Caller's user id.
    pub actor_id: Option<UserId>,
    /// Caller is an explicit member of the task's project.
    pub is_project_member: bool,
    /// Requested assignee for `AssignTask`.
    pub assignee_id: Option<UserId>,
    /// Highest role involved in a user write (granted or currently held).
    pub target_role: Option<Role>,
}

impl ResourceContext {
    pub fn actor(actor_id: UserId) -> Self {
        Self {
            actor_id: Some(actor_id),
            ..Self::default()
        }
    }

    pub fn with_membership(mut self, is_project_member: bool) -> Self {
        self.is_project_member = is_project_member;
        self
    }

    pub fn with_assignee(mut self, assignee_id: Option<UserId>) -> Self {
        self.assignee_id = assignee_id;
        self
    }

    pub fn with_target_role(mut self, target_role: Option<Role>) -> Self {
        self.target_role = target_role;
        self
    }
}

/// Returns whether `role` may perform `action` on `resource`.
pub fn allowed(role: Option<Role>, action: PolicyAction, resource: &ResourceContext) -> bool {
    let Some(role) = role else {
        return action == PolicyAction::RegisterOrganization;
    };

    match action {
        PolicyAction::RegisterOrganization => true,
        PolicyAction::CreateProject
        | PolicyAction::UpdateProject
        | PolicyAction::AddProjectMember
        | PolicyAction::ViewUser => role.is_privileged(),
        PolicyAction::CreateUser | PolicyAction::UpdateUser => {
            // Only an Admin may create, promote or edit another Admin.
            match resource.target_role {
                Some(Role::Admin) => role == Role::Admin,
                _ => role.is_privileged(),
            }
        }
        PolicyAction::ListUsers => role == Role::Admin,
        PolicyAction::ViewProjectTasks
        | PolicyAction::CreateTask
        | PolicyAction::UpdateTask
        | PolicyAction::CommentTask
        | PolicyAction::AttachToTask => role.is_privileged() || resource.is_project_member,
        PolicyAction::AssignTask => match resource.assignee_id {
            None => true,
            Some(assignee) => role.is_privileged() || Some(assignee) == resource.actor_id,
        },
    }
}

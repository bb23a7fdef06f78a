//! Task use-case service.
//!
//! # Responsibility
//! - Create, update, list and annotate tasks under the same rules the
//!   assistant applies.
//!
//! # Invariants
//! - Status changes follow `TaskStatus::check_transition`; a rejected
//!   update leaves the task unchanged.
//! - Assignee defaults to the actor. A Member may only self-assign.
//! - Due dates are not earlier than the start of the current UTC day.
//! - At most `MAX_ATTACHMENTS_PER_TASK` attachments; the cap never evicts.

use super::error::{ServiceError, ServiceResult};
use super::guard::{
    project_in_scope, require_assignable, require_project_access, task_in_scope, user_in_scope,
};
use super::notification::{notify_assignment, notify_comment, notify_status_change};
use crate::model::activity::{
    attachment_path, sanitize_filename, Attachment, Comment, NewAttachment,
    MAX_ATTACHMENTS_PER_TASK, MAX_ATTACHMENT_BYTES,
};
use crate::model::task::{check_due_date, NewTask, Task, TaskPriority, TaskStatus};
use crate::model::tenant::Identity;
use crate::model::{ProjectId, TaskId, UserId};
use crate::policy::PolicyAction;
use crate::repo::{DomainStore, TaskListQuery};
use chrono::{DateTime, Utc};
use log::info;

/// Input for task creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<DateTime<Utc>>,
    pub project_id: ProjectId,
    pub assignee_id: Option<UserId>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, project_id: ProjectId) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: None,
            status: None,
            due_date: None,
            project_id,
            assignee_id: None,
        }
    }
}

/// Partial task update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<UserId>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.assignee_id.is_none()
    }
}

pub struct TaskService<'s, S: DomainStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: DomainStore + ?Sized> TaskService<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Creates a task inside one of the caller's organization projects.
    pub fn create(
        &self,
        identity: &Identity,
        draft: &TaskDraft,
        now: DateTime<Utc>,
    ) -> ServiceResult<Task> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(ServiceError::invalid("Task title is required"));
        }

        let project = project_in_scope(self.store, identity, draft.project_id)?;
        require_project_access(self.store, identity, project.id, PolicyAction::CreateTask)?;

        let assignee_id = match draft.assignee_id {
            Some(assignee_id) if assignee_id != identity.user_id => {
                require_assignable(self.store, identity, assignee_id)?.id
            }
            _ => identity.user_id,
        };

        if let Some(due) = draft.due_date {
            check_due_date(due, now).map_err(|err| ServiceError::invalid(err.to_string()))?;
        }

        let task = self.store.create_task(
            &NewTask {
                title: title.to_string(),
                description: normalize_text(draft.description.as_deref()),
                status: draft.status.unwrap_or(TaskStatus::Todo),
                priority: draft.priority.unwrap_or_default(),
                due_date: draft.due_date.map(|due| due.timestamp_millis()),
                project_id: project.id,
                assignee_id: Some(assignee_id),
            },
            now.timestamp_millis(),
        )?;

        if assignee_id != identity.user_id {
            notify_assignment(self.store, &task, assignee_id)?;
        }

        info!(
            "event=task_created module=service status=ok task_id={} project_id={}",
            task.id, task.project_id
        );
        Ok(task)
    }

    /// Applies a partial update. Backward status moves are `StateConflict`.
    pub fn update(
        &self,
        identity: &Identity,
        task_id: TaskId,
        patch: &TaskPatch,
        now: DateTime<Utc>,
    ) -> ServiceResult<Task> {
        let current = task_in_scope(self.store, identity, task_id)?;
        require_project_access(
            self.store,
            identity,
            current.project_id,
            PolicyAction::UpdateTask,
        )?;

        if patch.is_empty() {
            return Err(ServiceError::invalid("No updates provided"));
        }

        let mut updated = current.clone();
        if let Some(status) = patch.status {
            current.status.check_transition(status).map_err(|_| {
                ServiceError::conflict(format!(
                    "Cannot move task status backward from {} to {}",
                    current.status.label(),
                    status.label()
                ))
            })?;
            updated.status = status;
        }
        if let Some(title) = patch.title.as_deref() {
            let title = title.trim();
            if title.is_empty() {
                return Err(ServiceError::invalid("Task title is required"));
            }
            updated.title = title.to_string();
        }
        if let Some(description) = patch.description.as_deref() {
            updated.description = normalize_text(Some(description));
        }
        if let Some(priority) = patch.priority {
            updated.priority = priority;
        }
        if let Some(due) = patch.due_date {
            check_due_date(due, now).map_err(|err| ServiceError::invalid(err.to_string()))?;
            updated.due_date = Some(due.timestamp_millis());
        }
        if let Some(assignee_id) = patch.assignee_id {
            if assignee_id != identity.user_id {
                require_assignable(self.store, identity, assignee_id)?;
            }
            updated.assignee_id = Some(assignee_id);
        }

        self.store.update_task(&updated, now.timestamp_millis())?;
        let stored = task_in_scope(self.store, identity, task_id)?;

        if stored.status != current.status {
            if let Some(assignee_id) = stored.assignee_id.filter(|id| *id != identity.user_id) {
                notify_status_change(self.store, &stored, assignee_id)?;
            }
        }
        if stored.assignee_id != current.assignee_id {
            if let Some(assignee_id) = stored.assignee_id.filter(|id| *id != identity.user_id) {
                notify_assignment(self.store, &stored, assignee_id)?;
            }
        }

        info!(
            "event=task_updated module=service status=ok task_id={} from={} to={}",
            stored.id, current.status, stored.status
        );
        Ok(stored)
    }

    pub fn get(&self, identity: &Identity, task_id: TaskId) -> ServiceResult<Task> {
        task_in_scope(self.store, identity, task_id)
    }

    /// Lists tasks in the caller's organization. A project filter requires access to it.
    pub fn list(&self, identity: &Identity, query: &TaskListQuery) -> ServiceResult<Vec<Task>> {
        if let Some(project_id) = query.project_id {
            project_in_scope(self.store, identity, project_id)?;
            require_project_access(
                self.store,
                identity,
                project_id,
                PolicyAction::ViewProjectTasks,
            )?;
        }
        Ok(self.store.list_tasks(identity.organization_id, query)?)
    }

    pub fn add_comment(
        &self,
        identity: &Identity,
        task_id: TaskId,
        content: &str,
    ) -> ServiceResult<Comment> {
        let task = task_in_scope(self.store, identity, task_id)?;
        require_project_access(
            self.store,
            identity,
            task.project_id,
            PolicyAction::CommentTask,
        )?;

        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::invalid("Comment content is required"));
        }

        let comment = self
            .store
            .create_comment(task.id, identity.user_id, content)?;

        if let Some(assignee_id) = task.assignee_id.filter(|id| *id != identity.user_id) {
            let author = user_in_scope(self.store, identity, identity.user_id)?;
            notify_comment(self.store, &task, &author.full_name, assignee_id)?;
        }
        Ok(comment)
    }

    pub fn list_comments(&self, identity: &Identity, task_id: TaskId) -> ServiceResult<Vec<Comment>> {
        let task = task_in_scope(self.store, identity, task_id)?;
        Ok(self.store.list_comments(task.id)?)
    }

    /// Records attachment metadata. The capacity check runs before size validation.
    pub fn add_attachment(
        &self,
        identity: &Identity,
        task_id: TaskId,
        filename: &str,
        size_bytes: u64,
    ) -> ServiceResult<Attachment> {
        let task = task_in_scope(self.store, identity, task_id)?;
        require_project_access(
            self.store,
            identity,
            task.project_id,
            PolicyAction::AttachToTask,
        )?;

        if self.store.count_attachments(task.id)? >= MAX_ATTACHMENTS_PER_TASK {
            return Err(ServiceError::Capacity(format!(
                "Maximum {MAX_ATTACHMENTS_PER_TASK} attachments per task allowed"
            )));
        }
        if size_bytes > MAX_ATTACHMENT_BYTES {
            return Err(ServiceError::invalid("File size exceeds 5MB limit"));
        }
        let filename = sanitize_filename(filename)
            .ok_or_else(|| ServiceError::invalid("Attachment filename is required"))?;

        let attachment = self.store.create_attachment(&NewAttachment {
            file_path: attachment_path(task.id, &filename),
            filename,
            size_bytes,
            task_id: task.id,
        })?;
        Ok(attachment)
    }
}

fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

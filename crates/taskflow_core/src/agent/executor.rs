//! Action execution in three phases: resolve, authorize, execute.
//!
//! # Responsibility
//! - Resolve free-text references into organization-scoped rows.
//! - Check the authorization policy before any write.
//! - Run the action through the same services the direct API uses.
//!
//! # Invariants
//! - Nothing is written before `execute`.
//! - Every failure is a typed `ActionError`; nothing panics or escapes raw.

use super::action::{ActionRequest, DecodeError, ListFilter};
use crate::config::AssistantSettings;
use crate::error::ErrorKind;
use crate::model::activity::{
    Attachment, Comment, Notification, MAX_ATTACHMENTS_PER_TASK,
};
use crate::model::project::Project;
use crate::model::task::{Task, TaskPriority, TaskStatus};
use crate::model::tenant::{Identity, Role, User};
use crate::model::time::format_day;
use crate::model::{ProjectId, TaskId, UserId};
use crate::policy::{PolicyAction, ResourceContext};
use crate::repo::{DomainStore, RepoError, TaskListQuery};
use crate::resolver::EntityResolver;
use crate::search::{SearchError, SearchScope, SearchSnippet, SemanticSearch};
use crate::service::guard::{
    require, require_project_access, CREATE_USER_DENIED, LIST_USERS_DENIED,
    NOT_ENOUGH_PERMISSIONS, SELF_ASSIGN_ONLY,
};
use crate::service::{
    CredentialHasher, NotificationService, ProjectDetail, ProjectPatch, ProjectService,
    ProjectStats, ServiceError, TaskDraft, TaskPatch, TaskService, UserDraft, UserPatch,
    UserService,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

const SEARCH_UNAVAILABLE: &str = "Search is temporarily unavailable. Please try again shortly.";
const GENERIC_FAILURE: &str =
    "Something went wrong while processing your request. Please try again.";

pub type ActionResult<T> = Result<T, ActionError>;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl From<RepoError> for ActionError {
    fn from(value: RepoError) -> Self {
        Self::Service(ServiceError::Repo(value))
    }
}

impl ActionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::InvalidInput,
            Self::Service(err) => err.kind(),
            Self::Search(SearchError::Unavailable(_)) => ErrorKind::UpstreamUnavailable,
            Self::Search(_) => ErrorKind::Internal,
        }
    }

    /// Caller-safe text.
    pub fn user_message(&self) -> String {
        match self {
            Self::Decode(err) => err.to_string(),
            Self::Service(err) => err.user_message(),
            Self::Search(SearchError::Unavailable(_)) => SEARCH_UNAVAILABLE.to_string(),
            Self::Search(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

/// Task row with its project and assignee names filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// `YYYY-MM-DD` in UTC.
    pub due_date: Option<String>,
    pub overdue: bool,
    pub project_id: ProjectId,
    pub project_name: String,
    pub assignee_id: Option<UserId>,
    pub assignee_name: Option<String>,
}

/// Structured result of one executed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionOutput {
    SearchResults {
        query: String,
        results: Vec<SearchSnippet>,
    },
    TaskList {
        filter: &'static str,
        tasks: Vec<TaskView>,
    },
    TaskCreated {
        task: TaskView,
    },
    TaskUpdated {
        task: TaskView,
        previous_status: TaskStatus,
    },
    TaskDetail {
        task: TaskView,
        comments: Vec<Comment>,
    },
    ProjectStats {
        projects: Vec<ProjectStats>,
    },
    ProjectCreated {
        project: Project,
    },
    ProjectUpdated {
        project: Project,
    },
    ProjectDetail {
        detail: ProjectDetail,
    },
    UserDetail {
        user: User,
    },
    UserList {
        role_filter: Option<Role>,
        users: Vec<User>,
    },
    UserCreated {
        user: User,
    },
    UserUpdated {
        user: User,
    },
    CommentAdded {
        task_title: String,
        comment: Comment,
    },
    FileAttached {
        task_title: String,
        attachment: Attachment,
        remaining_slots: u32,
    },
    MemberAdded {
        project_name: String,
        user_name: String,
    },
    Notifications {
        unread_only: bool,
        notifications: Vec<Notification>,
    },
}

/// Action with every free-text reference bound to a row.
#[derive(Debug, Clone)]
pub enum ResolvedAction {
    SearchTasks {
        query: String,
        top_k: u32,
    },
    ListTasks {
        filter: ListFilter,
    },
    CreateTask {
        draft: TaskDraft,
    },
    UpdateTask {
        task: Task,
        new_status: TaskStatus,
    },
    GetTask {
        task: Task,
    },
    ProjectStats {
        projects: Vec<Project>,
    },
    GetProject {
        project: Project,
    },
    CreateProject {
        name: String,
        description: Option<String>,
    },
    UpdateProject {
        project: Project,
        patch: ProjectPatch,
    },
    GetUser {
        user: User,
    },
    ListUsers {
        role_filter: Option<Role>,
    },
    CreateUser {
        draft: UserDraft,
    },
    UpdateUser {
        user: User,
        patch: UserPatch,
    },
    AddComment {
        task: Task,
        content: String,
    },
    AttachFile {
        task: Task,
        filename: String,
        size_bytes: u64,
    },
    AddProjectMember {
        project: Project,
        user: User,
    },
    ListNotifications {
        unread_only: bool,
    },
}

/// Request-scoped executor over one unit of work.
pub struct ActionExecutor<'a, S: DomainStore + ?Sized> {
    store: &'a S,
    search: &'a dyn SemanticSearch,
    search_scope: SearchScope<'a>,
    hasher: &'a dyn CredentialHasher,
    identity: &'a Identity,
    now: DateTime<Utc>,
    limits: AssistantSettings,
}

impl<'a, S: DomainStore + ?Sized> ActionExecutor<'a, S> {
    pub fn new(
        store: &'a S,
        search: &'a dyn SemanticSearch,
        search_scope: SearchScope<'a>,
        hasher: &'a dyn CredentialHasher,
        identity: &'a Identity,
        now: DateTime<Utc>,
        limits: AssistantSettings,
    ) -> Self {
        Self {
            store,
            search,
            search_scope,
            hasher,
            identity,
            now,
            limits,
        }
    }

    fn resolver(&self) -> EntityResolver<'a, S> {
        EntityResolver::new(self.store, self.identity.organization_id)
    }

    fn resolve_task(&self, fragment: &str) -> ActionResult<Task> {
        self.resolver()
            .resolve_task(fragment)?
            .ok_or(ActionError::Service(ServiceError::NotFound("Task")))
    }

    fn find_project(&self, fragment: &str) -> ActionResult<Project> {
        self.resolver()
            .find_project(fragment)?
            .ok_or(ActionError::Service(ServiceError::NotFound("Project")))
    }

    fn resolve_user(&self, fragment: &str) -> ActionResult<User> {
        self.resolver()
            .resolve_user(fragment)?
            .ok_or(ActionError::Service(ServiceError::NotFound("User")))
    }

    /// Binds names to rows. Unmatched required references are `NotFound`.
    pub fn resolve(&self, request: ActionRequest) -> ActionResult<ResolvedAction> {
        let resolved = match request {
            ActionRequest::SearchTasks { query, top_k } => ResolvedAction::SearchTasks {
                query,
                top_k: top_k.unwrap_or(self.limits.search_top_k),
            },
            ActionRequest::ListTasks { filter } => ResolvedAction::ListTasks { filter },
            ActionRequest::CreateTask {
                title,
                description,
                priority,
                due_date,
                project_name,
                assignee_name,
            } => {
                let project = self
                    .resolver()
                    .resolve_project(project_name.as_deref())?
                    .ok_or(ServiceError::NotFound("Project"))?;
                let assignee_id = match assignee_name.as_deref() {
                    Some(name) => Some(self.resolve_assignee(name)?),
                    None => None,
                };
                ResolvedAction::CreateTask {
                    draft: TaskDraft {
                        description,
                        priority,
                        due_date,
                        assignee_id,
                        ..TaskDraft::new(title, project.id)
                    },
                }
            }
            ActionRequest::UpdateTask {
                task_title,
                new_status,
            } => ResolvedAction::UpdateTask {
                task: self.resolve_task(&task_title)?,
                new_status,
            },
            ActionRequest::GetTask { task_identifier } => ResolvedAction::GetTask {
                task: self.resolve_task(&task_identifier)?,
            },
            ActionRequest::ProjectStats { project_name } => {
                let limit = Some(self.limits.stats_project_limit);
                let projects = match project_name.as_deref() {
                    Some(fragment) => {
                        let projects = self.store.search_projects(
                            self.identity.organization_id,
                            fragment,
                            limit,
                        )?;
                        if projects.is_empty() {
                            return Err(ServiceError::NotFound("Project").into());
                        }
                        projects
                    }
                    None => self
                        .store
                        .list_projects(self.identity.organization_id, limit)?,
                };
                ResolvedAction::ProjectStats { projects }
            }
            ActionRequest::GetProject { project_name } => ResolvedAction::GetProject {
                project: self.find_project(&project_name)?,
            },
            ActionRequest::CreateProject { name, description } => {
                ResolvedAction::CreateProject { name, description }
            }
            ActionRequest::UpdateProject {
                project_name,
                new_name,
                new_description,
            } => ResolvedAction::UpdateProject {
                project: self.find_project(&project_name)?,
                patch: ProjectPatch {
                    name: new_name,
                    description: new_description,
                },
            },
            ActionRequest::GetUser { user_identifier } => ResolvedAction::GetUser {
                user: self.resolve_user(&user_identifier)?,
            },
            ActionRequest::ListUsers { role_filter } => ResolvedAction::ListUsers { role_filter },
            ActionRequest::CreateUser {
                email,
                full_name,
                password,
                role,
            } => ResolvedAction::CreateUser {
                draft: UserDraft {
                    email,
                    full_name,
                    password,
                    role,
                },
            },
            ActionRequest::UpdateUser {
                user_identifier,
                new_name,
                new_role,
                is_active,
            } => ResolvedAction::UpdateUser {
                user: self.resolve_user(&user_identifier)?,
                patch: UserPatch {
                    full_name: new_name,
                    role: new_role,
                    is_active,
                },
            },
            ActionRequest::AddComment {
                task_title,
                content,
            } => ResolvedAction::AddComment {
                task: self.resolve_task(&task_title)?,
                content,
            },
            ActionRequest::AttachFile {
                task_title,
                filename,
                size_bytes,
            } => ResolvedAction::AttachFile {
                task: self.resolve_task(&task_title)?,
                filename,
                size_bytes,
            },
            ActionRequest::AddProjectMember {
                project_name,
                user_identifier,
            } => ResolvedAction::AddProjectMember {
                project: self.find_project(&project_name)?,
                user: self.resolve_user(&user_identifier)?,
            },
            ActionRequest::ListNotifications { unread_only } => {
                ResolvedAction::ListNotifications { unread_only }
            }
        };
        Ok(resolved)
    }

    /// A Member may only name themselves, so an unmatched name is `Forbidden`
    /// for them and `NotFound` for Admin/Manager.
    fn resolve_assignee(&self, name: &str) -> ActionResult<UserId> {
        match self.resolver().resolve_user(name)? {
            Some(user) => Ok(user.id),
            None if self.identity.role.is_privileged() => {
                Err(ServiceError::NotFound("User").into())
            }
            None => Err(ServiceError::forbidden(SELF_ASSIGN_ONLY).into()),
        }
    }

    /// Policy checks that depend only on the resolved rows.
    ///
    /// Rules that depend on the target user's role are enforced by `UserService`.
    pub fn authorize(&self, action: &ResolvedAction) -> ActionResult<()> {
        let identity = self.identity;
        let actor = ResourceContext::actor(identity.user_id);
        match action {
            ResolvedAction::CreateTask { draft } => {
                require_project_access(
                    self.store,
                    identity,
                    draft.project_id,
                    PolicyAction::CreateTask,
                )?;
                require(
                    identity,
                    PolicyAction::AssignTask,
                    &actor.with_assignee(draft.assignee_id),
                    SELF_ASSIGN_ONLY,
                )?;
            }
            ResolvedAction::UpdateTask { task, .. } => {
                require_project_access(self.store, identity, task.project_id, PolicyAction::UpdateTask)?;
            }
            ResolvedAction::AddComment { task, .. } => {
                require_project_access(self.store, identity, task.project_id, PolicyAction::CommentTask)?;
            }
            ResolvedAction::AttachFile { task, .. } => {
                require_project_access(self.store, identity, task.project_id, PolicyAction::AttachToTask)?;
            }
            ResolvedAction::CreateProject { .. } => {
                require(identity, PolicyAction::CreateProject, &actor, NOT_ENOUGH_PERMISSIONS)?;
            }
            ResolvedAction::UpdateProject { .. } => {
                require(identity, PolicyAction::UpdateProject, &actor, NOT_ENOUGH_PERMISSIONS)?;
            }
            ResolvedAction::AddProjectMember { .. } => {
                require(identity, PolicyAction::AddProjectMember, &actor, NOT_ENOUGH_PERMISSIONS)?;
            }
            ResolvedAction::ListUsers { .. } => {
                require(identity, PolicyAction::ListUsers, &actor, LIST_USERS_DENIED)?;
            }
            ResolvedAction::CreateUser { draft } => {
                require(
                    identity,
                    PolicyAction::CreateUser,
                    &actor.with_target_role(Some(draft.role)),
                    CREATE_USER_DENIED,
                )?;
            }
            ResolvedAction::SearchTasks { .. }
            | ResolvedAction::ListTasks { .. }
            | ResolvedAction::GetTask { .. }
            | ResolvedAction::ProjectStats { .. }
            | ResolvedAction::GetProject { .. }
            | ResolvedAction::GetUser { .. }
            | ResolvedAction::UpdateUser { .. }
            | ResolvedAction::ListNotifications { .. } => {}
        }
        Ok(())
    }

    /// Performs the action. Services re-check scope and policy.
    pub fn execute(&self, action: ResolvedAction) -> ActionResult<ActionOutput> {
        let identity = self.identity;
        let tasks = TaskService::new(self.store);
        let projects = ProjectService::new(self.store);
        let users = UserService::new(self.store, self.hasher);

        let output = match action {
            ResolvedAction::SearchTasks { query, top_k } => {
                let results = self.search.search(&self.search_scope, &query, top_k)?;
                ActionOutput::SearchResults { query, results }
            }
            ResolvedAction::ListTasks { filter } => {
                let mut query = TaskListQuery {
                    limit: Some(self.limits.list_limit),
                    ..TaskListQuery::default()
                };
                match filter {
                    ListFilter::All => {}
                    ListFilter::Overdue => query.overdue_at = Some(self.now.timestamp_millis()),
                    ListFilter::HighPriority => query.priority = Some(TaskPriority::High),
                    ListFilter::MyTasks => query.assignee_id = Some(identity.user_id),
                }
                let rows = tasks.list(identity, &query)?;
                ActionOutput::TaskList {
                    filter: filter.as_str(),
                    tasks: self.task_views(rows)?,
                }
            }
            ResolvedAction::CreateTask { draft } => {
                let task = tasks.create(identity, &draft, self.now)?;
                ActionOutput::TaskCreated {
                    task: self.task_view(task)?,
                }
            }
            ResolvedAction::UpdateTask { task, new_status } => {
                let previous_status = task.status;
                let updated =
                    tasks.update(identity, task.id, &TaskPatch::status(new_status), self.now)?;
                ActionOutput::TaskUpdated {
                    task: self.task_view(updated)?,
                    previous_status,
                }
            }
            ResolvedAction::GetTask { task } => {
                let task = tasks.get(identity, task.id)?;
                let comments = tasks.list_comments(identity, task.id)?;
                ActionOutput::TaskDetail {
                    task: self.task_view(task)?,
                    comments,
                }
            }
            ResolvedAction::ProjectStats { projects: rows } => ActionOutput::ProjectStats {
                projects: rows
                    .iter()
                    .map(|project| projects.stats(identity, project.id))
                    .collect::<Result<Vec<_>, _>>()?,
            },
            ResolvedAction::GetProject { project } => ActionOutput::ProjectDetail {
                detail: projects.get(identity, project.id)?,
            },
            ResolvedAction::CreateProject { name, description } => ActionOutput::ProjectCreated {
                project: projects.create(identity, &name, description.as_deref())?,
            },
            ResolvedAction::UpdateProject { project, patch } => ActionOutput::ProjectUpdated {
                project: projects.update(identity, project.id, &patch)?,
            },
            ResolvedAction::GetUser { user } => ActionOutput::UserDetail {
                user: users.get(identity, user.id)?,
            },
            ResolvedAction::ListUsers { role_filter } => ActionOutput::UserList {
                users: users.list(identity, role_filter, Some(self.limits.list_limit))?,
                role_filter,
            },
            ResolvedAction::CreateUser { draft } => ActionOutput::UserCreated {
                user: users.create(identity, &draft)?,
            },
            ResolvedAction::UpdateUser { user, patch } => ActionOutput::UserUpdated {
                user: users.update(identity, user.id, &patch)?,
            },
            ResolvedAction::AddComment { task, content } => {
                let comment = tasks.add_comment(identity, task.id, &content)?;
                ActionOutput::CommentAdded {
                    task_title: task.title,
                    comment,
                }
            }
            ResolvedAction::AttachFile {
                task,
                filename,
                size_bytes,
            } => {
                let attachment = tasks.add_attachment(identity, task.id, &filename, size_bytes)?;
                let used = self.store.count_attachments(task.id)?;
                ActionOutput::FileAttached {
                    task_title: task.title,
                    attachment,
                    remaining_slots: MAX_ATTACHMENTS_PER_TASK.saturating_sub(used),
                }
            }
            ResolvedAction::AddProjectMember { project, user } => {
                projects.add_member(identity, project.id, user.id)?;
                ActionOutput::MemberAdded {
                    project_name: project.name,
                    user_name: user.full_name,
                }
            }
            ResolvedAction::ListNotifications { unread_only } => ActionOutput::Notifications {
                notifications: NotificationService::new(self.store).list(identity, unread_only)?,
                unread_only,
            },
        };
        Ok(output)
    }

    /// Resolve, authorize and execute in one call.
    pub fn run(&self, request: ActionRequest) -> ActionResult<ActionOutput> {
        let resolved = self.resolve(request)?;
        self.authorize(&resolved)?;
        self.execute(resolved)
    }

    fn task_views(&self, rows: Vec<Task>) -> ActionResult<Vec<TaskView>> {
        rows.into_iter().map(|task| self.task_view(task)).collect()
    }

    fn task_view(&self, task: Task) -> ActionResult<TaskView> {
        let organization_id = self.identity.organization_id;
        let project_name = self
            .store
            .get_project(organization_id, task.project_id)?
            .map(|project| project.name)
            .ok_or(ServiceError::NotFound("Project"))?;
        let assignee_name = match task.assignee_id {
            Some(user_id) => self
                .store
                .get_user(organization_id, user_id)?
                .map(|user| user.full_name),
            None => None,
        };
        Ok(TaskView {
            overdue: task.is_overdue(self.now),
            id: task.id,
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            due_date: task.due_date.map(format_day),
            project_id: task.project_id,
            project_name,
            assignee_id: task.assignee_id,
            assignee_name,
        })
    }
}

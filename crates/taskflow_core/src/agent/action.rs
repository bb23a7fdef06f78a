//! Closed action catalog and typed parameter decoding.
//!
//! # Responsibility
//! - Name every action the assistant can run, with its parameter schema.
//! - Decode loosely-typed parameters into one `ActionRequest` variant before
//!   any side effect.
//!
//! # Invariants
//! - Unknown action names never map to a kind.
//! - Empty strings count as absent parameters.
//! - Invalid enum, number or date values are rejected, never coerced.

use crate::model::task::{TaskPriority, TaskStatus};
use crate::model::tenant::Role;
use crate::model::time::parse_due_date;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Every action the dispatcher can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    SearchTasks,
    ListTasks,
    CreateTask,
    UpdateTask,
    GetTask,
    ProjectStats,
    GetProject,
    CreateProject,
    UpdateProject,
    GetUser,
    ListUsers,
    CreateUser,
    UpdateUser,
    AddComment,
    AttachFile,
    AddProjectMember,
    ListNotifications,
}

/// Static parameter contract for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl ActionKind {
    pub const ALL: [ActionKind; 17] = [
        Self::SearchTasks,
        Self::ListTasks,
        Self::CreateTask,
        Self::UpdateTask,
        Self::GetTask,
        Self::ProjectStats,
        Self::GetProject,
        Self::CreateProject,
        Self::UpdateProject,
        Self::GetUser,
        Self::ListUsers,
        Self::CreateUser,
        Self::UpdateUser,
        Self::AddComment,
        Self::AttachFile,
        Self::AddProjectMember,
        Self::ListNotifications,
    ];

    pub fn name(self) -> &'static str {
        self.schema().name
    }

    /// Case-insensitive lookup; accepts `-` for `_` and a trailing `_tool`.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        let normalized = normalized.strip_suffix("_tool").unwrap_or(&normalized);
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
    }

    /// Actions that only read the store.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::SearchTasks
                | Self::ListTasks
                | Self::GetTask
                | Self::ProjectStats
                | Self::GetProject
                | Self::GetUser
                | Self::ListUsers
                | Self::ListNotifications
        )
    }

    pub fn schema(self) -> ActionSchema {
        match self {
            Self::SearchTasks => ActionSchema {
                name: "search_tasks",
                description: "Search existing tasks, their status, assignees or details with a natural language query.",
                required: &["query"],
                optional: &["top_k"],
            },
            Self::ListTasks => ActionSchema {
                name: "list_tasks",
                description: "List tasks. filter: one of 'all', 'overdue', 'high-priority', 'my-tasks'.",
                required: &[],
                optional: &["filter"],
            },
            Self::CreateTask => ActionSchema {
                name: "create_task",
                description: "Create a task. priority: 'high', 'medium' or 'low'; due_date: YYYY-MM-DD.",
                required: &["title"],
                optional: &[
                    "description",
                    "priority",
                    "due_date",
                    "project_name",
                    "assignee_name",
                ],
            },
            Self::UpdateTask => ActionSchema {
                name: "update_task",
                description: "Change the status of a task. new_status: 'todo', 'in-progress' or 'done'.",
                required: &["task_title", "new_status"],
                optional: &[],
            },
            Self::GetTask => ActionSchema {
                name: "get_task",
                description: "Show details of a task by title or partial title.",
                required: &["task_identifier"],
                optional: &[],
            },
            Self::ProjectStats => ActionSchema {
                name: "project_stats",
                description: "Task counts by status per project. Leave project_name empty for all projects.",
                required: &[],
                optional: &["project_name"],
            },
            Self::GetProject => ActionSchema {
                name: "get_project",
                description: "Show details of a project by name or partial name.",
                required: &["project_name"],
                optional: &[],
            },
            Self::CreateProject => ActionSchema {
                name: "create_project",
                description: "Create a project. Requires Admin or Manager role.",
                required: &["name"],
                optional: &["description"],
            },
            Self::UpdateProject => ActionSchema {
                name: "update_project",
                description: "Rename a project or change its description. Requires Admin or Manager role.",
                required: &["project_name"],
                optional: &["new_name", "new_description"],
            },
            Self::GetUser => ActionSchema {
                name: "get_user",
                description: "Show a user by name or email (partial match supported).",
                required: &["user_identifier"],
                optional: &[],
            },
            Self::ListUsers => ActionSchema {
                name: "list_users",
                description: "List users in the organization. role_filter: 'admin', 'manager' or 'member'.",
                required: &[],
                optional: &["role_filter"],
            },
            Self::CreateUser => ActionSchema {
                name: "create_user",
                description: "Create a user. Admin/Manager only. role: 'admin', 'manager' or 'member'.",
                required: &["email", "full_name", "password"],
                optional: &["role"],
            },
            Self::UpdateUser => ActionSchema {
                name: "update_user",
                description: "Update a user's name, role or active flag ('true'/'false').",
                required: &["user_identifier"],
                optional: &["new_name", "new_role", "is_active"],
            },
            Self::AddComment => ActionSchema {
                name: "add_comment",
                description: "Comment on a task by title.",
                required: &["task_title", "content"],
                optional: &[],
            },
            Self::AttachFile => ActionSchema {
                name: "attach_file",
                description: "Record a file attachment on a task. At most 3 files of 5MB each.",
                required: &["task_title", "filename", "size_bytes"],
                optional: &[],
            },
            Self::AddProjectMember => ActionSchema {
                name: "add_project_member",
                description: "Add a user to a project. Requires Admin or Manager role.",
                required: &["project_name", "user_identifier"],
                optional: &[],
            },
            Self::ListNotifications => ActionSchema {
                name: "list_notifications",
                description: "List your notifications. unread_only: 'true' or 'false'.",
                required: &[],
                optional: &["unread_only"],
            },
        }
    }
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// `list_tasks` filter vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFilter {
    #[default]
    All,
    Overdue,
    HighPriority,
    MyTasks,
}

impl ListFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Overdue => "overdue",
            Self::HighPriority => "high-priority",
            Self::MyTasks => "my-tasks",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "all" => Some(Self::All),
            "overdue" => Some(Self::Overdue),
            "high-priority" | "high" => Some(Self::HighPriority),
            "my-tasks" | "mine" => Some(Self::MyTasks),
            _ => None,
        }
    }
}

/// Decoded, typed action parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    SearchTasks {
        query: String,
        top_k: Option<u32>,
    },
    ListTasks {
        filter: ListFilter,
    },
    CreateTask {
        title: String,
        description: Option<String>,
        priority: Option<TaskPriority>,
        due_date: Option<DateTime<Utc>>,
        project_name: Option<String>,
        assignee_name: Option<String>,
    },
    UpdateTask {
        task_title: String,
        new_status: TaskStatus,
    },
    GetTask {
        task_identifier: String,
    },
    ProjectStats {
        project_name: Option<String>,
    },
    GetProject {
        project_name: String,
    },
    CreateProject {
        name: String,
        description: Option<String>,
    },
    UpdateProject {
        project_name: String,
        new_name: Option<String>,
        new_description: Option<String>,
    },
    GetUser {
        user_identifier: String,
    },
    ListUsers {
        role_filter: Option<Role>,
    },
    CreateUser {
        email: String,
        full_name: String,
        password: String,
        role: Role,
    },
    UpdateUser {
        user_identifier: String,
        new_name: Option<String>,
        new_role: Option<Role>,
        is_active: Option<bool>,
    },
    AddComment {
        task_title: String,
        content: String,
    },
    AttachFile {
        task_title: String,
        filename: String,
        size_bytes: u64,
    },
    AddProjectMember {
        project_name: String,
        user_identifier: String,
    },
    ListNotifications {
        unread_only: bool,
    },
}

/// Parameter validation failure. The message is safe to show the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::SearchTasks { .. } => ActionKind::SearchTasks,
            Self::ListTasks { .. } => ActionKind::ListTasks,
            Self::CreateTask { .. } => ActionKind::CreateTask,
            Self::UpdateTask { .. } => ActionKind::UpdateTask,
            Self::GetTask { .. } => ActionKind::GetTask,
            Self::ProjectStats { .. } => ActionKind::ProjectStats,
            Self::GetProject { .. } => ActionKind::GetProject,
            Self::CreateProject { .. } => ActionKind::CreateProject,
            Self::UpdateProject { .. } => ActionKind::UpdateProject,
            Self::GetUser { .. } => ActionKind::GetUser,
            Self::ListUsers { .. } => ActionKind::ListUsers,
            Self::CreateUser { .. } => ActionKind::CreateUser,
            Self::UpdateUser { .. } => ActionKind::UpdateUser,
            Self::AddComment { .. } => ActionKind::AddComment,
            Self::AttachFile { .. } => ActionKind::AttachFile,
            Self::AddProjectMember { .. } => ActionKind::AddProjectMember,
            Self::ListNotifications { .. } => ActionKind::ListNotifications,
        }
    }

    /// Validates `params` against the schema of `kind`.
    pub fn decode(kind: ActionKind, params: &Map<String, Value>) -> Result<Self, DecodeError> {
        let p = Params { kind, params };
        let request = match kind {
            ActionKind::SearchTasks => Self::SearchTasks {
                query: p.required("query")?,
                top_k: p.number("top_k")?.map(|value| value.clamp(1, 50) as u32),
            },
            ActionKind::ListTasks => Self::ListTasks {
                filter: match p.text_any(&["filter", "filter_type"]) {
                    Some(raw) => ListFilter::parse(&raw).ok_or_else(|| {
                        DecodeError(format!(
                            "Invalid filter: {raw}. Use: all, overdue, high-priority, or my-tasks"
                        ))
                    })?,
                    None => ListFilter::All,
                },
            },
            ActionKind::CreateTask => Self::CreateTask {
                title: p.required("title")?,
                description: p.text("description"),
                priority: p.parsed("priority", TaskPriority::parse, "high, medium, or low")?,
                due_date: p
                    .text("due_date")
                    .map(|raw| parse_due_date(&raw).map_err(|err| DecodeError(err.to_string())))
                    .transpose()?,
                project_name: p.text("project_name"),
                assignee_name: p.text_any(&["assignee_name", "assignee"]),
            },
            ActionKind::UpdateTask => Self::UpdateTask {
                task_title: p.required_any(&["task_title", "task_identifier"])?,
                new_status: p
                    .parsed_any(&["new_status", "status"], TaskStatus::parse, "todo, in-progress, or done")?
                    .ok_or_else(|| p.missing("new_status"))?,
            },
            ActionKind::GetTask => Self::GetTask {
                task_identifier: p.required_any(&["task_identifier", "task_title"])?,
            },
            ActionKind::ProjectStats => Self::ProjectStats {
                project_name: p.text("project_name"),
            },
            ActionKind::GetProject => Self::GetProject {
                project_name: p.required("project_name")?,
            },
            ActionKind::CreateProject => Self::CreateProject {
                name: p.required_any(&["name", "project_name"])?,
                description: p.text("description"),
            },
            ActionKind::UpdateProject => Self::UpdateProject {
                project_name: p.required("project_name")?,
                new_name: p.text("new_name"),
                new_description: p.text("new_description"),
            },
            ActionKind::GetUser => Self::GetUser {
                user_identifier: p.required("user_identifier")?,
            },
            ActionKind::ListUsers => Self::ListUsers {
                role_filter: p.parsed_any(&["role_filter", "role"], Role::parse, "admin, manager, or member")?,
            },
            ActionKind::CreateUser => Self::CreateUser {
                email: p.required("email")?,
                full_name: p.required("full_name")?,
                password: p.required("password")?,
                role: p
                    .parsed("role", Role::parse, "admin, manager, or member")?
                    .unwrap_or(Role::Member),
            },
            ActionKind::UpdateUser => Self::UpdateUser {
                user_identifier: p.required("user_identifier")?,
                new_name: p.text("new_name"),
                new_role: p.parsed("new_role", Role::parse, "admin, manager, or member")?,
                is_active: p.flag("is_active")?,
            },
            ActionKind::AddComment => Self::AddComment {
                task_title: p.required_any(&["task_title", "task_identifier"])?,
                content: p.required_any(&["content", "comment"])?,
            },
            ActionKind::AttachFile => Self::AttachFile {
                task_title: p.required_any(&["task_title", "task_identifier"])?,
                filename: p.required("filename")?,
                size_bytes: p
                    .number("size_bytes")?
                    .ok_or_else(|| p.missing("size_bytes"))?,
            },
            ActionKind::AddProjectMember => Self::AddProjectMember {
                project_name: p.required("project_name")?,
                user_identifier: p.required_any(&["user_identifier", "user_name", "email"])?,
            },
            ActionKind::ListNotifications => Self::ListNotifications {
                unread_only: p.flag("unread_only")?.unwrap_or(false),
            },
        };
        Ok(request)
    }
}

struct Params<'a> {
    kind: ActionKind,
    params: &'a Map<String, Value>,
}

impl Params<'_> {
    /// String or number rendered as trimmed text; blanks are absent.
    fn text(&self, key: &str) -> Option<String> {
        let text = match self.params.get(key)? {
            Value::String(value) => value.trim().to_string(),
            Value::Number(value) => value.to_string(),
            Value::Bool(value) => value.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    fn text_any(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.text(key))
    }

    fn missing(&self, key: &str) -> DecodeError {
        DecodeError(format!("{} requires `{key}`", self.kind.name()))
    }

    fn required(&self, key: &str) -> Result<String, DecodeError> {
        self.text(key).ok_or_else(|| self.missing(key))
    }

    fn required_any(&self, keys: &[&str]) -> Result<String, DecodeError> {
        self.text_any(keys).ok_or_else(|| self.missing(keys[0]))
    }

    fn parsed<T>(
        &self,
        key: &str,
        parse: fn(&str) -> Option<T>,
        expected: &str,
    ) -> Result<Option<T>, DecodeError> {
        self.parsed_any(&[key], parse, expected)
    }

    fn parsed_any<T>(
        &self,
        keys: &[&str],
        parse: fn(&str) -> Option<T>,
        expected: &str,
    ) -> Result<Option<T>, DecodeError> {
        match self.text_any(keys) {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| DecodeError(format!("Invalid {}: {raw}. Use: {expected}", keys[0]))),
            None => Ok(None),
        }
    }

    fn number(&self, key: &str) -> Result<Option<u64>, DecodeError> {
        match self.text(key) {
            Some(raw) => raw
                .parse::<u64>()
                .map(Some)
                .map_err(|_| DecodeError(format!("Invalid {key}: {raw}. Expected a whole number"))),
            None => Ok(None),
        }
    }

    fn flag(&self, key: &str) -> Result<Option<bool>, DecodeError> {
        match self.text(key) {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Some(true)),
                "false" | "no" | "0" => Ok(Some(false)),
                _ => Err(DecodeError(format!(
                    "Invalid {key}: {raw}. Use: true or false"
                ))),
            },
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionKind, ActionRequest, ListFilter};
    use crate::model::task::{TaskPriority, TaskStatus};
    use crate::model::tenant::Role;
    use serde_json::{json, Map, Value};

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("object expected"),
        }
    }

    #[test]
    fn names_round_trip_and_tool_suffix_is_accepted() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(
            ActionKind::from_name("create_task_tool"),
            Some(ActionKind::CreateTask)
        );
        assert_eq!(
            ActionKind::from_name("Project-Stats"),
            Some(ActionKind::ProjectStats)
        );
        assert_eq!(ActionKind::from_name("delete_everything"), None);
        assert_eq!(ActionKind::from_name("respond"), None);
    }

    #[test]
    fn create_task_decodes_optional_fields() {
        let request = ActionRequest::decode(
            ActionKind::CreateTask,
            &params(json!({
                "title": "Fix bug",
                "priority": "HIGH",
                "due_date": "2030-01-02",
                "project_name": "",
                "assignee_name": "bob"
            })),
        )
        .expect("decode");
        match request {
            ActionRequest::CreateTask {
                title,
                priority,
                due_date,
                project_name,
                assignee_name,
                ..
            } => {
                assert_eq!(title, "Fix bug");
                assert_eq!(priority, Some(TaskPriority::High));
                assert!(due_date.is_some());
                assert_eq!(project_name, None);
                assert_eq!(assignee_name.as_deref(), Some("bob"));
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn missing_required_parameter_is_rejected() {
        let err = ActionRequest::decode(ActionKind::CreateTask, &params(json!({ "title": "  " })))
            .expect_err("blank title");
        assert!(err.0.contains("title"));
    }

    #[test]
    fn invalid_enum_values_are_rejected_not_defaulted() {
        let err = ActionRequest::decode(
            ActionKind::UpdateTask,
            &params(json!({ "task_title": "Draft", "new_status": "archived" })),
        )
        .expect_err("bad status");
        assert!(err.0.contains("archived"));

        assert!(ActionRequest::decode(
            ActionKind::CreateTask,
            &params(json!({ "title": "x", "priority": "whenever" })),
        )
        .is_err());
        assert!(ActionRequest::decode(
            ActionKind::CreateTask,
            &params(json!({ "title": "x", "due_date": "tomorrow-ish" })),
        )
        .is_err());
    }

    #[test]
    fn update_task_accepts_hyphenated_status() {
        let request = ActionRequest::decode(
            ActionKind::UpdateTask,
            &params(json!({ "task_title": "Draft", "new_status": "in-progress" })),
        )
        .expect("decode");
        assert_eq!(
            request,
            ActionRequest::UpdateTask {
                task_title: "Draft".to_string(),
                new_status: TaskStatus::InProgress,
            }
        );
    }

    #[test]
    fn list_tasks_accepts_filter_type_alias() {
        let request = ActionRequest::decode(
            ActionKind::ListTasks,
            &params(json!({ "filter_type": "overdue" })),
        )
        .expect("decode");
        assert_eq!(
            request,
            ActionRequest::ListTasks {
                filter: ListFilter::Overdue
            }
        );
        let request = ActionRequest::decode(ActionKind::ListTasks, &Map::new()).expect("decode");
        assert_eq!(
            request,
            ActionRequest::ListTasks {
                filter: ListFilter::All
            }
        );
    }

    #[test]
    fn numbers_and_flags_are_lenient_about_json_types() {
        let request = ActionRequest::decode(
            ActionKind::AttachFile,
            &params(json!({ "task_title": "Logo", "filename": "a.png", "size_bytes": 1024 })),
        )
        .expect("decode");
        assert_eq!(request.kind(), ActionKind::AttachFile);

        let request = ActionRequest::decode(
            ActionKind::UpdateUser,
            &params(json!({ "user_identifier": "bob", "is_active": false, "new_role": "Manager" })),
        )
        .expect("decode");
        assert_eq!(
            request,
            ActionRequest::UpdateUser {
                user_identifier: "bob".to_string(),
                new_name: None,
                new_role: Some(Role::Manager),
                is_active: Some(false),
            }
        );
    }
}

//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD, filtered listing, fragment search and status aggregation
//!   over `tasks`.
//!
//! # Invariants
//! - Tasks reach an organization only through their project; every
//!   organization-scoped query joins `projects`.
//! - Read paths reject invalid persisted enum values instead of masking them.

use super::{fragment_needle, limit_value, RepoError, RepoResult, SqliteStore};
use crate::model::task::{NewTask, StatusCounts, Task, TaskPriority, TaskStatus};
use crate::model::{OrganizationId, ProjectId, TaskId, UserId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

const TASK_SELECT_SQL: &str = "SELECT
    tasks.id AS id,
    tasks.title AS title,
    tasks.description AS description,
    tasks.status AS status,
    tasks.priority AS priority,
    tasks.due_date AS due_date,
    tasks.project_id AS project_id,
    tasks.assignee_id AS assignee_id,
    tasks.created_at AS created_at,
    tasks.updated_at AS updated_at
FROM tasks
JOIN projects ON projects.id = tasks.project_id";

/// Query options for listing tasks inside one organization.
#[derive(Debug, Clone, Default)]
pub struct TaskListQuery {
    pub project_id: Option<ProjectId>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<UserId>,
    /// When set, only tasks due strictly before this epoch ms and not done.
    pub overdue_at: Option<i64>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for tasks.
pub trait TaskRepository {
    fn create_task(&self, task: &NewTask, now_ms: i64) -> RepoResult<Task>;
    fn get_task(&self, organization_id: OrganizationId, id: TaskId) -> RepoResult<Option<Task>>;
    /// Last writer wins; no version check.
    fn update_task(&self, task: &Task, now_ms: i64) -> RepoResult<()>;
    fn list_tasks(
        &self,
        organization_id: OrganizationId,
        query: &TaskListQuery,
    ) -> RepoResult<Vec<Task>>;
    /// Case-insensitive substring match on title.
    fn search_tasks_by_title(
        &self,
        organization_id: OrganizationId,
        fragment: &str,
        limit: Option<u32>,
    ) -> RepoResult<Vec<Task>>;
    fn count_tasks_by_status(&self, project_id: ProjectId) -> RepoResult<StatusCounts>;
}

impl TaskRepository for SqliteStore<'_> {
    fn create_task(&self, task: &NewTask, now_ms: i64) -> RepoResult<Task> {
        self.conn.execute(
            "INSERT INTO tasks (
                title,
                description,
                status,
                priority,
                due_date,
                project_id,
                assignee_id,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8);",
            params![
                task.title.trim(),
                task.description.as_deref(),
                task.status.as_str(),
                task.priority.as_str(),
                task.due_date,
                task.project_id,
                task.assignee_id,
                now_ms,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE tasks.id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => parse_task_row(row),
            None => Err(RepoError::NotFound { entity: "task", id }),
        }
    }

    fn get_task(&self, organization_id: OrganizationId, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL} WHERE tasks.id = ?1 AND projects.organization_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![id, organization_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_task_row(row)?)),
            None => Ok(None),
        }
    }

    fn update_task(&self, task: &Task, now_ms: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                title = ?1,
                description = ?2,
                status = ?3,
                priority = ?4,
                due_date = ?5,
                assignee_id = ?6,
                updated_at = ?7
             WHERE id = ?8;",
            params![
                task.title.as_str(),
                task.description.as_deref(),
                task.status.as_str(),
                task.priority.as_str(),
                task.due_date,
                task.assignee_id,
                now_ms,
                task.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "task",
                id: task.id,
            });
        }
        Ok(())
    }

    fn list_tasks(
        &self,
        organization_id: OrganizationId,
        query: &TaskListQuery,
    ) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE projects.organization_id = ?");
        let mut bind_values = vec![Value::Integer(organization_id)];

        if let Some(project_id) = query.project_id {
            sql.push_str(" AND tasks.project_id = ?");
            bind_values.push(Value::Integer(project_id));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND tasks.status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(priority) = query.priority {
            sql.push_str(" AND tasks.priority = ?");
            bind_values.push(Value::Text(priority.as_str().to_string()));
        }
        if let Some(assignee_id) = query.assignee_id {
            sql.push_str(" AND tasks.assignee_id = ?");
            bind_values.push(Value::Integer(assignee_id));
        }
        if let Some(overdue_at) = query.overdue_at {
            sql.push_str(" AND tasks.due_date IS NOT NULL AND tasks.due_date < ? AND tasks.status != 'done'");
            bind_values.push(Value::Integer(overdue_at));
        }

        sql.push_str(" ORDER BY tasks.id ASC LIMIT ?");
        bind_values.push(Value::Integer(limit_value(query.limit)));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        collect_tasks(self, &sql, bind_values)
    }

    fn search_tasks_by_title(
        &self,
        organization_id: OrganizationId,
        fragment: &str,
        limit: Option<u32>,
    ) -> RepoResult<Vec<Task>> {
        collect_tasks(
            self,
            &format!(
                "{TASK_SELECT_SQL}
                 WHERE projects.organization_id = ? AND instr(fold_case(tasks.title), ?) > 0
                 ORDER BY tasks.id ASC
                 LIMIT ?"
            ),
            vec![
                Value::Integer(organization_id),
                Value::Text(fragment_needle(fragment)),
                Value::Integer(limit_value(limit)),
            ],
        )
    }

    fn count_tasks_by_status(&self, project_id: ProjectId) -> RepoResult<StatusCounts> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) AS total FROM tasks WHERE project_id = ?1 GROUP BY status;",
        )?;
        let mut rows = stmt.query([project_id])?;
        let mut counts = StatusCounts::default();
        while let Some(row) = rows.next()? {
            let status_text: String = row.get("status")?;
            let status = TaskStatus::parse(&status_text).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid task status `{status_text}` in tasks.status"))
            })?;
            counts.add(status, row.get("total")?);
        }
        Ok(counts)
    }
}

fn collect_tasks(store: &SqliteStore<'_>, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Task>> {
    let mut stmt = store.conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(parse_task_row(row)?);
    }
    Ok(tasks)
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let status_text: String = row.get("status")?;
    let status = TaskStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid task status `{status_text}` in tasks.status"))
    })?;

    let priority_text: String = row.get("priority")?;
    let priority = TaskPriority::parse(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid task priority `{priority_text}` in tasks.priority"
        ))
    })?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status,
        priority,
        due_date: row.get("due_date")?,
        project_id: row.get("project_id")?,
        assignee_id: row.get("assignee_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

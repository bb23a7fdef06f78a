//! Project and membership persistence.
//!
//! # Invariants
//! - Projects are listed in ascending id order; the first row is the
//!   organization's default project for underspecified task creation.
//! - Membership rows cascade with their project.

use super::{fragment_needle, limit_value, RepoError, RepoResult, SqliteStore};
use crate::model::project::{NewProject, Project, ProjectMember};
use crate::model::{OrganizationId, ProjectId, UserId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

const PROJECT_SELECT_SQL: &str = "SELECT
    projects.id AS id,
    projects.name AS name,
    projects.description AS description,
    projects.organization_id AS organization_id,
    projects.created_at AS created_at
FROM projects";

/// Repository interface for projects and memberships.
pub trait ProjectRepository {
    fn create_project(&self, project: &NewProject) -> RepoResult<Project>;
    fn get_project(
        &self,
        organization_id: OrganizationId,
        id: ProjectId,
    ) -> RepoResult<Option<Project>>;
    fn update_project(&self, project: &Project) -> RepoResult<()>;
    fn list_projects(
        &self,
        organization_id: OrganizationId,
        limit: Option<u32>,
    ) -> RepoResult<Vec<Project>>;
    fn list_member_projects(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> RepoResult<Vec<Project>>;
    /// Case-insensitive substring match on project name.
    fn search_projects(
        &self,
        organization_id: OrganizationId,
        fragment: &str,
        limit: Option<u32>,
    ) -> RepoResult<Vec<Project>>;
    /// Exact-name lookup used for duplicate checks.
    fn find_project_by_name(
        &self,
        organization_id: OrganizationId,
        name: &str,
    ) -> RepoResult<Option<Project>>;
    fn add_member(&self, project_id: ProjectId, user_id: UserId) -> RepoResult<ProjectMember>;
    fn is_member(&self, project_id: ProjectId, user_id: UserId) -> RepoResult<bool>;
    fn member_count(&self, project_id: ProjectId) -> RepoResult<u32>;
}

impl ProjectRepository for SqliteStore<'_> {
    fn create_project(&self, project: &NewProject) -> RepoResult<Project> {
        self.conn.execute(
            "INSERT INTO projects (name, description, organization_id) VALUES (?1, ?2, ?3);",
            params![
                project.name.trim(),
                project.description.as_deref(),
                project.organization_id,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_project(project.organization_id, id)?
            .ok_or(RepoError::NotFound {
                entity: "project",
                id,
            })
    }

    fn get_project(
        &self,
        organization_id: OrganizationId,
        id: ProjectId,
    ) -> RepoResult<Option<Project>> {
        let project = self
            .conn
            .query_row(
                &format!("{PROJECT_SELECT_SQL} WHERE id = ?1 AND organization_id = ?2;"),
                params![id, organization_id],
                parse_project_row,
            )
            .optional()?;
        Ok(project)
    }

    fn update_project(&self, project: &Project) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE projects SET name = ?1, description = ?2
             WHERE id = ?3 AND organization_id = ?4;",
            params![
                project.name.as_str(),
                project.description.as_deref(),
                project.id,
                project.organization_id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "project",
                id: project.id,
            });
        }
        Ok(())
    }

    fn list_projects(
        &self,
        organization_id: OrganizationId,
        limit: Option<u32>,
    ) -> RepoResult<Vec<Project>> {
        collect_projects(
            self,
            &format!("{PROJECT_SELECT_SQL} WHERE organization_id = ? ORDER BY id ASC LIMIT ?"),
            vec![
                Value::Integer(organization_id),
                Value::Integer(limit_value(limit)),
            ],
        )
    }

    fn list_member_projects(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> RepoResult<Vec<Project>> {
        collect_projects(
            self,
            &format!(
                "{PROJECT_SELECT_SQL}
                 JOIN project_members ON project_members.project_id = projects.id
                 WHERE projects.organization_id = ? AND project_members.user_id = ?
                 ORDER BY projects.id ASC"
            ),
            vec![Value::Integer(organization_id), Value::Integer(user_id)],
        )
    }

    fn search_projects(
        &self,
        organization_id: OrganizationId,
        fragment: &str,
        limit: Option<u32>,
    ) -> RepoResult<Vec<Project>> {
        collect_projects(
            self,
            &format!(
                "{PROJECT_SELECT_SQL}
                 WHERE organization_id = ? AND instr(fold_case(name), ?) > 0
                 ORDER BY id ASC
                 LIMIT ?"
            ),
            vec![
                Value::Integer(organization_id),
                Value::Text(fragment_needle(fragment)),
                Value::Integer(limit_value(limit)),
            ],
        )
    }

    fn find_project_by_name(
        &self,
        organization_id: OrganizationId,
        name: &str,
    ) -> RepoResult<Option<Project>> {
        let project = self
            .conn
            .query_row(
                &format!(
                    "{PROJECT_SELECT_SQL} WHERE organization_id = ?1 AND name = ?2 ORDER BY id LIMIT 1;"
                ),
                params![organization_id, name.trim()],
                parse_project_row,
            )
            .optional()?;
        Ok(project)
    }

    fn add_member(&self, project_id: ProjectId, user_id: UserId) -> RepoResult<ProjectMember> {
        self.conn.execute(
            "INSERT INTO project_members (project_id, user_id) VALUES (?1, ?2);",
            params![project_id, user_id],
        )?;
        Ok(ProjectMember {
            project_id,
            user_id,
        })
    }

    fn is_member(&self, project_id: ProjectId, user_id: UserId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM project_members WHERE project_id = ?1 AND user_id = ?2
            );",
            params![project_id, user_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn member_count(&self, project_id: ProjectId) -> RepoResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM project_members WHERE project_id = ?1;",
            [project_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn collect_projects(
    store: &SqliteStore<'_>,
    sql: &str,
    bind_values: Vec<Value>,
) -> RepoResult<Vec<Project>> {
    let mut stmt = store.conn.prepare(sql)?;
    let projects = stmt
        .query_map(params_from_iter(bind_values), parse_project_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(projects)
}

fn parse_project_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        organization_id: row.get("organization_id")?,
        created_at: row.get("created_at")?,
    })
}

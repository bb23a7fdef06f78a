//! Organization persistence.

use super::{RepoResult, SqliteStore};
use crate::model::tenant::Organization;
use crate::model::OrganizationId;
use rusqlite::{params, OptionalExtension, Row};

const ORGANIZATION_SELECT_SQL: &str = "SELECT id, name, created_at FROM organizations";

/// Repository interface for tenant roots.
pub trait OrganizationRepository {
    fn create_organization(&self, name: &str) -> RepoResult<Organization>;
    fn get_organization(&self, id: OrganizationId) -> RepoResult<Option<Organization>>;
    fn organization_name_exists(&self, name: &str) -> RepoResult<bool>;
}

impl OrganizationRepository for SqliteStore<'_> {
    fn create_organization(&self, name: &str) -> RepoResult<Organization> {
        self.conn
            .execute("INSERT INTO organizations (name) VALUES (?1);", [name])?;
        let id = self.conn.last_insert_rowid();
        let organization = self
            .conn
            .query_row(
                &format!("{ORGANIZATION_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_organization_row,
            )?;
        Ok(organization)
    }

    fn get_organization(&self, id: OrganizationId) -> RepoResult<Option<Organization>> {
        let organization = self
            .conn
            .query_row(
                &format!("{ORGANIZATION_SELECT_SQL} WHERE id = ?1;"),
                params![id],
                parse_organization_row,
            )
            .optional()?;
        Ok(organization)
    }

    fn organization_name_exists(&self, name: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM organizations WHERE name = ?1);",
            [name],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn parse_organization_row(row: &Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

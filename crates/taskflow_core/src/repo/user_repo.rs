//! User persistence.
//!
//! # Invariants
//! - Email uniqueness is global and case-insensitive (`COLLATE NOCASE`).
//! - Lookups by id and fragment are organization-scoped.

use super::{
    bool_to_int, fragment_needle, int_to_bool, limit_value, RepoError, RepoResult, SqliteStore,
};
use crate::model::tenant::{NewUser, Role, User};
use crate::model::{OrganizationId, UserId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    email,
    hashed_password,
    full_name,
    role,
    is_active,
    organization_id
FROM users";

/// Repository interface for users.
pub trait UserRepository {
    fn create_user(&self, user: &NewUser) -> RepoResult<User>;
    fn get_user(&self, organization_id: OrganizationId, id: UserId) -> RepoResult<Option<User>>;
    fn email_exists(&self, email: &str) -> RepoResult<bool>;
    fn update_user(&self, user: &User) -> RepoResult<()>;
    fn list_users(
        &self,
        organization_id: OrganizationId,
        role: Option<Role>,
        limit: Option<u32>,
    ) -> RepoResult<Vec<User>>;
    /// Case-insensitive substring match on display name OR email.
    fn search_users(
        &self,
        organization_id: OrganizationId,
        fragment: &str,
        limit: Option<u32>,
    ) -> RepoResult<Vec<User>>;
}

impl UserRepository for SqliteStore<'_> {
    fn create_user(&self, user: &NewUser) -> RepoResult<User> {
        self.conn.execute(
            "INSERT INTO users (
                email,
                hashed_password,
                full_name,
                role,
                is_active,
                organization_id
            ) VALUES (?1, ?2, ?3, ?4, 1, ?5);",
            params![
                user.email.trim(),
                user.hashed_password.as_str(),
                user.full_name.trim(),
                user.role.as_str(),
                user.organization_id,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_user(user.organization_id, id)?
            .ok_or(RepoError::NotFound { entity: "user", id })
    }

    fn get_user(&self, organization_id: OrganizationId, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "{USER_SELECT_SQL} WHERE id = ?1 AND organization_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![id, organization_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn email_exists(&self, email: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1);",
            [email.trim()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET
                full_name = ?1,
                role = ?2,
                is_active = ?3
             WHERE id = ?4 AND organization_id = ?5;",
            params![
                user.full_name.as_str(),
                user.role.as_str(),
                bool_to_int(user.is_active),
                user.id,
                user.organization_id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "user",
                id: user.id,
            });
        }
        Ok(())
    }

    fn list_users(
        &self,
        organization_id: OrganizationId,
        role: Option<Role>,
        limit: Option<u32>,
    ) -> RepoResult<Vec<User>> {
        let mut sql = format!("{USER_SELECT_SQL} WHERE organization_id = ?");
        let mut bind_values = vec![Value::Integer(organization_id)];

        if let Some(role) = role {
            sql.push_str(" AND role = ?");
            bind_values.push(Value::Text(role.as_str().to_string()));
        }

        sql.push_str(" ORDER BY id ASC LIMIT ?");
        bind_values.push(Value::Integer(limit_value(limit)));

        collect_users(self, &sql, bind_values)
    }

    fn search_users(
        &self,
        organization_id: OrganizationId,
        fragment: &str,
        limit: Option<u32>,
    ) -> RepoResult<Vec<User>> {
        let sql = format!(
            "{USER_SELECT_SQL}
             WHERE organization_id = ?
               AND (instr(fold_case(full_name), ?) > 0 OR instr(fold_case(email), ?) > 0)
             ORDER BY id ASC
             LIMIT ?"
        );
        let needle = fragment_needle(fragment);
        let bind_values = vec![
            Value::Integer(organization_id),
            Value::Text(needle.clone()),
            Value::Text(needle),
            Value::Integer(limit_value(limit)),
        ];
        collect_users(self, &sql, bind_values)
    }
}

fn collect_users(store: &SqliteStore<'_>, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<User>> {
    let mut stmt = store.conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut users = Vec::new();
    while let Some(row) = rows.next()? {
        users.push(parse_user_row(row)?);
    }
    Ok(users)
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid role `{role_text}` in users.role")))?;

    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        hashed_password: row.get("hashed_password")?,
        full_name: row.get("full_name")?,
        role,
        is_active: int_to_bool(row.get("is_active")?, "users.is_active")?,
        organization_id: row.get("organization_id")?,
    })
}

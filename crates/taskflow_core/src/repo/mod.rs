//! Repository layer abstractions and the SQLite domain store.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per entity family.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Every read that takes an `OrganizationId` is scoped to it; rows from
//!   another organization are indistinguishable from absent rows.
//! - List/search results are ordered by ascending id.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

pub mod activity_repo;
pub mod organization_repo;
pub mod project_repo;
pub mod task_repo;
pub mod user_repo;

use crate::db::DbError;
use rusqlite::Connection;

pub use activity_repo::ActivityRepository;
pub use organization_repo::OrganizationRepository;
pub use project_repo::ProjectRepository;
pub use task_repo::{TaskListQuery, TaskRepository};
pub use user_repo::UserRepository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },
    #[error("uniqueness violated: {0}")]
    Conflict(String),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if is_unique_violation(&value) {
            return Self::Conflict(value.to_string());
        }
        Self::Db(DbError::Sqlite(value))
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => matches!(
            failure.extended_code,
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        ),
        _ => false,
    }
}

/// Full store contract consumed by services, resolver and actions.
pub trait DomainStore:
    OrganizationRepository + UserRepository + ProjectRepository + TaskRepository + ActivityRepository
{
}

impl<T> DomainStore for T where
    T: OrganizationRepository
        + UserRepository
        + ProjectRepository
        + TaskRepository
        + ActivityRepository
{
}

/// SQLite-backed store borrowing one connection.
///
/// Pass a `rusqlite::Transaction` (it derefs to `Connection`) to make every
/// read and write of one request a single unit of work.
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

/// Lowercased needle for `instr(fold_case(column), ?)` fragment matching.
///
/// Both sides use Unicode lowercasing, so "ÉQUIPE" finds "Équipe".
pub(crate) fn fragment_needle(fragment: &str) -> String {
    fragment.trim().to_lowercase()
}

pub(crate) fn limit_value(limit: Option<u32>) -> i64 {
    limit.map_or(-1, i64::from)
}

//! Semantic search collaborator.
//!
//! # Responsibility
//! - Define the `search(query, top_k) -> ranked snippets` seam the assistant
//!   consumes.
//! - Ship a bundled implementation backed by SQLite FTS5.
//!
//! # Invariants
//! - Results never include rows from outside the scope's organization.
//! - An empty result is a valid answer, not an error.

pub mod fts;

use crate::db::DbError;
use crate::model::task::{TaskPriority, TaskStatus};
use crate::model::{OrganizationId, ProjectId, TaskId, UserId};
use rusqlite::Connection;
use serde::Serialize;

pub use fts::{rebuild_search_index, FtsTaskSearch};

pub type SearchResult<T> = Result<T, SearchError>;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search backend unavailable: {0}")]
    Unavailable(String),
    #[error("invalid search row: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Request-scoped search context.
pub struct SearchScope<'a> {
    pub organization_id: OrganizationId,
    /// The request's unit of work, for implementations that read the store.
    pub conn: &'a Connection,
}

/// Structured facts attached to one snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnippetMetadata {
    pub task_id: TaskId,
    pub project_id: ProjectId,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<UserId>,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchSnippet {
    pub text: String,
    pub metadata: SnippetMetadata,
}

/// Ranked retrieval over the organization's tasks.
pub trait SemanticSearch: Send + Sync {
    fn search(
        &self,
        scope: &SearchScope<'_>,
        query: &str,
        top_k: u32,
    ) -> SearchResult<Vec<SearchSnippet>>;
}

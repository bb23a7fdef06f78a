//! SQLite FTS5-based task search.
//!
//! # Responsibility
//! - Provide keyword search over task title and description.
//! - Render each hit as a self-contained text snippet.
//!
//! # Invariants
//! - Only tasks whose project belongs to the scope organization are returned.
//! - Result ordering is deterministic by bm25 rank, then task id.

use super::{SearchError, SearchResult, SearchScope, SearchSnippet, SemanticSearch, SnippetMetadata};
use crate::model::task::{TaskPriority, TaskStatus};
use crate::model::time::format_day;
use log::info;
use rusqlite::{params, Connection, Row};

/// Bundled `SemanticSearch` over the `tasks_fts` index.
#[derive(Debug, Default, Clone, Copy)]
pub struct FtsTaskSearch;

impl SemanticSearch for FtsTaskSearch {
    fn search(
        &self,
        scope: &SearchScope<'_>,
        query: &str,
        top_k: u32,
    ) -> SearchResult<Vec<SearchSnippet>> {
        let Some(match_expr) = build_match_expression(query) else {
            return Ok(Vec::new());
        };
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = scope.conn.prepare(
            "SELECT
                tasks.id AS task_id,
                tasks.title AS title,
                tasks.description AS description,
                tasks.status AS status,
                tasks.priority AS priority,
                tasks.due_date AS due_date,
                tasks.project_id AS project_id,
                tasks.assignee_id AS assignee_id,
                projects.name AS project_name,
                users.full_name AS assignee_name
             FROM tasks_fts
             JOIN tasks ON tasks.id = tasks_fts.rowid
             JOIN projects ON projects.id = tasks.project_id
             LEFT JOIN users ON users.id = tasks.assignee_id
             WHERE tasks_fts MATCH ?1
               AND projects.organization_id = ?2
             ORDER BY bm25(tasks_fts), tasks.id ASC
             LIMIT ?3;",
        )?;
        let mut rows = stmt
            .query(params![match_expr, scope.organization_id, i64::from(top_k)])
            .map_err(map_query_error)?;

        let mut snippets = Vec::new();
        while let Some(row) = rows.next().map_err(map_query_error)? {
            snippets.push(parse_snippet_row(row)?);
        }
        Ok(snippets)
    }
}

/// Rebuilds `tasks_fts` from the `tasks` table. Returns the indexed task count.
pub fn rebuild_search_index(conn: &Connection) -> SearchResult<u64> {
    conn.execute("INSERT INTO tasks_fts(tasks_fts) VALUES ('rebuild');", [])?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM tasks;", [], |row| row.get(0))?;
    let count = u64::try_from(count)
        .map_err(|_| SearchError::InvalidData(format!("negative task count {count}")))?;
    info!("event=search_index_rebuild module=search status=ok indexed={count}");
    Ok(count)
}

fn parse_snippet_row(row: &Row<'_>) -> SearchResult<SearchSnippet> {
    let status_text: String = row.get("status")?;
    let status = TaskStatus::parse(&status_text)
        .ok_or_else(|| SearchError::InvalidData(format!("invalid status `{status_text}`")))?;
    let priority_text: String = row.get("priority")?;
    let priority = TaskPriority::parse(&priority_text)
        .ok_or_else(|| SearchError::InvalidData(format!("invalid priority `{priority_text}`")))?;

    let title: String = row.get("title")?;
    let description: Option<String> = row.get("description")?;
    let assignee_name: Option<String> = row.get("assignee_name")?;
    let project_name: String = row.get("project_name")?;
    let due_date: Option<i64> = row.get("due_date")?;

    let text = format!(
        "Task: {title}. Description: {}. Status: {}. Priority: {}. Assigned to: {}. Project: {project_name}. Due date: {}.",
        description.as_deref().unwrap_or("No description"),
        status.as_str(),
        priority.as_str(),
        assignee_name.as_deref().unwrap_or("Unassigned"),
        due_date.map_or_else(|| "No due date".to_string(), format_day),
    );

    Ok(SearchSnippet {
        text,
        metadata: SnippetMetadata {
            task_id: row.get("task_id")?,
            project_id: row.get("project_id")?,
            status,
            priority,
            assignee_id: row.get("assignee_id")?,
        },
    })
}

/// Quotes every term and joins them with OR so free text never hits FTS5 syntax.
fn build_match_expression(query: &str) -> Option<String> {
    let terms = query
        .split_whitespace()
        .map(|term| term.trim_matches(|ch: char| !ch.is_alphanumeric()))
        .filter(|term| !term.is_empty())
        .map(escape_fts_term)
        .collect::<Vec<_>>();

    if terms.is_empty() {
        return None;
    }
    Some(terms.join(" OR "))
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

fn map_query_error(err: rusqlite::Error) -> SearchError {
    match &err {
        rusqlite::Error::SqliteFailure(_, Some(message))
            if message.to_lowercase().contains("fts5") =>
        {
            SearchError::Unavailable(message.clone())
        }
        _ => SearchError::from(err),
    }
}

#[cfg(test)]
mod tests {
    use super::build_match_expression;

    #[test]
    fn blank_queries_produce_no_expression() {
        assert_eq!(build_match_expression("   "), None);
        assert_eq!(build_match_expression("?!"), None);
    }

    #[test]
    fn terms_are_quoted_and_or_joined() {
        assert_eq!(
            build_match_expression("login bug?").as_deref(),
            Some("\"login\" OR \"bug\"")
        );
        assert_eq!(
            build_match_expression("say \"hi\"").as_deref(),
            Some("\"say\" OR \"hi\"")
        );
    }
}

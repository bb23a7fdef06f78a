mod common;

use chrono::{TimeZone, Utc};
use common::{acme, insert_task, now};
use taskflow_core::model::task::{TaskPriority, TaskStatus};
use taskflow_core::search::{rebuild_search_index, FtsTaskSearch, SearchScope, SemanticSearch};
use taskflow_core::service::{TaskDraft, TaskPatch, TaskService};
use taskflow_core::SqliteStore;

#[test]
fn search_finds_title_and_description_terms() {
    let fx = acme();
    let store = SqliteStore::new(&fx.conn);
    let tasks = TaskService::new(&store);
    tasks
        .create(
            &fx.admin,
            &TaskDraft {
                description: Some("Rotate the staging certificates".to_string()),
                ..TaskDraft::new("Ops chores", fx.website)
            },
            now(),
        )
        .unwrap();
    tasks
        .create(&fx.admin, &TaskDraft::new("Write changelog", fx.website), now())
        .unwrap();

    let hits = search(&fx.conn, fx.admin.organization_id, "certificates", 5);
    assert_eq!(hits.len(), 1);
    assert!(hits[0].text.starts_with("Task: Ops chores."));
}

#[test]
fn search_is_scoped_to_organization() {
    let fx = acme();
    insert_task(
        &fx.conn,
        fx.globex_project,
        "Secret launch plan",
        TaskStatus::Todo,
        None,
        Some(&fx.globex_admin),
    );

    assert!(search(&fx.conn, fx.admin.organization_id, "secret launch", 5).is_empty());
    assert_eq!(
        search(&fx.conn, fx.globex_admin.organization_id, "secret launch", 5).len(),
        1
    );
}

#[test]
fn snippet_text_and_metadata_describe_the_task() {
    let fx = acme();
    let due = Utc.with_ymd_and_hms(2030, 7, 1, 0, 0, 0).unwrap();
    let store = SqliteStore::new(&fx.conn);
    let task = TaskService::new(&store)
        .create(
            &fx.admin,
            &TaskDraft {
                priority: Some(TaskPriority::High),
                due_date: Some(due),
                assignee_id: Some(fx.bob.user_id),
                ..TaskDraft::new("Launch banner", fx.website)
            },
            now(),
        )
        .unwrap();

    let hits = search(&fx.conn, fx.admin.organization_id, "banner", 5);
    assert_eq!(hits.len(), 1);
    assert_eq!(
        hits[0].text,
        "Task: Launch banner. Description: No description. Status: todo. Priority: high. \
         Assigned to: Bob Builder. Project: Website. Due date: 2030-07-01."
    );
    assert_eq!(hits[0].metadata.task_id, task.id);
    assert_eq!(hits[0].metadata.project_id, fx.website);
    assert_eq!(hits[0].metadata.assignee_id, Some(fx.bob.user_id));
}

#[test]
fn index_follows_title_updates() {
    let fx = acme();
    let store = SqliteStore::new(&fx.conn);
    let tasks = TaskService::new(&store);
    let task = tasks
        .create(&fx.admin, &TaskDraft::new("Draft proposal", fx.website), now())
        .unwrap();
    tasks
        .update(
            &fx.admin,
            task.id,
            &TaskPatch {
                title: Some("Final contract".to_string()),
                ..TaskPatch::default()
            },
            now(),
        )
        .unwrap();

    assert!(search(&fx.conn, fx.admin.organization_id, "proposal", 5).is_empty());
    assert_eq!(search(&fx.conn, fx.admin.organization_id, "contract", 5).len(), 1);
}

#[test]
fn blank_query_and_zero_top_k_return_nothing() {
    let fx = acme();
    insert_task(&fx.conn, fx.website, "Anything", TaskStatus::Todo, None, None);

    assert!(search(&fx.conn, fx.admin.organization_id, "   ", 5).is_empty());
    assert!(search(&fx.conn, fx.admin.organization_id, "\"*()", 5).is_empty());
    assert!(search(&fx.conn, fx.admin.organization_id, "anything", 0).is_empty());
}

#[test]
fn top_k_limits_results() {
    let fx = acme();
    for index in 0..4 {
        insert_task(
            &fx.conn,
            fx.website,
            &format!("Report {index}"),
            TaskStatus::Todo,
            None,
            None,
        );
    }

    assert_eq!(search(&fx.conn, fx.admin.organization_id, "report", 2).len(), 2);
}

#[test]
fn rebuild_reports_indexed_task_count() {
    let fx = acme();
    insert_task(&fx.conn, fx.website, "One", TaskStatus::Todo, None, None);
    insert_task(&fx.conn, fx.globex_project, "Two", TaskStatus::Todo, None, None);

    assert_eq!(rebuild_search_index(&fx.conn).unwrap(), 2);
    assert_eq!(search(&fx.conn, fx.admin.organization_id, "one", 5).len(), 1);
}

fn search(
    conn: &rusqlite::Connection,
    organization_id: i64,
    query: &str,
    top_k: u32,
) -> Vec<taskflow_core::search::SearchSnippet> {
    FtsTaskSearch
        .search(
            &SearchScope {
                organization_id,
                conn,
            },
            query,
            top_k,
        )
        .unwrap()
}

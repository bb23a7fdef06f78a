mod common;

use chrono::Duration;
use common::{acme, count_rows, insert_task, intent_json, now, seed, ScriptedModel};
use rusqlite::Connection;
use serde_json::json;
use std::sync::Arc;
use taskflow_core::agent::intent::{RULE_HELP, UNPARSEABLE_REPLY};
use taskflow_core::agent::{
    LanguageModel, ModelError, ModelIntentParser, RuleIntentParser, RATE_LIMIT_MESSAGE,
    UPSTREAM_UNAVAILABLE_MESSAGE,
};
use taskflow_core::error::ErrorKind;
use taskflow_core::model::task::{Task, TaskStatus};
use taskflow_core::model::OrganizationId;
use taskflow_core::repo::{TaskRepository, UserRepository};
use taskflow_core::search::{SearchError, SearchScope, SearchSnippet, SemanticSearch};
use taskflow_core::service::CredentialHasher;
use taskflow_core::service::{register_organization, ProjectService, Registration};
use taskflow_core::{open_db, DispatchOutcome, Dispatcher, Identity, Role, SqliteStore};

fn scripted(replies: Vec<Result<String, ModelError>>) -> (Dispatcher, Arc<ScriptedModel>) {
    let model = Arc::new(ScriptedModel::new(replies));
    let shared: Arc<dyn LanguageModel> = model.clone();
    (
        Dispatcher::new(Box::new(ModelIntentParser::new(shared))),
        model,
    )
}

fn replying(action: &str, input: serde_json::Value) -> Dispatcher {
    scripted(vec![Ok(intent_json(action, input))]).0
}

fn find_task(conn: &Connection, organization_id: OrganizationId, title: &str) -> Option<Task> {
    SqliteStore::new(conn)
        .search_tasks_by_title(organization_id, title, Some(1))
        .unwrap()
        .into_iter()
        .next()
}

#[test]
fn create_task_without_project_lands_in_first_project_assigned_to_caller() {
    let mut fx = acme();
    let dispatcher = replying("create_task", json!({ "title": "Fix bug" }));

    let response = dispatcher.dispatch_at(&mut fx.conn, "add a task fix bug", &fx.bob, now());

    assert_eq!(response.outcome, DispatchOutcome::Completed);
    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.response,
        "✅ Task 'Fix bug' created in project 'Website' (priority: medium, assigned to: Bob Builder)"
    );
    let task = find_task(&fx.conn, fx.admin.organization_id, "Fix bug").unwrap();
    assert_eq!(task.project_id, fx.website);
    assert_eq!(task.assignee_id, Some(fx.bob.user_id));
    assert_eq!(response.actions[0].action, "create_task");
    assert!(response.actions[0].success);
    assert_eq!(response.actions[0].details["type"], "task_created");
}

#[test]
fn create_task_in_organization_without_projects_is_not_found() {
    let mut conn = taskflow_core::open_db_in_memory().unwrap();
    let registered = register_organization(
        &mut conn,
        &Registration {
            organization_name: "Initech".to_string(),
            email: "peter@initech.com".to_string(),
            credential_hash: "hash".to_string(),
            full_name: "Peter Gibbons".to_string(),
        },
    )
    .unwrap();
    let admin = Identity::of(&registered.admin);
    let dispatcher = replying("create_task", json!({ "title": "TPS reports" }));

    let response = dispatcher.dispatch_at(&mut conn, "create tps reports", &admin, now());

    assert_eq!(response.outcome, DispatchOutcome::Failed(ErrorKind::NotFound));
    assert_eq!(response.status_code(), 404);
    assert_eq!(response.response, "❌ Project not found");
    assert_eq!(count_rows(&conn, "tasks"), 0);
}

#[test]
fn backward_status_move_is_a_conflict_and_leaves_task_unchanged() {
    let mut fx = acme();
    insert_task(&fx.conn, fx.website, "Draft spec", TaskStatus::Done, None, Some(&fx.bob));
    let dispatcher = replying(
        "update_task",
        json!({ "task_title": "draft spec", "new_status": "todo" }),
    );

    let response = dispatcher.dispatch_at(&mut fx.conn, "reopen draft spec", &fx.bob, now());

    assert_eq!(
        response.outcome,
        DispatchOutcome::Failed(ErrorKind::StateConflict)
    );
    assert_eq!(response.status_code(), 409);
    assert_eq!(
        response.response,
        "❌ Cannot move task status backward from Done to To Do"
    );
    let task = find_task(&fx.conn, fx.admin.organization_id, "Draft spec").unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    assert_eq!(count_rows(&fx.conn, "notifications"), 0);
}

#[test]
fn forward_status_move_reports_both_labels() {
    let mut fx = acme();
    insert_task(&fx.conn, fx.website, "Draft spec", TaskStatus::Todo, None, Some(&fx.bob));
    let dispatcher = Dispatcher::rule_based();

    let response =
        dispatcher.dispatch_at(&mut fx.conn, "move draft spec to in-progress", &fx.bob, now());

    assert_eq!(response.outcome, DispatchOutcome::Completed);
    assert_eq!(
        response.response,
        "✅ Task 'Draft spec' status updated from To Do to In Progress"
    );
}

#[test]
fn overdue_filter_excludes_done_tasks() {
    let mut fx = acme();
    let yesterday = now() - Duration::days(1);
    insert_task(&fx.conn, fx.website, "Task A", TaskStatus::Todo, Some(yesterday), Some(&fx.bob));
    insert_task(&fx.conn, fx.website, "Task B", TaskStatus::Done, Some(yesterday), Some(&fx.bob));
    let dispatcher = replying("list_tasks", json!({ "filter": "overdue" }));

    let response = dispatcher.dispatch_at(&mut fx.conn, "what is overdue?", &fx.admin, now());

    assert_eq!(response.outcome, DispatchOutcome::Completed);
    let tasks = response.actions[0].details["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "Task A");
    assert_eq!(tasks[0]["overdue"], true);
    assert!(response.response.starts_with("Found 1 tasks:"));
    assert!(response.response.contains("Task A"));
    assert!(response.response.contains("OVERDUE"));
    assert!(!response.response.contains("Task B"));
}

#[test]
fn empty_filtered_list_names_the_filter() {
    let mut fx = acme();
    let dispatcher = replying("list_tasks", json!({ "filter": "high-priority" }));

    let response = dispatcher.dispatch_at(&mut fx.conn, "urgent stuff?", &fx.admin, now());

    assert_eq!(response.outcome, DispatchOutcome::Completed);
    assert_eq!(response.response, "No high-priority tasks found.");
}

#[test]
fn malformed_model_output_degrades_to_chat() {
    for raw in [
        "Sure! I'll get right on that.",
        "{\"action\": \"create_task\", \"action_input\": {",
        "```json\n{\"action\": 42}\n```",
        "",
    ] {
        let mut fx = acme();
        let dispatcher = scripted(vec![Ok(raw.to_string())]).0;

        let response = dispatcher.dispatch_at(&mut fx.conn, "do the thing", &fx.admin, now());

        assert_eq!(response.outcome, DispatchOutcome::Chat, "raw: {raw:?}");
        assert!(response.is_success());
        assert!(response.response.starts_with(UNPARSEABLE_REPLY), "raw: {raw:?}");
        assert!(response.actions.is_empty());
        assert_eq!(count_rows(&fx.conn, "tasks"), 0);
    }
}

#[test]
fn invalid_model_response_error_degrades_to_chat() {
    let mut fx = acme();
    let dispatcher = scripted(vec![Err(ModelError::InvalidResponse(
        "no candidates".to_string(),
    ))])
    .0;

    let response = dispatcher.dispatch_at(&mut fx.conn, "hello?", &fx.admin, now());

    assert_eq!(response.outcome, DispatchOutcome::Chat);
    assert_eq!(response.response, UNPARSEABLE_REPLY);
}

#[test]
fn fenced_intent_is_executed() {
    let mut fx = acme();
    let raw = format!(
        "Here you go:\n```json\n{}\n```",
        intent_json("create_project", json!({ "name": "Analytics" }))
    );
    let dispatcher = scripted(vec![Ok(raw)]).0;

    let response = dispatcher.dispatch_at(&mut fx.conn, "new analytics project", &fx.manager, now());

    assert_eq!(response.outcome, DispatchOutcome::Completed);
    assert_eq!(response.response, "✅ Project 'Analytics' created successfully");
}

#[test]
fn respond_action_is_a_terminal_chat_reply() {
    let mut fx = acme();
    let dispatcher = replying("respond", json!({ "message": "Hi Bob!" }));

    let response = dispatcher.dispatch_at(&mut fx.conn, "hi", &fx.bob, now());

    assert_eq!(response.outcome, DispatchOutcome::Chat);
    assert_eq!(response.response, "Hi Bob!");
    assert_eq!(response.status_code(), 200);
}

#[test]
fn unknown_action_is_reported_without_side_effects() {
    let mut fx = acme();
    let dispatcher = replying("delete_everything", json!({}));

    let response = dispatcher.dispatch_at(&mut fx.conn, "wipe it all", &fx.admin, now());

    assert_eq!(response.outcome, DispatchOutcome::Chat);
    assert_eq!(response.response, "Unknown action: delete_everything");
    assert_eq!(count_rows(&fx.conn, "projects"), 3);
}

#[test]
fn invalid_parameters_are_rejected_before_execution() {
    let mut fx = acme();
    let dispatcher = replying(
        "create_task",
        json!({ "title": "Plan", "priority": "whenever" }),
    );

    let response = dispatcher.dispatch_at(&mut fx.conn, "plan sometime", &fx.admin, now());

    assert_eq!(
        response.outcome,
        DispatchOutcome::Failed(ErrorKind::InvalidInput)
    );
    assert_eq!(response.status_code(), 400);
    assert_eq!(
        response.response,
        "❌ Invalid priority: whenever. Use: high, medium, or low"
    );
    assert_eq!(response.actions[0].details["error"], "invalid_input");
    assert_eq!(count_rows(&fx.conn, "tasks"), 0);
}

#[test]
fn past_due_date_is_invalid_input() {
    let mut fx = acme();
    let dispatcher = replying(
        "create_task",
        json!({ "title": "Late start", "due_date": "2030-06-14" }),
    );

    let response = dispatcher.dispatch_at(&mut fx.conn, "late start", &fx.admin, now());

    assert_eq!(
        response.outcome,
        DispatchOutcome::Failed(ErrorKind::InvalidInput)
    );
    assert_eq!(count_rows(&fx.conn, "tasks"), 0);
}

#[test]
fn attachment_cap_holds_through_the_assistant() {
    let mut fx = acme();
    insert_task(&fx.conn, fx.website, "Logo", TaskStatus::Todo, None, Some(&fx.bob));
    let attach = |index: usize| {
        intent_json(
            "attach_file",
            json!({ "task_title": "logo", "filename": format!("v{index}.png"), "size_bytes": 2048 }),
        )
    };
    let (dispatcher, _) = scripted((0..5).map(|index| Ok(attach(index))).collect());

    for expected_left in [2, 1, 0] {
        let response = dispatcher.dispatch_at(&mut fx.conn, "attach", &fx.bob, now());
        assert_eq!(response.outcome, DispatchOutcome::Completed);
        assert!(response
            .response
            .ends_with(&format!("{expected_left} attachment slot(s) left.")));
    }
    for _ in 0..2 {
        let response = dispatcher.dispatch_at(&mut fx.conn, "attach", &fx.bob, now());
        assert_eq!(
            response.outcome,
            DispatchOutcome::Failed(ErrorKind::StateConflict)
        );
        assert_eq!(
            response.response,
            "❌ Maximum 3 attachments per task allowed"
        );
    }
    assert_eq!(count_rows(&fx.conn, "attachments"), 3);
}

#[test]
fn rate_limit_returns_429_without_fallback_or_writes() {
    let mut fx = acme();
    let model = Arc::new(ScriptedModel::failing(ModelError::RateLimited));
    let shared: Arc<dyn LanguageModel> = model.clone();
    let dispatcher = Dispatcher::new(Box::new(ModelIntentParser::new(shared)))
        .with_degraded_parser(Box::new(RuleIntentParser));

    let response = dispatcher.dispatch_at(&mut fx.conn, "create task Quota test", &fx.admin, now());

    assert_eq!(response.outcome, DispatchOutcome::RateLimited);
    assert_eq!(response.status_code(), 429);
    assert_eq!(response.response, RATE_LIMIT_MESSAGE);
    assert_eq!(model.prompts().len(), 1);
    assert_eq!(count_rows(&fx.conn, "tasks"), 0);

    let envelope = serde_json::to_value(response.into_envelope(now())).unwrap();
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["status_code"], 429);
}

#[test]
fn timeout_without_degraded_parser_is_upstream_unavailable() {
    let mut fx = acme();
    let dispatcher = scripted(vec![Err(ModelError::Timeout { timeout_ms: 30_000 })]).0;

    let response = dispatcher.dispatch_at(&mut fx.conn, "create task Slow", &fx.admin, now());

    assert_eq!(
        response.outcome,
        DispatchOutcome::Failed(ErrorKind::UpstreamUnavailable)
    );
    assert_eq!(response.status_code(), 503);
    assert_eq!(
        response.response,
        format!("❌ {UPSTREAM_UNAVAILABLE_MESSAGE}")
    );
    assert!(ErrorKind::UpstreamUnavailable.is_retryable());
}

#[test]
fn unreachable_model_falls_back_to_keyword_rules() {
    let mut fx = acme();
    let model: Arc<dyn LanguageModel> = Arc::new(ScriptedModel::failing(ModelError::Unavailable(
        "connection refused".to_string(),
    )));
    let dispatcher = Dispatcher::new(Box::new(ModelIntentParser::new(model)))
        .with_degraded_parser(Box::new(RuleIntentParser));

    let response = dispatcher.dispatch_at(
        &mut fx.conn,
        "create task Write docs in mobile priority high",
        &fx.admin,
        now(),
    );

    assert_eq!(response.outcome, DispatchOutcome::Completed);
    let task = find_task(&fx.conn, fx.admin.organization_id, "Write docs").unwrap();
    assert_eq!(task.project_id, fx.mobile);
    assert_eq!(task.priority.as_str(), "high");
}

#[test]
fn narration_replaces_formatted_text_and_failures_fall_back() {
    let mut fx = acme();
    let narrator = Arc::new(ScriptedModel::new(vec![
        Ok("You now have a project called Analytics.".to_string()),
        Err(ModelError::Unavailable("down".to_string())),
    ]));
    let shared_narrator: Arc<dyn LanguageModel> = narrator.clone();
    let (dispatcher, _) = scripted(vec![
        Ok(intent_json("create_project", json!({ "name": "Analytics" }))),
        Ok(intent_json("create_project", json!({ "name": "Billing" }))),
    ]);
    let dispatcher = dispatcher.with_narrator(shared_narrator);

    let narrated = dispatcher.dispatch_at(&mut fx.conn, "analytics project", &fx.admin, now());
    assert_eq!(narrated.response, "You now have a project called Analytics.");

    let fallback = dispatcher.dispatch_at(&mut fx.conn, "billing project", &fx.admin, now());
    assert_eq!(fallback.outcome, DispatchOutcome::Completed);
    assert_eq!(fallback.response, "✅ Project 'Billing' created successfully");

    assert!(narrator.prompts()[0].contains("analytics project"));
}

#[test]
fn intent_prompt_carries_caller_context() {
    let mut fx = acme();
    let (dispatcher, model) = scripted(vec![Ok(intent_json("respond", json!("ok")))]);

    dispatcher.dispatch_at(&mut fx.conn, "what can you do", &fx.bob, now());

    let prompt = &model.prompts()[0];
    assert!(prompt.contains("Bob Builder"));
    assert!(prompt.contains("2030-06-15"));
    assert!(prompt.contains("create_task"));
    assert!(prompt.ends_with("User request: what can you do"));
}

#[test]
fn other_tenants_tasks_are_invisible() {
    let mut fx = acme();
    insert_task(
        &fx.conn,
        fx.globex_project,
        "Secret launch plan",
        TaskStatus::Todo,
        None,
        Some(&fx.globex_admin),
    );
    let dispatcher = Dispatcher::rule_based();

    let shown = dispatcher.dispatch_at(&mut fx.conn, "show task secret", &fx.admin, now());
    assert_eq!(shown.outcome, DispatchOutcome::Failed(ErrorKind::NotFound));
    assert_eq!(shown.response, "❌ Task not found");

    let moved = dispatcher.dispatch_at(&mut fx.conn, "mark secret launch plan as done", &fx.admin, now());
    assert_eq!(moved.outcome, DispatchOutcome::Failed(ErrorKind::NotFound));

    let searched = dispatcher.dispatch_at(&mut fx.conn, "search secret launch", &fx.admin, now());
    assert_eq!(searched.response, "No tasks found matching your query.");

    let task = find_task(&fx.conn, fx.globex_admin.organization_id, "Secret").unwrap();
    assert_eq!(task.status, TaskStatus::Todo);
}

#[test]
fn members_cannot_manage_projects_or_delegate() {
    let mut fx = acme();
    let dispatcher = Dispatcher::rule_based();

    let response = dispatcher.dispatch_at(&mut fx.conn, "create project Skunkworks", &fx.bob, now());
    assert_eq!(response.outcome, DispatchOutcome::Failed(ErrorKind::Forbidden));
    assert_eq!(response.status_code(), 403);
    assert_eq!(response.response, "❌ Not enough permissions");
    assert_eq!(count_rows(&fx.conn, "projects"), 3);

    for assignee in ["Ada", "nobody-at-all"] {
        let response = replying(
            "create_task",
            json!({ "title": "Delegated", "assignee_name": assignee }),
        )
        .dispatch_at(&mut fx.conn, "delegate", &fx.bob, now());
        assert_eq!(
            response.outcome,
            DispatchOutcome::Failed(ErrorKind::Forbidden),
            "assignee {assignee}"
        );
        assert_eq!(
            response.response,
            "❌ Members can only assign tasks to themselves"
        );
    }
    assert_eq!(count_rows(&fx.conn, "tasks"), 0);
}

#[test]
fn managers_assign_by_name_and_the_assignee_is_notified() {
    let mut fx = acme();
    let dispatcher = Dispatcher::rule_based();

    let response = dispatcher.dispatch_at(
        &mut fx.conn,
        "create task \"Ship in time\" in website for carol",
        &fx.manager,
        now(),
    );
    assert_eq!(response.outcome, DispatchOutcome::Completed);
    let task = find_task(&fx.conn, fx.admin.organization_id, "Ship in time").unwrap();
    assert_eq!(task.assignee_id, Some(fx.carol.user_id));
    assert_eq!(task.project_id, fx.website);

    let inbox = dispatcher.dispatch_at(&mut fx.conn, "unread notifications", &fx.carol, now());
    assert_eq!(inbox.outcome, DispatchOutcome::Completed);
    assert!(inbox
        .response
        .contains("New Task Assignment: You have been assigned to task: Ship in time"));
}

#[test]
fn user_listing_and_creation_follow_role_rules() {
    let mut fx = acme();
    let dispatcher = Dispatcher::rule_based();

    let listed = dispatcher.dispatch_at(&mut fx.conn, "list member users", &fx.admin, now());
    assert_eq!(listed.outcome, DispatchOutcome::Completed);
    assert!(listed.response.starts_with("Found 2 users:"));

    let denied = dispatcher.dispatch_at(&mut fx.conn, "list users", &fx.manager, now());
    assert_eq!(denied.outcome, DispatchOutcome::Failed(ErrorKind::Forbidden));
    assert_eq!(denied.response, "❌ Only admins can list users");

    let create_admin = replying(
        "create_user",
        json!({
            "email": "boss@acme.com",
            "full_name": "Big Boss",
            "password": "hunter2",
            "role": "admin"
        }),
    )
    .dispatch_at(&mut fx.conn, "make boss an admin", &fx.manager, now());
    assert_eq!(
        create_admin.outcome,
        DispatchOutcome::Failed(ErrorKind::Forbidden)
    );
    assert_eq!(count_rows(&fx.conn, "users"), 5);
}

#[test]
fn project_stats_cover_named_or_all_projects() {
    let mut fx = acme();
    insert_task(&fx.conn, fx.website, "One", TaskStatus::Todo, None, None);
    insert_task(&fx.conn, fx.website, "Two", TaskStatus::Done, None, None);
    let dispatcher = Dispatcher::rule_based();

    let all = dispatcher.dispatch_at(&mut fx.conn, "stats", &fx.admin, now());
    assert_eq!(all.outcome, DispatchOutcome::Completed);
    assert!(all.response.starts_with("📊 Project statistics:"));
    assert!(all.response.contains("Website"));
    assert!(all.response.contains("Mobile App"));

    let missing = dispatcher.dispatch_at(&mut fx.conn, "stats for nonexistent", &fx.admin, now());
    assert_eq!(missing.outcome, DispatchOutcome::Failed(ErrorKind::NotFound));
}

#[test]
fn comments_and_member_adds_run_through_rules() {
    let mut fx = acme();
    insert_task(&fx.conn, fx.website, "Hero banner", TaskStatus::Todo, None, Some(&fx.bob));
    let dispatcher = Dispatcher::rule_based();

    let commented = dispatcher.dispatch_at(
        &mut fx.conn,
        "comment on hero banner: needs a darker blue",
        &fx.admin,
        now(),
    );
    assert_eq!(commented.outcome, DispatchOutcome::Completed);
    assert_eq!(commented.response, "💬 Comment added to task 'Hero banner'");

    let added = dispatcher.dispatch_at(&mut fx.conn, "add carol to project mobile", &fx.admin, now());
    assert_eq!(added.outcome, DispatchOutcome::Completed);
    assert_eq!(added.response, "✅ Carol Member added to project 'Mobile App'");

    let again = dispatcher.dispatch_at(&mut fx.conn, "add carol to project mobile", &fx.admin, now());
    assert_eq!(again.outcome, DispatchOutcome::Failed(ErrorKind::StateConflict));
}

#[test]
fn greetings_return_rule_help() {
    let mut fx = acme();
    let response = Dispatcher::rule_based().dispatch_at(&mut fx.conn, "hello", &fx.bob, now());

    assert_eq!(response.outcome, DispatchOutcome::Chat);
    assert_eq!(response.response, RULE_HELP);
}

#[test]
fn concurrent_dispatches_on_separate_connections_do_not_interfere() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("concurrent.db");
    let fx = seed(open_db(&path).unwrap());
    let dispatcher = Dispatcher::rule_based();

    std::thread::scope(|scope| {
        for (worker, identity) in [(0, fx.admin), (1, fx.bob)] {
            let dispatcher = &dispatcher;
            let path = &path;
            scope.spawn(move || {
                let mut conn = open_db(path).unwrap();
                for index in 0..10 {
                    let message = format!("create task Worker {worker} item {index} in website");
                    let response = dispatcher.dispatch_at(&mut conn, &message, &identity, now());
                    assert_eq!(response.outcome, DispatchOutcome::Completed, "{message}");
                }
            });
        }
    });

    assert_eq!(count_rows(&fx.conn, "tasks"), 20);
    let bob_tasks: i64 = fx
        .conn
        .query_row(
            "SELECT COUNT(*) FROM tasks WHERE assignee_id = ?1;",
            [fx.bob.user_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(bob_tasks, 10);
}

struct OfflineSearch;

impl SemanticSearch for OfflineSearch {
    fn search(
        &self,
        _scope: &SearchScope<'_>,
        _query: &str,
        _top_k: u32,
    ) -> Result<Vec<SearchSnippet>, SearchError> {
        Err(SearchError::Unavailable("index offline".to_string()))
    }
}

struct ReversingHasher;

impl CredentialHasher for ReversingHasher {
    fn hash(&self, secret: &str) -> Result<String, String> {
        Ok(format!("rev:{}", secret.chars().rev().collect::<String>()))
    }
}

#[test]
fn search_outage_is_reported_as_retryable_upstream_failure() {
    let mut fx = acme();
    let dispatcher = replying("search_tasks", json!({ "query": "launch" }))
        .with_search(Box::new(OfflineSearch));

    let response = dispatcher.dispatch_at(&mut fx.conn, "find launch tasks", &fx.admin, now());

    assert_eq!(
        response.outcome,
        DispatchOutcome::Failed(ErrorKind::UpstreamUnavailable)
    );
    assert_eq!(response.status_code(), 503);
    assert!(response.response.contains("try again shortly"));
}

#[test]
fn created_users_store_the_configured_credential_hash() {
    let mut fx = acme();
    let dispatcher = replying(
        "create_user",
        json!({
            "email": "dan@acme.com",
            "full_name": "Dan Dev",
            "password": "abc123",
            "role": "member"
        }),
    )
    .with_hasher(Box::new(ReversingHasher));

    let response = dispatcher.dispatch_at(&mut fx.conn, "add dan", &fx.admin, now());

    assert_eq!(response.outcome, DispatchOutcome::Completed);
    let dan = SqliteStore::new(&fx.conn)
        .search_users(fx.admin.organization_id, "dan@acme.com", None)
        .unwrap()
        .remove(0);
    assert_eq!(dan.hashed_password, "rev:321cba");
    assert_eq!(dan.role, Role::Member);
}

#[test]
fn create_task_targets_project_named_with_non_ascii_letters() {
    let mut fx = acme();
    let equipe = {
        let store = SqliteStore::new(&fx.conn);
        ProjectService::new(&store)
            .create(&fx.admin, "Équipe", None)
            .unwrap()
            .id
    };
    let dispatcher = replying(
        "create_task",
        json!({ "title": "Plan offsite", "project_name": "Équipe" }),
    );

    let response = dispatcher.dispatch_at(&mut fx.conn, "plan the offsite", &fx.admin, now());

    assert_eq!(response.outcome, DispatchOutcome::Completed);
    assert!(response
        .response
        .starts_with("✅ Task 'Plan offsite' created in project 'Équipe'"));
    let task = find_task(&fx.conn, fx.admin.organization_id, "Plan offsite").unwrap();
    assert_eq!(task.project_id, equipe);
}

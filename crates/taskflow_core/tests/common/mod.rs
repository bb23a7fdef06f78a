#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use std::collections::VecDeque;
use std::sync::Mutex;
use taskflow_core::agent::{LanguageModel, ModelError};
use taskflow_core::model::task::{NewTask, TaskPriority, TaskStatus};
use taskflow_core::model::{ProjectId, TaskId};
use taskflow_core::repo::TaskRepository;
use taskflow_core::service::{
    register_organization, LockedCredentialHasher, ProjectService, Registration, UserDraft,
    UserService,
};
use taskflow_core::{open_db_in_memory, Identity, Role, SqliteStore};

/// Fixed clock for every scenario: 2030-06-15 12:00 UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 15, 12, 0, 0).unwrap()
}

/// Two tenants.
///
/// Acme: Ada (admin), Mia (manager), Bob and Carol (members); projects
/// "Website" (Ada, Bob) then "Mobile App" (Ada).
/// Globex: Gina (admin); project "Website Redesign".
pub struct Fixture {
    pub conn: Connection,
    pub admin: Identity,
    pub manager: Identity,
    pub bob: Identity,
    pub carol: Identity,
    pub website: ProjectId,
    pub mobile: ProjectId,
    pub globex_admin: Identity,
    pub globex_project: ProjectId,
}

pub fn acme() -> Fixture {
    let conn = open_db_in_memory().unwrap();
    seed(conn)
}

pub fn seed(mut conn: Connection) -> Fixture {
    let admin = register(&mut conn, "Acme", "ada@acme.com", "Ada Admin");
    let globex_admin = register(&mut conn, "Globex", "gina@globex.com", "Gina Admin");

    let store = SqliteStore::new(&conn);
    let users = UserService::new(&store, &LockedCredentialHasher);
    let add_user = |email: &str, full_name: &str, role: Role| {
        let user = users
            .create(
                &admin,
                &UserDraft {
                    email: email.to_string(),
                    full_name: full_name.to_string(),
                    password: "secret".to_string(),
                    role,
                },
            )
            .unwrap();
        Identity::of(&user)
    };
    let manager = add_user("mia@acme.com", "Mia Manager", Role::Manager);
    let bob = add_user("bob@acme.com", "Bob Builder", Role::Member);
    let carol = add_user("carol@acme.com", "Carol Member", Role::Member);

    let projects = ProjectService::new(&store);
    let website = projects.create(&admin, "Website", Some("Public site")).unwrap().id;
    let mobile = projects.create(&admin, "Mobile App", None).unwrap().id;
    projects.add_member(&admin, website, bob.user_id).unwrap();
    let globex_project = projects
        .create(&globex_admin, "Website Redesign", None)
        .unwrap()
        .id;
    drop(store);

    Fixture {
        conn,
        admin,
        manager,
        bob,
        carol,
        website,
        mobile,
        globex_admin,
        globex_project,
    }
}

fn register(conn: &mut Connection, organization: &str, email: &str, full_name: &str) -> Identity {
    let registered = register_organization(
        conn,
        &Registration {
            organization_name: organization.to_string(),
            email: email.to_string(),
            credential_hash: "hash".to_string(),
            full_name: full_name.to_string(),
        },
    )
    .unwrap();
    Identity::of(&registered.admin)
}

/// Inserts a task straight into the store, bypassing service guards.
pub fn insert_task(
    conn: &Connection,
    project_id: ProjectId,
    title: &str,
    status: TaskStatus,
    due_date: Option<DateTime<Utc>>,
    assignee: Option<&Identity>,
) -> TaskId {
    SqliteStore::new(conn)
        .create_task(
            &NewTask {
                title: title.to_string(),
                description: None,
                status,
                priority: TaskPriority::Medium,
                due_date: due_date.map(|due| due.timestamp_millis()),
                project_id,
                assignee_id: assignee.map(|identity| identity.user_id),
            },
            now().timestamp_millis(),
        )
        .unwrap()
        .id
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}

/// Language model that replays canned replies and records prompts.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn failing(err: ModelError) -> Self {
        Self::new(vec![Err(err)])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Unavailable("script exhausted".to_string())))
    }
}

/// `{"action": name, "action_input": input}` as the model would reply.
pub fn intent_json(action: &str, input: serde_json::Value) -> String {
    serde_json::json!({
        "thought": "scripted",
        "action": action,
        "action_input": input,
    })
    .to_string()
}

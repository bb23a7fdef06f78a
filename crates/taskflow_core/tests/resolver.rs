mod common;

use common::{acme, insert_task};
use taskflow_core::model::task::TaskStatus;
use taskflow_core::service::{LockedCredentialHasher, ProjectService, UserDraft, UserService};
use taskflow_core::{open_db_in_memory, EntityResolver, Role, SqliteStore};

#[test]
fn fragments_never_resolve_into_another_organization() {
    let fx = acme();
    insert_task(
        &fx.conn,
        fx.globex_project,
        "Secret launch plan",
        TaskStatus::Todo,
        None,
        Some(&fx.globex_admin),
    );
    let store = SqliteStore::new(&fx.conn);
    let resolver = EntityResolver::new(&store, fx.admin.organization_id);

    assert!(resolver.resolve_task("secret").unwrap().is_none());
    assert!(resolver.resolve_user("gina").unwrap().is_none());
    assert!(resolver.find_project("redesign").unwrap().is_none());

    // "website" matches both tenants' projects; only Acme's may come back.
    let project = resolver.find_project("website").unwrap().unwrap();
    assert_eq!(project.id, fx.website);
}

#[test]
fn first_match_by_ascending_id_wins() {
    let fx = acme();
    let first = insert_task(&fx.conn, fx.website, "Fix login bug", TaskStatus::Todo, None, None);
    insert_task(&fx.conn, fx.mobile, "Fix login screen", TaskStatus::Todo, None, None);
    let store = SqliteStore::new(&fx.conn);
    let resolver = EntityResolver::new(&store, fx.admin.organization_id);

    assert_eq!(resolver.resolve_task("LOGIN").unwrap().unwrap().id, first);
}

#[test]
fn project_resolution_falls_back_to_first_project() {
    let fx = acme();
    let store = SqliteStore::new(&fx.conn);
    let resolver = EntityResolver::new(&store, fx.admin.organization_id);

    assert_eq!(resolver.resolve_project(None).unwrap().unwrap().id, fx.website);
    assert_eq!(
        resolver.resolve_project(Some("nonexistent")).unwrap().unwrap().id,
        fx.website
    );
    assert_eq!(
        resolver.resolve_project(Some("mobile")).unwrap().unwrap().id,
        fx.mobile
    );
}

#[test]
fn strict_project_lookup_does_not_fall_back() {
    let fx = acme();
    let store = SqliteStore::new(&fx.conn);
    let resolver = EntityResolver::new(&store, fx.admin.organization_id);

    assert!(resolver.find_project("nonexistent").unwrap().is_none());
    assert!(resolver.find_project("   ").unwrap().is_none());
}

#[test]
fn organization_without_projects_resolves_nothing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::new(&conn);
    let resolver = EntityResolver::new(&store, 1);

    assert!(resolver.resolve_project(None).unwrap().is_none());
    assert!(resolver.resolve_project(Some("anything")).unwrap().is_none());
}

#[test]
fn users_resolve_by_name_or_email() {
    let fx = acme();
    let store = SqliteStore::new(&fx.conn);
    let resolver = EntityResolver::new(&store, fx.admin.organization_id);

    assert_eq!(resolver.resolve_user("bob").unwrap().unwrap().id, fx.bob.user_id);
    assert_eq!(
        resolver.resolve_user("mia@ACME").unwrap().unwrap().id,
        fx.manager.user_id
    );
    assert!(resolver.resolve_user("").unwrap().is_none());
}

#[test]
fn non_ascii_names_match_in_any_case() {
    let fx = acme();
    let store = SqliteStore::new(&fx.conn);
    let equipe = ProjectService::new(&store)
        .create(&fx.admin, "Équipe", None)
        .unwrap()
        .id;
    let elodie = UserService::new(&store, &LockedCredentialHasher)
        .create(
            &fx.admin,
            &UserDraft {
                email: "elodie@acme.com".to_string(),
                full_name: "Élodie Martin".to_string(),
                password: "secret".to_string(),
                role: Role::Member,
            },
        )
        .unwrap()
        .id;
    let study = insert_task(&fx.conn, equipe, "Étude de marché", TaskStatus::Todo, None, None);
    let resolver = EntityResolver::new(&store, fx.admin.organization_id);

    for fragment in ["Équipe", "équipe", "ÉQUIPE"] {
        assert_eq!(resolver.find_project(fragment).unwrap().unwrap().id, equipe);
        assert_eq!(
            resolver.resolve_project(Some(fragment)).unwrap().unwrap().id,
            equipe
        );
    }
    for fragment in ["Élodie", "élodie martin", "ÉLODIE"] {
        assert_eq!(resolver.resolve_user(fragment).unwrap().unwrap().id, elodie);
    }
    for fragment in ["Étude", "étude de MARCHÉ"] {
        assert_eq!(resolver.resolve_task(fragment).unwrap().unwrap().id, study);
    }
}

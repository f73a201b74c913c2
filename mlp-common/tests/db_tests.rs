//! Database-backed tests
//!
//! These need a scratch PostgreSQL database named by MLP_TEST_DATABASE_URL.
//! When the variable is unset each test prints a notice and returns.
//! All tests are #[serial]: they share one database.

use chrono::{Duration, Utc};
use mlp_common::auth::Role;
use mlp_common::db::users::LoginOutcome;
use mlp_common::db::{self, sessions, users, Permissions};
use mlp_common::schema::{SchemaIntrospector, CATALOG};
use mlp_common::Error;
use serde_json::{json, Value};
use serial_test::serial;
use sqlx::PgPool;

async fn setup_test_db() -> Option<PgPool> {
    let url = match std::env::var("MLP_TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: MLP_TEST_DATABASE_URL not set");
            return None;
        }
    };

    let pool = PgPool::connect(&url).await.expect("Should connect to test database");
    db::init_database(&pool, &CATALOG).await.expect("Should initialize database");
    Some(pool)
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[tokio::test]
#[serial]
async fn test_init_is_idempotent_and_verifies() {
    let Some(pool) = setup_test_db().await else { return };

    db::init_database(&pool, &CATALOG).await.expect("Second init should succeed");
    db::SchemaSync::verify_catalog(&pool, &CATALOG).await.expect("Catalog should verify");

    let columns = SchemaIntrospector::introspect_table(&pool, "capture_images").await.unwrap();
    let image_state = columns.iter().find(|c| c.column_name == "image_state").unwrap();
    assert_eq!(image_state.fk_table.as_deref(), Some("image_states"));
    assert!(!image_state.nullable);

    let err = SchemaIntrospector::introspect_table(&pool, "no_such_table").await.unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

#[tokio::test]
#[serial]
async fn test_create_show_update_remove_node_model() {
    let Some(pool) = setup_test_db().await else { return };
    let surveyors = CATALOG.get("surveyors").unwrap();

    let created = db::create(
        &pool,
        surveyors,
        None,
        &json!({"given_names": " Arthur Oliver ", "last_name": "Wheeler"}),
    )
    .await
    .unwrap();
    let id = created["id"].as_i64().expect("id populated");
    assert_eq!(created["given_names"], "Arthur Oliver");

    let shown = db::select(&pool, surveyors, id).await.unwrap();
    assert_eq!(shown["last_name"], "Wheeler");

    let node = db::show_node(&pool, id).await.unwrap();
    assert_eq!(node.node["type"], "surveyors");
    assert!(node.node["owner_id"].is_null());

    let updated = db::update(&pool, surveyors, id, &json!({"short_name": "AOW"})).await.unwrap();
    assert_eq!(updated["short_name"], "AOW");
    assert_eq!(updated["last_name"], "Wheeler");

    db::remove(&pool, surveyors, id).await.unwrap();
    assert!(matches!(db::select(&pool, surveyors, id).await, Err(Error::NotFound(_))));
    assert!(matches!(db::show_node(&pool, id).await, Err(Error::NotFound(_))));
}

#[tokio::test]
#[serial]
async fn test_ownership_rules() {
    let Some(pool) = setup_test_db().await else { return };
    let surveyors = CATALOG.get("surveyors").unwrap();
    let surveys = CATALOG.get("surveys").unwrap();
    let stations = CATALOG.get("stations").unwrap();

    let surveyor = db::create(&pool, surveyors, None, &json!({"last_name": "Bridgland"}))
        .await
        .unwrap();
    let surveyor_id = surveyor["id"].as_i64().unwrap();

    // Owned model without an owner
    let err = db::create(&pool, surveys, None, &json!({"name": "Crowsnest"})).await.unwrap_err();
    assert!(matches!(err, Error::InvalidOwner(_)));

    // Owner of the wrong type
    let err = db::create(&pool, stations, Some(surveyor_id), &json!({"name": "Station 1"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOwner(_)));

    // Root model given an owner
    let err = db::create(&pool, surveyors, Some(surveyor_id), &json!({"last_name": "X"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOwner(_)));

    let survey = db::create(&pool, surveys, Some(surveyor_id), &json!({"name": "Crowsnest"}))
        .await
        .unwrap();
    let survey_id = survey["id"].as_i64().unwrap();
    assert_eq!(survey["owner_id"], json!(surveyor_id));

    let tree = db::show_node(&pool, surveyor_id).await.unwrap();
    assert!(tree.children.iter().any(|c| c["id"] == json!(survey_id)));

    // Children block removal of their owner
    let err = db::remove(&pool, surveyors, surveyor_id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict { constraint: "fkey", .. }));

    db::remove(&pool, surveys, survey_id).await.unwrap();
    db::remove(&pool, surveyors, surveyor_id).await.unwrap();
}

async fn count_children(pool: &PgPool, owner_id: i64) -> i64 {
    sqlx::query_scalar("SELECT count(*) FROM nodes WHERE owner_id = $1")
        .bind(owner_id as i32)
        .fetch_one(pool)
        .await
        .expect("Should count nodes")
}

#[tokio::test]
#[serial]
async fn test_failed_model_insert_leaves_no_node() {
    let Some(pool) = setup_test_db().await else { return };
    let projects = CATALOG.get("projects").unwrap();
    let historic_captures = CATALOG.get("historic_captures").unwrap();

    let project = db::create(&pool, projects, None, &json!({"name": "Rollback"}))
        .await
        .unwrap();
    let project_id = project["id"].as_i64().unwrap();
    assert_eq!(count_children(&pool, project_id).await, 0);

    // The node row goes in first; the capture row then fails its camera foreign key
    let err = db::create(
        &pool,
        historic_captures,
        Some(project_id),
        &json!({"plate_id": "P-1", "cameras_id": i32::MAX}),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Conflict { constraint: "fkey", .. }));
    assert_eq!(count_children(&pool, project_id).await, 0);

    // The owner is still removable: no orphaned child node points at it
    db::remove(&pool, projects, project_id).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_update_moves_node_to_new_owner() {
    let Some(pool) = setup_test_db().await else { return };
    let surveyors = CATALOG.get("surveyors").unwrap();
    let surveys = CATALOG.get("surveys").unwrap();

    let first = db::create(&pool, surveyors, None, &json!({"last_name": "McArthur"}))
        .await
        .unwrap();
    let first_id = first["id"].as_i64().unwrap();
    let second = db::create(&pool, surveyors, None, &json!({"last_name": "Deville"}))
        .await
        .unwrap();
    let second_id = second["id"].as_i64().unwrap();

    let survey = db::create(&pool, surveys, Some(first_id), &json!({"name": "Bow Valley"}))
        .await
        .unwrap();
    let survey_id = survey["id"].as_i64().unwrap();

    let updated = db::update(&pool, surveys, survey_id, &json!({"owner_id": second_id}))
        .await
        .unwrap();
    assert_eq!(updated["owner_id"], json!(second_id));
    assert_eq!(updated["name"], "Bow Valley");

    let node = db::show_node(&pool, survey_id).await.unwrap();
    assert_eq!(node.node["owner_id"], json!(second_id));
    assert_eq!(node.node["owner_type"], "surveyors");
    assert_eq!(count_children(&pool, first_id).await, 0);
    assert_eq!(count_children(&pool, second_id).await, 1);

    let owned = db::select_by_owner(&pool, surveys, second_id).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0]["id"], json!(survey_id));
    assert!(db::select_by_owner(&pool, surveys, first_id).await.unwrap().is_empty());
    let err = db::select_by_owner(&pool, surveyors, second_id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidOwner(_)));

    // The old owner is free to go; the new one is still blocked
    db::remove(&pool, surveyors, first_id).await.unwrap();
    let err = db::remove(&pool, surveyors, second_id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict { constraint: "fkey", .. }));

    db::remove(&pool, surveys, survey_id).await.unwrap();
    db::remove(&pool, surveyors, second_id).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_integer_overflow_is_not_stored() {
    let Some(pool) = setup_test_db().await else { return };
    let lens = CATALOG.get("lens").unwrap();

    let created = db::create(
        &pool,
        lens,
        None,
        &json!({"brand": "Zeiss", "focal_length": "99999999999"}),
    )
    .await
    .unwrap();
    assert!(created["focal_length"].is_null());
    let id = created["id"].as_i64().unwrap();

    let updated = db::update(&pool, lens, id, &json!({"focal_length": 2147483647i64}))
        .await
        .unwrap();
    assert_eq!(updated["focal_length"], json!(2147483647));

    db::remove(&pool, lens, id).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_file_record_takes_owner_type() {
    let Some(pool) = setup_test_db().await else { return };
    let projects = CATALOG.get("projects").unwrap();
    let metadata_files = CATALOG.get("metadata_files").unwrap();

    let project = db::create(&pool, projects, None, &json!({"name": "Repeat photography"}))
        .await
        .unwrap();
    let project_id = project["id"].as_i64().unwrap();
    let fs_path = unique("metadata/field-notes.pdf");

    let file = db::create(
        &pool,
        metadata_files,
        Some(project_id),
        &json!({"filename": "field-notes.pdf", "fs_path": fs_path, "metadata_type": "field_notes"}),
    )
    .await
    .unwrap();
    assert_eq!(file["owner_type"], "projects");
    let file_id = file["id"].as_i64().unwrap();

    let listed = db::list_files(&pool, Some(project_id)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["file_type"], "metadata_files");

    let by_path = db::file_by_path(&pool, &fs_path).await.unwrap();
    assert_eq!(by_path.map(|f| f["id"].clone()), Some(json!(file_id)));

    // Duplicate fs_path
    let err = db::create(
        &pool,
        metadata_files,
        Some(project_id),
        &json!({"filename": "copy.pdf", "fs_path": fs_path}),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Conflict { constraint: "unique", .. }));

    db::remove(&pool, metadata_files, file_id).await.unwrap();
    db::remove(&pool, projects, project_id).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_remove_missing_is_not_found() {
    let Some(pool) = setup_test_db().await else { return };
    let cameras = CATALOG.get("cameras").unwrap();

    let err = db::remove(&pool, cameras, i32::MAX as i64).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
#[serial]
async fn test_users_sessions_permissions() {
    let Some(pool) = setup_test_db().await else { return };

    let email = format!("{}@example.org", unique("editor"));
    let user = users::create_user(&pool, &email, Some("Editor"), "long enough", Role::Editor)
        .await
        .unwrap();
    assert_eq!(user.role, Role::Editor);

    assert!(matches!(
        users::authenticate(&pool, &email, "wrong password").await.unwrap(),
        LoginOutcome::WrongPassword
    ));
    assert!(matches!(
        users::authenticate(&pool, "nobody@example.org", "long enough").await.unwrap(),
        LoginOutcome::UnknownUser
    ));
    match users::authenticate(&pool, &email.to_uppercase(), "long enough").await.unwrap() {
        LoginOutcome::Accepted(found) => assert_eq!(found.id, user.id),
        other => panic!("Expected Accepted, got {:?}", other),
    }

    let token = sessions::create_session(&pool, user.id, Duration::hours(1)).await.unwrap();
    let current = sessions::session_user(&pool, &token).await.unwrap();
    assert_eq!(current.map(|u| u.id), Some(user.id));

    sessions::delete_session(&pool, &token).await.unwrap();
    assert!(sessions::session_user(&pool, &token).await.unwrap().is_none());

    let expired = sessions::create_session(&pool, user.id, Duration::hours(-1)).await.unwrap();
    assert!(sessions::session_user(&pool, &expired).await.unwrap().is_none());

    let permissions = Permissions::load(&pool).await.unwrap();
    assert!(!permissions.is_empty());

    let options: Value = db::options(&pool).await.unwrap();
    assert_eq!(options["image_states"].as_array().map(|a| a.len()), Some(5));
}

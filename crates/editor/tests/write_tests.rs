mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{row_ids, send, table_ids, users_and_sites_db, users_db};
use serde_json::{json, Map, Value};
use tabula_editor::{Action, Editor, EditorConfig, EditorError, Field, HookEvent, HookPoint, SetMode};
use tabula_query::{Condition, MemoryDatabase, QueryKind};

fn required(value: &Value, _: &Value) -> Option<String> {
    match value.as_str() {
        Some(s) if !s.trim().is_empty() => None,
        _ => Some("This field is required".to_string()),
    }
}

fn users_editor() -> Editor {
    Editor::new("users")
        .field(Field::new("first_name").validator(required))
        .field(Field::new("site"))
}

#[tokio::test]
async fn test_create_returns_new_row() {
    let db = users_db();
    let response = send(
        &users_editor(),
        &db,
        json!({ "action": "create", "data": { "0": { "first_name": "Kim", "site": 2 } } }),
    )
    .await
    .unwrap();

    assert!(response.is_success());
    assert_eq!(row_ids(&response), vec!["row_11"]);
    assert_eq!(response.data[0]["first_name"], json!("Kim"));
    assert_eq!(db.rows("users").len(), 11);
}

#[tokio::test]
async fn test_failed_validation_blocks_whole_batch() {
    let db = users_db();
    db.clear_log();
    let response = send(
        &users_editor(),
        &db,
        json!({
            "action": "create",
            "data": {
                "0": { "first_name": "Kim", "site": 1 },
                "1": { "first_name": "  ", "site": 1 }
            }
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.field_errors.len(), 1);
    assert_eq!(response.field_errors[0].name, "first_name");
    assert!(response.data.is_empty());
    assert_eq!(db.count_kind(QueryKind::Insert), 0);
    assert_eq!(db.count_kind(QueryKind::Update), 0);
    assert_eq!(db.rows("users").len(), 10);
}

#[tokio::test]
async fn test_edit_updates_only_submitted_fields() {
    let db = users_db();
    let response = send(
        &users_editor(),
        &db,
        json!({ "action": "edit", "data": { "row_4": { "first_name": "Daniel" } } }),
    )
    .await
    .unwrap();

    assert_eq!(response.data[0]["DT_RowId"], json!("row_4"));
    assert_eq!(response.data[0]["first_name"], json!("Daniel"));
    assert_eq!(response.data[0]["site"], json!(2));
}

#[tokio::test]
async fn test_edit_of_key_column_returns_row_under_new_id() {
    let db = users_db();
    let editor = users_editor().field(Field::new("id"));

    let response = send(
        &editor,
        &db,
        json!({ "action": "edit", "data": { "row_1": { "id": 42, "first_name": "Anna" } } }),
    )
    .await
    .unwrap();

    assert_eq!(row_ids(&response), vec!["row_42"]);
    assert!(table_ids(&db, "users").contains(&42));
    assert!(!table_ids(&db, "users").contains(&1));
}

#[tokio::test]
async fn test_set_modes_and_set_values() {
    let db = users_db();
    let editor = Editor::new("users")
        .field(Field::new("first_name"))
        .field(Field::new("site").set(SetMode::CreateOnly))
        .field(Field::new("source").set_value("import").get(false));

    send(
        &editor,
        &db,
        json!({ "action": "edit", "data": { "row_2": { "first_name": "Rob", "site": 9 } } }),
    )
    .await
    .unwrap();

    let row = db.rows("users").into_iter().find(|r| r["id"] == json!(2)).unwrap();
    assert_eq!(row["first_name"], json!("Rob"));
    assert_eq!(row["site"], json!(2));
    assert_eq!(row["source"], json!("import"));
}

#[tokio::test]
async fn test_pre_edit_cancellation_is_reported() {
    let db = users_db();
    let editor = users_editor().on(HookPoint::PreEdit, |event: &HookEvent<'_>| {
        (event.id() == Some("2")).then_some(false)
    });

    let response = send(
        &editor,
        &db,
        json!({
            "action": "edit",
            "data": {
                "row_1": { "first_name": "A" },
                "row_2": { "first_name": "B" }
            }
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.cancelled, vec!["2"]);
    assert_eq!(row_ids(&response), vec!["row_1"]);
    let bob = db.rows("users").into_iter().find(|r| r["id"] == json!(2)).unwrap();
    assert_eq!(bob["first_name"], json!("Bob"));
}

#[tokio::test]
async fn test_write_hooks_fire_in_order() {
    let db = users_db();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let mut editor = users_editor();
    for point in [HookPoint::PreCreate, HookPoint::WriteCreate, HookPoint::PostCreate] {
        let seen = seen.clone();
        editor = editor.on(point, move |event: &HookEvent<'_>| {
            seen.lock().unwrap().push(event.point());
            None
        });
    }

    send(
        &editor,
        &db,
        json!({ "action": "create", "data": { "0": { "first_name": "Kim" } } }),
    )
    .await
    .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![HookPoint::PreCreate, HookPoint::WriteCreate, HookPoint::PostCreate]
    );
}

#[tokio::test]
async fn test_compound_key_create() {
    let db = MemoryDatabase::new();
    db.define_table("stock", None);
    let editor = Editor::new("stock")
        .pkey(&["site", "code"])
        .field(Field::new("site"))
        .field(Field::new("code"))
        .field(Field::new("qty"));

    let response = send(
        &editor,
        &db,
        json!({ "action": "create", "data": { "0": { "site": "a", "code": 7, "qty": 3 } } }),
    )
    .await
    .unwrap();

    let separator = editor.primary_key().separator();
    assert_eq!(row_ids(&response), vec![format!("row_a{}7", separator)]);
}

#[tokio::test]
async fn test_compound_key_create_needs_every_column() {
    let db = MemoryDatabase::new();
    db.define_table("stock", None);
    let editor = Editor::new("stock")
        .pkey(&["site", "code"])
        .field(Field::new("site"))
        .field(Field::new("qty"))
        .config(EditorConfig::new().contained_errors(true));

    let err = send(
        &editor,
        &db,
        json!({ "action": "create", "data": { "0": { "site": "a", "qty": 3 } } }),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, EditorError::Configuration(_)));
    assert!(db.rows("stock").is_empty());
}

#[tokio::test]
async fn test_failure_after_write_rolls_back() {
    let db = users_db();
    let editor = users_editor()
        .where_condition(Condition::Raw("site > 0".to_string()))
        .config(EditorConfig::new().contained_errors(true));

    let response = send(
        &editor,
        &db,
        json!({ "action": "create", "data": { "0": { "first_name": "Kim" } } }),
    )
    .await
    .unwrap();

    assert!(response.error.is_some());
    assert_eq!(db.rows("users").len(), 10);
}

#[tokio::test]
async fn test_without_transactions_partial_writes_remain() {
    let db = users_db();
    let editor = users_editor()
        .where_condition(Condition::Raw("site > 0".to_string()))
        .config(EditorConfig::new().transactions(false));

    let result = send(
        &editor,
        &db,
        json!({ "action": "create", "data": { "0": { "first_name": "Kim" } } }),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(db.rows("users").len(), 11);
}

#[tokio::test]
async fn test_global_validator_stops_processing() {
    let db = users_db();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let editor = users_editor().validator(move |action: Action, _: &Map<String, Value>| {
        counter.fetch_add(1, Ordering::SeqCst);
        (action == Action::Create).then(|| "Creating is closed".to_string())
    });

    let response = send(
        &editor,
        &db,
        json!({ "action": "create", "data": { "0": { "first_name": "Kim" } } }),
    )
    .await
    .unwrap();

    assert_eq!(response.error.as_deref(), Some("Creating is closed"));
    assert_eq!(db.rows("users").len(), 10);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_write_without_rows_is_rejected() {
    let db = users_db();
    let response = send(&users_editor(), &db, json!({ "action": "edit" })).await.unwrap();

    assert!(response.error.unwrap().starts_with("No data detected"));
}

#[tokio::test]
async fn test_unknown_action() {
    let db = users_db();
    let err = send(&users_editor(), &db, json!({ "action": "truncate" })).await.unwrap_err();
    assert!(matches!(err, EditorError::UnknownAction(_)));

    let contained = users_editor().config(EditorConfig::new().contained_errors(true));
    let response = send(&contained, &db, json!({ "action": "truncate" })).await.unwrap();
    assert!(response.error.is_some());
}

#[tokio::test]
async fn test_left_join_edit_writes_joined_row() {
    let db = users_and_sites_db();
    let editor = Editor::new("users")
        .field(Field::new("users.first_name"))
        .field(Field::new("users.site"))
        .field(Field::new("sites.name"))
        .left_join("sites", "sites.id", "=", "users.site");

    let response = send(
        &editor,
        &db,
        json!({
            "action": "edit",
            "data": { "row_1": { "users": { "site": 2 }, "sites": { "name": "Greater London" } } }
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.data[0]["users"]["site"], json!(2));
    assert_eq!(response.data[0]["sites"]["name"], json!("Greater London"));
    let sites = db.rows("sites");
    assert_eq!(sites[0]["name"], json!("Edinburgh"));
    assert_eq!(sites[1]["name"], json!("Greater London"));
}

#[tokio::test]
async fn test_create_across_tables_takes_first_generated_id() {
    let db = users_db();
    db.define_table("audit", Some("id"));
    db.seed("audit", vec![json!({ "id": 500, "action": "seed", "note": "" })]);
    let editor = Editor::new("users")
        .table("audit")
        .field(Field::new("users.first_name"))
        .field(Field::new("audit.action").set_value("create").get(false))
        .field(Field::new("audit.note").get(false));

    let response = send(
        &editor,
        &db,
        json!({
            "action": "create",
            "data": { "0": { "users": { "first_name": "Kim" }, "audit": { "note": "signup" } } }
        }),
    )
    .await
    .unwrap();

    assert_eq!(row_ids(&response), vec!["row_11"]);
    assert_eq!(response.data[0]["users"]["first_name"], json!("Kim"));

    let audit = db.rows("audit");
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[1]["id"], json!(501));
    assert_eq!(audit[1]["action"], json!("create"));
    assert_eq!(audit[1]["note"], json!("signup"));
    assert!(audit[1].get("first_name").is_none());

    let kim = db.rows("users").into_iter().find(|r| r["id"] == json!(11)).unwrap();
    assert!(kim.get("note").is_none());
}

fn meta_editor() -> Editor {
    Editor::new("users")
        .field(Field::new("users.first_name"))
        .field(Field::new("user_meta.note"))
        .left_join("user_meta", "user_meta.user_id", "=", "users.id")
}

#[tokio::test]
async fn test_left_join_create_inserts_linked_row() {
    let db = users_db();
    db.define_table("user_meta", None);

    let response = send(
        &meta_editor(),
        &db,
        json!({
            "action": "create",
            "data": { "0": { "users": { "first_name": "Kim" }, "user_meta": { "note": "hi" } } }
        }),
    )
    .await
    .unwrap();

    let meta = db.rows("user_meta");
    assert_eq!(meta.len(), 1);
    assert_eq!(meta[0]["user_id"], json!("11"));
    assert_eq!(meta[0]["note"], json!("hi"));
    assert_eq!(response.data[0]["DT_RowId"], json!("row_11"));
    assert_eq!(response.data[0]["user_meta"]["note"], json!("hi"));
}

#[tokio::test]
async fn test_left_join_edit_inserts_missing_linked_row() {
    let db = users_db();
    db.define_table("user_meta", None);
    db.seed("user_meta", vec![json!({ "user_id": 2, "note": "kept" })]);

    let response = send(
        &meta_editor(),
        &db,
        json!({ "action": "edit", "data": { "row_1": { "user_meta": { "note": "new" } } } }),
    )
    .await
    .unwrap();

    assert_eq!(db.count_queries(QueryKind::Update, "user_meta"), 0);
    let meta = db.rows("user_meta");
    assert_eq!(meta.len(), 2);
    assert_eq!(meta[0]["note"], json!("kept"));
    assert_eq!(meta[1]["user_id"], json!("1"));
    assert_eq!(meta[1]["note"], json!("new"));
    assert_eq!(response.data[0]["user_meta"]["note"], json!("new"));
    assert_eq!(response.data[0]["users"]["first_name"], json!("Anna"));
}

#[tokio::test]
async fn test_empty_id_prefix() {
    let db = users_db();
    let editor = users_editor().config(EditorConfig::new().id_prefix(""));

    let response = send(
        &editor,
        &db,
        json!({ "action": "edit", "data": { "4": { "first_name": "Daniel" } } }),
    )
    .await
    .unwrap();

    assert_eq!(row_ids(&response), vec!["4"]);
    assert_eq!(response.data[0]["first_name"], json!("Daniel"));
}

mod common;

use common::{row_ids, send, users_and_sites_db, users_db};
use serde_json::json;
use tabula_editor::{Editor, EditorConfig, Field, HookEvent, HookPoint, OptionItem};
use tabula_query::{Condition, QueryKind};

fn users_editor() -> Editor {
    Editor::new("users").field(Field::new("first_name")).field(Field::new("site"))
}

#[tokio::test]
async fn test_read_returns_every_row_with_prefixed_ids() {
    let db = users_db();
    let response = send(&users_editor(), &db, json!({})).await.unwrap();

    assert!(response.is_success());
    assert_eq!(response.data.len(), 10);
    assert_eq!(response.data[0]["DT_RowId"], json!("row_1"));
    assert_eq!(response.data[0]["first_name"], json!("Anna"));
    assert_eq!(response.data[0]["site"], json!(1));
    assert!(response.draw.is_none());
    assert!(response.records_total.is_none());
}

#[tokio::test]
async fn test_server_side_processing_counts_and_page() {
    let db = users_db();
    let response = send(
        &users_editor(),
        &db,
        json!({
            "draw": "3",
            "start": "0",
            "length": "2",
            "order": [{ "column": "0", "dir": "asc" }],
            "columns": [
                { "data": "first_name", "searchable": "true", "search": { "value": "" } },
                { "data": "site", "searchable": "false", "search": { "value": "" } }
            ],
            "search": { "value": "an" }
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.draw, Some(3));
    assert_eq!(response.records_total, Some(10));
    assert_eq!(response.records_filtered, Some(3));
    let names: Vec<_> = response.data.iter().map(|r| r["first_name"].clone()).collect();
    assert_eq!(names, vec![json!("Anna"), json!("Dan")]);
}

#[tokio::test]
async fn test_server_side_processing_show_all_and_column_search() {
    let db = users_db();
    let response = send(
        &users_editor(),
        &db,
        json!({
            "draw": 1,
            "start": 0,
            "length": -1,
            "order": [{ "column": 0, "dir": "desc" }],
            "columns": [
                { "data": "first_name", "searchable": true, "search": { "value": "" } },
                { "data": "site", "searchable": true, "search": { "value": "2" } }
            ],
            "search": { "value": "" }
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.records_total, Some(10));
    assert_eq!(response.records_filtered, Some(5));
    assert_eq!(response.data.len(), 5);
    assert_eq!(response.data[0]["first_name"], json!("Jo"));
}

#[tokio::test]
async fn test_server_side_processing_rejects_unknown_column() {
    let db = users_db();
    let result = send(
        &users_editor(),
        &db,
        json!({
            "draw": 1,
            "start": 0,
            "length": 10,
            "order": [{ "column": 0, "dir": "asc" }],
            "columns": [{ "data": "password", "searchable": true }]
        }),
    )
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_where_conditions_limit_rows_and_total() {
    let db = users_db();
    let editor = users_editor().where_eq("site", 1);

    let response = send(
        &editor,
        &db,
        json!({
            "draw": 1,
            "start": 0,
            "length": 10,
            "columns": [{ "data": "first_name", "searchable": true }],
            "search": { "value": "" }
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.records_total, Some(5));
    assert_eq!(response.records_filtered, Some(5));
    assert_eq!(db.count_queries(QueryKind::Count, "users"), 2);
}

#[tokio::test]
async fn test_left_join_fields_nest_by_table() {
    let db = users_and_sites_db();
    let editor = Editor::new("users")
        .field(Field::new("users.first_name"))
        .field(Field::new("users.site"))
        .field(Field::new("sites.name"))
        .left_join("sites", "sites.id", "=", "users.site");

    let response = send(&editor, &db, json!({ "action": "read" })).await.unwrap();

    assert_eq!(
        response.data[1],
        json!({
            "DT_RowId": "row_2",
            "users": { "first_name": "Bob", "site": 2 },
            "sites": { "name": "London" }
        })
    );
}

#[tokio::test]
async fn test_left_join_requires_qualified_fields() {
    let db = users_and_sites_db();
    let editor = Editor::new("users")
        .field(Field::new("first_name"))
        .left_join("sites", "sites.id", "=", "users.site");

    let err = send(&editor, &db, json!({})).await.unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_options_and_computed_get_values() {
    let db = users_db();
    let editor = Editor::new("users")
        .field(Field::new("first_name").get_formatter(|v, _| json!(v.as_str().unwrap_or("").to_uppercase())))
        .field(Field::new("site").options(vec![
            OptionItem::new("Edinburgh", 1),
            OptionItem::new("London", 2),
        ]))
        .field(Field::with_name("-", "kind").get_value("person"));

    let response = send(&editor, &db, json!({})).await.unwrap();

    assert_eq!(response.data[0]["first_name"], json!("ANNA"));
    assert_eq!(response.data[0]["kind"], json!("person"));
    assert_eq!(
        response.options["site"],
        json!([
            { "label": "Edinburgh", "value": 1 },
            { "label": "London", "value": 2 }
        ])
    );
}

#[tokio::test]
async fn test_pre_get_cancels_read() {
    let db = users_db();
    let editor = users_editor().on(HookPoint::PreGet, |_: &HookEvent<'_>| Some(false));

    let response = send(&editor, &db, json!({})).await.unwrap();

    assert!(response.data.is_empty());
    assert_eq!(db.count_kind(QueryKind::Select), 0);
}

#[tokio::test]
async fn test_custom_prefix_and_debug_statements() {
    let db = users_db();
    let editor = users_editor()
        .config(EditorConfig::new().id_prefix("user-"))
        .debug(true);

    let response = send(&editor, &db, json!({})).await.unwrap();

    assert_eq!(row_ids(&response)[0], "user-1");
    let debug = response.debug.expect("debug statements");
    assert_eq!(debug.len(), 1);
    assert!(debug[0].starts_with("SELECT"));
    assert_eq!(debug[0], db.query_log()[0].sql);
}

#[tokio::test]
async fn test_unsupported_condition_surfaces_as_error() {
    let db = users_db();
    let editor = users_editor().where_condition(Condition::Raw("site > 1".to_string()));

    assert!(send(&editor, &db, json!({})).await.is_err());

    let contained = users_editor()
        .where_condition(Condition::Raw("site > 1".to_string()))
        .config(EditorConfig::new().contained_errors(true));
    let response = send(&contained, &db, json!({})).await.unwrap();
    assert!(response.error.is_some());
    assert!(response.data.is_empty());
}

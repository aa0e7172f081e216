#![allow(dead_code)]

use serde_json::{json, Value};
use tabula_editor::{Editor, EditorResult, Request, Response};
use tabula_query::MemoryDatabase;

pub const FIRST_NAMES: [&str; 10] = [
    "Anna", "Bob", "Cara", "Dan", "Eve", "Finn", "Gus", "Hal", "Ivan", "Jo",
];

/// `users` with a serial `id` and one row per entry of [`FIRST_NAMES`]
pub fn users_db() -> MemoryDatabase {
    let db = MemoryDatabase::new();
    db.define_table("users", Some("id"));
    db.seed(
        "users",
        FIRST_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| json!({ "id": i + 1, "first_name": name, "site": (i % 2) + 1 }))
            .collect(),
    );
    db
}

/// `users` plus `sites`, linked through `users.site`
pub fn users_and_sites_db() -> MemoryDatabase {
    let db = users_db();
    db.define_table("sites", Some("id"));
    db.seed(
        "sites",
        vec![
            json!({ "id": 1, "name": "Edinburgh" }),
            json!({ "id": 2, "name": "London" }),
        ],
    );
    db
}

pub async fn send(editor: &Editor, db: &MemoryDatabase, body: Value) -> EditorResult<Response> {
    let request = Request::from_value(body)?;
    editor.process(db, &request, None).await
}

pub fn row_ids(response: &Response) -> Vec<String> {
    response
        .data
        .iter()
        .filter_map(|row| row["DT_RowId"].as_str().map(str::to_string))
        .collect()
}

pub fn table_ids(db: &MemoryDatabase, table: &str) -> Vec<i64> {
    db.rows(table).iter().filter_map(|r| r["id"].as_i64()).collect()
}

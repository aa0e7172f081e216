mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::users_db;
use serde_json::{json, Map, Value};
use tabula_editor::{
    Editor, EditorError, EditorResult, Field, HookEvent, HookPoint, ManyJoin, Request, Upload, UploadOutcome,
    UploadPayload,
};
use tabula_query::{Executor, MemoryDatabase, QueryBuilder};

/// Stores file metadata in the `files` table
#[derive(Default)]
struct FileStore {
    max_size: u64,
    cleans: Arc<AtomicUsize>,
}

#[async_trait]
impl Upload for FileStore {
    async fn data(&self, executor: &dyn Executor, ids: Option<&[Value]>) -> EditorResult<Map<String, Value>> {
        let mut query = QueryBuilder::table("files").select("id, filename, size");
        if let Some(ids) = ids {
            query = query.where_in("id", ids.to_vec());
        }
        let mut out = Map::new();
        for row in executor.fetch_all(&query).await? {
            let key = row.get("id").map(|v| v.to_string()).unwrap_or_default();
            out.insert(key, Value::Object(row));
        }
        Ok(out)
    }

    async fn db_clean_exec(&self, _executor: &dyn Executor, _field: &str) -> EditorResult<()> {
        self.cleans.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exec(&self, executor: &dyn Executor, payload: &UploadPayload) -> EditorResult<UploadOutcome> {
        if payload.size > self.max_size {
            return Ok(UploadOutcome::Rejected("File too large".to_string()));
        }
        let insert = QueryBuilder::insert_into("files")
            .set("filename", payload.name.clone())
            .set("size", payload.size);
        let row = executor.insert(&insert, &["id".to_string()]).await?;
        Ok(UploadOutcome::Stored(
            row.and_then(|r| r.get("id").cloned()).unwrap_or(Value::Null),
        ))
    }

    fn table(&self) -> Option<&str> {
        Some("files")
    }

    fn pkey(&self) -> Option<&str> {
        Some("id")
    }
}

fn files_db() -> MemoryDatabase {
    let db = users_db();
    db.define_table("files", Some("id"));
    db.seed("files", vec![json!({ "id": 1, "filename": "anna.png", "size": 10 })]);
    db
}

fn payload(size: u64) -> UploadPayload {
    UploadPayload {
        name: "kim.png".to_string(),
        mime: "image/png".to_string(),
        size,
        content: vec![0; size as usize],
    }
}

fn editor(cleans: Arc<AtomicUsize>) -> Editor {
    Editor::new("users").field(Field::new("first_name")).field(
        Field::new("image").upload(FileStore {
            max_size: 100,
            cleans,
        }),
    )
}

async fn upload(editor: &Editor, db: &MemoryDatabase, field: &str, file: Option<UploadPayload>) -> EditorResult<tabula_editor::Response> {
    let request = Request::from_value(json!({ "action": "upload", "uploadField": field }))?;
    editor.process(db, &request, file.as_ref()).await
}

#[tokio::test]
async fn test_upload_stores_file_and_reports_id() {
    let db = files_db();
    let response = upload(&editor(Arc::default()), &db, "image", Some(payload(20))).await.unwrap();

    assert!(response.is_success());
    assert_eq!(response.upload.as_ref().map(|u| u.id.clone()), Some(json!(2)));
    assert_eq!(response.files["files"]["2"]["filename"], json!("kim.png"));
    assert!(response.files["files"].get("1").is_none());
}

#[tokio::test]
async fn test_rejected_upload_is_a_field_error() {
    let db = files_db();
    let response = upload(&editor(Arc::default()), &db, "image", Some(payload(500))).await.unwrap();

    assert!(response.upload.is_none());
    assert_eq!(response.field_errors[0].name, "image");
    assert_eq!(response.field_errors[0].status, "File too large");
    assert_eq!(db.rows("files").len(), 1);
}

#[tokio::test]
async fn test_upload_errors() {
    let db = files_db();
    let editor = editor(Arc::default());

    let unknown = upload(&editor, &db, "avatar", Some(payload(1))).await.unwrap_err();
    assert!(matches!(unknown, EditorError::Upload(_)));

    let missing = upload(&editor, &db, "image", None).await.unwrap_err();
    assert!(matches!(missing, EditorError::Upload(_)));

    let unbound = upload(&editor, &db, "first_name", Some(payload(1))).await.unwrap_err();
    assert!(unbound.is_configuration());
}

#[tokio::test]
async fn test_pre_upload_cancels_quietly() {
    let db = files_db();
    let editor = editor(Arc::default()).on(HookPoint::PreUpload, |_: &HookEvent<'_>| Some(false));

    let response = upload(&editor, &db, "image", Some(payload(5))).await.unwrap();

    assert!(response.is_success());
    assert!(response.upload.is_none());
    assert_eq!(db.rows("files").len(), 1);
}

#[tokio::test]
async fn test_many_join_field_accepts_uploads() {
    let db = files_db();
    let editor = Editor::new("users").field(Field::new("first_name")).many_join(
        ManyJoin::new("gallery")
            .link("users.id", "gallery.user_id")
            .field(Field::new("file_id").upload(FileStore {
                max_size: 100,
                cleans: Arc::default(),
            })),
    );

    let response = upload(&editor, &db, "gallery[].file_id", Some(payload(5))).await.unwrap();
    assert_eq!(response.upload.map(|u| u.id), Some(json!(2)));
}

#[tokio::test]
async fn test_read_attaches_referenced_files() {
    let db = files_db();
    db.seed("users", vec![json!({ "id": 11, "first_name": "Kim", "image": 1 })]);

    let response = common::send(&editor(Arc::default()), &db, json!({})).await.unwrap();

    assert_eq!(response.files["files"]["1"]["filename"], json!("anna.png"));
}

#[tokio::test]
async fn test_writes_trigger_orphan_cleanup() {
    let db = files_db();
    let cleans = Arc::new(AtomicUsize::new(0));
    let editor = editor(cleans.clone());

    common::send(&editor, &db, json!({ "action": "edit", "data": { "row_1": { "first_name": "Ann" } } }))
        .await
        .unwrap();
    common::send(&editor, &db, json!({ "action": "remove", "data": { "row_2": {} } }))
        .await
        .unwrap();
    common::send(&editor, &db, json!({})).await.unwrap();

    assert_eq!(cleans.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cleanup_runs_after_global_rejection() {
    let db = files_db();
    let cleans = Arc::new(AtomicUsize::new(0));
    let editor = editor(cleans.clone())
        .validator(|_: tabula_editor::Action, _: &Map<String, Value>| Some("Read only".to_string()));

    let response = common::send(&editor, &db, json!({ "action": "edit", "data": { "row_1": { "first_name": "Ann" } } }))
        .await
        .unwrap();

    assert_eq!(response.error.as_deref(), Some("Read only"));
    assert_eq!(cleans.load(Ordering::SeqCst), 1);
}

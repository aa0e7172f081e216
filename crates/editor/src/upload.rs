//! File upload binding
//!
//! Storage and movement of files live behind [`Upload`]; the engine only
//! routes upload requests, reports metadata and triggers cleanup.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tabula_query::Executor;

use crate::error::EditorResult;

/// A file received with an upload request
#[derive(Debug, Clone, Default)]
pub struct UploadPayload {
    pub name: String,
    pub mime: String,
    pub size: u64,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// Id of the stored file
    Stored(Value),
    /// The file was refused; the message is reported as a field error
    Rejected(String),
}

#[async_trait]
pub trait Upload: Send + Sync {
    /// Metadata rows of the file table keyed by file id. `ids` limits the
    /// lookup when present.
    async fn data(&self, executor: &dyn Executor, ids: Option<&[Value]>) -> EditorResult<Map<String, Value>>;

    /// Remove orphaned files after a write
    async fn db_clean_exec(&self, executor: &dyn Executor, field: &str) -> EditorResult<()>;

    async fn exec(&self, executor: &dyn Executor, payload: &UploadPayload) -> EditorResult<UploadOutcome>;

    /// File metadata table, if metadata is kept in the database
    fn table(&self) -> Option<&str>;

    fn pkey(&self) -> Option<&str>;
}

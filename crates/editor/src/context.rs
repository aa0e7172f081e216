//! Per-call processing context
//!
//! Editor configuration is immutable; everything that varies per request
//! (the executor in use, the resolved primary key, debug output) lives here
//! and is passed explicitly.

use std::sync::Mutex;

use async_trait::async_trait;
use tabula_query::{Executor, QueryBuilder, QueryResult, Row, TableName};
use tracing::debug;

use crate::field::Field;
use crate::pkey::PrimaryKey;
use crate::request::Action;

/// Executor wrapper that records every statement when debugging is on
pub struct Recorder<'a> {
    inner: &'a dyn Executor,
    enabled: bool,
    entries: Mutex<Vec<String>>,
}

impl<'a> Recorder<'a> {
    pub fn new(inner: &'a dyn Executor, enabled: bool) -> Self {
        Self {
            inner,
            enabled,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Record a free-form debug message
    pub fn note(&self, message: impl Into<String>) {
        if self.enabled {
            self.push(message.into());
        }
    }

    pub fn take(&self) -> Vec<String> {
        match self.entries.lock() {
            Ok(mut entries) => std::mem::take(&mut *entries),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn push(&self, entry: String) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    fn statement(&self, sql: impl FnOnce() -> String) {
        if self.enabled {
            let sql = sql();
            debug!(target: "tabula_editor::sql", "{}", sql);
            self.push(sql);
        }
    }
}

#[async_trait]
impl Executor for Recorder<'_> {
    fn client_name(&self) -> &str {
        self.inner.client_name()
    }

    async fn fetch_all(&self, query: &QueryBuilder) -> QueryResult<Vec<Row>> {
        self.statement(|| query.to_sql());
        self.inner.fetch_all(query).await
    }

    async fn fetch_count(&self, query: &QueryBuilder, column: &str) -> QueryResult<i64> {
        self.statement(|| query.to_count_sql(column));
        self.inner.fetch_count(query, column).await
    }

    async fn insert(&self, query: &QueryBuilder, returning: &[String]) -> QueryResult<Option<Row>> {
        self.statement(|| query.to_insert_sql(returning));
        self.inner.insert(query, returning).await
    }

    async fn execute(&self, query: &QueryBuilder) -> QueryResult<u64> {
        self.statement(|| query.to_sql());
        self.inner.execute(query).await
    }
}

pub struct Context<'a> {
    pub(crate) recorder: &'a Recorder<'a>,
    pub(crate) action: Action,
    /// First write table
    pub(crate) host: TableName,
    /// Primary key, table-qualified when left joins are in play
    pub(crate) pkey: PrimaryKey,
    pub(crate) id_prefix: &'a str,
    pub(crate) fields: &'a [Field],
}

impl<'a> Context<'a> {
    pub fn executor(&self) -> &dyn Executor {
        self.recorder
    }

    pub fn strip_prefix<'s>(&self, id: &'s str) -> &'s str {
        id.strip_prefix(self.id_prefix).unwrap_or(id)
    }

    pub fn find_field_by_db(&self, db_field: &str) -> Option<&'a Field> {
        self.fields.iter().find(|f| f.db_field() == db_field)
    }

    /// Decompose an unprefixed id into flat `column -> value` pairs
    pub fn pkey_where(&self, id: &str) -> crate::error::EditorResult<serde_json::Map<String, serde_json::Value>> {
        self.pkey.decompose(id, self.id_prefix, true, None)
    }
}

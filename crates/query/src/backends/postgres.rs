//! PostgreSQL Backend Implementation
//!
//! Executes built queries through a sqlx connection pool. Rows are
//! converted into JSON maps keyed by the output column names.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Postgres, Row as SqlxRow};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::core::{Database, Executor, Row, Transaction};
use crate::error::{QueryError, QueryResult};
use crate::query::{QueryBuilder, QueryType};

const CLIENT_NAME: &str = "postgres";

/// PostgreSQL database backed by a sqlx pool
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a small pool to `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> QueryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        debug!("PostgreSQL pool created with {} max connections", max_connections);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Executor for PgDatabase {
    fn client_name(&self) -> &str {
        CLIENT_NAME
    }

    async fn fetch_all(&self, query: &QueryBuilder) -> QueryResult<Vec<Row>> {
        let sql = select_sql(query)?;
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_json).collect()
    }

    async fn fetch_count(&self, query: &QueryBuilder, column: &str) -> QueryResult<i64> {
        let row = sqlx::query(&query.to_count_sql(column))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn insert(&self, query: &QueryBuilder, returning: &[String]) -> QueryResult<Option<Row>> {
        let sql = insert_sql(query, returning)?;
        if returning.is_empty() {
            sqlx::query(&sql).execute(&self.pool).await?;
            return Ok(None);
        }
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_json).transpose()
    }

    async fn execute(&self, query: &QueryBuilder) -> QueryResult<u64> {
        let result = sqlx::query(&query.to_sql()).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Database for PgDatabase {
    fn as_executor(&self) -> &dyn Executor {
        self
    }

    async fn begin(&self) -> QueryResult<Box<dyn Transaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| QueryError::Transaction(format!("Failed to begin transaction: {}", e)))?;
        debug!("Database transaction started");
        Ok(Box::new(PgTransaction {
            inner: Mutex::new(Some(tx)),
        }))
    }
}

/// Transaction holding a single pooled connection until commit or rollback
pub struct PgTransaction {
    inner: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
}

fn closed() -> QueryError {
    QueryError::Transaction("Transaction is no longer active".to_string())
}

#[async_trait]
impl Executor for PgTransaction {
    fn client_name(&self) -> &str {
        CLIENT_NAME
    }

    async fn fetch_all(&self, query: &QueryBuilder) -> QueryResult<Vec<Row>> {
        let sql = select_sql(query)?;
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(closed)?;
        let rows = sqlx::query(&sql).fetch_all(&mut **tx).await?;
        rows.iter().map(row_to_json).collect()
    }

    async fn fetch_count(&self, query: &QueryBuilder, column: &str) -> QueryResult<i64> {
        let sql = query.to_count_sql(column);
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(closed)?;
        let row = sqlx::query(&sql).fetch_one(&mut **tx).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn insert(&self, query: &QueryBuilder, returning: &[String]) -> QueryResult<Option<Row>> {
        let sql = insert_sql(query, returning)?;
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(closed)?;
        if returning.is_empty() {
            sqlx::query(&sql).execute(&mut **tx).await?;
            return Ok(None);
        }
        let row = sqlx::query(&sql).fetch_optional(&mut **tx).await?;
        row.as_ref().map(row_to_json).transpose()
    }

    async fn execute(&self, query: &QueryBuilder) -> QueryResult<u64> {
        let sql = query.to_sql();
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(closed)?;
        let result = sqlx::query(&sql).execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    fn as_executor(&self) -> &dyn Executor {
        self
    }

    async fn commit(self: Box<Self>) -> QueryResult<()> {
        let tx = self.inner.into_inner().ok_or_else(closed)?;
        tx.commit()
            .await
            .map_err(|e| QueryError::Transaction(format!("Failed to commit transaction: {}", e)))?;
        debug!("Database transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> QueryResult<()> {
        let tx = self.inner.into_inner().ok_or_else(closed)?;
        tx.rollback()
            .await
            .map_err(|e| QueryError::Transaction(format!("Failed to rollback transaction: {}", e)))?;
        warn!("Database transaction rolled back");
        Ok(())
    }
}

fn select_sql(query: &QueryBuilder) -> QueryResult<String> {
    match query.query_type() {
        QueryType::Select => Ok(query.to_sql()),
        other => Err(QueryError::Query(format!("Expected a SELECT query, got {:?}", other))),
    }
}

fn insert_sql(query: &QueryBuilder, returning: &[String]) -> QueryResult<String> {
    match query.query_type() {
        QueryType::Insert => Ok(query.to_insert_sql(returning)),
        other => Err(QueryError::Query(format!("Expected an INSERT query, got {:?}", other))),
    }
}

/// Convert a PostgreSQL row to a JSON map
fn row_to_json(row: &PgRow) -> QueryResult<Row> {
    let mut map = Row::new();

    for (i, column) in row.columns().iter().enumerate() {
        let json_value = if let Ok(value) = row.try_get::<Option<String>, _>(i) {
            value.map_or(JsonValue::Null, JsonValue::String)
        } else if let Ok(value) = row.try_get::<Option<i64>, _>(i) {
            value.map_or(JsonValue::Null, |v| JsonValue::Number(v.into()))
        } else if let Ok(value) = row.try_get::<Option<i32>, _>(i) {
            value.map_or(JsonValue::Null, |v| JsonValue::Number(v.into()))
        } else if let Ok(value) = row.try_get::<Option<i16>, _>(i) {
            value.map_or(JsonValue::Null, |v| JsonValue::Number(v.into()))
        } else if let Ok(value) = row.try_get::<Option<f64>, _>(i) {
            value
                .and_then(serde_json::Number::from_f64)
                .map_or(JsonValue::Null, JsonValue::Number)
        } else if let Ok(value) = row.try_get::<Option<bool>, _>(i) {
            value.map_or(JsonValue::Null, JsonValue::Bool)
        } else if let Ok(value) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i) {
            value.map_or(JsonValue::Null, |v| {
                JsonValue::String(v.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            })
        } else if let Ok(value) = row.try_get::<Option<chrono::NaiveDateTime>, _>(i) {
            value.map_or(JsonValue::Null, |v| {
                JsonValue::String(v.and_utc().to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            })
        } else if let Ok(value) = row.try_get::<Option<chrono::NaiveDate>, _>(i) {
            value.map_or(JsonValue::Null, |v| JsonValue::String(v.format("%Y-%m-%d").to_string()))
        } else if let Ok(value) = row.try_get::<Option<uuid::Uuid>, _>(i) {
            value.map_or(JsonValue::Null, |v| JsonValue::String(v.to_string()))
        } else if let Ok(value) = row.try_get::<Option<JsonValue>, _>(i) {
            value.unwrap_or(JsonValue::Null)
        } else {
            return Err(QueryError::Serialization(format!(
                "Unsupported column type for '{}'",
                column.name()
            )));
        };

        map.insert(column.name().to_string(), json_value);
    }

    Ok(map)
}

//! Core Database Backend Traits
//!
//! The engine only ever talks to storage through these traits. A
//! [`Database`] hands out [`Transaction`]s; both are [`Executor`]s so code
//! can run the same statements with or without a transaction in scope.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::QueryResult;
use crate::query::QueryBuilder;

/// A result row, keyed by output column name
pub type Row = Map<String, Value>;

/// Runs built queries against a storage engine
#[async_trait]
pub trait Executor: Send + Sync {
    /// Name of the client driver, used for dialect specific branches
    fn client_name(&self) -> &str;

    /// Execute a SELECT and return every row
    async fn fetch_all(&self, query: &QueryBuilder) -> QueryResult<Vec<Row>>;

    /// Count the rows a SELECT would match, ignoring ordering and paging
    async fn fetch_count(&self, query: &QueryBuilder, column: &str) -> QueryResult<i64>;

    /// Execute an INSERT. When `returning` is non-empty the inserted row's
    /// values for those columns are returned.
    async fn insert(&self, query: &QueryBuilder, returning: &[String]) -> QueryResult<Option<Row>>;

    /// Execute an UPDATE or DELETE and return the affected row count
    async fn execute(&self, query: &QueryBuilder) -> QueryResult<u64>;
}

/// A storage engine able to open transactions
#[async_trait]
pub trait Database: Executor {
    /// View this database as a plain executor
    fn as_executor(&self) -> &dyn Executor;

    /// Begin a transaction
    async fn begin(&self) -> QueryResult<Box<dyn Transaction>>;
}

/// An open transaction
#[async_trait]
pub trait Transaction: Executor {
    /// View this transaction as a plain executor
    fn as_executor(&self) -> &dyn Executor;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> QueryResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> QueryResult<()>;
}

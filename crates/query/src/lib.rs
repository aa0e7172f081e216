//! # tabula-query
//!
//! Fluent relational query builder plus the storage seam it executes
//! through. Queries are plain values: they can be rendered to SQL, cloned
//! to derive COUNT statements, or evaluated in memory.

pub mod backends;
pub mod error;
pub mod query;

pub use backends::{
    Database, Executor, MemoryDatabase, PgDatabase, QueryKind, QueryLogEntry, Row, Transaction,
};
pub use error::{QueryError, QueryResult};
pub use query::*;

//! Database Backend Abstractions
//!
//! Storage engines implement the [`Executor`], [`Database`] and
//! [`Transaction`] traits. Two backends ship with the crate: PostgreSQL via
//! sqlx and an in-memory evaluator.

pub mod core;
pub mod memory;
pub mod postgres;

pub use self::core::*;
pub use memory::{MemoryDatabase, MemoryTransaction, QueryKind, QueryLogEntry};
pub use postgres::{PgDatabase, PgTransaction};

//! Query Builder DML operations (INSERT, UPDATE, DELETE)

use super::builder::QueryBuilder;
use super::types::*;
use serde_json::Value;

impl QueryBuilder {
    /// Start an INSERT query
    pub fn insert_into(table: &str) -> Self {
        let mut query = Self::new();
        query.query_type = QueryType::Insert;
        query.target_table = Some(TableName::parse(table));
        query
    }

    /// Start an UPDATE query
    pub fn update(table: &str) -> Self {
        let mut query = Self::new();
        query.query_type = QueryType::Update;
        query.target_table = Some(TableName::parse(table));
        query
    }

    /// Start a DELETE query
    pub fn delete_from(table: &str) -> Self {
        let mut query = Self::new();
        query.query_type = QueryType::Delete;
        query.target_table = Some(TableName::parse(table));
        query
    }

    /// Set a column value (for INSERT/UPDATE)
    pub fn set<T: Into<Value>>(mut self, column: &str, value: T) -> Self {
        self.set_clauses.push(SetClause {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    /// Set multiple values at once
    pub fn set_values(mut self, values: &serde_json::Map<String, Value>) -> Self {
        for (column, value) in values {
            self.set_clauses.push(SetClause {
                column: column.clone(),
                value: value.clone(),
            });
        }
        self
    }
}

//! Query Builder SELECT operations

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Add SELECT columns, comma separated
    pub fn select(mut self, fields: &str) -> Self {
        self.select_fields.extend(
            fields
                .split(',')
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .map(|f| SelectField {
                    expression: f.to_string(),
                    alias: None,
                    raw: false,
                }),
        );
        self
    }

    /// Add a column projected under an explicit output name
    pub fn select_as(mut self, column: &str, alias: &str) -> Self {
        self.select_fields.push(SelectField {
            expression: column.to_string(),
            alias: Some(alias.to_string()),
            raw: false,
        });
        self
    }

    /// Add a raw SQL expression projected under an explicit output name
    pub fn select_raw(mut self, expression: &str, alias: &str) -> Self {
        self.select_fields.push(SelectField {
            expression: expression.to_string(),
            alias: Some(alias.to_string()),
            raw: true,
        });
        self
    }

    /// Make the SELECT DISTINCT
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Set the FROM table
    pub fn from(mut self, table: &str) -> Self {
        self.from_table = Some(TableName::parse(table));
        self
    }
}

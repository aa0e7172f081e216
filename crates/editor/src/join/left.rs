//! Single-row left joins
//!
//! Each link is added to read queries verbatim. On write the link is
//! resolved into a parent and a child column, and the joined table is
//! upserted on the child column.

use serde_json::Value;
use tabula_query::{QueryBuilder, QueryOperator, TableName};

use crate::context::Context;
use crate::error::{EditorError, EditorResult};
use crate::field::Direction;
use crate::request::Action;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeftJoin {
    table: String,
    field1: String,
    operator: String,
    field2: String,
}

impl LeftJoin {
    pub fn new(table: &str, field1: &str, operator: &str, field2: &str) -> Self {
        Self {
            table: table.to_string(),
            field1: field1.to_string(),
            operator: operator.to_string(),
            field2: field2.to_string(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn table_name(&self) -> TableName {
        TableName::parse(&self.table)
    }

    pub fn apply(&self, query: QueryBuilder) -> EditorResult<QueryBuilder> {
        let operator = QueryOperator::parse(&self.operator).ok_or_else(|| {
            EditorError::config(format!(
                "Unsupported operator `{}` in left join to `{}`",
                self.operator, self.table
            ))
        })?;
        Ok(query.left_join_op(&self.table, &self.field1, operator, &self.field2))
    }

    /// `(parent, child)`: the child endpoint is the one on the joined table
    pub fn sides(&self) -> (&str, &str) {
        let joined = self.table_name();
        if table_of(&self.field1) == Some(joined.reference()) {
            (self.field2.as_str(), self.field1.as_str())
        } else {
            (self.field1.as_str(), self.field2.as_str())
        }
    }

    /// Column on the joined table and the value to match it against for the
    /// row written as `id`. `None` when nothing submitted identifies the
    /// joined row.
    pub(crate) fn write_target(
        &self,
        ctx: &Context<'_>,
        id: &str,
        values: &Value,
    ) -> Option<(String, Value)> {
        let (parent, child) = self.sides();

        let where_value = if parent == ctx.pkey.first() && !ctx.pkey.is_compound() {
            Value::String(id.to_string())
        } else {
            let submitted = |db: &str| {
                ctx.find_field_by_db(db)
                    .filter(|f| f.apply(Action::Edit, values))
                    .map(|f| f.val(Direction::Set, values))
            };
            submitted(parent).or_else(|| submitted(child))?
        };

        Some((column_of(child).to_string(), where_value))
    }
}

pub(crate) fn apply_all(joins: &[LeftJoin], mut query: QueryBuilder) -> EditorResult<QueryBuilder> {
    for join in joins {
        query = join.apply(query)?;
    }
    Ok(query)
}

pub(crate) fn table_of(column: &str) -> Option<&str> {
    column.rsplit_once('.').map(|(table, _)| table)
}

pub(crate) fn column_of(column: &str) -> &str {
    column.rsplit_once('.').map_or(column, |(_, name)| name)
}

//! Query Builder SQL generation
//!
//! Values are rendered inline as escaped literals so PostgreSQL can coerce
//! text ids into the column's own type.

use serde_json::Value;
use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Convert the query to a SQL string
    pub fn to_sql(&self) -> String {
        match self.query_type {
            QueryType::Select => self.build_select_sql(),
            QueryType::Insert => self.build_insert_sql(&[]),
            QueryType::Update => self.build_update_sql(),
            QueryType::Delete => self.build_delete_sql(),
        }
    }

    /// SELECT COUNT over the same tables, joins and conditions
    pub fn to_count_sql(&self, column: &str) -> String {
        let mut sql = format!("SELECT COUNT({}) AS cnt", column);
        self.build_from_clause(&mut sql);
        self.build_where_clause(&mut sql);
        sql
    }

    /// INSERT with a RETURNING clause for the given columns
    pub fn to_insert_sql(&self, returning: &[String]) -> String {
        self.build_insert_sql(returning)
    }

    fn build_select_sql(&self) -> String {
        let mut sql = String::new();

        if self.distinct {
            sql.push_str("SELECT DISTINCT ");
        } else {
            sql.push_str("SELECT ");
        }

        if self.select_fields.is_empty() {
            sql.push('*');
        } else {
            let fields: Vec<String> = self
                .select_fields
                .iter()
                .map(|field| match &field.alias {
                    Some(alias) => format!("{} AS {}", field.expression, quote_identifier(alias)),
                    None => field.expression.clone(),
                })
                .collect();
            sql.push_str(&fields.join(", "));
        }

        self.build_from_clause(&mut sql);
        self.build_where_clause(&mut sql);
        self.build_order_limit_clause(&mut sql);

        sql
    }

    fn build_from_clause(&self, sql: &mut String) {
        if let Some(table) = &self.from_table {
            sql.push_str(" FROM ");
            sql.push_str(&table.to_string());
        }

        for join in &self.joins {
            sql.push_str(&format!(" {} {}", join.join_type, TableName::parse(&join.table)));
            if !join.on_conditions.is_empty() {
                sql.push_str(" ON ");
                let conditions: Vec<String> = join
                    .on_conditions
                    .iter()
                    .map(|on| format!("{} {} {}", on.left, on.operator, on.right))
                    .collect();
                sql.push_str(&conditions.join(" AND "));
            }
        }
    }

    fn build_insert_sql(&self, returning: &[String]) -> String {
        let mut sql = String::new();

        if let Some(table) = &self.target_table {
            sql.push_str(&format!("INSERT INTO {}", table.name));

            if self.set_clauses.is_empty() {
                sql.push_str(" DEFAULT VALUES");
            } else {
                let columns: Vec<&str> = self.set_clauses.iter().map(|c| c.column.as_str()).collect();
                let values: Vec<String> = self
                    .set_clauses
                    .iter()
                    .map(|c| format_value(&c.value))
                    .collect();
                sql.push_str(&format!(" ({}) VALUES ({})", columns.join(", "), values.join(", ")));
            }

            if !returning.is_empty() {
                sql.push_str(&format!(" RETURNING {}", returning.join(", ")));
            }
        }

        sql
    }

    fn build_update_sql(&self) -> String {
        let mut sql = String::new();

        if let Some(table) = &self.target_table {
            sql.push_str(&format!("UPDATE {}", table));

            if !self.set_clauses.is_empty() {
                let sets: Vec<String> = self
                    .set_clauses
                    .iter()
                    .map(|c| format!("{} = {}", c.column, format_value(&c.value)))
                    .collect();
                sql.push_str(" SET ");
                sql.push_str(&sets.join(", "));
            }

            self.build_where_clause(&mut sql);
        }

        sql
    }

    fn build_delete_sql(&self) -> String {
        let mut sql = String::new();

        if let Some(table) = &self.target_table {
            sql.push_str(&format!("DELETE FROM {}", table));
            self.build_where_clause(&mut sql);
        }

        sql
    }

    fn build_where_clause(&self, sql: &mut String) {
        if !self.where_conditions.is_empty() {
            let conditions: Vec<String> = self.where_conditions.iter().map(render_condition).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
    }

    fn build_order_limit_clause(&self, sql: &mut String) {
        if !self.order_by.is_empty() {
            let order_clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_clauses.join(", "));
        }

        if let Some(limit) = self.limit_count {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset_value {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
    }
}

fn render_condition(condition: &Condition) -> String {
    match condition {
        Condition::Raw(raw) => raw.clone(),
        Condition::Any(group) => render_group(group, " OR ", "1 = 0"),
        Condition::All(group) => render_group(group, " AND ", "1 = 1"),
        Condition::Compare(compare) => render_compare(compare),
    }
}

fn render_group(group: &[Condition], joiner: &str, empty: &str) -> String {
    if group.is_empty() {
        return empty.to_string();
    }
    let parts: Vec<String> = group.iter().map(render_condition).collect();
    format!("({})", parts.join(joiner))
}

fn render_compare(condition: &WhereCondition) -> String {
    match condition.operator {
        QueryOperator::IsNull | QueryOperator::IsNotNull => {
            format!("{} {}", condition.column, condition.operator)
        }
        QueryOperator::In | QueryOperator::NotIn => {
            if condition.values.is_empty() {
                // An empty IN list matches nothing, an empty NOT IN everything
                return if condition.operator == QueryOperator::In {
                    "1 = 0".to_string()
                } else {
                    "1 = 1".to_string()
                };
            }
            let values: Vec<String> = condition.values.iter().map(format_value).collect();
            format!("{} {} ({})", condition.column, condition.operator, values.join(", "))
        }
        QueryOperator::ILike => {
            let value = condition.value.as_ref().unwrap_or(&Value::Null);
            format!("CAST({} AS TEXT) ILIKE {}", condition.column, format_value(value))
        }
        _ => match &condition.value {
            Some(Value::Null) | None => match condition.operator {
                QueryOperator::NotEqual => format!("{} IS NOT NULL", condition.column),
                _ => format!("{} IS NULL", condition.column),
            },
            Some(value) => format!("{} {} {}", condition.column, condition.operator, format_value(value)),
        },
    }
}

/// Format a value as a SQL literal
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")), // Escape single quotes
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "NULL".to_string(),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

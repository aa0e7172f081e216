//! Query Builder WHERE clause operations

use super::builder::QueryBuilder;
use super::types::*;
use serde_json::Value;

impl QueryBuilder {
    /// Add a prebuilt condition
    pub fn where_condition(mut self, condition: Condition) -> Self {
        self.where_conditions.push(condition);
        self
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_condition(Condition::eq(column, value))
    }

    /// Add WHERE condition with an explicit operator
    pub fn where_op<T: Into<Value>>(self, column: &str, operator: QueryOperator, value: T) -> Self {
        self.where_condition(Condition::compare(column, operator, value))
    }

    /// Add WHERE condition with LIKE
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.where_condition(Condition::like(column, pattern))
    }

    /// Add WHERE condition with ILIKE (case-insensitive match)
    pub fn where_ilike(self, column: &str, pattern: &str) -> Self {
        self.where_condition(Condition::ilike(column, pattern))
    }

    /// Add WHERE condition with IN
    pub fn where_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.where_condition(Condition::is_in(column, values))
    }

    /// Add WHERE condition with NOT IN
    pub fn where_not_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.where_condition(Condition::Compare(WhereCondition {
            column: column.to_string(),
            operator: QueryOperator::NotIn,
            value: None,
            values: values.into_iter().map(Into::into).collect(),
        }))
    }

    /// Add WHERE condition with IS NULL
    pub fn where_null(self, column: &str) -> Self {
        self.where_condition(Condition::is_null(column))
    }

    /// Add WHERE condition with IS NOT NULL
    pub fn where_not_null(self, column: &str) -> Self {
        self.where_condition(Condition::is_not_null(column))
    }

    /// Add a parenthesised OR group. An empty group is skipped.
    pub fn where_any(self, conditions: Vec<Condition>) -> Self {
        if conditions.is_empty() {
            return self;
        }
        self.where_condition(Condition::Any(conditions))
    }

    /// Add every `column = value` pair of a map as equality conditions
    pub fn where_map(mut self, values: &serde_json::Map<String, Value>) -> Self {
        for (column, value) in values {
            self = self.where_eq(column, value.clone());
        }
        self
    }

    /// Add raw WHERE condition for complex cases
    pub fn where_raw(self, raw_condition: &str) -> Self {
        self.where_condition(Condition::Raw(raw_condition.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_where_any_skips_empty_group() {
        let query = QueryBuilder::table("users").where_any(vec![]);
        assert!(query.conditions().is_empty());
    }

    #[test]
    fn test_where_map_adds_equalities() {
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), json!(4));
        map.insert("site".to_string(), json!("a"));
        let query = QueryBuilder::table("users").where_map(&map);
        assert_eq!(
            query.conditions(),
            &[Condition::eq("id", 4), Condition::eq("site", "a")]
        );
    }

    #[test]
    fn test_null_and_negated_predicates_render() {
        let query = QueryBuilder::table("users")
            .where_null("deleted_at")
            .where_not_in("site", vec![1, 2])
            .where_op("age", QueryOperator::GreaterThanOrEqual, 18);
        let sql = query.to_sql();
        assert!(sql.contains("deleted_at IS NULL"));
        assert!(sql.contains("site NOT IN (1, 2)"));
        assert!(sql.contains("age >= 18"));
    }
}

//! Query Builder - Core builder implementation

use super::types::*;

/// Query builder for constructing database queries
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    pub(crate) query_type: QueryType,
    pub(crate) select_fields: Vec<SelectField>,
    pub(crate) from_table: Option<TableName>,
    pub(crate) target_table: Option<TableName>,
    pub(crate) set_clauses: Vec<SetClause>,
    pub(crate) where_conditions: Vec<Condition>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) order_by: Vec<(String, OrderDirection)>,
    pub(crate) limit_count: Option<i64>,
    pub(crate) offset_value: Option<i64>,
    pub(crate) distinct: bool,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new() -> Self {
        Self {
            query_type: QueryType::Select,
            select_fields: Vec::new(),
            from_table: None,
            target_table: None,
            set_clauses: Vec::new(),
            where_conditions: Vec::new(),
            joins: Vec::new(),
            order_by: Vec::new(),
            limit_count: None,
            offset_value: None,
            distinct: false,
        }
    }

    /// Create a SELECT query over `table` (which may carry an alias)
    pub fn table(table: &str) -> Self {
        Self::new().from(table)
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn select_fields(&self) -> &[SelectField] {
        &self.select_fields
    }

    pub fn from_table(&self) -> Option<&TableName> {
        self.from_table.as_ref()
    }

    /// Table targeted by an INSERT, UPDATE or DELETE
    pub fn target_table(&self) -> Option<&TableName> {
        self.target_table.as_ref()
    }

    pub fn set_clauses(&self) -> &[SetClause] {
        &self.set_clauses
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.where_conditions
    }

    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    pub fn ordering(&self) -> &[(String, OrderDirection)] {
        &self.order_by
    }

    pub fn limit_count(&self) -> Option<i64> {
        self.limit_count
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset_value
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }
}

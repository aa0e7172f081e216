//! Query Builder JOIN operations

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    fn push_join(
        mut self,
        join_type: JoinType,
        table: &str,
        left_col: &str,
        operator: QueryOperator,
        right_col: &str,
    ) -> Self {
        self.joins.push(JoinClause {
            join_type,
            table: table.to_string(),
            on_conditions: vec![JoinOn {
                left: left_col.to_string(),
                operator,
                right: right_col.to_string(),
            }],
        });
        self
    }

    /// Add INNER JOIN to the query
    pub fn join(self, table: &str, left_col: &str, right_col: &str) -> Self {
        self.push_join(JoinType::Inner, table, left_col, QueryOperator::Equal, right_col)
    }

    /// Alias of [`QueryBuilder::join`]
    pub fn inner_join(self, table: &str, left_col: &str, right_col: &str) -> Self {
        self.join(table, left_col, right_col)
    }

    /// Add LEFT JOIN to the query
    pub fn left_join(self, table: &str, left_col: &str, right_col: &str) -> Self {
        self.push_join(JoinType::Left, table, left_col, QueryOperator::Equal, right_col)
    }

    /// Add LEFT JOIN with an arbitrary comparison operator
    pub fn left_join_op(
        self,
        table: &str,
        left_col: &str,
        operator: QueryOperator,
        right_col: &str,
    ) -> Self {
        self.push_join(JoinType::Left, table, left_col, operator, right_col)
    }
}

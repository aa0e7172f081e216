//! Query Builder Module - Fluent query builder for relational statements

pub mod builder;
pub mod dml;
pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use builder::QueryBuilder;
pub use sql_generation::format_value;
pub use types::{
    Condition, JoinClause, JoinOn, JoinType, OrderDirection, QueryOperator, QueryType,
    SelectField, SetClause, TableName, WhereCondition,
};

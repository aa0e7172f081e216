//! Query Builder Types - Core types and enums for query building

use std::fmt;
use serde_json::Value;

/// Query operator types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    ILike,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl QueryOperator {
    /// Parse a comparison operator as written in SQL
    pub fn parse(operator: &str) -> Option<Self> {
        let op = match operator.trim().to_uppercase().as_str() {
            "=" => QueryOperator::Equal,
            "!=" | "<>" => QueryOperator::NotEqual,
            ">" => QueryOperator::GreaterThan,
            ">=" => QueryOperator::GreaterThanOrEqual,
            "<" => QueryOperator::LessThan,
            "<=" => QueryOperator::LessThanOrEqual,
            "LIKE" => QueryOperator::Like,
            "ILIKE" => QueryOperator::ILike,
            "NOT LIKE" => QueryOperator::NotLike,
            "IN" => QueryOperator::In,
            "NOT IN" => QueryOperator::NotIn,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
            QueryOperator::Like => write!(f, "LIKE"),
            QueryOperator::ILike => write!(f, "ILIKE"),
            QueryOperator::NotLike => write!(f, "NOT LIKE"),
            QueryOperator::In => write!(f, "IN"),
            QueryOperator::NotIn => write!(f, "NOT IN"),
            QueryOperator::IsNull => write!(f, "IS NULL"),
            QueryOperator::IsNotNull => write!(f, "IS NOT NULL"),
        }
    }
}

/// Single column comparison
#[derive(Debug, Clone, PartialEq)]
pub struct WhereCondition {
    pub column: String,
    pub operator: QueryOperator,
    pub value: Option<Value>,
    pub values: Vec<Value>, // For IN, NOT IN
}

/// A predicate tree. Top-level conditions of a query are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare(WhereCondition),
    /// Disjunction of the nested conditions
    Any(Vec<Condition>),
    /// Conjunction of the nested conditions
    All(Vec<Condition>),
    /// Raw SQL fragment, passed through verbatim
    Raw(String),
}

impl Condition {
    pub fn compare<T: Into<Value>>(column: &str, operator: QueryOperator, value: T) -> Self {
        Condition::Compare(WhereCondition {
            column: column.to_string(),
            operator,
            value: Some(value.into()),
            values: Vec::new(),
        })
    }

    pub fn eq<T: Into<Value>>(column: &str, value: T) -> Self {
        Self::compare(column, QueryOperator::Equal, value)
    }

    pub fn like(column: &str, pattern: &str) -> Self {
        Self::compare(column, QueryOperator::Like, pattern)
    }

    pub fn ilike(column: &str, pattern: &str) -> Self {
        Self::compare(column, QueryOperator::ILike, pattern)
    }

    pub fn is_in<T: Into<Value>>(column: &str, values: Vec<T>) -> Self {
        Condition::Compare(WhereCondition {
            column: column.to_string(),
            operator: QueryOperator::In,
            value: None,
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn is_null(column: &str) -> Self {
        Condition::Compare(WhereCondition {
            column: column.to_string(),
            operator: QueryOperator::IsNull,
            value: None,
            values: Vec::new(),
        })
    }

    pub fn is_not_null(column: &str) -> Self {
        Condition::Compare(WhereCondition {
            column: column.to_string(),
            operator: QueryOperator::IsNotNull,
            value: None,
            values: Vec::new(),
        })
    }
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
        }
    }
}

/// Column-to-column comparison used in a join's ON clause
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOn {
    pub left: String,
    pub operator: QueryOperator,
    pub right: String,
}

/// Join clause
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub on_conditions: Vec<JoinOn>,
}

/// One projected column
#[derive(Debug, Clone, PartialEq)]
pub struct SelectField {
    pub expression: String,
    pub alias: Option<String>,
    /// Raw expressions are never resolved as column references
    pub raw: bool,
}

impl SelectField {
    /// Name of the key this field produces in a result row
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.expression)
    }
}

/// Table reference, optionally aliased (`"users as u"`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub name: String,
    pub alias: Option<String>,
}

impl TableName {
    /// Split `"name as alias"` (or `"name alias"`) into its two parts
    pub fn parse(table: &str) -> Self {
        let parts: Vec<&str> = table.split_whitespace().collect();
        match parts.as_slice() {
            [name, kw, alias] if kw.eq_ignore_ascii_case("as") => TableName {
                name: name.to_string(),
                alias: Some(alias.to_string()),
            },
            [name, alias] => TableName {
                name: name.to_string(),
                alias: Some(alias.to_string()),
            },
            _ => TableName {
                name: table.trim().to_string(),
                alias: None,
            },
        }
    }

    /// The name rows of this table are referenced by in the query
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {}", self.name, alias),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    /// Anything other than `desc` sorts ascending
    pub fn parse(direction: &str) -> Self {
        if direction.trim().eq_ignore_ascii_case("desc") {
            OrderDirection::Desc
        } else {
            OrderDirection::Asc
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Query types supported by the builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
}

/// Set clause for UPDATE and INSERT operations
#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    pub column: String,
    pub value: Value,
}

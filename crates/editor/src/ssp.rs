//! Server-side processing
//!
//! Paging, ordering and searching are pushed into the queries. The data
//! query, the filtered count and the total count are built and executed
//! separately.

use tabula_query::{Condition, OrderDirection, QueryBuilder};

use crate::error::{EditorError, EditorResult};
use crate::field::Field;
use crate::pkey::PrimaryKey;
use crate::request::Request;

/// `length` value asking for every row
pub const SHOW_ALL: i64 = -1;

/// Only requests carrying a draw counter are server-side processed
pub fn engaged(request: &Request) -> bool {
    request.draw.is_some()
}

/// Db column behind the requested column index
pub fn column(request: &Request, index: usize, fields: &[Field], pkey: &PrimaryKey) -> EditorResult<String> {
    let name = request
        .columns
        .get(index)
        .and_then(|c| c.name())
        .ok_or_else(|| EditorError::Protocol(format!("Unknown field: column index {}", index)))?;

    if name == "DT_RowId" {
        return Ok(pkey.first().to_string());
    }
    fields
        .iter()
        .find(|f| f.name() == name)
        .map(|f| f.db_field().to_string())
        .ok_or_else(|| EditorError::Protocol(format!("Unknown field: {} (index {})", name, index)))
}

pub fn paginate(query: QueryBuilder, request: &Request) -> QueryBuilder {
    match request.length {
        Some(length) if length != SHOW_ALL => query
            .limit(length)
            .offset(request.start.unwrap_or(0).max(0)),
        _ => query,
    }
}

pub fn order(
    mut query: QueryBuilder,
    request: &Request,
    fields: &[Field],
    pkey: &PrimaryKey,
) -> EditorResult<QueryBuilder> {
    for order in &request.order {
        let column = column(request, order.column, fields, pkey)?;
        query = query.order_by_dir(&column, OrderDirection::parse(&order.dir));
    }
    Ok(query)
}

/// Global search as one OR group over searchable columns, plus one AND
/// term per column search. `client` picks ILIKE for PostgreSQL.
pub fn filter(
    mut query: QueryBuilder,
    request: &Request,
    fields: &[Field],
    pkey: &PrimaryKey,
    client: &str,
) -> EditorResult<QueryBuilder> {
    let like = |column: &str, term: &str| {
        let pattern = format!("%{}%", term);
        if client == "postgres" {
            Condition::ilike(column, &pattern)
        } else {
            Condition::like(column, &pattern)
        }
    };

    if let Some(term) = request.search_term() {
        let mut any = Vec::new();
        for (index, requested) in request.columns.iter().enumerate() {
            if requested.searchable {
                any.push(like(&column(request, index, fields, pkey)?, term));
            }
        }
        query = query.where_any(any);
    }

    for (index, requested) in request.columns.iter().enumerate() {
        let term = requested.search_value();
        if requested.searchable && !term.is_empty() {
            query = query.where_condition(like(&column(request, index, fields, pkey)?, term));
        }
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> Request {
        Request::from_value(value).unwrap()
    }

    fn fields() -> Vec<Field> {
        vec![Field::new("users.name"), Field::with_name("users.city", "city")]
    }

    #[test]
    fn test_engaged_only_with_draw() {
        assert!(!engaged(&request(json!({}))));
        assert!(engaged(&request(json!({"draw": 1}))));
    }

    #[test]
    fn test_column_resolution() {
        let req = request(json!({"draw": 1, "columns": [{"data": "DT_RowId"}, {"data": "city"}, {"data": "nope"}]}));
        let pkey = PrimaryKey::new(&["users.id"]);
        assert_eq!(column(&req, 0, &fields(), &pkey).unwrap(), "users.id");
        assert_eq!(column(&req, 1, &fields(), &pkey).unwrap(), "users.city");
        assert!(matches!(column(&req, 2, &fields(), &pkey), Err(EditorError::Protocol(_))));
        assert!(column(&req, 9, &fields(), &pkey).is_err());
    }

    #[test]
    fn test_paginate_skips_show_all() {
        let req = request(json!({"draw": 1, "start": 20, "length": 10}));
        let query = paginate(QueryBuilder::table("users"), &req);
        assert_eq!(query.limit_count(), Some(10));
        assert_eq!(query.offset_value(), Some(20));

        let req = request(json!({"draw": 1, "start": 20, "length": -1}));
        let query = paginate(QueryBuilder::table("users"), &req);
        assert_eq!(query.limit_count(), None);
    }

    #[test]
    fn test_filter_sql_shape() {
        let req = request(json!({
            "draw": 1,
            "columns": [
                {"data": "users.name", "searchable": true, "search": {"value": ""}},
                {"data": "city", "searchable": true, "search": {"value": "Lon"}}
            ],
            "search": {"value": "an"}
        }));
        let pkey = PrimaryKey::default();

        let query = filter(QueryBuilder::table("users"), &req, &fields(), &pkey, "memory").unwrap();
        assert_eq!(
            query.to_sql(),
            "SELECT * FROM users WHERE (users.name LIKE '%an%' OR users.city LIKE '%an%') AND users.city LIKE '%Lon%'"
        );

        let query = filter(QueryBuilder::table("users"), &req, &fields(), &pkey, "postgres").unwrap();
        assert!(query.to_sql().contains("CAST(users.name AS TEXT) ILIKE '%an%'"));
    }

    #[test]
    fn test_order_maps_columns() {
        let req = request(json!({
            "draw": 1,
            "columns": [{"data": "users.name"}, {"data": "city"}],
            "order": [{"column": 1, "dir": "desc"}, {"column": 0, "dir": "asc"}]
        }));
        let query = order(QueryBuilder::table("users"), &req, &fields(), &PrimaryKey::default()).unwrap();
        assert_eq!(
            query.ordering(),
            &[
                ("users.city".to_string(), OrderDirection::Desc),
                ("users.name".to_string(), OrderDirection::Asc)
            ]
        );
    }
}

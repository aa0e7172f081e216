//! Primary-key codec
//!
//! Rows are addressed on the wire by a single opaque id. Compound keys are
//! joined with a separator derived from the key's column names (hex CRC-32
//! of the comma-joined list), so the same schema always produces the same
//! separator and literal key values need no escaping.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::{EditorError, EditorResult};
use crate::path::{self, Path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    columns: Vec<String>,
}

impl Default for PrimaryKey {
    fn default() -> Self {
        Self {
            columns: vec!["id".to_string()],
        }
    }
}

impl PrimaryKey {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn first(&self) -> &str {
        self.columns.first().map(String::as_str).unwrap_or("id")
    }

    pub fn is_compound(&self) -> bool {
        self.columns.len() > 1
    }

    /// Qualify every bare column with `table`
    pub fn qualified(&self, table: &str) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|c| {
                    if c.contains('.') {
                        c.clone()
                    } else {
                        format!("{}.{}", table, c)
                    }
                })
                .collect(),
        }
    }

    pub fn separator(&self) -> String {
        separator_for(&self.columns)
    }

    /// Compose the id of `row`. Flat rows are keyed by column name; nested
    /// rows are read through dotted paths.
    pub fn compose(&self, row: &Value, flat: bool) -> EditorResult<String> {
        self.compose_with(|column| {
            if flat {
                row.as_object().and_then(|r| r.get(column))
            } else {
                path::read(row, column)
            }
        })
    }

    pub fn compose_with<'v, F>(&self, lookup: F) -> EditorResult<String>
    where
        F: Fn(&str) -> Option<&'v Value>,
    {
        let mut parts = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            match lookup(column) {
                None | Some(Value::Null) => {
                    return Err(EditorError::config(format!(
                        "Primary key element `{}` is not available in the data set",
                        column
                    )))
                }
                Some(value) => parts.push(key_text(value)?),
            }
        }
        Ok(parts.join(&self.separator()))
    }

    /// Split an id back into its column values. `columns` overrides this
    /// key's own column list, for ids composed by another editor.
    pub fn decompose(
        &self,
        id: &str,
        prefix: &str,
        flat: bool,
        columns: Option<&[String]>,
    ) -> EditorResult<Map<String, Value>> {
        let columns = columns.unwrap_or(&self.columns);
        let id = id.strip_prefix(prefix).unwrap_or(id);

        let parts: Vec<&str> = if columns.len() > 1 {
            id.split(separator_for(columns).as_str()).collect()
        } else {
            vec![id]
        };

        if parts.len() != columns.len() {
            return Err(EditorError::Protocol(
                "Primary key data doesn't match submitted data".to_string(),
            ));
        }

        let mut out = Map::new();
        for (column, part) in columns.iter().zip(parts) {
            let value = Value::String(part.to_string());
            if flat {
                out.insert(column.clone(), value);
            } else {
                Path::parse(column).set(&mut out, value)?;
            }
        }
        Ok(out)
    }
}

fn separator_for(columns: &[String]) -> String {
    format!("{:x}", crc32fast::hash(columns.join(",").as_bytes()))
}

/// Canonical text of one key part. Timestamps normalise to UTC.
pub fn key_text(value: &Value) -> EditorResult<String> {
    match value {
        Value::String(s) => Ok(match DateTime::parse_from_rfc3339(s) {
            Ok(ts) => ts
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            Err(_) => s.clone(),
        }),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(EditorError::config(format!(
            "Primary key values must be scalars, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_column_round_trip() {
        let pkey = PrimaryKey::default();
        let id = pkey.compose(&json!({"id": 42, "name": "x"}), true).unwrap();
        assert_eq!(id, "42");

        let row = pkey.decompose(&format!("row_{}", id), "row_", true, None).unwrap();
        assert_eq!(Value::Object(row), json!({"id": "42"}));
    }

    #[test]
    fn test_compound_round_trip() {
        let pkey = PrimaryKey::new(&["site", "code"]);
        let row = json!({"site": "edi", "code": 7, "extra": true});
        let id = pkey.compose(&row, true).unwrap();
        assert_eq!(id, format!("edi{}7", pkey.separator()));

        let back = pkey.decompose(&id, "row_", true, None).unwrap();
        assert_eq!(Value::Object(back), json!({"site": "edi", "code": "7"}));
    }

    #[test]
    fn test_nested_compose_and_decompose() {
        let pkey = PrimaryKey::new(&["users.id", "users.site"]);
        let row = json!({"users": {"id": 1, "site": 2}});
        let id = pkey.compose(&row, false).unwrap();

        let back = pkey.decompose(&id, "row_", false, None).unwrap();
        assert_eq!(Value::Object(back), json!({"users": {"id": "1", "site": "2"}}));
    }

    #[test]
    fn test_separator_depends_on_column_order() {
        let ab = PrimaryKey::new(&["a", "b"]);
        let ba = PrimaryKey::new(&["b", "a"]);
        assert_eq!(ab.separator(), PrimaryKey::new(&["a", "b"]).separator());
        assert_ne!(ab.separator(), ba.separator());
        assert_eq!(ab.separator(), format!("{:x}", crc32fast::hash(b"a,b")));
    }

    #[test]
    fn test_missing_or_null_part_is_fatal() {
        let pkey = PrimaryKey::new(&["a", "b"]);
        let err = pkey.compose(&json!({"a": 1, "b": null}), true).unwrap_err();
        assert!(err.is_configuration());
        assert!(pkey.compose(&json!({"a": 1}), true).is_err());
    }

    #[test]
    fn test_part_count_mismatch() {
        let pkey = PrimaryKey::new(&["a", "b"]);
        assert!(matches!(
            pkey.decompose("row_1", "row_", true, None),
            Err(EditorError::Protocol(_))
        ));
    }

    #[test]
    fn test_override_columns_use_their_own_separator() {
        let host = PrimaryKey::default();
        let other = vec!["x".to_string(), "y".to_string()];
        let foreign = PrimaryKey::new(&other);
        let id = foreign.compose(&json!({"x": 1, "y": 2}), true).unwrap();

        let back = host.decompose(&id, "row_", true, Some(&other)).unwrap();
        assert_eq!(Value::Object(back), json!({"x": "1", "y": "2"}));
    }

    #[test]
    fn test_timestamps_normalise_to_utc() {
        let pkey = PrimaryKey::new(&["day", "id"]);
        let id = pkey
            .compose(&json!({"day": "2024-03-01T12:00:00+02:00", "id": 1}), true)
            .unwrap();
        assert!(id.starts_with("2024-03-01T10:00:00.000Z"));
    }

    #[test]
    fn test_qualified_keeps_existing_tables() {
        let pkey = PrimaryKey::new(&["id", "other.code"]).qualified("users");
        assert_eq!(pkey.columns(), &["users.id".to_string(), "other.code".to_string()]);
    }
}

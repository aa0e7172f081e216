//! Wire request
//!
//! Clients send numbers and flags either as JSON scalars or as their form
//! encoded string forms, so the SSP parameters decode leniently.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{EditorError, EditorResult};

/// The action a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Edit,
    Delete,
    Upload,
}

impl Action {
    /// Absent action means read
    pub fn parse(action: Option<&str>) -> EditorResult<Self> {
        match action.map(str::trim) {
            None | Some("") | Some("read") => Ok(Action::Read),
            Some("create") => Ok(Action::Create),
            Some("edit") => Ok(Action::Edit),
            Some("remove") | Some("delete") => Ok(Action::Delete),
            Some("upload") => Ok(Action::Upload),
            Some(other) => Err(EditorError::UnknownAction(other.to_string())),
        }
    }

    /// Create, edit and delete carry row data
    pub fn needs_data(&self) -> bool {
        matches!(self, Action::Create | Action::Edit | Action::Delete)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "remove",
            Action::Upload => "upload",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub action: Option<String>,
    /// Row id (or create placeholder) to submitted record
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub draw: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub start: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub length: Option<i64>,
    #[serde(default)]
    pub order: Vec<OrderRequest>,
    #[serde(default)]
    pub columns: Vec<ColumnRequest>,
    #[serde(default)]
    pub search: Option<SearchRequest>,
    #[serde(default)]
    pub upload_field: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderRequest {
    #[serde(deserialize_with = "lenient_usize")]
    pub column: usize,
    #[serde(default)]
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnRequest {
    #[serde(default)]
    pub data: Value,
    #[serde(default = "searchable_default", deserialize_with = "lenient_bool")]
    pub searchable: bool,
    #[serde(default)]
    pub search: Option<SearchRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
}

fn searchable_default() -> bool {
    true
}

impl Request {
    pub fn from_value(value: Value) -> EditorResult<Self> {
        serde_json::from_value(value).map_err(|e| EditorError::Protocol(e.to_string()))
    }

    pub fn action(&self) -> EditorResult<Action> {
        Action::parse(self.action.as_deref())
    }

    pub fn read() -> Self {
        Self::default()
    }

    /// Global search term, if one was sent
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_ref()
            .map(|s| s.value.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Submitted rows, in request order
    pub fn rows(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter().flat_map(|data| data.iter())
    }

    pub fn has_rows(&self) -> bool {
        self.data.as_ref().map_or(false, |d| !d.is_empty())
    }
}

impl ColumnRequest {
    /// Column name as sent in `data`; objects carry it under `_`
    pub fn name(&self) -> Option<&str> {
        match &self.data {
            Value::String(s) => Some(s),
            Value::Object(map) => map.get("_").and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn search_value(&self) -> &str {
        self.search.as_ref().map(|s| s.value.as_str()).unwrap_or("")
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid integer {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid integer '{}'", s))),
        Some(other) => Err(de::Error::custom(format!("invalid integer {}", other))),
    }
}

fn lenient_usize<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match lenient_i64(deserializer)? {
        Some(n) if n >= 0 => Ok(n as usize),
        Some(n) => Err(de::Error::custom(format!("invalid column index {}", n))),
        None => Err(de::Error::custom("missing column index")),
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(searchable_default()),
        Value::Number(n) => Ok(n.as_f64().map_or(false, |f| f != 0.0)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            _ => Err(de::Error::custom(format!("invalid boolean '{}'", s))),
        },
        other => Err(de::Error::custom(format!("invalid boolean {}", other))),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_parsing() {
        assert_eq!(Action::parse(None).unwrap(), Action::Read);
        assert_eq!(Action::parse(Some("create")).unwrap(), Action::Create);
        assert_eq!(Action::parse(Some("remove")).unwrap(), Action::Delete);
        assert_eq!(Action::parse(Some("delete")).unwrap(), Action::Delete);
        assert!(matches!(
            Action::parse(Some("truncate")),
            Err(EditorError::UnknownAction(a)) if a == "truncate"
        ));
    }

    #[test]
    fn test_lenient_ssp_parameters() {
        let request = Request::from_value(json!({
            "draw": "3",
            "start": 10,
            "length": "-1",
            "order": [{"column": "1", "dir": "desc"}],
            "columns": [
                {"data": "name", "searchable": "true", "search": {"value": "ann"}},
                {"data": "DT_RowId", "searchable": false}
            ],
            "search": {"value": "x"}
        }))
        .unwrap();

        assert_eq!(request.draw, Some(3));
        assert_eq!(request.start, Some(10));
        assert_eq!(request.length, Some(-1));
        assert_eq!(request.order[0].column, 1);
        assert!(request.columns[0].searchable);
        assert!(!request.columns[1].searchable);
        assert_eq!(request.columns[0].search_value(), "ann");
        assert_eq!(request.search_term(), Some("x"));
        assert_eq!(request.action().unwrap(), Action::Read);
    }

    #[test]
    fn test_rows_keep_request_order() {
        let request = Request::from_value(json!({
            "action": "remove",
            "data": {"row_3": {}, "row_1": {}, "row_2": {}}
        }))
        .unwrap();
        let keys: Vec<&str> = request.rows().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["row_3", "row_1", "row_2"]);
        assert!(request.has_rows());
    }

    #[test]
    fn test_malformed_request_is_protocol_error() {
        let err = Request::from_value(json!({"draw": "abc"})).unwrap_err();
        assert!(matches!(err, EditorError::Protocol(_)));
    }
}

//! Wire response

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadResult {
    pub id: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub data: Vec<Value>,
    pub cancelled: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub field_errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub files: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draw: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_filtered: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Vec<String>>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// No error and no field errors
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.field_errors.is_empty()
    }

    pub fn field_error(&mut self, name: impl Into<String>, status: impl Into<String>) {
        self.field_errors.push(FieldError {
            name: name.into(),
            status: status.into(),
        });
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_response_shape() {
        assert_eq!(
            Response::new().to_value(),
            json!({"data": [], "cancelled": [], "fieldErrors": []})
        );
    }

    #[test]
    fn test_ssp_counters_are_camel_case() {
        let response = Response {
            draw: Some(2),
            records_total: Some(10),
            records_filtered: Some(3),
            ..Response::default()
        };
        let value = response.to_value();
        assert_eq!(value["recordsTotal"], json!(10));
        assert_eq!(value["recordsFiltered"], json!(3));
        assert_eq!(value["draw"], json!(2));
    }

    #[test]
    fn test_field_errors_block_success() {
        let mut response = Response::new();
        assert!(response.is_success());
        response.field_error("name", "Required");
        assert!(!response.is_success());
        assert_eq!(response.to_value()["fieldErrors"], json!([{"name": "name", "status": "Required"}]));
    }
}

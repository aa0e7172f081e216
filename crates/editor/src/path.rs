//! Dotted-path access over JSON records
//!
//! Wire names such as `"site.name"` address nested objects. A [`Path`] is
//! the parsed, ordered segment list; reads and existence checks never fail,
//! writes refuse to overwrite anything already present.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error(
        "A property with the name `{0}` already exists. This can occur if you have \
         properties which share a prefix - for example `name` and `name.first`"
    )]
    Occupied(String),

    #[error("Cannot write `{0}`: a parent segment holds a scalar value")]
    ScalarPrefix(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    pub fn parse(dotted: &str) -> Self {
        Self {
            segments: dotted.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn get<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        let mut current = record;
        for segment in &self.segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Present in the record, even if the value is `null`
    pub fn exists(&self, record: &Value) -> bool {
        self.get(record).is_some()
    }

    /// Write `value` at this path, creating intermediate objects
    pub fn set(&self, record: &mut Map<String, Value>, value: Value) -> Result<(), PathError> {
        let (last, parents) = match self.segments.split_last() {
            Some(split) => split,
            None => return Ok(()),
        };

        let mut current = record;
        for segment in parents {
            let slot = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match slot {
                Value::Object(map) => map,
                _ => return Err(PathError::ScalarPrefix(self.to_string())),
            };
        }

        if current.contains_key(last) {
            return Err(PathError::Occupied(self.to_string()));
        }
        current.insert(last.clone(), value);
        Ok(())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Read a dotted name from a record
pub fn read<'a>(record: &'a Value, dotted: &str) -> Option<&'a Value> {
    Path::parse(dotted).get(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_and_exists() {
        let record = json!({"site": {"name": "Edinburgh", "code": null}, "id": 1});
        assert_eq!(read(&record, "site.name"), Some(&json!("Edinburgh")));
        assert!(Path::parse("site.code").exists(&record));
        assert!(!Path::parse("site.missing").exists(&record));
        assert!(!Path::parse("id.nested").exists(&record));
    }

    #[test]
    fn test_set_creates_nested_objects() {
        let mut out = Map::new();
        Path::parse("site.name").set(&mut out, json!("London")).unwrap();
        Path::parse("site.id").set(&mut out, json!(2)).unwrap();
        assert_eq!(Value::Object(out), json!({"site": {"name": "London", "id": 2}}));
    }

    #[test]
    fn test_set_refuses_overwrite() {
        let mut out = Map::new();
        Path::parse("name").set(&mut out, json!("a")).unwrap();
        assert_eq!(
            Path::parse("name").set(&mut out, json!("b")),
            Err(PathError::Occupied("name".to_string()))
        );
    }

    #[test]
    fn test_set_under_scalar_is_an_error() {
        let mut out = Map::new();
        Path::parse("name").set(&mut out, json!("a")).unwrap();
        assert_eq!(
            Path::parse("name.first").set(&mut out, json!("b")),
            Err(PathError::ScalarPrefix("name.first".to_string()))
        );
    }
}

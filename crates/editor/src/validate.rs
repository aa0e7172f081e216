//! Validator traits
//!
//! Validators return `None` when the value is acceptable and an error
//! message otherwise. Plain closures implement each trait.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tabula_query::Executor;

use crate::request::Action;

/// What a field validator knows about the request it runs in
pub struct ValidationHost<'a> {
    pub action: Action,
    /// Unprefixed row id; `None` on create
    pub id: Option<&'a str>,
    /// Wire name of the field being validated
    pub field: &'a str,
    pub executor: &'a dyn Executor,
}

/// Validates one field value
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, value: &Value, data: &Value, host: &ValidationHost<'_>) -> Option<String>;
}

#[async_trait]
impl<F> Validator for F
where
    F: Fn(&Value, &Value) -> Option<String> + Send + Sync,
{
    async fn validate(&self, value: &Value, data: &Value, _host: &ValidationHost<'_>) -> Option<String> {
        self(value, data)
    }
}

/// Validates a whole request before dispatch
#[async_trait]
pub trait GlobalValidator: Send + Sync {
    async fn validate(
        &self,
        action: Action,
        data: &Map<String, Value>,
        executor: &dyn Executor,
    ) -> Option<String>;
}

#[async_trait]
impl<F> GlobalValidator for F
where
    F: Fn(Action, &Map<String, Value>) -> Option<String> + Send + Sync,
{
    async fn validate(
        &self,
        action: Action,
        data: &Map<String, Value>,
        _executor: &dyn Executor,
    ) -> Option<String> {
        self(action, data)
    }
}

/// Validates the full submitted array of a many-join
#[async_trait]
pub trait DatasetValidator: Send + Sync {
    async fn validate(&self, action: Action, rows: &[Value]) -> Option<String>;
}

#[async_trait]
impl<F> DatasetValidator for F
where
    F: Fn(Action, &[Value]) -> Option<String> + Send + Sync,
{
    async fn validate(&self, action: Action, rows: &[Value]) -> Option<String> {
        self(action, rows)
    }
}

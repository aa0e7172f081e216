//! Option lists for selection widgets

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tabula_query::Executor;

use crate::error::EditorResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionItem {
    pub label: String,
    pub value: Value,
}

impl OptionItem {
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Produces the options of one field. `None` means the field has no list.
#[async_trait]
pub trait OptionsSource: Send + Sync {
    async fn exec(&self, executor: &dyn Executor) -> EditorResult<Option<Vec<OptionItem>>>;
}

#[async_trait]
impl OptionsSource for Vec<OptionItem> {
    async fn exec(&self, _executor: &dyn Executor) -> EditorResult<Option<Vec<OptionItem>>> {
        Ok(Some(self.clone()))
    }
}

//! Field descriptor and value pipeline
//!
//! A [`Field`] maps one wire name onto one database column (or SQL
//! expression). It decides whether it takes part in an action, reads its
//! value for output or storage, runs its validators and writes itself into
//! an output record.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::options::{OptionItem, OptionsSource};
use crate::path::{self, Path, PathError};
use crate::request::Action;
use crate::upload::Upload;
use crate::validate::{ValidationHost, Validator};

/// Which write actions may set the field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    None,
    Both,
    CreateOnly,
    EditOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Get,
    Set,
}

/// Formatter: `(value, whole record) -> value`
pub type Formatter = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// A value that replaces what the row or request holds
#[derive(Clone)]
pub enum FieldValue {
    Static(Value),
    Computed(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl FieldValue {
    pub fn resolve(&self) -> Value {
        match self {
            FieldValue::Static(value) => value.clone(),
            FieldValue::Computed(f) => f(),
        }
    }
}

#[derive(Clone)]
pub struct Field {
    name: String,
    db_field: String,
    get: bool,
    set: SetMode,
    get_value: Option<FieldValue>,
    set_value: Option<FieldValue>,
    get_formatter: Option<Formatter>,
    set_formatter: Option<Formatter>,
    validators: Vec<Arc<dyn Validator>>,
    options: Option<Arc<dyn OptionsSource>>,
    upload: Option<Arc<dyn Upload>>,
}

impl Field {
    /// A field whose wire name equals its db column
    pub fn new(db_field: &str) -> Self {
        Self::with_name(db_field, db_field)
    }

    pub fn with_name(db_field: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            db_field: db_field.to_string(),
            get: true,
            set: SetMode::Both,
            get_value: None,
            set_value: None,
            get_formatter: None,
            set_formatter: None,
            validators: Vec::new(),
            options: None,
            upload: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn db_field(&self) -> &str {
        &self.db_field
    }

    pub fn set_mode(&self) -> SetMode {
        self.set
    }

    pub fn is_gettable(&self) -> bool {
        self.get
    }

    /// Read from the row (not from an override)
    pub fn reads_column(&self) -> bool {
        self.get && self.get_value.is_none()
    }

    /// SQL expressions are projected raw
    pub fn is_expression(&self) -> bool {
        self.db_field.contains('(')
    }

    /// Table (or alias) part of a qualified db column
    pub fn table_part(&self) -> Option<&str> {
        if self.is_expression() {
            return None;
        }
        self.db_field.rsplit_once('.').map(|(table, _)| table)
    }

    /// Column part of the db column
    pub fn column_part(&self) -> &str {
        if self.is_expression() {
            return &self.db_field;
        }
        self.db_field
            .rsplit_once('.')
            .map_or(self.db_field.as_str(), |(_, column)| column)
    }

    pub fn upload_binding(&self) -> Option<&Arc<dyn Upload>> {
        self.upload.as_ref()
    }

    pub fn get(mut self, enabled: bool) -> Self {
        self.get = enabled;
        self
    }

    pub fn set(mut self, mode: SetMode) -> Self {
        self.set = mode;
        self
    }

    pub fn get_value(mut self, value: impl Into<Value>) -> Self {
        self.get_value = Some(FieldValue::Static(value.into()));
        self
    }

    pub fn get_value_with<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.get_value = Some(FieldValue::Computed(Arc::new(f)));
        self
    }

    pub fn set_value(mut self, value: impl Into<Value>) -> Self {
        self.set_value = Some(FieldValue::Static(value.into()));
        self
    }

    pub fn set_value_with<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.set_value = Some(FieldValue::Computed(Arc::new(f)));
        self
    }

    pub fn get_formatter<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    {
        self.get_formatter = Some(Arc::new(f));
        self
    }

    pub fn set_formatter<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    {
        self.set_formatter = Some(Arc::new(f));
        self
    }

    pub fn validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn options<O: OptionsSource + 'static>(mut self, source: O) -> Self {
        self.options = Some(Arc::new(source));
        self
    }

    pub fn upload<U: Upload + 'static>(mut self, upload: U) -> Self {
        self.upload = Some(Arc::new(upload));
        self
    }

    /// Whether the field takes part in `action` for the submitted `data`
    pub fn apply(&self, action: Action, data: &Value) -> bool {
        match action {
            Action::Read => self.get,
            Action::Create | Action::Edit => {
                let allowed = match self.set {
                    SetMode::None => false,
                    SetMode::Both => true,
                    SetMode::CreateOnly => action == Action::Create,
                    SetMode::EditOnly => action == Action::Edit,
                };
                allowed && (self.set_value.is_some() || Path::parse(&self.name).exists(data))
            }
            Action::Delete | Action::Upload => false,
        }
    }

    /// Value for output (`Get`, from a flat db row) or storage (`Set`,
    /// from a submitted record), after formatting
    pub fn val(&self, direction: Direction, record: &Value) -> Value {
        match direction {
            Direction::Get => {
                let value = match &self.get_value {
                    Some(value) => value.resolve(),
                    None => record
                        .as_object()
                        .and_then(|row| row.get(&self.db_field))
                        .cloned()
                        .unwrap_or(Value::Null),
                };
                match &self.get_formatter {
                    Some(format) => format(&value, record),
                    None => value,
                }
            }
            Direction::Set => {
                let value = match &self.set_value {
                    Some(value) => value.resolve(),
                    None => path::read(record, &self.name).cloned().unwrap_or(Value::Null),
                };
                match &self.set_formatter {
                    Some(format) => format(&value, record),
                    None => value,
                }
            }
        }
    }

    /// Write the output value into `out` at the wire path
    pub fn write(&self, out: &mut Map<String, Value>, row: &Value) -> Result<(), PathError> {
        Path::parse(&self.name).set(out, self.val(Direction::Get, row))
    }

    /// Run validators in order; the first failure is returned and the rest
    /// are skipped
    pub async fn validate(&self, data: &Value, host: &ValidationHost<'_>) -> Option<String> {
        if self.validators.is_empty() {
            return None;
        }
        let value = path::read(data, &self.name).cloned().unwrap_or(Value::Null);
        for validator in &self.validators {
            if let Some(message) = validator.validate(&value, data, host).await {
                return Some(message);
            }
        }
        None
    }

    pub(crate) async fn options_exec(
        &self,
        executor: &dyn tabula_query::Executor,
    ) -> crate::error::EditorResult<Option<Vec<OptionItem>>> {
        match &self.options {
            Some(source) => source.exec(executor).await,
            None => Ok(None),
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("db_field", &self.db_field)
            .field("get", &self.get)
            .field("set", &self.set)
            .field("validators", &self.validators.len())
            .field("options", &self.options.is_some())
            .field("upload", &self.upload.is_some())
            .finish()
    }
}

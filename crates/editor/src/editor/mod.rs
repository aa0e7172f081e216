//! The request processor
//!
//! An [`Editor`] is built once with its tables, fields and joins, then
//! handles any number of requests through [`Editor::process`]. Nothing in
//! the editor changes while a request runs; per-request state lives in a
//! [`Context`].

mod process;
mod read;
mod remove;
mod upload;
mod write;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tabula_query::{Condition, QueryBuilder, TableName};

use crate::config::EditorConfig;
use crate::context::{Context, Recorder};
use crate::error::{EditorError, EditorResult};
use crate::field::Field;
use crate::hooks::{Hook, HookPoint, Hooks};
use crate::join::{LeftJoin, ManyJoin};
use crate::pkey::PrimaryKey;
use crate::request::Action;
use crate::validate::GlobalValidator;

pub use read::ReadResult;

#[derive(Clone)]
pub struct Editor {
    tables: Vec<String>,
    read_table: Option<String>,
    pkey: PrimaryKey,
    fields: Vec<Field>,
    left_joins: Vec<LeftJoin>,
    many_joins: Vec<ManyJoin>,
    conditions: Vec<Condition>,
    validators: Vec<Arc<dyn GlobalValidator>>,
    hooks: Hooks,
    config: EditorConfig,
}

impl Editor {
    /// Editor over `table` (`"name"` or `"name as alias"`)
    pub fn new(table: &str) -> Self {
        Self {
            tables: vec![table.to_string()],
            read_table: None,
            pkey: PrimaryKey::default(),
            fields: Vec::new(),
            left_joins: Vec::new(),
            many_joins: Vec::new(),
            conditions: Vec::new(),
            validators: Vec::new(),
            hooks: Hooks::new(),
            config: EditorConfig::default(),
        }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn primary_key(&self) -> &PrimaryKey {
        &self.pkey
    }

    pub fn configuration(&self) -> &EditorConfig {
        &self.config
    }

    /// Add another write table
    pub fn table(mut self, table: &str) -> Self {
        self.tables.push(table.to_string());
        self
    }

    /// Read from this table or view instead of the first write table
    pub fn read_table(mut self, table: &str) -> Self {
        self.read_table = Some(table.to_string());
        self
    }

    pub fn pkey<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.pkey = PrimaryKey::new(columns);
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields_from<I: IntoIterator<Item = Field>>(mut self, fields: I) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn left_join(mut self, table: &str, field1: &str, operator: &str, field2: &str) -> Self {
        self.left_joins.push(LeftJoin::new(table, field1, operator, field2));
        self
    }

    pub fn many_join(mut self, join: ManyJoin) -> Self {
        self.many_joins.push(join);
        self
    }

    /// Restrict every read to rows matching `condition`
    pub fn where_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_condition(Condition::eq(column, value))
    }

    pub fn validator<V: GlobalValidator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn on<H: Hook + 'static>(mut self, point: HookPoint, hook: H) -> Self {
        self.hooks.on(point, Arc::new(hook));
        self
    }

    pub fn config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    fn host_table(&self) -> &str {
        self.tables.first().map(String::as_str).unwrap_or_default()
    }

    fn source_table(&self) -> &str {
        self.read_table.as_deref().unwrap_or_else(|| self.host_table())
    }

    fn apply_where(&self, mut query: QueryBuilder) -> QueryBuilder {
        for condition in &self.conditions {
            query = query.where_condition(condition.clone());
        }
        query
    }

    /// Resolve request-time configuration. With left joins every field must
    /// name its table and the primary key is qualified with the host table.
    fn context<'a>(&'a self, recorder: &'a Recorder<'a>, action: Action) -> EditorResult<Context<'a>> {
        let host = TableName::parse(self.host_table());

        let pkey = if self.left_joins.is_empty() {
            self.pkey.clone()
        } else {
            if let Some(field) = self
                .fields
                .iter()
                .find(|f| !f.is_expression() && f.table_part().is_none())
            {
                return Err(EditorError::config(format!(
                    "Table part of the field `{}` was not found. With left joins, every field \
                     must name its database table explicitly.",
                    field.db_field()
                )));
            }
            self.pkey.qualified(host.reference())
        };

        Ok(Context {
            recorder,
            action,
            host,
            pkey,
            id_prefix: &self.config.id_prefix,
            fields: &self.fields,
        })
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("tables", &self.tables)
            .field("read_table", &self.read_table)
            .field("pkey", &self.pkey)
            .field("fields", &self.fields)
            .field("left_joins", &self.left_joins)
            .field("many_joins", &self.many_joins)
            .field("conditions", &self.conditions)
            .field("validators", &self.validators.len())
            .field("hooks", &self.hooks)
            .field("config", &self.config)
            .finish()
    }
}

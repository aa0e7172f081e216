//! One-to-many and many-to-many joins
//!
//! A [`ManyJoin`] materialises the rows of another table as an array
//! property on every host row. Links are declared with one or two
//! [`ManyJoin::link`] calls:
//!
//! - one call (two endpoints) joins the target table directly on a foreign
//!   key pointing at the host;
//! - two calls (four endpoints over three tables) go through a link table.
//!
//! Reading is batched into a single query for all host rows. Writing is
//! destructive: an update removes every existing child link and recreates
//! the submitted set.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tabula_query::{Condition, OrderDirection, QueryBuilder, QueryError, TableName};
use tracing::debug;

use crate::context::Context;
use crate::error::{EditorError, EditorResult};
use crate::field::{Direction, Field};
use crate::join::left::{column_of, table_of};
use crate::path;
use crate::pkey::key_text;
use crate::request::Action;
use crate::response::FieldError;
use crate::validate::{DatasetValidator, ValidationHost};

/// Parent ids above this count are not pushed into the child query
pub(crate) const ID_LIMIT: usize = 1000;

const PKEY_ALIAS: &str = "dteditor_pkey";

#[derive(Clone)]
pub struct ManyJoin {
    name: String,
    table: String,
    links: Vec<(String, String)>,
    get: bool,
    set: bool,
    fields: Vec<Field>,
    conditions: Vec<Condition>,
    order: Vec<(String, OrderDirection)>,
    validators: Vec<(String, Arc<dyn DatasetValidator>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkTable {
    table: String,
    to_host: String,
    to_child: String,
}

/// Columns resolved from the declared links for one request
#[derive(Debug, Clone, PartialEq, Eq)]
struct Topology {
    host_field: String,
    child_field: String,
    link: Option<LinkTable>,
}

impl ManyJoin {
    pub fn new(table: &str) -> Self {
        let name = TableName::parse(table).name;
        Self {
            name,
            table: table.to_string(),
            links: Vec::new(),
            get: true,
            set: true,
            fields: Vec::new(),
            conditions: Vec::new(),
            order: Vec::new(),
            validators: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn link(mut self, field1: &str, field2: &str) -> Self {
        self.links.push((field1.to_string(), field2.to_string()));
        self
    }

    pub fn get(mut self, enabled: bool) -> Self {
        self.get = enabled;
        self
    }

    pub fn set(mut self, enabled: bool) -> Self {
        self.set = enabled;
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn where_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Comma separated `column [asc|desc]` list
    pub fn order(mut self, order: &str) -> Self {
        for part in order.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let mut words = part.split_whitespace();
            if let Some(column) = words.next() {
                let direction = OrderDirection::parse(words.next().unwrap_or("asc"));
                self.order.push((column.to_string(), direction));
            }
        }
        self
    }

    /// Validate the whole submitted array; failures are reported under
    /// `field_name`
    pub fn validator<V: DatasetValidator + 'static>(mut self, field_name: &str, validator: V) -> Self {
        self.validators.push((field_name.to_string(), Arc::new(validator)));
        self
    }

    /// Field addressed on the wire as `<name>[].<field>`
    pub fn find_field(&self, wire_name: &str) -> Option<&Field> {
        let rest = wire_name.strip_prefix(&self.name)?.strip_prefix("[].")?;
        self.fields.iter().find(|f| f.name() == rest)
    }

    fn count_key(&self) -> String {
        format!("{}-many-count", self.name)
    }

    fn prepare(&self, host: &TableName) -> EditorResult<Topology> {
        let target = TableName::parse(&self.table);
        let is_host = |t: &str| t == host.name || Some(t) == host.alias.as_deref();
        let is_target = |t: &str| t == target.name || Some(t) == target.alias.as_deref();

        let mut endpoints = Vec::with_capacity(self.links.len() * 2);
        for (a, b) in &self.links {
            for endpoint in [a, b] {
                let table = table_of(endpoint).ok_or_else(|| {
                    EditorError::config(format!(
                        "Many join `{}`: link `{}` must be table qualified",
                        self.name, endpoint
                    ))
                })?;
                endpoints.push((table, column_of(endpoint)));
            }
        }

        match endpoints.as_slice() {
            [(t1, c1), (t2, c2)] => {
                let (t1, c1, t2, c2) = (*t1, *c1, *t2, *c2);
                let (host_field, child_field) = if is_host(t1) && is_target(t2) {
                    (c1, c2)
                } else if is_host(t2) && is_target(t1) {
                    (c2, c1)
                } else {
                    return Err(EditorError::config(format!(
                        "Many join `{}` must link `{}` and `{}`",
                        self.name, host.name, target.name
                    )));
                };
                Ok(Topology {
                    host_field: host_field.to_string(),
                    child_field: child_field.to_string(),
                    link: None,
                })
            }
            [_, _, _, _] => self.prepare_link_table(&endpoints, &is_host, &is_target),
            _ => Err(EditorError::config(format!(
                "Many join `{}` needs one or two link() calls (2 or 4 endpoints), got {}",
                self.name,
                endpoints.len()
            ))),
        }
    }

    fn prepare_link_table(
        &self,
        endpoints: &[(&str, &str)],
        is_host: &dyn Fn(&str) -> bool,
        is_target: &dyn Fn(&str) -> bool,
    ) -> EditorResult<Topology> {
        let mut tables: Vec<&str> = endpoints.iter().map(|(t, _)| *t).collect();
        tables.sort_unstable();
        tables.dedup();

        let link_tables: Vec<&str> = tables
            .iter()
            .copied()
            .filter(|t| !is_host(*t) && !is_target(*t))
            .collect();
        if tables.len() != 3 || link_tables.len() != 1 {
            return Err(EditorError::config(format!(
                "Many join `{}` must reference exactly three distinct tables: host, link and target",
                self.name
            )));
        }
        let link_table = link_tables[0];

        let (mut host_field, mut child_field, mut to_host, mut to_child) = (None, None, None, None);
        for pair in endpoints.chunks(2) {
            let (link_end, other) = match pair {
                [a, b] if a.0 == link_table => (a, b),
                [a, b] if b.0 == link_table => (b, a),
                _ => {
                    return Err(EditorError::config(format!(
                        "Many join `{}`: every link must reference the link table `{}`",
                        self.name, link_table
                    )))
                }
            };
            if is_host(other.0) {
                host_field = Some(other.1);
                to_host = Some(link_end.1);
            } else if is_target(other.0) {
                child_field = Some(other.1);
                to_child = Some(link_end.1);
            }
        }

        match (host_field, child_field, to_host, to_child) {
            (Some(host_field), Some(child_field), Some(to_host), Some(to_child)) => Ok(Topology {
                host_field: host_field.to_string(),
                child_field: child_field.to_string(),
                link: Some(LinkTable {
                    table: link_table.to_string(),
                    to_host: to_host.to_string(),
                    to_child: to_child.to_string(),
                }),
            }),
            _ => Err(EditorError::config(format!(
                "Many join `{}` must link the host and the target through `{}`",
                self.name, link_table
            ))),
        }
    }

    fn host_column(&self, ctx: &Context<'_>, topology: &Topology) -> String {
        format!("{}.{}", ctx.host.reference(), topology.host_field)
    }

    fn pkey_is_join(&self, ctx: &Context<'_>, topology: &Topology) -> bool {
        let first = ctx.pkey.first();
        topology.host_field == first || self.host_column(ctx, topology) == first
    }

    /// Attach the joined rows to every host row and collect option lists
    pub(crate) async fn data(
        &self,
        ctx: &Context<'_>,
        rows: &mut [Value],
        options: &mut Map<String, Value>,
    ) -> EditorResult<()> {
        if !self.get {
            return Ok(());
        }
        if ctx.pkey.is_compound() {
            return Err(EditorError::config(format!(
                "Many join `{}` is not supported with a compound primary key",
                self.name
            )));
        }

        let topology = self.prepare(&ctx.host)?;
        let host_column = self.host_column(ctx, &topology);
        let target = TableName::parse(&self.table);

        let join_field = if self.pkey_is_join(ctx, &topology) {
            None
        } else {
            let field = ctx
                .find_field_by_db(&host_column)
                .or_else(|| ctx.find_field_by_db(&topology.host_field))
                .ok_or_else(|| {
                    EditorError::config(format!(
                        "Join was performed on `{}`, which is not an editor field. The join \
                         field must be included as a regular field.",
                        host_column
                    ))
                })?;
            Some(field.name().to_string())
        };
        let link_value = |row: &Value| -> Option<String> {
            match &join_field {
                None => row
                    .get("DT_RowId")
                    .and_then(Value::as_str)
                    .map(|id| ctx.strip_prefix(id).to_string()),
                Some(name) => path::read(row, name)
                    .filter(|v| !v.is_null())
                    .and_then(|v| key_text(v).ok()),
            }
        };

        let mut query = QueryBuilder::table(&ctx.host.to_string())
            .distinct()
            .select_as(&host_column, PKEY_ALIAS);
        for field in self.fields.iter().filter(|f| f.reads_column()) {
            let db = field.db_field();
            query = if field.is_expression() {
                query.select_raw(db, db)
            } else if db.contains('.') {
                query.select_as(db, db)
            } else {
                query.select_as(&format!("{}.{}", target.reference(), db), db)
            };
        }

        query = match &topology.link {
            Some(link) => query
                .inner_join(&link.table, &host_column, &format!("{}.{}", link.table, link.to_host))
                .inner_join(
                    &self.table,
                    &format!("{}.{}", target.reference(), topology.child_field),
                    &format!("{}.{}", link.table, link.to_child),
                ),
            None => query.inner_join(
                &self.table,
                &format!("{}.{}", target.reference(), topology.child_field),
                &host_column,
            ),
        };
        for condition in &self.conditions {
            query = query.where_condition(condition.clone());
        }
        for (column, direction) in &self.order {
            query = query.order_by_dir(column, *direction);
        }
        if rows.len() < ID_LIMIT {
            let ids: Vec<Value> = rows.iter().filter_map(|r| link_value(r)).map(Value::String).collect();
            query = query.where_in(&host_column, ids);
        }

        let result = ctx.executor().fetch_all(&query).await?;
        debug!(
            "many join '{}' fetched {} rows for {} parents",
            self.name,
            result.len(),
            rows.len()
        );

        let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
        for row in result {
            let key = match row.get(PKEY_ALIAS) {
                Some(value) if !value.is_null() => key_text(value)?,
                _ => continue,
            };
            let row = Value::Object(row);
            let mut inner = Map::new();
            for field in self.fields.iter().filter(|f| f.apply(Action::Read, &row)) {
                field.write(&mut inner, &row)?;
            }
            grouped.entry(key).or_default().push(Value::Object(inner));
        }

        for row in rows.iter_mut() {
            let children = link_value(row)
                .and_then(|key| grouped.get(&key).cloned())
                .unwrap_or_default();
            if let Some(object) = row.as_object_mut() {
                object.insert(self.name.clone(), Value::Array(children));
            }
        }

        for field in &self.fields {
            if let Some(list) = field.options_exec(ctx.executor()).await? {
                let list = serde_json::to_value(list).map_err(QueryError::from)?;
                options.insert(format!("{}[].{}", self.name, field.name()), list);
            }
        }
        Ok(())
    }

    /// Value of the host join column for the row `id`
    async fn parent_values(
        &self,
        ctx: &Context<'_>,
        topology: &Topology,
        ids: &[String],
    ) -> EditorResult<Vec<Value>> {
        if self.pkey_is_join(ctx, topology) {
            return Ok(ids.iter().cloned().map(Value::String).collect());
        }

        let host_column = self.host_column(ctx, topology);
        let mut values = Vec::with_capacity(ids.len());
        for id in ids {
            let query = QueryBuilder::table(&ctx.host.to_string())
                .select_as(&host_column, PKEY_ALIAS)
                .where_map(&ctx.pkey_where(id)?);
            let rows = ctx.executor().fetch_all(&query).await?;
            if let Some(value) = rows.first().and_then(|r| r.get(PKEY_ALIAS)) {
                if !value.is_null() {
                    values.push(value.clone());
                }
            }
        }
        Ok(values)
    }

    fn child_value(&self, topology: &Topology, item: &Value) -> Value {
        self.fields
            .iter()
            .find(|f| f.column_part() == topology.child_field)
            .map(|f| f.val(Direction::Set, item))
            .or_else(|| path::read(item, &topology.child_field).cloned())
            .unwrap_or(Value::Null)
    }

    /// Insert one child (or link) row per submitted array element
    pub(crate) async fn create(&self, ctx: &Context<'_>, parent_id: &str, values: &Value) -> EditorResult<()> {
        if !self.set || values.get(self.count_key()).map_or(true, Value::is_null) {
            return Ok(());
        }
        let Some(items) = values.get(&self.name).and_then(Value::as_array) else {
            return Ok(());
        };

        let topology = self.prepare(&ctx.host)?;
        let parents = self
            .parent_values(ctx, &topology, &[parent_id.to_string()])
            .await?;
        let Some(parent) = parents.into_iter().next() else {
            return Ok(());
        };

        for item in items {
            let query = match &topology.link {
                Some(link) => QueryBuilder::insert_into(&link.table)
                    .set(&link.to_host, parent.clone())
                    .set(&link.to_child, self.child_value(&topology, item)),
                None => {
                    let mut query = QueryBuilder::insert_into(&self.table);
                    for field in self.fields.iter().filter(|f| f.apply(Action::Create, item)) {
                        query = query.set(field.column_part(), field.val(Direction::Set, item));
                    }
                    query.set(&topology.child_field, parent.clone())
                }
            };
            ctx.executor().insert(&query, &[]).await?;
        }
        debug!("many join '{}' created {} rows for {}", self.name, items.len(), parent_id);
        Ok(())
    }

    /// Remove every existing child then recreate the submitted set
    pub(crate) async fn update(&self, ctx: &Context<'_>, parent_id: &str, values: &Value) -> EditorResult<()> {
        if !self.set || values.get(self.count_key()).map_or(true, Value::is_null) {
            return Ok(());
        }
        self.remove(ctx, &[parent_id.to_string()]).await?;
        self.create(ctx, parent_id, values).await
    }

    pub(crate) async fn remove(&self, ctx: &Context<'_>, ids: &[String]) -> EditorResult<()> {
        if !self.set || ids.is_empty() {
            return Ok(());
        }
        let topology = self.prepare(&ctx.host)?;
        let parents = self.parent_values(ctx, &topology, ids).await?;
        if parents.is_empty() {
            return Ok(());
        }

        let query = match &topology.link {
            Some(link) => QueryBuilder::delete_from(&link.table).where_in(&link.to_host, parents),
            None => QueryBuilder::delete_from(&self.table).where_in(&topology.child_field, parents),
        };
        let removed = ctx.executor().execute(&query).await?;
        debug!("many join '{}' removed {} rows", self.name, removed);
        Ok(())
    }

    /// Dataset validators first, then every child through the field pipeline
    pub(crate) async fn validate(
        &self,
        ctx: &Context<'_>,
        id: Option<&str>,
        values: &Value,
        errors: &mut Vec<FieldError>,
    ) {
        if !self.set && self.validators.is_empty() {
            return;
        }
        // An empty selection arrives as a count marker with no array
        let rows: &[Value] = values
            .get(&self.name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        for (field_name, validator) in &self.validators {
            if let Some(status) = validator.validate(ctx.action, rows).await {
                errors.push(FieldError {
                    name: field_name.clone(),
                    status,
                });
            }
        }
        if !self.set {
            return;
        }

        for row in rows {
            for field in &self.fields {
                let host = ValidationHost {
                    action: ctx.action,
                    id,
                    field: field.name(),
                    executor: ctx.executor(),
                };
                if let Some(status) = field.validate(row, &host).await {
                    errors.push(FieldError {
                        name: format!("{}[].{}", self.name, field.name()),
                        status,
                    });
                }
            }
        }
    }
}

impl fmt::Debug for ManyJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManyJoin")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("links", &self.links)
            .field("get", &self.get)
            .field("set", &self.set)
            .field("fields", &self.fields)
            .finish()
    }
}

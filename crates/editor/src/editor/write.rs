use serde_json::{Map, Value};
use tabula_query::{QueryBuilder, QueryError, TableName};
use tracing::{debug, warn};

use super::Editor;
use crate::context::Context;
use crate::error::{EditorError, EditorResult};
use crate::field::Direction;
use crate::hooks::{last_non_null, HookEvent};
use crate::join::left::column_of;
use crate::pkey::key_text;
use crate::request::{Action, Request};
use crate::response::{FieldError, Response};
use crate::validate::ValidationHost;

impl Editor {
    /// Create or edit every submitted row. All rows are validated before
    /// anything is written; one failure blocks the whole batch.
    pub(super) async fn write(&self, ctx: &Context<'_>, request: &Request, out: &mut Response) -> EditorResult<()> {
        let mut rows: Vec<(&str, &Value)> = Vec::new();
        for (key, values) in request.rows() {
            let cancelled = match ctx.action {
                Action::Create => {
                    self.hooks
                        .cancelled(HookEvent::PreCreate { values }, ctx.executor())
                        .await
                }
                _ => {
                    let id = ctx.strip_prefix(key);
                    let cancelled = self
                        .hooks
                        .cancelled(HookEvent::PreEdit { id, values }, ctx.executor())
                        .await;
                    if cancelled {
                        out.cancelled.push(id.to_string());
                    }
                    cancelled
                }
            };
            if cancelled {
                warn!(action = %ctx.action, row = %key, "row cancelled by hook");
                ctx.recorder.note(format!("{} of row {} cancelled", ctx.action, key));
                continue;
            }
            rows.push((key.as_str(), values));
        }

        if !self.validate_rows(ctx, &rows, &mut out.field_errors).await {
            debug!(errors = out.field_errors.len(), "validation failed, nothing written");
            return Ok(());
        }

        for (key, values) in rows {
            let row = match ctx.action {
                Action::Create => self.insert(ctx, values).await?,
                _ => self.update(ctx, ctx.strip_prefix(key), values).await?,
            };
            if let Some(row) = row {
                out.data.push(row);
            }
        }
        out.files = self.file_data(ctx, &out.data).await?;
        Ok(())
    }

    async fn validate_rows(
        &self,
        ctx: &Context<'_>,
        rows: &[(&str, &Value)],
        errors: &mut Vec<FieldError>,
    ) -> bool {
        for (key, values) in rows {
            let id = (ctx.action == Action::Edit).then(|| ctx.strip_prefix(key));
            for field in &self.fields {
                let host = ValidationHost {
                    action: ctx.action,
                    id,
                    field: field.name(),
                    executor: ctx.executor(),
                };
                if let Some(status) = field.validate(values, &host).await {
                    errors.push(FieldError {
                        name: field.name().to_string(),
                        status,
                    });
                }
            }
            for join in &self.many_joins {
                join.validate(ctx, id, values, errors).await;
            }
        }
        errors.is_empty()
    }

    async fn insert(&self, ctx: &Context<'_>, values: &Value) -> EditorResult<Option<Value>> {
        self.guard_compound_insert(ctx, values)?;

        let Some(id) = self.insert_or_update(ctx, None, values).await? else {
            return Ok(None);
        };
        for join in &self.many_joins {
            join.create(ctx, &id, values).await?;
        }
        self.hooks
            .trigger(HookEvent::WriteCreate { id: &id, values }, ctx.executor(), last_non_null)
            .await;

        let row = self.get(ctx, Some(&id), None).await?.data.into_iter().next();
        self.hooks
            .trigger(
                HookEvent::PostCreate { id: &id, values, row: row.as_ref() },
                ctx.executor(),
                last_non_null,
            )
            .await;
        Ok(row)
    }

    async fn update(&self, ctx: &Context<'_>, id: &str, values: &Value) -> EditorResult<Option<Value>> {
        self.insert_or_update(ctx, Some(id), values).await?;
        for join in &self.many_joins {
            join.update(ctx, id, values).await?;
        }
        self.hooks
            .trigger(HookEvent::WriteEdit { id, values }, ctx.executor(), last_non_null)
            .await;

        // The edit may have changed the key itself
        let current = self.pkey_submit_merge(ctx, id, values)?;
        let row = self.get(ctx, Some(&current), None).await?.data.into_iter().next();
        self.hooks
            .trigger(
                HookEvent::PostEdit { id, values, row: row.as_ref() },
                ctx.executor(),
                last_non_null,
            )
            .await;
        Ok(row)
    }

    /// A compound key cannot come from the storage engine, so every key
    /// column must be submitted on create
    fn guard_compound_insert(&self, ctx: &Context<'_>, values: &Value) -> EditorResult<()> {
        if !ctx.pkey.is_compound() {
            return Ok(());
        }
        for column in ctx.pkey.columns() {
            let submitted = ctx
                .find_field_by_db(column)
                .map_or(false, |f| f.apply(Action::Create, values));
            if !submitted {
                return Err(EditorError::config(format!(
                    "When inserting into a compound key table, every key column must be \
                     submitted. `{}` was not.",
                    column
                )));
            }
        }
        Ok(())
    }

    fn pkey_submit_merge(&self, ctx: &Context<'_>, id: &str, values: &Value) -> EditorResult<String> {
        let mut row = ctx.pkey_where(id)?;
        for column in ctx.pkey.columns() {
            if let Some(field) = ctx.find_field_by_db(column) {
                if field.apply(Action::Edit, values) {
                    row.insert(column.clone(), field.val(Direction::Set, values));
                }
            }
        }
        ctx.pkey.compose(&Value::Object(row), true)
    }

    /// Write one record across the primary tables and the left-joined
    /// tables. Returns the row id, or `None` when a create wrote nothing.
    async fn insert_or_update(
        &self,
        ctx: &Context<'_>,
        id: Option<&str>,
        values: &Value,
    ) -> EditorResult<Option<String>> {
        let key_where = match id {
            Some(id) => Some(ctx.pkey_where(id)?),
            None => None,
        };

        // Only the first table to be written on create supplies the id
        let mut id = id.map(str::to_string);
        for table in &self.tables {
            let written = self
                .insert_or_update_table(ctx, table, values, key_where.as_ref(), id.is_none())
                .await?;
            if id.is_none() {
                id = written;
            }
        }
        let Some(id) = id else {
            return Ok(None);
        };

        for join in &self.left_joins {
            match join.write_target(ctx, &id, values) {
                Some((column, value)) => {
                    let mut join_where = Map::new();
                    join_where.insert(column, value);
                    self.insert_or_update_table(ctx, join.table(), values, Some(&join_where), false)
                        .await?;
                }
                None => debug!(table = join.table(), "no submitted link value, join skipped"),
            }
        }
        Ok(Some(id))
    }

    /// Insert into or update a single table from the fields that belong to
    /// it. The update path checks existence first and inserts when the row
    /// is missing; the check and the write are separate statements.
    async fn insert_or_update_table(
        &self,
        ctx: &Context<'_>,
        table: &str,
        values: &Value,
        key_where: Option<&Map<String, Value>>,
        primary: bool,
    ) -> EditorResult<Option<String>> {
        let action = if key_where.is_none() {
            Action::Create
        } else {
            Action::Edit
        };
        let table_name = TableName::parse(table);

        let mut set = Map::new();
        for field in &self.fields {
            if field.is_expression() {
                continue;
            }
            if field.table_part().map_or(false, |t| t != table_name.reference()) {
                continue;
            }
            if field.apply(action, values) {
                set.insert(field.column_part().to_string(), field.val(Direction::Set, values));
            }
        }
        if set.is_empty() {
            return Ok(None);
        }
        debug!(table, action = %action, columns = set.len(), "writing table");

        let executor = ctx.executor();
        match key_where {
            None if primary => {
                let key_column = column_of(ctx.pkey.first()).to_string();
                let inserted = executor
                    .insert(&QueryBuilder::insert_into(table).set_values(&set), &[key_column.clone()])
                    .await?;

                if ctx.pkey.is_compound() {
                    return ctx.pkey.compose_with(|c| set.get(column_of(c))).map(Some);
                }
                if let Some(value) = set.get(&key_column).filter(|v| !v.is_null()) {
                    return Ok(Some(key_text(value)?));
                }
                match inserted.as_ref().and_then(|r| r.get(&key_column)).filter(|v| !v.is_null()) {
                    Some(value) => Ok(Some(key_text(value)?)),
                    None => Err(QueryError::Query(format!(
                        "Insert into `{}` did not return a value for `{}`",
                        table, key_column
                    ))
                    .into()),
                }
            }
            None => {
                executor
                    .insert(&QueryBuilder::insert_into(table).set_values(&set), &[])
                    .await?;
                Ok(None)
            }
            Some(key_where) => {
                let key_where: Map<String, Value> = key_where
                    .iter()
                    .map(|(column, value)| (column_of(column).to_string(), value.clone()))
                    .collect();

                let existing = executor
                    .fetch_count(&QueryBuilder::table(table).where_map(&key_where), "*")
                    .await?;
                if existing > 0 {
                    executor
                        .execute(&QueryBuilder::update(table).set_values(&set).where_map(&key_where))
                        .await?;
                } else {
                    let mut merged = set;
                    for (column, value) in key_where {
                        merged.insert(column, value);
                    }
                    executor
                        .insert(&QueryBuilder::insert_into(table).set_values(&merged), &[])
                        .await?;
                }
                Ok(None)
            }
        }
    }
}

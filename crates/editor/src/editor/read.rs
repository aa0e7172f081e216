use serde_json::{Map, Value};
use tabula_query::{QueryBuilder, QueryError};
use tracing::debug;

use super::Editor;
use crate::context::Context;
use crate::error::EditorResult;
use crate::hooks::{last_non_null, HookEvent};
use crate::join::{left, ID_LIMIT};
use crate::path;
use crate::request::{Action, Request};
use crate::response::Response;
use crate::ssp;

/// Rows and side data produced by one read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadResult {
    pub data: Vec<Value>,
    pub options: Map<String, Value>,
    pub files: Map<String, Value>,
    pub draw: Option<i64>,
    pub records_total: Option<i64>,
    pub records_filtered: Option<i64>,
}

impl Editor {
    pub(super) async fn read(&self, ctx: &Context<'_>, request: &Request, out: &mut Response) -> EditorResult<()> {
        let result = self.get(ctx, None, Some(request)).await?;
        out.data = result.data;
        out.options = result.options;
        out.files = result.files;
        out.draw = result.draw;
        out.records_total = result.records_total;
        out.records_filtered = result.records_filtered;
        Ok(())
    }

    /// Read every row, or only `id` (unprefixed) when given
    pub(super) async fn get(
        &self,
        ctx: &Context<'_>,
        id: Option<&str>,
        request: Option<&Request>,
    ) -> EditorResult<ReadResult> {
        if self.hooks.cancelled(HookEvent::PreGet { id }, ctx.executor()).await {
            return Ok(ReadResult::default());
        }

        let mut query = QueryBuilder::table(self.source_table());
        for column in ctx.pkey.columns() {
            query = query.select_as(column, column);
        }
        for field in self.fields.iter().filter(|f| f.reads_column()) {
            let db = field.db_field();
            query = if field.is_expression() {
                query.select_raw(db, db)
            } else {
                query.select_as(db, db)
            };
        }
        query = self.apply_where(query);
        query = left::apply_all(&self.left_joins, query)?;

        let mut result = ReadResult::default();
        if let Some(request) = request.filter(|r| ssp::engaged(r)) {
            query = self.ssp(ctx, query, request, &mut result).await?;
        }
        if let Some(id) = id {
            query = query.where_map(&ctx.pkey_where(id)?);
        }

        let rows = ctx.executor().fetch_all(&query).await?;
        debug!(table = self.source_table(), rows = rows.len(), "read rows");

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let row = Value::Object(row);
            let mut inner = Map::new();
            inner.insert(
                "DT_RowId".to_string(),
                Value::String(format!("{}{}", ctx.id_prefix, ctx.pkey.compose(&row, true)?)),
            );
            for field in self.fields.iter().filter(|f| f.apply(Action::Read, &row)) {
                field.write(&mut inner, &row)?;
            }
            data.push(Value::Object(inner));
        }

        if id.is_none() {
            for field in &self.fields {
                if let Some(list) = field.options_exec(ctx.executor()).await? {
                    let list = serde_json::to_value(list).map_err(QueryError::from)?;
                    result.options.insert(field.name().to_string(), list);
                }
            }
        }

        for join in &self.many_joins {
            join.data(ctx, &mut data, &mut result.options).await?;
        }

        self.hooks
            .trigger(HookEvent::PostGet { id, data: &data }, ctx.executor(), last_non_null)
            .await;

        result.files = self.file_data(ctx, &data).await?;
        result.data = data;
        Ok(result)
    }

    /// Apply paging, ordering and filtering to the data query and run the
    /// two count queries
    async fn ssp(
        &self,
        ctx: &Context<'_>,
        query: QueryBuilder,
        request: &Request,
        result: &mut ReadResult,
    ) -> EditorResult<QueryBuilder> {
        let client = ctx.executor().client_name().to_string();
        let count_column = ctx.pkey.first();

        let filtered = self.apply_where(QueryBuilder::table(self.source_table()));
        let filtered = ssp::filter(filtered, request, &self.fields, &ctx.pkey, &client)?;
        let filtered = left::apply_all(&self.left_joins, filtered)?;
        let records_filtered = ctx.executor().fetch_count(&filtered, count_column).await?;

        let mut total = QueryBuilder::table(self.source_table());
        if !self.conditions.is_empty() {
            total = self.apply_where(total);
            total = left::apply_all(&self.left_joins, total)?;
        }
        let records_total = ctx.executor().fetch_count(&total, count_column).await?;

        result.draw = request.draw;
        result.records_total = Some(records_total);
        result.records_filtered = Some(records_filtered);

        let query = ssp::order(query, request, &self.fields, &ctx.pkey)?;
        let query = ssp::filter(query, request, &self.fields, &ctx.pkey, &client)?;
        Ok(ssp::paginate(query, request))
    }

    /// File metadata for every upload field, keyed by file table. Lookups
    /// are limited to the ids present in `rows` when there are few rows.
    pub(super) async fn file_data(&self, ctx: &Context<'_>, rows: &[Value]) -> EditorResult<Map<String, Value>> {
        let own = self.fields.iter().map(|f| (f, None));
        let joined = self
            .many_joins
            .iter()
            .flat_map(|j| j.fields().iter().map(move |f| (f, Some(j.name()))));

        let mut files = Map::new();
        for (field, join) in own.chain(joined) {
            let Some(upload) = field.upload_binding() else {
                continue;
            };
            let Some(table) = upload.table() else {
                continue;
            };
            if files.contains_key(table) {
                continue;
            }

            let ids = (rows.len() < ID_LIMIT).then(|| {
                let mut ids = Vec::new();
                for row in rows {
                    let records: Vec<&Value> = match join {
                        None => vec![row],
                        Some(name) => row
                            .get(name)
                            .and_then(Value::as_array)
                            .map(|children| children.iter().collect())
                            .unwrap_or_default(),
                    };
                    for record in records {
                        if let Some(id) = path::read(record, field.name()).filter(|v| !v.is_null()) {
                            if !ids.contains(id) {
                                ids.push(id.clone());
                            }
                        }
                    }
                }
                ids
            });

            let data = upload.data(ctx.executor(), ids.as_deref()).await?;
            files.insert(table.to_string(), Value::Object(data));
        }
        Ok(files)
    }
}

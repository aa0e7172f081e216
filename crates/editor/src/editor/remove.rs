use std::slice;

use tabula_query::{Condition, QueryBuilder, TableName};
use tracing::{debug, warn};

use super::Editor;
use crate::context::Context;
use crate::error::EditorResult;
use crate::field::SetMode;
use crate::hooks::{last_non_null, HookEvent};
use crate::join::left::column_of;
use crate::request::Request;
use crate::response::Response;

impl Editor {
    /// Delete the submitted rows: many-join rows first, then (optionally)
    /// directly linked left-join rows, then the primary tables
    pub(super) async fn remove(&self, ctx: &Context<'_>, request: &Request, out: &mut Response) -> EditorResult<()> {
        let mut ids = Vec::new();
        for (key, values) in request.rows() {
            let id = ctx.strip_prefix(key);
            if self
                .hooks
                .cancelled(HookEvent::PreRemove { id, values }, ctx.executor())
                .await
            {
                warn!(row = id, "remove cancelled by hook");
                ctx.recorder.note(format!("remove of row {} cancelled", id));
                out.cancelled.push(id.to_string());
            } else {
                ids.push(id.to_string());
            }
        }
        if ids.is_empty() {
            return Ok(());
        }

        for join in &self.many_joins {
            join.remove(ctx, &ids).await?;
        }

        if self.config.left_join_remove {
            for join in &self.left_joins {
                let (parent, child) = join.sides();
                // Only a single-column key identifies the joined row
                if parent == ctx.pkey.first() && !ctx.pkey.is_compound() {
                    let child = child.to_string();
                    self.remove_table(ctx, join.table(), &ids, Some(slice::from_ref(&child)))
                        .await?;
                }
            }
        }

        for table in &self.tables {
            self.remove_table(ctx, table, &ids, None).await?;
        }

        for (key, values) in request.rows() {
            let id = ctx.strip_prefix(key);
            if ids.iter().any(|removed| removed == id) {
                self.hooks
                    .trigger(HookEvent::PostRemove { id, values }, ctx.executor(), last_non_null)
                    .await;
            }
        }
        Ok(())
    }

    /// Delete `ids` from `table`, matching on `columns` (the primary key by
    /// default). Tables are left alone unless an unqualified field, or a
    /// writable field qualified with the table, maps to them.
    async fn remove_table(
        &self,
        ctx: &Context<'_>,
        table: &str,
        ids: &[String],
        columns: Option<&[String]>,
    ) -> EditorResult<()> {
        let table_name = TableName::parse(table);
        let mapped = self
            .fields
            .iter()
            .any(|f| match f.table_part() {
                None => true,
                Some(t) => t == table_name.reference() && f.set_mode() != SetMode::None,
            });
        if !mapped {
            return Ok(());
        }

        let mut any = Vec::with_capacity(ids.len());
        for id in ids {
            let key = ctx.pkey.decompose(id, ctx.id_prefix, true, columns)?;
            any.push(Condition::All(
                key.into_iter()
                    .map(|(column, value)| Condition::eq(column_of(&column), value))
                    .collect(),
            ));
        }

        let query = QueryBuilder::delete_from(&table_name.name).where_any(any);
        let removed = ctx.executor().execute(&query).await?;
        debug!(table = %table_name.name, removed, "removed rows");
        Ok(())
    }
}

use std::slice;

use serde_json::Value;

use super::Editor;
use crate::context::Context;
use crate::error::{EditorError, EditorResult};
use crate::hooks::{last_non_null, HookEvent};
use crate::request::Request;
use crate::response::{Response, UploadResult};
use crate::upload::{UploadOutcome, UploadPayload};

impl Editor {
    /// Hand an uploaded file to the binding of the addressed field, which
    /// may be an own field or a many-join field (`<join>[].<field>`)
    pub(super) async fn upload(
        &self,
        ctx: &Context<'_>,
        request: &Request,
        payload: Option<&UploadPayload>,
        out: &mut Response,
    ) -> EditorResult<()> {
        let wire_name = request
            .upload_field
            .as_deref()
            .ok_or_else(|| EditorError::Protocol("No upload field submitted".to_string()))?;

        let field = self
            .fields
            .iter()
            .find(|f| f.name() == wire_name)
            .or_else(|| self.many_joins.iter().find_map(|j| j.find_field(wire_name)))
            .ok_or_else(|| EditorError::Upload(format!("Unknown upload field name submitted: {}", wire_name)))?;

        let payload = payload.ok_or_else(|| EditorError::Upload("No file was submitted".to_string()))?;

        if self
            .hooks
            .cancelled(HookEvent::PreUpload { field: wire_name, payload }, ctx.executor())
            .await
        {
            return Ok(());
        }

        let upload = field.upload_binding().ok_or_else(|| {
            EditorError::config(format!(
                "File uploaded to `{}`, which has no upload binding",
                wire_name
            ))
        })?;

        match upload.exec(ctx.executor(), payload).await? {
            UploadOutcome::Rejected(message) => out.field_error(wire_name, message),
            UploadOutcome::Stored(id) => {
                if let Some(table) = upload.table() {
                    let data = upload.data(ctx.executor(), Some(slice::from_ref(&id))).await?;
                    out.files.insert(table.to_string(), Value::Object(data));
                }
                self.hooks
                    .trigger(
                        HookEvent::PostUpload { field: wire_name, id: &id, files: &out.files },
                        ctx.executor(),
                        last_non_null,
                    )
                    .await;
                out.upload = Some(UploadResult { id });
            }
        }
        Ok(())
    }
}

use serde_json::Map;
use tabula_query::{Database, Executor};
use tracing::{debug, warn};

use super::Editor;
use crate::context::{Context, Recorder};
use crate::error::EditorResult;
use crate::request::{Action, Request};
use crate::response::Response;
use crate::upload::UploadPayload;

impl Editor {
    /// Process one request. With transactions enabled the whole request
    /// runs in a single transaction that is rolled back on error.
    ///
    /// Configuration errors are always returned. Other errors are returned
    /// too, unless contained errors are enabled, in which case they are
    /// reported in the response `error` after the rollback.
    pub async fn process(
        &self,
        db: &dyn Database,
        request: &Request,
        upload: Option<&UploadPayload>,
    ) -> EditorResult<Response> {
        let action = match request.action() {
            Ok(action) => action,
            Err(e) => return self.finish(Err(e), Response::new()),
        };
        debug!(action = %action, table = self.host_table(), "processing request");

        if self.config.transactions {
            let tx = db.begin().await?;
            let (result, response) = self.run(tx.as_executor(), action, request, upload).await;
            if result.is_ok() {
                tx.commit().await?;
            } else if let Err(e) = tx.rollback().await {
                warn!(error = %e, "rollback failed");
            }
            self.finish(result, response)
        } else {
            let (result, response) = self.run(db.as_executor(), action, request, upload).await;
            self.finish(result, response)
        }
    }

    async fn run(
        &self,
        executor: &dyn Executor,
        action: Action,
        request: &Request,
        upload: Option<&UploadPayload>,
    ) -> (EditorResult<()>, Response) {
        let recorder = Recorder::new(executor, self.config.debug);
        let mut out = Response::new();

        let result = match self.context(&recorder, action) {
            Ok(ctx) => self.dispatch(&ctx, request, upload, &mut out).await,
            Err(e) => Err(e),
        };

        if self.config.debug {
            out.debug = Some(recorder.take());
        }
        (result, out)
    }

    fn finish(&self, result: EditorResult<()>, mut out: Response) -> EditorResult<Response> {
        match result {
            Ok(()) => Ok(out),
            Err(e) if self.config.contained_errors && !e.is_configuration() => {
                warn!(error = %e, "request failed; error reported in response");
                out.error = Some(e.to_string());
                Ok(out)
            }
            Err(e) => Err(e),
        }
    }

    async fn dispatch(
        &self,
        ctx: &Context<'_>,
        request: &Request,
        upload: Option<&UploadPayload>,
        out: &mut Response,
    ) -> EditorResult<()> {
        let empty = Map::new();
        let data = request.data.as_ref().unwrap_or(&empty);

        let mut rejected = None;
        for validator in &self.validators {
            if let Some(message) = validator.validate(ctx.action, data, ctx.executor()).await {
                debug!(action = %ctx.action, "global validator rejected request");
                rejected = Some(message);
                break;
            }
        }

        if let Some(message) = rejected {
            out.error = Some(message);
        } else if ctx.action.needs_data() && !request.has_rows() {
            out.error = Some(format!(
                "No data detected. A `{}` request must submit row data.",
                ctx.action
            ));
        } else {
            match ctx.action {
                Action::Read => self.read(ctx, request, out).await?,
                Action::Create | Action::Edit => self.write(ctx, request, out).await?,
                Action::Delete => self.remove(ctx, request, out).await?,
                Action::Upload => self.upload(ctx, request, upload, out).await?,
            }
        }

        if ctx.action.needs_data() {
            self.file_clean(ctx).await?;
        }
        Ok(())
    }

    /// Let every upload binding clear orphaned files
    async fn file_clean(&self, ctx: &Context<'_>) -> EditorResult<()> {
        let joined = self.many_joins.iter().flat_map(|j| j.fields());
        for field in self.fields.iter().chain(joined) {
            if let Some(upload) = field.upload_binding() {
                upload.db_clean_exec(ctx.executor(), field.name()).await?;
            }
        }
        Ok(())
    }
}

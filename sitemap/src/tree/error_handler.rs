//! Error handling at pipeline boundaries.

use super::{invoke_nodes, InvokeContext, Node};
use crate::components::{Generator, NotifyingGenerator};
use crate::config::Location;
use crate::core::{Notification, NOTIFYING_OBJECT, THROWABLE_OBJECT};
use crate::environment::Environment;
use crate::errors::{SitemapError, SitemapResult};
use crate::events::{SitemapEvent, ERROR_HANDLED};
use crate::pipeline::PipelineStep;
use std::sync::Arc;

/// A `handle-errors` subtree.
pub struct HandleErrorsNode {
    status_code: u16,
    notifier: Option<PipelineStep<dyn Generator>>,
    children: Vec<Node>,
    location: Location,
}

impl HandleErrorsNode {
    /// Creates a handler answering with `status_code`.
    ///
    /// Unless the subtree starts with its own generator, the pipeline is
    /// pre-seeded with the notifying generator.
    #[must_use]
    pub fn new(status_code: u16, children: Vec<Node>, location: Location) -> Self {
        let notifier = if children.first().is_some_and(Node::starts_content) {
            None
        } else {
            Some(PipelineStep::new(
                "<notifier>",
                Arc::new(NotifyingGenerator) as Arc<dyn Generator>,
            ))
        };
        Self {
            status_code,
            notifier,
            children,
            location,
        }
    }

    /// Returns the status code the handler sets.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status_code
    }

    async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        env.response().status = Some(self.status_code);
        if let Some(notifier) = &self.notifier {
            ctx.pipeline_mut().set_generator(notifier.clone())?;
        }
        invoke_nodes(&self.children, env, ctx).await
    }
}

/// The error handlers of one `pipeline` or `pipelines` node.
///
/// The untyped handler and the `500` handler share one slot.
#[derive(Default)]
pub struct ErrorHandlerHelper {
    handler_404: Option<HandleErrorsNode>,
    handler_500: Option<HandleErrorsNode>,
}

impl ErrorHandlerHelper {
    /// Creates a helper.
    #[must_use]
    pub const fn new(handler_404: Option<HandleErrorsNode>, handler_500: Option<HandleErrorsNode>) -> Self {
        Self {
            handler_404,
            handler_500,
        }
    }

    /// Returns true if any handler is configured.
    #[must_use]
    pub const fn has_handlers(&self) -> bool {
        self.handler_404.is_some() || self.handler_500.is_some()
    }

    fn handler_for(&self, error: &SitemapError) -> Option<&HandleErrorsNode> {
        if error.is_not_found() {
            self.handler_404.as_ref().or(self.handler_500.as_ref())
        } else {
            self.handler_500.as_ref()
        }
    }

    /// Handles an error that reached this boundary.
    ///
    /// Internal requests, and requests whose handler already failed, get the
    /// error back unchanged. Otherwise the handler runs in a fresh context:
    /// `true` resolves the error, `false` returns the original error, and a
    /// failing handler's own error is returned instead.
    pub async fn handle(
        &self,
        error: SitemapError,
        env: &Environment,
        ctx: &mut InvokeContext,
    ) -> SitemapResult<bool> {
        if !env.is_external() && !env.is_internal_redirect() {
            return Err(error);
        }
        if env.handler_failed() {
            return Err(error);
        }
        let Some(handler) = self.handler_for(&error) else {
            return Err(error);
        };
        prepare_error_context(&error, env);
        tracing::warn!(
            error = %error,
            uri = %env.uri(),
            handler = %handler.location,
            status = handler.status_code,
            "Invoking error handler"
        );
        let mut error_ctx = ctx.for_error_handler();
        match handler.invoke(env, &mut error_ctx).await {
            Ok(true) => {
                if ctx.is_build_only() {
                    ctx.set_pipeline(error_ctx.take_pipeline());
                }
                ctx.processor().emit(SitemapEvent::new(
                    ERROR_HANDLED,
                    serde_json::json!({
                        "uri": env.uri(),
                        "status": handler.status_code,
                        "error": error.to_dict(),
                    }),
                ));
                Ok(true)
            }
            Ok(false) => Err(error),
            Err(handler_error) => {
                tracing::error!(
                    error = %handler_error,
                    original = %error,
                    handler = %handler.location,
                    "Error handler failed"
                );
                env.mark_handler_failed();
                Err(handler_error)
            }
        }
    }

    pub(crate) fn dispose(&self) {
        for handler in [&self.handler_404, &self.handler_500].into_iter().flatten() {
            super::dispose_all(&handler.children);
        }
    }
}

/// Stores the notification and the error summary, once per request.
fn prepare_error_context(error: &SitemapError, env: &Environment) {
    let model = env.object_model();
    if model.contains_key(NOTIFYING_OBJECT) {
        return;
    }
    env.response().reset();
    match serde_json::to_value(Notification::from_error(error)) {
        Ok(notification) => model.insert(NOTIFYING_OBJECT, notification),
        Err(e) => tracing::warn!(error = %e, "Could not store error notification"),
    }
    model.insert(
        THROWABLE_OBJECT,
        serde_json::Value::Object(error.to_dict().into_iter().collect()),
    );
}

//! Flow declaration and `call` nodes.

use super::{locate, InvokeContext};
use crate::components::Interpreter;
use crate::config::Location;
use crate::environment::Environment;
use crate::errors::{ConfigurationError, SitemapError, SitemapResult};
use crate::variables::{ParameterTemplate, VariableResolver};
use std::fmt;
use std::sync::Arc;

/// The tree's flow declaration: one interpreter and its scripts.
pub struct FlowNode {
    language: String,
    interpreter: Arc<dyn Interpreter>,
    scripts: Vec<String>,
}

impl fmt::Debug for FlowNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowNode")
            .field("language", &self.language)
            .field("scripts", &self.scripts)
            .finish_non_exhaustive()
    }
}

impl FlowNode {
    /// Declares the flow and registers its scripts with the interpreter.
    ///
    /// # Errors
    ///
    /// Propagates the interpreter's rejection of the scripts.
    pub fn new(
        language: String,
        interpreter: Arc<dyn Interpreter>,
        scripts: Vec<String>,
    ) -> Result<Self, ConfigurationError> {
        interpreter.register_scripts(&scripts)?;
        Ok(Self {
            language,
            interpreter,
            scripts,
        })
    }

    /// Returns the flow language.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Returns the declared scripts.
    #[must_use]
    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    /// Returns the bound interpreter.
    #[must_use]
    pub fn interpreter(&self) -> Arc<dyn Interpreter> {
        self.interpreter.clone()
    }
}

/// Calls a flow function, or resumes a continuation.
///
/// The interpreter must answer through the redirector; returning without
/// having done so is a processing error.
pub struct CallFunctionNode {
    function: Option<VariableResolver>,
    continuation: Option<VariableResolver>,
    arguments: ParameterTemplate,
    interpreter: Arc<dyn Interpreter>,
    pub(crate) location: Location,
}

impl CallFunctionNode {
    /// Creates a call node.
    #[must_use]
    pub fn new(
        function: Option<VariableResolver>,
        continuation: Option<VariableResolver>,
        arguments: ParameterTemplate,
        interpreter: Arc<dyn Interpreter>,
        location: Location,
    ) -> Self {
        Self {
            function,
            continuation,
            arguments,
            interpreter,
            location,
        }
    }

    pub(crate) async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        self.call(env, ctx)
            .await
            .map_err(|e| locate(e, &self.location))
    }

    async fn call(&self, env: &Environment, ctx: &InvokeContext) -> SitemapResult<bool> {
        let redirector = ctx.redirector()?;
        let arguments = self.arguments.resolve(ctx.maps(), env)?.to_pairs();
        let resolve = |value: Option<&VariableResolver>| -> SitemapResult<Option<String>> {
            Ok(value
                .map(|value| value.resolve(ctx.maps(), env))
                .transpose()?
                .filter(|value| !value.is_empty()))
        };

        if let Some(continuation) = resolve(self.continuation.as_ref())? {
            tracing::debug!(continuation = %continuation, "Resuming continuation");
            self.interpreter
                .handle_continuation(&continuation, &arguments, &redirector, env)
                .await?;
            if !redirector.has_redirected() {
                return Err(SitemapError::processing(format!(
                    "Continuation '{continuation}' did not send a response"
                )));
            }
        } else if let Some(function) = resolve(self.function.as_ref())? {
            tracing::debug!(function = %function, "Calling flow function");
            self.interpreter
                .call_function(&function, &arguments, &redirector, env)
                .await?;
            if !redirector.has_redirected() {
                return Err(SitemapError::processing(format!(
                    "Function '{function}' did not send a response"
                )));
            }
        } else {
            return Err(SitemapError::processing(
                "Neither a function nor a continuation resolved for 'call'",
            ));
        }
        Ok(true)
    }
}

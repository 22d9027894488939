//! Request environment.

use super::Response;
use crate::config::ProcessorConfig;
use crate::core::ObjectModel;
use crate::errors::{SitemapError, SitemapResult};
use crate::processor::TreeProcessor;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Everything the tree knows about one request.
pub struct Environment {
    request_id: Uuid,
    method: String,
    parameters: HashMap<String, String>,
    headers: HashMap<String, String>,
    external: bool,
    depth: usize,
    uri: RwLock<String>,
    prefix: RwLock<String>,
    context: RwLock<String>,
    view: RwLock<Option<String>>,
    action: RwLock<Option<String>>,
    internal_redirect: AtomicBool,
    pass_through: AtomicBool,
    handler_failed: AtomicBool,
    object_model: Arc<ObjectModel>,
    response: Arc<Mutex<Response>>,
    scope: RwLock<Option<Arc<TreeProcessor>>>,
    root: RwLock<Option<Arc<TreeProcessor>>>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("request_id", &self.request_id)
            .field("uri", &*self.uri.read())
            .field("prefix", &*self.prefix.read())
            .field("external", &self.external)
            .field("internal_redirect", &self.is_internal_redirect())
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

/// Splits `path?a=1&b=2` into the path and its query parameters.
fn split_query(uri: &str) -> (String, HashMap<String, String>) {
    let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
    let parameters = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (name.to_string(), value.to_string())
        })
        .collect();
    (path.trim_start_matches('/').to_string(), parameters)
}

impl Environment {
    /// Creates the environment of an external request.
    ///
    /// A leading `/` is stripped and a query string becomes request
    /// parameters.
    #[must_use]
    pub fn new(uri: &str) -> Self {
        let (path, parameters) = split_query(uri);
        Self {
            request_id: Uuid::new_v4(),
            method: "GET".to_string(),
            parameters,
            headers: HashMap::new(),
            external: true,
            depth: 0,
            uri: RwLock::new(path),
            prefix: RwLock::new(String::new()),
            context: RwLock::new(String::new()),
            view: RwLock::new(None),
            action: RwLock::new(None),
            internal_redirect: AtomicBool::new(false),
            pass_through: AtomicBool::new(false),
            handler_failed: AtomicBool::new(false),
            object_model: Arc::new(ObjectModel::new()),
            response: Arc::new(Mutex::new(Response::default())),
            scope: RwLock::new(None),
            root: RwLock::new(None),
        }
    }

    /// Adds a request parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Adds a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the request method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Marks the request as internal.
    #[must_use]
    pub const fn internal(mut self) -> Self {
        self.external = false;
        self
    }

    /// Derives an environment for a nested request sharing this one's
    /// headers, method and root processor.
    fn derive(&self, uri: &str, max_depth: usize) -> SitemapResult<Self> {
        let depth = self.depth + 1;
        if depth > max_depth {
            return Err(SitemapError::processing(format!(
                "Internal request depth exceeded {max_depth} while requesting '{uri}'"
            )));
        }
        let mut env = Self::new(uri).internal();
        env.request_id = self.request_id;
        env.method.clone_from(&self.method);
        env.headers.clone_from(&self.headers);
        env.depth = depth;
        *env.root.write() = self.root_processor();
        Ok(env)
    }

    /// Creates the environment of an internal `cocoon:` request.
    ///
    /// The new request has its own object model and response.
    ///
    /// # Errors
    ///
    /// Returns a processing error when the nesting limit is reached.
    pub fn internal_request(&self, uri: &str, max_depth: usize) -> SitemapResult<Self> {
        self.derive(uri, max_depth)
    }

    /// Creates the environment of an internal redirect.
    ///
    /// The forwarded request shares this request's object model and
    /// response, and is handled by error handlers like an external one.
    ///
    /// # Errors
    ///
    /// Returns a processing error when the nesting limit is reached.
    pub fn forward(&self, uri: &str, max_depth: usize) -> SitemapResult<Self> {
        let mut env = self.derive(uri, max_depth)?;
        env.object_model = self.object_model.clone();
        env.response = self.response.clone();
        env.internal_redirect.store(true, Ordering::SeqCst);
        Ok(env)
    }

    /// Returns the id shared by a request and its nested requests.
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the URI relative to the current sitemap.
    #[must_use]
    pub fn uri(&self) -> String {
        self.uri.read().clone()
    }

    /// Returns the prefix consumed by enclosing mounts.
    #[must_use]
    pub fn prefix(&self) -> String {
        self.prefix.read().clone()
    }

    /// Returns the context URI of the current sitemap.
    #[must_use]
    pub fn context(&self) -> String {
        self.context.read().clone()
    }

    /// Returns the nesting depth of internal requests.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Returns a request parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.parameters.get(name).cloned()
    }

    /// Returns a request header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Returns true for requests coming from outside.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        self.external
    }

    /// Returns true for forwarded `cocoon:` redirects.
    #[must_use]
    pub fn is_internal_redirect(&self) -> bool {
        self.internal_redirect.load(Ordering::SeqCst)
    }

    /// Reads the requested view and action from the request parameters.
    ///
    /// Values already set are kept.
    pub fn init_controls(&self, config: &ProcessorConfig) {
        let mut view = self.view.write();
        if view.is_none() {
            *view = self.parameter(&config.view_parameter).filter(|v| !v.is_empty());
        }
        drop(view);
        let mut action = self.action.write();
        if action.is_none() {
            *action = self.parameter(&config.action_parameter).filter(|a| !a.is_empty());
        }
    }

    /// Returns the requested view.
    #[must_use]
    pub fn view(&self) -> Option<String> {
        self.view.read().clone()
    }

    /// Requests a view.
    pub fn set_view(&self, view: Option<String>) {
        *self.view.write() = view;
    }

    /// Returns the requested action-set action.
    #[must_use]
    pub fn action(&self) -> Option<String> {
        self.action.read().clone()
    }

    /// Returns the request-scoped object model.
    #[must_use]
    pub fn object_model(&self) -> &ObjectModel {
        &self.object_model
    }

    /// Locks the response.
    pub fn response(&self) -> MutexGuard<'_, Response> {
        self.response.lock()
    }

    /// Returns a copy of the response.
    #[must_use]
    pub fn response_snapshot(&self) -> Response {
        self.response.lock().clone()
    }

    /// Returns true if a mounted sitemap may decline the request.
    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        self.pass_through.load(Ordering::SeqCst)
    }

    /// Sets the pass-through flag.
    pub fn set_pass_through(&self, pass_through: bool) {
        self.pass_through.store(pass_through, Ordering::SeqCst);
    }

    /// Returns true once an error handler of this request has failed.
    #[must_use]
    pub fn handler_failed(&self) -> bool {
        self.handler_failed.load(Ordering::SeqCst)
    }

    /// Records that an error handler has failed.
    pub fn mark_handler_failed(&self) {
        self.handler_failed.store(true, Ordering::SeqCst);
    }

    /// Returns the processor currently handling the request.
    #[must_use]
    pub fn current_processor(&self) -> Option<Arc<TreeProcessor>> {
        self.scope.read().clone()
    }

    /// Returns the outermost processor of the request.
    #[must_use]
    pub fn root_processor(&self) -> Option<Arc<TreeProcessor>> {
        self.root.read().clone()
    }

    /// Makes `processor` the current source-resolution scope until the
    /// guard is dropped. The first processor entered becomes the root.
    #[must_use]
    pub fn enter_scope(&self, processor: Arc<TreeProcessor>) -> ScopeGuard<'_> {
        {
            let mut root = self.root.write();
            if root.is_none() {
                *root = Some(processor.clone());
            }
        }
        let previous = self.scope.write().replace(processor);
        ScopeGuard {
            env: self,
            previous,
        }
    }

    /// Consumes `prefix` from the URI and switches to a new context.
    ///
    /// The prefix is normalised to end with `/`; a URI equal to the prefix
    /// without its slash is accepted and becomes empty.
    ///
    /// # Errors
    ///
    /// Returns a processing error if the URI does not start with the prefix.
    pub fn change_context(&self, prefix: &str, context: &str) -> SitemapResult<()> {
        let mut prefix = prefix.trim_start_matches('/').to_string();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        let uri = self.uri();
        let remainder = if let Some(rest) = uri.strip_prefix(prefix.as_str()) {
            rest.to_string()
        } else if !prefix.is_empty() && uri == prefix[..prefix.len() - 1] {
            String::new()
        } else {
            return Err(SitemapError::processing(format!(
                "The current URI '{uri}' doesn't start with the given prefix '{prefix}'"
            )));
        };
        tracing::debug!(uri = %uri, prefix = %prefix, context = %context, "Changing context");
        self.prefix.write().push_str(&prefix);
        *self.uri.write() = remainder;
        *self.context.write() = context.to_string();
        Ok(())
    }

    /// Saves the addressing state; it is restored when the guard drops.
    #[must_use]
    pub fn save_addressing(&self) -> AddressingGuard<'_> {
        AddressingGuard {
            env: self,
            uri: self.uri(),
            prefix: self.prefix(),
            context: self.context(),
            pass_through: self.is_pass_through(),
        }
    }
}

/// Restores the previous processor scope on drop.
pub struct ScopeGuard<'a> {
    env: &'a Environment,
    previous: Option<Arc<TreeProcessor>>,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        *self.env.scope.write() = self.previous.take();
    }
}

/// Restores URI, prefix, context and pass-through on drop.
pub struct AddressingGuard<'a> {
    env: &'a Environment,
    uri: String,
    prefix: String,
    context: String,
    pass_through: bool,
}

impl Drop for AddressingGuard<'_> {
    fn drop(&mut self) {
        *self.env.uri.write() = std::mem::take(&mut self.uri);
        *self.env.prefix.write() = std::mem::take(&mut self.prefix);
        *self.env.context.write() = std::mem::take(&mut self.context);
        self.env.set_pass_through(self.pass_through);
    }
}

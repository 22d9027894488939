//! Stub components for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::components::{
    Action, ActionFactory, Generator, Interpreter, MatchResult, Matcher, Reader, Selector,
    SourceResolver, Transformer,
};
use crate::core::{Parameters, SaxEvent};
use crate::environment::{Environment, Redirector};
use crate::errors::{ConfigurationError, SitemapError, SitemapResult};

fn result_of(pairs: &[(&str, &str)]) -> MatchResult {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// A matcher with a fixed outcome that records the patterns it was given.
#[derive(Debug)]
pub struct StubMatcher {
    result: Option<MatchResult>,
    patterns: Mutex<Vec<String>>,
}

impl StubMatcher {
    /// Creates a matcher that always matches with `pairs`.
    #[must_use]
    pub fn matching(pairs: &[(&str, &str)]) -> Self {
        Self {
            result: Some(result_of(pairs)),
            patterns: Mutex::new(Vec::new()),
        }
    }

    /// Creates a matcher that never matches.
    #[must_use]
    pub fn never() -> Self {
        Self {
            result: None,
            patterns: Mutex::new(Vec::new()),
        }
    }

    /// Returns the resolved patterns seen so far.
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        self.patterns.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.patterns.lock().len()
    }
}

#[async_trait]
impl Matcher for StubMatcher {
    async fn matches(
        &self,
        pattern: &str,
        _env: &Environment,
        _params: &Parameters,
    ) -> SitemapResult<Option<MatchResult>> {
        self.patterns.lock().push(pattern.to_string());
        Ok(self.result.clone())
    }
}

/// A selector accepting a fixed set of tests and recording every test.
#[derive(Debug)]
pub struct RecordingSelector {
    accept: Vec<String>,
    tests: Mutex<Vec<String>>,
}

impl RecordingSelector {
    /// Creates a selector accepting the given tests.
    #[must_use]
    pub fn new(accept: &[&str]) -> Self {
        Self {
            accept: accept.iter().map(|t| (*t).to_string()).collect(),
            tests: Mutex::new(Vec::new()),
        }
    }

    /// Returns the evaluated tests in order.
    #[must_use]
    pub fn tests(&self) -> Vec<String> {
        self.tests.lock().clone()
    }
}

#[async_trait]
impl Selector for RecordingSelector {
    async fn select(
        &self,
        expression: &str,
        _env: &Environment,
        _params: &Parameters,
    ) -> SitemapResult<bool> {
        self.tests.lock().push(expression.to_string());
        Ok(self.accept.iter().any(|t| t == expression))
    }
}

#[derive(Debug, Clone)]
enum ActionOutcome {
    Succeed(MatchResult),
    Fail,
    Redirect(String),
}

/// An action with a fixed outcome that records its invocations.
#[derive(Debug)]
pub struct StubAction {
    outcome: ActionOutcome,
    calls: Mutex<Vec<(String, Parameters)>>,
}

impl StubAction {
    /// Creates an action returning `pairs`.
    #[must_use]
    pub fn succeeding(pairs: &[(&str, &str)]) -> Self {
        Self::with_outcome(ActionOutcome::Succeed(result_of(pairs)))
    }

    /// Creates an action that fails by returning `None`.
    #[must_use]
    pub fn failing() -> Self {
        Self::with_outcome(ActionOutcome::Fail)
    }

    /// Creates an action that redirects to `uri`.
    #[must_use]
    pub fn redirecting(uri: impl Into<String>) -> Self {
        Self::with_outcome(ActionOutcome::Redirect(uri.into()))
    }

    fn with_outcome(outcome: ActionOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns a factory creating fresh copies of this action, for pooling.
    #[must_use]
    pub fn factory(pairs: &'static [(&'static str, &'static str)]) -> ActionFactory {
        Box::new(move || Box::new(Self::succeeding(pairs)) as Box<dyn Action>)
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the source and parameters of every call.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, Parameters)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Action for StubAction {
    async fn act(
        &self,
        redirector: &Redirector,
        env: &Environment,
        source: &str,
        params: &Parameters,
    ) -> SitemapResult<Option<MatchResult>> {
        self.calls.lock().push((source.to_string(), params.clone()));
        match &self.outcome {
            ActionOutcome::Succeed(result) => Ok(Some(result.clone())),
            ActionOutcome::Fail => Ok(None),
            ActionOutcome::Redirect(uri) => {
                redirector.redirect(env, uri, false).await?;
                Ok(Some(MatchResult::new()))
            }
        }
    }
}

/// A generator returning fixed events, or echoing its source.
#[derive(Debug, Clone, Default)]
pub struct StaticGenerator {
    events: Option<Vec<SaxEvent>>,
}

impl StaticGenerator {
    /// Creates a generator returning `events`.
    #[must_use]
    pub const fn new(events: Vec<SaxEvent>) -> Self {
        Self {
            events: Some(events),
        }
    }

    /// Creates a generator producing `<source>{src}</source>`.
    #[must_use]
    pub const fn echo() -> Self {
        Self { events: None }
    }
}

#[async_trait]
impl Generator for StaticGenerator {
    async fn generate(
        &self,
        _env: &Environment,
        source: Option<&str>,
        _params: &Parameters,
    ) -> SitemapResult<Vec<SaxEvent>> {
        Ok(match &self.events {
            Some(events) => events.clone(),
            None => SaxEvent::text_document("source", source.unwrap_or_default()),
        })
    }
}

/// A generator that always fails.
#[derive(Debug, Clone)]
pub struct FailingGenerator {
    message: String,
    not_found: bool,
}

impl FailingGenerator {
    /// Fails with a processing error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            not_found: false,
        }
    }

    /// Fails with a resource-not-found error for the source.
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            message: "Resource does not exist".to_string(),
            not_found: true,
        }
    }
}

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(
        &self,
        _env: &Environment,
        source: Option<&str>,
        _params: &Parameters,
    ) -> SitemapResult<Vec<SaxEvent>> {
        if self.not_found {
            Err(SitemapError::not_found(self.message.clone(), source.unwrap_or_default()))
        } else {
            Err(SitemapError::processing(self.message.clone()))
        }
    }
}

/// Upper-cases text events.
#[derive(Debug, Clone, Copy, Default)]
pub struct UppercaseTransformer;

#[async_trait]
impl Transformer for UppercaseTransformer {
    async fn transform(
        &self,
        _env: &Environment,
        _source: Option<&str>,
        _params: &Parameters,
        events: Vec<SaxEvent>,
    ) -> SitemapResult<Vec<SaxEvent>> {
        Ok(events
            .into_iter()
            .map(|event| match event {
                SaxEvent::Characters(text) => SaxEvent::Characters(text.to_uppercase()),
                other => other,
            })
            .collect())
    }
}

/// A reader returning a fixed body, or its source as the body.
#[derive(Debug, Clone, Default)]
pub struct StaticReader {
    body: Option<String>,
}

impl StaticReader {
    /// Creates a reader returning `body`.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
        }
    }

    /// Creates a reader returning its resolved source.
    #[must_use]
    pub const fn echo() -> Self {
        Self { body: None }
    }
}

#[async_trait]
impl Reader for StaticReader {
    async fn read(
        &self,
        _env: &Environment,
        source: Option<&str>,
        _params: &Parameters,
    ) -> SitemapResult<Vec<u8>> {
        let body = self.body.as_deref().or(source).unwrap_or_default();
        Ok(body.as_bytes().to_vec())
    }

    fn mime_type(&self) -> Option<String> {
        Some("text/plain".to_string())
    }
}

/// An interpreter recording calls; it answers with a `200` status
/// unless created silent.
#[derive(Debug, Default)]
pub struct RecordingInterpreter {
    silent: bool,
    scripts: Mutex<Vec<String>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl RecordingInterpreter {
    /// Creates a responding interpreter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an interpreter that never sends a response.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    /// Returns the registered scripts.
    #[must_use]
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }

    /// Returns `function:name` or `continuation:id` with the arguments
    /// of every call.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String, arguments: &[(String, String)], redirector: &Redirector, env: &Environment) {
        self.calls.lock().push((call, arguments.to_vec()));
        if !self.silent {
            redirector.send_status(env, 200);
        }
    }
}

#[async_trait]
impl Interpreter for RecordingInterpreter {
    fn register_scripts(&self, scripts: &[String]) -> Result<(), ConfigurationError> {
        self.scripts.lock().extend(scripts.iter().cloned());
        Ok(())
    }

    async fn call_function(
        &self,
        function: &str,
        arguments: &[(String, String)],
        redirector: &Redirector,
        env: &Environment,
    ) -> SitemapResult<()> {
        self.record(format!("function:{function}"), arguments, redirector, env);
        Ok(())
    }

    async fn handle_continuation(
        &self,
        continuation_id: &str,
        arguments: &[(String, String)],
        redirector: &Redirector,
        env: &Environment,
    ) -> SitemapResult<()> {
        self.record(format!("continuation:{continuation_id}"), arguments, redirector, env);
        Ok(())
    }
}

/// Serves fixed documents for non-`cocoon:` sources.
#[derive(Debug, Default)]
pub struct StaticSourceResolver {
    documents: HashMap<String, Vec<SaxEvent>>,
    resolved: AtomicUsize,
}

impl StaticSourceResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document `<element>text</element>` under `uri`.
    #[must_use]
    pub fn with_text(mut self, uri: impl Into<String>, element: &str, text: &str) -> Self {
        self.documents
            .insert(uri.into(), SaxEvent::text_document(element, text));
        self
    }

    /// Returns the number of successful resolutions.
    #[must_use]
    pub fn resolved(&self) -> usize {
        self.resolved.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceResolver for StaticSourceResolver {
    async fn resolve(&self, uri: &str, _env: &Environment) -> SitemapResult<Vec<SaxEvent>> {
        let events = self
            .documents
            .get(uri)
            .cloned()
            .ok_or_else(|| SitemapError::not_found("Unknown source", uri))?;
        self.resolved.fetch_add(1, Ordering::SeqCst);
        Ok(events)
    }
}

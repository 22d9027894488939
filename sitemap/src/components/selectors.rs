//! Built-in selectors.

use super::{Selector, SwitchContext, SwitchSelector};
use crate::core::Parameters;
use crate::environment::Environment;
use crate::errors::SitemapResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Parameter naming the request parameter to test.
pub const PARAMETER_NAME: &str = "parameter-name";

/// Parameter holding the value tested by [`ParameterSelector`].
pub const PARAMETER_SELECTOR_TEST: &str = "parameter-selector-test";

/// Selects on the value of a request parameter.
///
/// The parameter name comes from the `parameter-name` node parameter. The
/// value is read once per select node invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestParameterSelector;

impl RequestParameterSelector {
    fn value(env: &Environment, params: &Parameters) -> Option<String> {
        params.get(PARAMETER_NAME).and_then(|name| env.parameter(name))
    }
}

#[async_trait]
impl Selector for RequestParameterSelector {
    async fn select(
        &self,
        expression: &str,
        env: &Environment,
        params: &Parameters,
    ) -> SitemapResult<bool> {
        Ok(Self::value(env, params).as_deref() == Some(expression))
    }

    fn as_switch(self: Arc<Self>) -> Option<Arc<dyn SwitchSelector>> {
        Some(self)
    }
}

#[async_trait]
impl SwitchSelector for RequestParameterSelector {
    async fn selector_context(
        &self,
        env: &Environment,
        params: &Parameters,
    ) -> SitemapResult<SwitchContext> {
        Ok(Box::new(Self::value(env, params)))
    }

    fn select_with(&self, expression: &str, context: &SwitchContext) -> bool {
        context
            .downcast_ref::<Option<String>>()
            .and_then(Option::as_deref)
            == Some(expression)
    }
}

/// Compares each test against the `parameter-selector-test` parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterSelector;

#[async_trait]
impl Selector for ParameterSelector {
    async fn select(
        &self,
        expression: &str,
        _env: &Environment,
        params: &Parameters,
    ) -> SitemapResult<bool> {
        Ok(params.get(PARAMETER_SELECTOR_TEST) == Some(expression))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_parameter_switch() {
        let env = Environment::new("page").with_parameter("format", "pdf");
        let params = Parameters::new().with(PARAMETER_NAME, "format");
        let selector = Arc::new(RequestParameterSelector);

        let switch = selector.clone().as_switch().unwrap();
        let context = switch.selector_context(&env, &params).await.unwrap();
        assert!(switch.select_with("pdf", &context));
        assert!(!switch.select_with("html", &context));
        assert!(selector.select("pdf", &env, &params).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_request_parameter_never_selects() {
        let env = Environment::new("page");
        let params = Parameters::new().with(PARAMETER_NAME, "format");
        let selector = RequestParameterSelector;
        assert!(!selector.select("", &env, &params).await.unwrap());
    }

    #[tokio::test]
    async fn test_parameter_selector() {
        let env = Environment::new("page");
        let params = Parameters::new().with(PARAMETER_SELECTOR_TEST, "blue");
        assert!(ParameterSelector.select("blue", &env, &params).await.unwrap());
        assert!(!ParameterSelector.select("red", &env, &params).await.unwrap());
        assert!(Arc::new(ParameterSelector).as_switch().is_none());
    }
}

//! Built-in input modules.

use super::InputModule;
use crate::environment::Environment;
use crate::errors::SitemapResult;

/// Exposes request parameters as `{request-param:name}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestParamModule;

impl InputModule for RequestParamModule {
    fn attribute(&self, name: &str, env: &Environment) -> SitemapResult<Option<String>> {
        Ok(env.parameter(name))
    }
}

/// Exposes request headers as `{request-header:name}`.
///
/// Header names are matched case-insensitively.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestHeaderModule;

impl InputModule for RequestHeaderModule {
    fn attribute(&self, name: &str, env: &Environment) -> SitemapResult<Option<String>> {
        Ok(env.header(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_modules() {
        let env = Environment::new("index")
            .with_parameter("lang", "fr")
            .with_header("Accept", "text/html");

        assert_eq!(
            RequestParamModule.attribute("lang", &env).unwrap().as_deref(),
            Some("fr")
        );
        assert_eq!(RequestParamModule.attribute("missing", &env).unwrap(), None);
        assert_eq!(
            RequestHeaderModule.attribute("accept", &env).unwrap().as_deref(),
            Some("text/html")
        );
    }
}

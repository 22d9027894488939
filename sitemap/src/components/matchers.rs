//! Built-in URI matchers.

use super::{MatchResult, Matcher, PreparableMatcher, PreparedPattern};
use crate::core::Parameters;
use crate::environment::Environment;
use crate::errors::{codes, ConfigurationError, SitemapError, SitemapResult};
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

/// Matches the request URI against a wildcard pattern.
///
/// `*` matches within one path segment, `**` across segments and `\`
/// escapes the next character. Key `"0"` holds the whole URI and keys
/// `"1"`..`"n"` the wildcard captures.
#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardUriMatcher;

/// Compiles a wildcard pattern into an anchored regular expression.
///
/// # Errors
///
/// Returns a configuration error for a trailing escape character.
pub fn compile_wildcard(pattern: &str) -> Result<Regex, ConfigurationError> {
    let mut expression = String::with_capacity(pattern.len() * 2 + 2);
    expression.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().ok_or_else(|| {
                    ConfigurationError::coded(
                        codes::BAD_PATTERN,
                        format!("Wildcard pattern '{pattern}' ends with an escape character"),
                    )
                })?;
                expression.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
            }
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    expression.push_str("(.*)");
                } else {
                    expression.push_str("([^/]*)");
                }
            }
            other => expression.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    expression.push('$');
    compile_regex(pattern, &expression)
}

fn compile_regex(pattern: &str, expression: &str) -> Result<Regex, ConfigurationError> {
    Regex::new(expression).map_err(|e| {
        ConfigurationError::coded(codes::BAD_PATTERN, format!("Invalid pattern '{pattern}': {e}"))
    })
}

fn captures(regex: &Regex, subject: &str) -> Option<MatchResult> {
    let caps = regex.captures(subject)?;
    let mut result = MatchResult::new();
    for (index, group) in caps.iter().enumerate() {
        result.insert(
            index.to_string(),
            group.map_or_else(String::new, |m| m.as_str().to_string()),
        );
    }
    for name in regex.capture_names().flatten() {
        if let Some(m) = caps.name(name) {
            result.insert(name.to_string(), m.as_str().to_string());
        }
    }
    Some(result)
}

fn downcast(prepared: &PreparedPattern) -> SitemapResult<&Regex> {
    prepared
        .downcast_ref::<Regex>()
        .ok_or_else(|| SitemapError::processing("Prepared pattern was not compiled by this matcher"))
}

#[async_trait]
impl Matcher for WildcardUriMatcher {
    async fn matches(
        &self,
        pattern: &str,
        env: &Environment,
        _params: &Parameters,
    ) -> SitemapResult<Option<MatchResult>> {
        let regex = compile_wildcard(pattern)?;
        Ok(captures(&regex, &env.uri()))
    }

    fn as_preparable(self: Arc<Self>) -> Option<Arc<dyn PreparableMatcher>> {
        Some(self)
    }
}

#[async_trait]
impl PreparableMatcher for WildcardUriMatcher {
    fn prepare(&self, pattern: &str) -> Result<PreparedPattern, ConfigurationError> {
        Ok(Arc::new(compile_wildcard(pattern)?))
    }

    async fn prepared_match(
        &self,
        prepared: &PreparedPattern,
        env: &Environment,
        _params: &Parameters,
    ) -> SitemapResult<Option<MatchResult>> {
        Ok(captures(downcast(prepared)?, &env.uri()))
    }
}

/// Matches the request URI against an anchored regular expression.
///
/// Numbered groups are bound as `"0"`..`"n"`, named groups by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexpUriMatcher;

fn compile_anchored(pattern: &str) -> Result<Regex, ConfigurationError> {
    compile_regex(pattern, &format!("^(?:{pattern})$"))
}

#[async_trait]
impl Matcher for RegexpUriMatcher {
    async fn matches(
        &self,
        pattern: &str,
        env: &Environment,
        _params: &Parameters,
    ) -> SitemapResult<Option<MatchResult>> {
        let regex = compile_anchored(pattern)?;
        Ok(captures(&regex, &env.uri()))
    }

    fn as_preparable(self: Arc<Self>) -> Option<Arc<dyn PreparableMatcher>> {
        Some(self)
    }
}

#[async_trait]
impl PreparableMatcher for RegexpUriMatcher {
    fn prepare(&self, pattern: &str) -> Result<PreparedPattern, ConfigurationError> {
        Ok(Arc::new(compile_anchored(pattern)?))
    }

    async fn prepared_match(
        &self,
        prepared: &PreparedPattern,
        env: &Environment,
        _params: &Parameters,
    ) -> SitemapResult<Option<MatchResult>> {
        Ok(captures(downcast(prepared)?, &env.uri()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_star_stays_in_segment() {
        let regex = compile_wildcard("docs/*.html").unwrap();
        let result = captures(&regex, "docs/index.html").unwrap();
        assert_eq!(result.get("1").unwrap(), "index");
        assert_eq!(result.get("0").unwrap(), "docs/index.html");
        assert!(captures(&regex, "docs/api/index.html").is_none());
    }

    #[test]
    fn test_double_star_crosses_segments() {
        let regex = compile_wildcard("docs/**").unwrap();
        let result = captures(&regex, "docs/api/index.html").unwrap();
        assert_eq!(result.get("1").unwrap(), "api/index.html");
    }

    #[test]
    fn test_escape() {
        let regex = compile_wildcard(r"a\*b").unwrap();
        assert!(captures(&regex, "a*b").is_some());
        assert!(captures(&regex, "axb").is_none());
        assert!(compile_wildcard("trailing\\").is_err());
    }

    #[test]
    fn test_regex_special_characters_are_literal() {
        let regex = compile_wildcard("file.(x)").unwrap();
        assert!(captures(&regex, "file.(x)").is_some());
        assert!(captures(&regex, "fileX(x)").is_none());
    }

    #[tokio::test]
    async fn test_prepared_wildcard_match() {
        let matcher = Arc::new(WildcardUriMatcher);
        let prepared = matcher.prepare("*/index").unwrap();
        let env = Environment::new("/news/index");

        let result = matcher
            .prepared_match(&prepared, &env, &Parameters::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.get("1").unwrap(), "news");
        assert!(matcher.as_preparable().is_some());
    }

    #[tokio::test]
    async fn test_regexp_named_groups() {
        let matcher = RegexpUriMatcher;
        let env = Environment::new("articles/2024");
        let result = matcher
            .matches(r"articles/(?P<year>\d{4})", &env, &Parameters::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.get("year").unwrap(), "2024");
        assert_eq!(result.get("1").unwrap(), "2024");
        assert!(matcher.prepare("(").is_err());
    }
}

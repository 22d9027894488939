//! Compiled expressions.

use super::MapStack;
use crate::components::{ComponentRegistry, InputModule};
use crate::environment::Environment;
use crate::errors::{codes, ConfigurationError, SitemapError, SitemapResult};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
enum Token {
    Text(String),
    Sitemap {
        levels_up: usize,
        key: String,
    },
    Anchor {
        anchor: String,
        key: String,
    },
    Module {
        name: String,
        module: Arc<dyn InputModule>,
        attribute: Vec<Token>,
    },
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Sitemap { levels_up, key } => f
                .debug_struct("Sitemap")
                .field("levels_up", levels_up)
                .field("key", key)
                .finish(),
            Self::Anchor { anchor, key } => f
                .debug_struct("Anchor")
                .field("anchor", anchor)
                .field("key", key)
                .finish(),
            Self::Module {
                name, attribute, ..
            } => f
                .debug_struct("Module")
                .field("name", name)
                .field("attribute", attribute)
                .finish_non_exhaustive(),
        }
    }
}

/// An attribute value compiled once, evaluated per request.
#[derive(Debug, Clone)]
pub struct VariableResolver {
    expression: String,
    tokens: Option<Vec<Token>>,
}

fn bad_pattern(expression: &str, problem: &str) -> ConfigurationError {
    ConfigurationError::coded(
        codes::BAD_PATTERN,
        format!("Malformed expression '{expression}': {problem}"),
    )
}

/// Byte offset of the brace closing the one opened at `open`.
fn closing_brace(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut index = open;
    while index < bytes.len() {
        match bytes[index] {
            b'\\' => index += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
        index += 1;
    }
    None
}

/// Byte offset of the first `:` outside nested braces.
fn module_separator(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (index, byte) in text.bytes().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b':' if depth == 0 => return Some(index),
            _ => {}
        }
    }
    None
}

fn parse_tokens(
    expression: &str,
    text: &str,
    registry: &ComponentRegistry,
) -> Result<Vec<Token>, ConfigurationError> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = text.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(&(_, escaped @ ('{' | '}'))) => {
                    literal.push(escaped);
                    chars.next();
                }
                _ => literal.push('\\'),
            },
            '{' => {
                let close = closing_brace(text, index)
                    .ok_or_else(|| bad_pattern(expression, "unbalanced '{'"))?;
                if !literal.is_empty() {
                    tokens.push(Token::Text(std::mem::take(&mut literal)));
                }
                tokens.push(parse_variable(expression, &text[index + 1..close], registry)?);
                while chars.peek().is_some_and(|&(next, _)| next <= close) {
                    chars.next();
                }
            }
            '}' => return Err(bad_pattern(expression, "unbalanced '}'")),
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        tokens.push(Token::Text(literal));
    }
    Ok(tokens)
}

fn parse_variable(
    expression: &str,
    inner: &str,
    registry: &ComponentRegistry,
) -> Result<Token, ConfigurationError> {
    if inner.is_empty() {
        return Err(bad_pattern(expression, "empty variable"));
    }
    if let Some(anchored) = inner.strip_prefix('#') {
        let (anchor, key) = anchored
            .split_once(':')
            .ok_or_else(|| bad_pattern(expression, "anchored variable needs '#name:key'"))?;
        return Ok(Token::Anchor {
            anchor: anchor.to_string(),
            key: key.to_string(),
        });
    }
    if let Some(separator) = module_separator(inner).filter(|&s| s > 0) {
        let name = &inner[..separator];
        let module = registry.input_module(name).map_err(|_| {
            ConfigurationError::coded(
                codes::BAD_PATTERN,
                format!("Unknown input module '{name}' in '{expression}'"),
            )
        })?;
        return Ok(Token::Module {
            name: name.to_string(),
            module,
            attribute: parse_tokens(expression, &inner[separator + 1..], registry)?,
        });
    }
    let mut key = inner;
    let mut levels_up = 0;
    while let Some(rest) = key.strip_prefix("../") {
        levels_up += 1;
        key = rest;
    }
    Ok(Token::Sitemap {
        levels_up,
        key: key.to_string(),
    })
}

fn resolve_tokens(
    expression: &str,
    tokens: &[Token],
    maps: &MapStack,
    env: &Environment,
) -> SitemapResult<String> {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Sitemap { levels_up, key } => {
                let frame = maps.level(*levels_up).ok_or_else(|| {
                    SitemapError::processing(format!(
                        "Error while evaluating '{expression}': not so many levels"
                    ))
                })?;
                if let Some(value) = frame.values.get(key) {
                    out.push_str(value);
                }
            }
            Token::Anchor { anchor, key } => {
                let frame = maps.anchored(anchor).ok_or_else(|| {
                    SitemapError::processing(format!(
                        "Error while evaluating '{expression}': no anchor '#{anchor}'"
                    ))
                })?;
                if let Some(value) = frame.values.get(key) {
                    out.push_str(value);
                }
            }
            Token::Module {
                module, attribute, ..
            } => {
                let name = resolve_tokens(expression, attribute, maps, env)?;
                if let Some(value) = module.attribute(&name, env)? {
                    out.push_str(&value);
                }
            }
        }
    }
    Ok(out)
}

impl VariableResolver {
    /// Compiles an expression, looking up input modules in `registry`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unbalanced braces, malformed
    /// variables or unknown input modules.
    pub fn parse(expression: &str, registry: &ComponentRegistry) -> Result<Self, ConfigurationError> {
        let tokens = parse_tokens(expression, expression, registry)?;
        let tokens = match tokens.as_slice() {
            [] => None,
            [Token::Text(text)] if text == expression => None,
            [Token::Text(text)] => return Ok(Self::literal(text.clone())),
            _ => Some(tokens),
        };
        Ok(Self {
            expression: expression.to_string(),
            tokens,
        })
    }

    /// A literal value.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            expression: value.into(),
            tokens: None,
        }
    }

    /// Returns true if the value never depends on the request.
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        self.tokens.is_none()
    }

    /// Returns the source text, or the unescaped value for literals.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Evaluates the expression.
    ///
    /// # Errors
    ///
    /// Returns a processing error when a referenced map level or anchor is
    /// not bound, and propagates input module failures.
    pub fn resolve(&self, maps: &MapStack, env: &Environment) -> SitemapResult<String> {
        match &self.tokens {
            None => Ok(self.expression.clone()),
            Some(tokens) => resolve_tokens(&self.expression, tokens, maps, env),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::MatchResult;
    use pretty_assertions::assert_eq;

    fn map(pairs: &[(&str, &str)]) -> MatchResult {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn registry() -> ComponentRegistry {
        ComponentRegistry::with_builtins()
    }

    #[test]
    fn test_plain_text_is_literal() {
        let resolver = VariableResolver::parse("docs/index.xml", &registry()).unwrap();
        assert!(resolver.is_literal());
        assert_eq!(resolver.expression(), "docs/index.xml");
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        let resolver = VariableResolver::parse(r"\d\{4\}", &registry()).unwrap();
        assert!(resolver.is_literal());
        assert_eq!(resolver.expression(), r"\d{4}");
    }

    #[test]
    fn test_levels_and_anchors() {
        let mut maps = MapStack::new();
        maps.push(Some("section".to_string()), map(&[("1", "news")]));
        maps.push(None, map(&[("1", "today"), ("format", "pdf")]));
        let env = Environment::new("news/today");

        let resolve = |expression: &str| {
            VariableResolver::parse(expression, &registry())
                .unwrap()
                .resolve(&maps, &env)
                .unwrap()
        };
        assert_eq!(resolve("{../1}/{1}.{format}"), "news/today.pdf");
        assert_eq!(resolve("{#section:1}"), "news");
        assert_eq!(resolve("[{missing}]"), "[]");
    }

    #[test]
    fn test_too_many_levels_is_processing_error() {
        let resolver = VariableResolver::parse("{../../1}", &registry()).unwrap();
        let mut maps = MapStack::new();
        maps.push(None, map(&[("1", "x")]));
        let err = resolver.resolve(&maps, &Environment::new("x")).unwrap_err();
        assert!(matches!(err, SitemapError::Processing(_)));
    }

    #[test]
    fn test_module_with_nested_expression() {
        let resolver = VariableResolver::parse("{request-param:{1}}", &registry()).unwrap();
        let mut maps = MapStack::new();
        maps.push(None, map(&[("1", "lang")]));
        let env = Environment::new("page").with_parameter("lang", "de");

        assert!(!resolver.is_literal());
        assert_eq!(resolver.resolve(&maps, &env).unwrap(), "de");
    }

    #[test]
    fn test_malformed_expressions_fail_at_build_time() {
        for expression in ["{1", "1}", "{}", "{#anchor}", "{session-attr:user}"] {
            let err = VariableResolver::parse(expression, &registry()).unwrap_err();
            assert_eq!(err.code(), Some(codes::BAD_PATTERN), "{expression}");
        }
    }
}

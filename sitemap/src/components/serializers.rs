//! Built-in serializers.

use super::Serializer;
use crate::core::{ElementName, Parameters, SaxEvent};
use crate::environment::Environment;
use crate::errors::SitemapResult;
use async_trait::async_trait;
use std::collections::HashMap;

/// Renders content events as XML text.
///
/// Namespace declarations are emitted on the first element that uses a
/// prefix in scope. The XML declaration is written unless the
/// `omit-xml-declaration` parameter is `true`.
#[derive(Debug, Clone)]
pub struct XmlSerializer {
    mime_type: String,
}

impl Default for XmlSerializer {
    fn default() -> Self {
        Self {
            mime_type: "text/xml".to_string(),
        }
    }
}

impl XmlSerializer {
    /// Creates a serializer reporting a custom content type.
    #[must_use]
    pub fn with_mime_type(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
        }
    }

    /// Renders events to a string.
    #[must_use]
    pub fn render(events: &[SaxEvent], declaration: bool) -> String {
        let mut out = String::new();
        if declaration {
            out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        }
        let mut scopes: Vec<HashMap<String, String>> = vec![HashMap::new()];
        for event in events {
            match event {
                SaxEvent::StartDocument | SaxEvent::EndDocument => {}
                SaxEvent::StartElement { name, attributes } => {
                    let mut scope = scopes.last().cloned().unwrap_or_default();
                    out.push('<');
                    out.push_str(&name.qname());
                    if let Some(declaration) = declare(&mut scope, name) {
                        out.push_str(&declaration);
                    }
                    for (key, value) in attributes {
                        out.push(' ');
                        out.push_str(key);
                        out.push_str("=\"");
                        out.push_str(&escape(value, true));
                        out.push('"');
                    }
                    out.push('>');
                    scopes.push(scope);
                }
                SaxEvent::EndElement { name } => {
                    scopes.pop();
                    out.push_str("</");
                    out.push_str(&name.qname());
                    out.push('>');
                }
                SaxEvent::Characters(text) => out.push_str(&escape(text, false)),
            }
        }
        out
    }
}

fn declare(scope: &mut HashMap<String, String>, name: &ElementName) -> Option<String> {
    if name.namespace.is_empty() && name.prefix.is_empty() {
        return None;
    }
    if scope.get(&name.prefix) == Some(&name.namespace) {
        return None;
    }
    scope.insert(name.prefix.clone(), name.namespace.clone());
    let attribute = if name.prefix.is_empty() {
        "xmlns".to_string()
    } else {
        format!("xmlns:{}", name.prefix)
    };
    Some(format!(" {attribute}=\"{}\"", escape(&name.namespace, true)))
}

fn escape(text: &str, attribute: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if attribute => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[async_trait]
impl Serializer for XmlSerializer {
    async fn serialize(
        &self,
        _env: &Environment,
        params: &Parameters,
        events: &[SaxEvent],
    ) -> SitemapResult<Vec<u8>> {
        let declaration = params.get("omit-xml-declaration") != Some("true");
        Ok(Self::render(events, declaration).into_bytes())
    }

    fn mime_type(&self) -> Option<String> {
        Some(self.mime_type.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_escapes_text_and_attributes() {
        let events = SaxEvent::document([
            SaxEvent::StartElement {
                name: ElementName::local("p"),
                attributes: vec![("title".to_string(), "a \"b\"".to_string())],
            },
            SaxEvent::text("1 < 2 & 3"),
            SaxEvent::end("p"),
        ]);
        assert_eq!(
            XmlSerializer::render(&events, false),
            "<p title=\"a &quot;b&quot;\">1 &lt; 2 &amp; 3</p>"
        );
    }

    #[test]
    fn test_namespace_declared_once() {
        let ns = |local: &str| ElementName::qualified("urn:x", "x", local);
        let events = vec![
            SaxEvent::StartElement { name: ns("a"), attributes: Vec::new() },
            SaxEvent::StartElement { name: ns("b"), attributes: Vec::new() },
            SaxEvent::EndElement { name: ns("b") },
            SaxEvent::EndElement { name: ns("a") },
        ];
        assert_eq!(
            XmlSerializer::render(&events, true),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><x:a xmlns:x=\"urn:x\"><x:b></x:b></x:a>"
        );
    }

    #[tokio::test]
    async fn test_serialize_honours_declaration_parameter() {
        let env = Environment::new("doc");
        let params = Parameters::new().with("omit-xml-declaration", "true");
        let bytes = XmlSerializer::default()
            .serialize(&env, &params, &SaxEvent::text_document("doc", "hi"))
            .await
            .unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "<doc>hi</doc>");
        assert_eq!(XmlSerializer::default().mime_type().as_deref(), Some("text/xml"));
    }
}

//! The response under construction.

use serde::{Deserialize, Serialize};

/// The response produced by a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Status code, `None` until a node sets one.
    pub status: Option<u16>,
    /// Content type of the body.
    pub content_type: Option<String>,
    /// Response body.
    #[serde(default)]
    pub body: Vec<u8>,
    /// Redirect target for 3xx responses.
    pub location: Option<String>,
}

impl Response {
    /// Returns the effective status code.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    /// Returns the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns true if the response is a redirect.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        self.location.is_some() && (300..400).contains(&self.status_code())
    }

    /// Discards everything buffered so far.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_discards_buffered_output() {
        let mut response = Response {
            status: Some(302),
            content_type: Some("text/html".to_string()),
            body: b"partial".to_vec(),
            location: Some("elsewhere".to_string()),
        };
        assert!(response.is_redirect());

        response.reset();
        assert_eq!(response, Response::default());
        assert_eq!(response.status_code(), 200);
    }
}

use std::time::Duration;

use bytes::Bytes;
use http::HeaderMap;
use http::header::{CONTENT_TYPE, HeaderValue};

/// Outcome of performing a compiled request.
///
/// Pseudo-schemes synthesize the same envelope so that checks never need to
/// know how the response was produced.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub header: HeaderMap,
    pub body: Bytes,
    pub duration: Duration,
    /// Every URL a redirect pointed to, in order.
    pub redirections: Vec<String>,
    /// URL of the final response.
    pub url: String,
}

impl Response {
    pub fn synthetic(status: u16, status_text: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: status_text.to_string(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: http::HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.header.append(name, value);
        }
        self
    }

    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.header.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn header_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.header
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    pub fn status_line(&self) -> String {
        format!("{} {}", self.status, self.status_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_response_carries_headers() {
        let response = Response::synthetic(200, "OK", "hello")
            .with_header(CONTENT_TYPE, "text/plain")
            .with_header(http::HeaderName::from_static("x-a"), "1")
            .with_header(http::HeaderName::from_static("x-a"), "2");

        assert_eq!(response.status_line(), "200 OK");
        assert_eq!(response.body_str(), "hello");
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(response.header_values("X-A").collect::<Vec<_>>(), vec!["1", "2"]);
    }
}

//! Recorded HTTP response

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{body, find_header_key, replace_in_body, Headers};

/// Response status line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    /// Status code
    pub code: u16,
    /// Reason phrase
    #[serde(default)]
    pub message: String,
}

/// A recorded HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    status: ResponseStatus,
    #[serde(default)]
    headers: Headers,
    #[serde(default, with = "body")]
    body: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    http_version: Option<String>,
}

impl Response {
    /// Create a response with the given status code and no body
    #[must_use]
    pub fn new(code: u16) -> Self {
        Self {
            status: ResponseStatus {
                code,
                message: String::new(),
            },
            headers: Headers::new(),
            body: Bytes::new(),
            http_version: None,
        }
    }

    /// Set the reason phrase
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.status.message = message.into();
        self
    }

    /// Add a header value
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the HTTP version string (e.g. "1.1")
    #[must_use]
    pub fn with_http_version(mut self, version: impl Into<String>) -> Self {
        self.http_version = Some(version.into());
        self
    }

    /// Status line
    #[must_use]
    pub fn status(&self) -> &ResponseStatus {
        &self.status
    }

    /// Headers
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Values of a header, looked up case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&[String]> {
        find_header_key(&self.headers, name)
            .and_then(|key| self.headers.get(key))
            .map(Vec::as_slice)
    }

    /// Body bytes
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// HTTP version, when known
    #[must_use]
    pub fn http_version(&self) -> Option<&str> {
        self.http_version.as_deref()
    }

    /// Length of the body in bytes
    #[must_use]
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Rewrite an existing content-length header to match the body.
    ///
    /// Responses without the header are left alone.
    pub(crate) fn update_content_length_header(&mut self) {
        let length = self.content_length().to_string();
        if let Some(key) = find_header_key(&self.headers, "content-length").map(str::to_string) {
            self.headers.insert(key, vec![length]);
        }
    }

    pub(crate) fn filter_text(&mut self, from: &str, to: &str) {
        for values in self.headers.values_mut() {
            for value in values.iter_mut() {
                *value = value.replace(from, to);
            }
        }
        self.body = replace_in_body(&self.body, from, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_content_length_header() {
        let mut response = Response::new(200)
            .with_header("Content-Length", "999")
            .with_body("hello");
        response.update_content_length_header();
        assert_eq!(response.header("content-length").unwrap(), ["5".to_string()]);
    }

    #[test]
    fn test_update_content_length_without_header() {
        let mut response = Response::new(200).with_body("hello");
        response.update_content_length_header();
        assert!(response.header("Content-Length").is_none());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let response = Response::new(204).with_header("X-Request-Id", "abc");
        assert_eq!(response.header("x-request-id").unwrap(), ["abc".to_string()]);
        assert!(response.header("x-other").is_none());
    }
}

//! Recorded HTTP request

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use hyper::Uri;
use serde::{Deserialize, Deserializer, Serialize};

use super::{body, replace_in_body, Headers};
use crate::{Result, VcrError};

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
    /// TRACE
    Trace,
    /// CONNECT
    Connect,
}

impl Method {
    /// Uppercase wire name of the method
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = VcrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "TRACE" => Ok(Self::Trace),
            "CONNECT" => Ok(Self::Connect),
            other => Err(VcrError::Http(format!("Invalid HTTP method '{other}'"))),
        }
    }
}

/// An outgoing HTTP request, immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    method: Method,
    #[serde(deserialize_with = "deserialize_uri")]
    uri: String,
    #[serde(default)]
    headers: Headers,
    #[serde(default, with = "body")]
    body: Bytes,
}

impl Request {
    /// Create a request; the URI is normalized
    #[must_use]
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: normalize_uri(uri),
            headers: Headers::new(),
            body: Bytes::new(),
        }
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

    /// Request method
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Normalized URI
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Headers; names keep the case they were recorded with
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Body bytes; empty means no body
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Lowercase host, if the URI is absolute
    #[must_use]
    pub fn host(&self) -> Option<String> {
        self.uri
            .parse::<Uri>()
            .ok()
            .and_then(|uri| uri.host().map(str::to_ascii_lowercase))
    }

    /// Path component of the URI
    #[must_use]
    pub fn path(&self) -> String {
        match self.uri.parse::<Uri>() {
            Ok(uri) => uri.path().to_string(),
            Err(_) => self
                .uri
                .split_once('?')
                .map_or(self.uri.as_str(), |(path, _)| path)
                .to_string(),
        }
    }

    /// Raw query string, without the leading `?`
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    /// Decoded query parameters, sorted by key then value
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .query()
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(key), decode_component(value))
            })
            .collect();
        pairs.sort();
        pairs
    }

    pub(crate) fn filter_text(&mut self, from: &str, to: &str) {
        self.uri = self.uri.replace(from, to);
        for values in self.headers.values_mut() {
            for value in values.iter_mut() {
                *value = value.replace(from, to);
            }
        }
        self.body = replace_in_body(&self.body, from, to);
    }
}

/// Normalize a request URI
///
/// Lowercases scheme and host, drops default ports, and ensures a path.
/// URIs that do not parse as absolute are only trimmed.
#[must_use]
pub fn normalize_uri(uri: &str) -> String {
    let trimmed = uri.trim();

    let Ok(parsed) = trimmed.parse::<Uri>() else {
        return trimmed.to_string();
    };
    let (Some(scheme), Some(host)) = (parsed.scheme_str(), parsed.host()) else {
        return trimmed.to_string();
    };

    let scheme = scheme.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();
    let port = match (scheme.as_str(), parsed.port_u16()) {
        ("http", Some(80)) | ("https", Some(443)) | (_, None) => String::new(),
        (_, Some(port)) => format!(":{port}"),
    };
    let path_and_query = parsed
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/");
    let path_and_query = if path_and_query.starts_with('/') {
        path_and_query.to_string()
    } else {
        format!("/{path_and_query}")
    };

    format!("{scheme}://{host}{port}{path_and_query}")
}

/// Stored URIs go through the same normalization as runtime requests
fn deserialize_uri<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    String::deserialize(deserializer).map(|uri| normalize_uri(&uri))
}

fn decode_component(component: &str) -> String {
    let spaced = component.replace('+', " ");
    urlencoding::decode(&spaced).map_or(spaced.clone(), |decoded| decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_uri_is_normalized() {
        let stored = serde_json::json!({"method": "get", "uri": "HTTP://Example.COM:80/x"});
        let request: Request = serde_json::from_value(stored).unwrap();
        assert_eq!(request, Request::new(Method::Get, "http://example.com/x"));
    }

    #[test]
    fn test_normalize_uri() {
        assert_eq!(
            normalize_uri("  HTTP://Example.COM:80/a?b=1 "),
            "http://example.com/a?b=1"
        );
        assert_eq!(normalize_uri("https://example.com:443"), "https://example.com/");
        assert_eq!(
            normalize_uri("http://example.com:8080/x"),
            "http://example.com:8080/x"
        );
        assert_eq!(normalize_uri("/relative/path"), "/relative/path");
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!(" Delete ".parse::<Method>().unwrap(), Method::Delete);
        assert!("FETCH".parse::<Method>().is_err());
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }

    #[test]
    fn test_uri_components() {
        let request = Request::new(Method::Get, "http://API.example.com/v1/items?b=2&a=hello%20world");
        assert_eq!(request.host().as_deref(), Some("api.example.com"));
        assert_eq!(request.path(), "/v1/items");
        assert_eq!(request.query(), Some("b=2&a=hello%20world"));
        assert_eq!(
            request.query_pairs(),
            vec![
                ("a".to_string(), "hello world".to_string()),
                ("b".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_relative_uri_has_no_host() {
        let request = Request::new(Method::Get, "/only/path?x=1");
        assert_eq!(request.host(), None);
        assert_eq!(request.path(), "/only/path");
    }

    #[test]
    fn test_filter_text() {
        let mut request = Request::new(Method::Post, "http://example.com/?token=s3cret")
            .with_header("Authorization", "Bearer s3cret")
            .with_body("key=s3cret");
        request.filter_text("s3cret", "<TOKEN>");

        assert_eq!(request.uri(), "http://example.com/?token=<TOKEN>");
        assert_eq!(request.headers()["Authorization"], vec!["Bearer <TOKEN>"]);
        assert_eq!(request.body().as_ref(), b"key=<TOKEN>");
    }
}

//! Named request matchers
//!
//! A matcher is a pure predicate over two requests. Cassettes name the
//! matchers they want in `match_requests_on`; two requests match the set
//! only when every named matcher agrees.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::interaction::Request;
use crate::{Result, VcrError};

/// Matcher predicate
pub type MatcherFn = dyn Fn(&Request, &Request) -> bool + Send + Sync;

/// Matchers used when a cassette does not choose its own
pub const DEFAULT_MATCHERS: [&str; 2] = ["method", "uri"];

/// Registry of matchers keyed by name
pub struct MatcherRegistry {
    matchers: DashMap<String, Arc<MatcherFn>>,
}

impl MatcherRegistry {
    /// Create a registry holding the built-in matchers
    #[must_use]
    pub fn new() -> Self {
        let registry = Self {
            matchers: DashMap::new(),
        };

        registry.register("method", |a, b| a.method() == b.method());
        registry.register("uri", |a, b| a.uri() == b.uri());
        registry.register("body", |a, b| a.body() == b.body());
        registry.register("headers", |a, b| {
            normalized_headers(a) == normalized_headers(b)
        });
        registry.register("host", |a, b| a.host() == b.host());
        registry.register("path", |a, b| a.path() == b.path());
        registry.register("query", |a, b| a.query_pairs() == b.query_pairs());
        registry.register("uri_without_query", |a, b| {
            uri_without_query(a) == uri_without_query(b)
        });
        registry.register("body_as_json", body_as_json);

        registry
    }

    /// Register (or replace) a matcher under `name`
    pub fn register<F>(&self, name: impl Into<String>, matcher: F)
    where
        F: Fn(&Request, &Request) -> bool + Send + Sync + 'static,
    {
        self.matchers.insert(name.into(), Arc::new(matcher));
    }

    /// Look up a matcher by name
    ///
    /// # Errors
    ///
    /// Returns error if no matcher is registered under `name`
    pub fn get(&self, name: &str) -> Result<Arc<MatcherFn>> {
        self.matchers
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| VcrError::UnregisteredMatcher(name.to_string()))
    }

    /// Resolve an ordered list of matcher names into a matcher set
    ///
    /// # Errors
    ///
    /// Returns error if any name is unregistered
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<RequestMatchers> {
        let matchers = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.get(name).map(|matcher| (name.to_string(), matcher))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RequestMatchers { matchers })
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.matchers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered, resolved matcher set
#[derive(Clone)]
pub struct RequestMatchers {
    matchers: Vec<(String, Arc<MatcherFn>)>,
}

impl RequestMatchers {
    /// Whether `a` and `b` match under every matcher in the set
    #[must_use]
    pub fn matches(&self, a: &Request, b: &Request) -> bool {
        self.matchers.iter().all(|(_, matcher)| matcher(a, b))
    }

    /// Matcher names in order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.matchers.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl fmt::Debug for RequestMatchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn normalized_headers(request: &Request) -> BTreeMap<String, Vec<String>> {
    let mut normalized: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, values) in request.headers() {
        normalized
            .entry(name.to_lowercase())
            .or_default()
            .extend(values.iter().map(|value| value.trim().to_string()));
    }
    normalized
}

fn uri_without_query(request: &Request) -> &str {
    request
        .uri()
        .split_once('?')
        .map_or(request.uri(), |(base, _)| base)
}

fn body_as_json(a: &Request, b: &Request) -> bool {
    let parsed_a = serde_json::from_slice::<serde_json::Value>(a.body());
    let parsed_b = serde_json::from_slice::<serde_json::Value>(b.body());
    match (parsed_a, parsed_b) {
        (Ok(json_a), Ok(json_b)) => json_a == json_b,
        _ => a.body() == b.body(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::Method;

    fn get(uri: &str) -> Request {
        Request::new(Method::Get, uri)
    }

    #[test]
    fn test_default_matchers() {
        let registry = MatcherRegistry::new();
        let matchers = registry.resolve(&DEFAULT_MATCHERS).unwrap();

        assert!(matchers.matches(&get("http://a.com/x"), &get("http://a.com/x")));
        assert!(!matchers.matches(&get("http://a.com/x"), &get("http://a.com/y")));
        assert!(!matchers.matches(
            &get("http://a.com/x"),
            &Request::new(Method::Post, "http://a.com/x")
        ));
    }

    #[test]
    fn test_host_and_path() {
        let registry = MatcherRegistry::new();
        let host = registry.resolve(&["host"]).unwrap();
        let path = registry.resolve(&["path"]).unwrap();

        let a = get("http://a.com/one?x=1");
        let b = get("http://a.com/two");
        let c = get("http://b.com/one");

        assert!(host.matches(&a, &b));
        assert!(!host.matches(&a, &c));
        assert!(path.matches(&a, &c));
        assert!(!path.matches(&a, &b));
    }

    #[test]
    fn test_query_ignores_order_and_encoding() {
        let registry = MatcherRegistry::new();
        let query = registry.resolve(&["query"]).unwrap();

        assert!(query.matches(
            &get("http://a.com/?b=2&a=hello%20world"),
            &get("http://z.com/other?a=hello+world&b=2")
        ));
        assert!(!query.matches(&get("http://a.com/?a=1"), &get("http://a.com/?a=2")));
    }

    #[test]
    fn test_headers_case_insensitive_names() {
        let registry = MatcherRegistry::new();
        let headers = registry.resolve(&["headers"]).unwrap();

        let a = get("http://a.com/").with_header("Accept", "text/html");
        let b = get("http://a.com/").with_header("accept", " text/html ");
        let c = get("http://a.com/").with_header("Accept", "text/plain");

        assert!(headers.matches(&a, &b));
        assert!(!headers.matches(&a, &c));
    }

    #[test]
    fn test_body_and_body_as_json() {
        let registry = MatcherRegistry::new();
        let body = registry.resolve(&["body"]).unwrap();
        let json = registry.resolve(&["body_as_json"]).unwrap();

        let a = get("http://a.com/").with_body(r#"{"a":1,"b":2}"#);
        let b = get("http://a.com/").with_body(r#"{ "b": 2, "a": 1 }"#);

        assert!(!body.matches(&a, &b));
        assert!(json.matches(&a, &b));
        assert!(json.matches(
            &get("http://a.com/").with_body("not json"),
            &get("http://a.com/").with_body("not json")
        ));
    }

    #[test]
    fn test_uri_without_query() {
        let registry = MatcherRegistry::new();
        let matchers = registry.resolve(&["uri_without_query"]).unwrap();
        assert!(matchers.matches(&get("http://a.com/x?t=1"), &get("http://a.com/x?t=2")));
    }

    #[test]
    fn test_custom_matcher() {
        let registry = MatcherRegistry::new();
        registry.register("port_agnostic_host", |a, b| a.host() == b.host());

        let matchers = registry.resolve(&["method", "port_agnostic_host"]).unwrap();
        assert_eq!(matchers.names(), vec!["method", "port_agnostic_host"]);
        assert!(matchers.matches(&get("http://a.com:8080/x"), &get("http://a.com/y")));
    }

    #[test]
    fn test_unregistered_matcher() {
        let registry = MatcherRegistry::new();
        let result = registry.resolve(&["method", "nope"]);
        assert!(matches!(result, Err(VcrError::UnregisteredMatcher(name)) if name == "nope"));
    }

    #[test]
    fn test_builtin_names() {
        let names = MatcherRegistry::new().names();
        for builtin in ["method", "uri", "body", "headers", "host", "path", "query"] {
            assert!(names.iter().any(|n| n == builtin), "missing {builtin}");
        }
    }
}

//! Live HTTP executor backed by hyper

use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Uri, Version};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use crate::interaction::{Request, Response};
use crate::transport::LiveExecutor;
use crate::{Result, VcrError};

/// Performs real HTTP calls when a cassette allows them.
///
/// Uses a plain HTTP connector; `https` URIs are rejected by the connector.
pub struct HttpExecutor {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpExecutor {
    /// Create a new executor
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build_http();

        Self { client }
    }
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveExecutor for HttpExecutor {
    async fn execute(&self, request: &Request) -> Result<Response> {
        let uri = request
            .uri()
            .parse::<Uri>()
            .map_err(|e| VcrError::Http(format!("Invalid URI '{}': {e}", request.uri())))?;
        let method = request
            .method()
            .as_str()
            .parse::<hyper::Method>()
            .map_err(|e| VcrError::Http(format!("Invalid HTTP method: {e}")))?;

        debug!("Live {} {}", method, uri);

        let mut builder = hyper::Request::builder().method(method).uri(uri);
        for (name, values) in request.headers() {
            for value in values {
                builder = builder.header(name, value);
            }
        }
        let http_request = builder
            .body(Full::new(request.body().clone()))
            .map_err(|e| VcrError::Http(format!("Failed to build request: {e}")))?;

        let response = self.client.request(http_request).await.map_err(|e| {
            warn!("Request failed: {e}");
            VcrError::Http(format!("Request failed: {e}"))
        })?;

        let status = response.status();
        let mut converted = Response::new(status.as_u16())
            .with_message(status.canonical_reason().unwrap_or_default())
            .with_http_version(version_string(response.version()));
        for (name, value) in response.headers() {
            converted = converted.with_header(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| VcrError::Http(format!("Failed to read response body: {e}")))?
            .to_bytes();

        Ok(converted.with_body(body))
    }
}

fn version_string(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

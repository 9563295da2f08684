//! Request executor installed in place of the real network call
//!
//! A test harness routes every outgoing request through [`Transport::handle`].
//! It replays a recorded response when one matches, falls through to the
//! live executor when the cassette permits recording, and fails otherwise.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::fingerprint::short_fingerprint;
use crate::interaction::{Interaction, Request, Response};
use crate::replay::InteractionLookup;
use crate::vcr::Vcr;
use crate::{Result, VcrError};

/// Performs a real HTTP call
pub trait LiveExecutor: Send + Sync {
    /// Execute `request` against the network
    fn execute(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;
}

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Served from a cassette
    Playback,
    /// Live call recorded into the innermost cassette
    Recorded,
    /// Live call outside any cassette (ignored request or no cassette)
    Passthrough,
}

/// Routes requests through the active cassettes
pub struct Transport<E> {
    vcr: Arc<Vcr>,
    live: E,
}

impl<E: LiveExecutor> Transport<E> {
    /// Create a transport over `vcr` that uses `live` for real calls
    #[must_use]
    pub fn new(vcr: Arc<Vcr>, live: E) -> Self {
        Self { vcr, live }
    }

    /// The harness context
    #[must_use]
    pub fn vcr(&self) -> &Arc<Vcr> {
        &self.vcr
    }

    /// Handle one outgoing request
    ///
    /// # Errors
    ///
    /// Returns `NoCassetteInserted` or `UnhandledRequest` when a live call
    /// is not permitted, or the live executor's error
    pub async fn handle(&self, request: Request) -> Result<Response> {
        self.handle_with_outcome(request)
            .await
            .map(|(response, _)| response)
    }

    /// Handle one outgoing request, reporting where the response came from
    ///
    /// # Errors
    ///
    /// Same as [`Transport::handle`]
    pub async fn handle_with_outcome(&self, request: Request) -> Result<(Response, Outcome)> {
        let fingerprint = short_fingerprint(&request);

        if self.vcr.ignorer().should_ignore(&request) {
            debug!(
                "Ignored request: {} {} ({})",
                request.method(),
                request.uri(),
                fingerprint
            );
            let response = self.live.execute(&request).await?;
            return Ok((response, Outcome::Passthrough));
        }

        let Some(cassette) = self.vcr.current_cassette() else {
            if self.vcr.config().allow_http_connections_when_no_cassette {
                let response = self.live.execute(&request).await?;
                return Ok((response, Outcome::Passthrough));
            }
            warn!(
                "No cassette inserted for {} {} ({})",
                request.method(),
                request.uri(),
                fingerprint
            );
            return Err(VcrError::NoCassetteInserted);
        };

        if let Some(response) = cassette.http_interactions()?.response_for(&request) {
            return Ok((response, Outcome::Playback));
        }

        if cassette.recording() {
            let response = self.live.execute(&request).await?;
            info!(
                "Recorded {} {} -> {} into '{}' ({})",
                request.method(),
                request.uri(),
                response.status().code,
                cassette.name(),
                fingerprint
            );
            cassette.record_http_interaction(Interaction::new(
                request,
                response.clone(),
                Utc::now(),
            ));
            return Ok((response, Outcome::Recorded));
        }

        warn!(
            "Unhandled request: {} {} in cassette '{}' ({})",
            request.method(),
            request.uri(),
            cassette.name(),
            fingerprint
        );
        Err(VcrError::UnhandledRequest {
            method: request.method().to_string(),
            uri: request.uri().to_string(),
            cassette: cassette.name().to_string(),
            record_mode: cassette.record_mode().to_string(),
        })
    }
}

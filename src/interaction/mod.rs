//! Recorded HTTP interactions

mod body;
mod request;
mod response;

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use request::{normalize_uri, Method, Request};
pub use response::{Response, ResponseStatus};

/// Header map: name to values. Order of names is irrelevant.
pub type Headers = BTreeMap<String, Vec<String>>;

/// A request paired with its response and the time it was recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    request: Request,
    response: Response,
    recorded_at: DateTime<Utc>,
}

impl Interaction {
    /// Create an interaction
    #[must_use]
    pub fn new(request: Request, response: Response, recorded_at: DateTime<Utc>) -> Self {
        Self {
            request,
            response,
            recorded_at,
        }
    }

    /// Recorded request
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Recorded response
    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// When the interaction was recorded
    #[must_use]
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub(crate) fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub(crate) fn filter_text(&mut self, from: &str, to: &str) {
        if from.is_empty() {
            return;
        }
        self.request.filter_text(from, to);
        self.response.filter_text(from, to);
    }
}

/// An interaction handed to a hook.
///
/// The ignore flag only exists for the duration of the hook invocation;
/// interactions marked ignored are dropped by the caller afterwards.
#[derive(Debug)]
pub struct HookedInteraction<'a> {
    interaction: &'a mut Interaction,
    ignored: bool,
}

impl<'a> HookedInteraction<'a> {
    pub(crate) fn new(interaction: &'a mut Interaction) -> Self {
        Self {
            interaction,
            ignored: false,
        }
    }

    /// The interaction under inspection
    #[must_use]
    pub fn interaction(&self) -> &Interaction {
        self.interaction
    }

    /// Shorthand for `interaction().request()`
    #[must_use]
    pub fn request(&self) -> &Request {
        self.interaction.request()
    }

    /// Shorthand for `interaction().response()`
    #[must_use]
    pub fn response(&self) -> &Response {
        self.interaction.response()
    }

    /// Drop this interaction from the set being recorded or played back
    pub fn ignore(&mut self) {
        self.ignored = true;
    }

    /// Whether a hook asked to drop this interaction
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// Replace every occurrence of `from` with `to` in URI, headers and text bodies
    pub fn filter_text(&mut self, from: &str, to: &str) {
        self.interaction.filter_text(from, to);
    }
}

/// Find the stored spelling of a header name, ignoring case
fn find_header_key<'h>(headers: &'h Headers, name: &str) -> Option<&'h str> {
    headers
        .keys()
        .find(|key| key.eq_ignore_ascii_case(name))
        .map(String::as_str)
}

/// Substitute text inside a body; binary bodies are returned unchanged
fn replace_in_body(body: &Bytes, from: &str, to: &str) -> Bytes {
    match std::str::from_utf8(body) {
        Ok(text) if text.contains(from) => Bytes::from(text.replace(from, to)),
        _ => body.clone(),
    }
}

//! Interaction list: matching, consumption and parent fallback

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::debug;

use crate::fingerprint::short_fingerprint;
use crate::interaction::{Interaction, Request, Response};
use crate::matcher::RequestMatchers;

/// Lookup contract shared by interaction lists and the null list
pub trait InteractionLookup: Send + Sync {
    /// Whether a response is available for `request` in this list or its parents
    fn has_interaction_matching(&self, request: &Request) -> bool;

    /// Take the response for `request`, consuming the matched interaction
    /// unless playback repeats are allowed. `None` means no match anywhere
    /// in the chain.
    fn response_for(&self, request: &Request) -> Option<Response>;
}

/// Terminates every parent chain: never matches, never changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullList;

impl NullList {
    /// The shared sentinel instance
    #[must_use]
    pub fn shared() -> Arc<dyn InteractionLookup> {
        static NULL_LIST: OnceLock<Arc<dyn InteractionLookup>> = OnceLock::new();
        Arc::clone(NULL_LIST.get_or_init(|| Arc::new(NullList) as Arc<dyn InteractionLookup>))
    }
}

impl InteractionLookup for NullList {
    fn has_interaction_matching(&self, _request: &Request) -> bool {
        false
    }

    fn response_for(&self, _request: &Request) -> Option<Response> {
        None
    }
}

#[derive(Debug, Default)]
struct ListState {
    unused: Vec<Interaction>,
    /// Served interactions, oldest first
    used: Vec<Interaction>,
}

/// Working set of interactions for one cassette
pub struct InteractionList {
    state: Mutex<ListState>,
    matchers: RequestMatchers,
    allow_playback_repeats: bool,
    parent: Arc<dyn InteractionLookup>,
}

impl InteractionList {
    /// Create a list over `interactions`, falling back to `parent` on a miss
    #[must_use]
    pub fn new(
        interactions: Vec<Interaction>,
        matchers: RequestMatchers,
        allow_playback_repeats: bool,
        parent: Arc<dyn InteractionLookup>,
    ) -> Self {
        Self {
            state: Mutex::new(ListState {
                unused: interactions,
                used: Vec::new(),
            }),
            matchers,
            allow_playback_repeats,
            parent,
        }
    }

    /// Number of local interactions that have never been served
    #[must_use]
    pub fn remaining_unused_interaction_count(&self) -> usize {
        self.lock().unused.len()
    }

    /// Whether served interactions may be served again
    #[must_use]
    pub fn allow_playback_repeats(&self) -> bool {
        self.allow_playback_repeats
    }

    /// Matcher set used by this list
    #[must_use]
    pub fn matchers(&self) -> &RequestMatchers {
        &self.matchers
    }

    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn matches(&self, request: &Request, interaction: &Interaction) -> bool {
        self.matchers.matches(request, interaction.request())
    }

    /// Match-and-consume under a single lock acquisition
    fn take_local(&self, request: &Request) -> Option<Response> {
        let mut state = self.lock();

        if let Some(index) = state.unused.iter().position(|i| self.matches(request, i)) {
            let interaction = state.unused.remove(index);
            let response = interaction.response().clone();
            state.used.push(interaction);
            return Some(response);
        }

        if self.allow_playback_repeats {
            return state
                .used
                .iter()
                .rev()
                .find(|i| self.matches(request, i))
                .map(|i| i.response().clone());
        }

        None
    }
}

impl InteractionLookup for InteractionList {
    fn has_interaction_matching(&self, request: &Request) -> bool {
        let local = {
            let state = self.lock();
            state.unused.iter().any(|i| self.matches(request, i))
                || (self.allow_playback_repeats
                    && state.used.iter().any(|i| self.matches(request, i)))
        };

        local || self.parent.has_interaction_matching(request)
    }

    fn response_for(&self, request: &Request) -> Option<Response> {
        if let Some(response) = self.take_local(request) {
            debug!(
                "Playback: {} {} -> {} ({})",
                request.method(),
                request.uri(),
                response.status().code,
                short_fingerprint(request)
            );
            return Some(response);
        }

        self.parent.response_for(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::Method;
    use crate::matcher::{MatcherRegistry, DEFAULT_MATCHERS};
    use chrono::Utc;

    fn interaction(uri: &str, body: &str) -> Interaction {
        Interaction::new(
            Request::new(Method::Get, uri),
            Response::new(200).with_body(body.to_string()),
            Utc::now(),
        )
    }

    fn matchers() -> RequestMatchers {
        MatcherRegistry::new().resolve(&DEFAULT_MATCHERS).unwrap()
    }

    fn list(interactions: Vec<Interaction>, repeats: bool) -> InteractionList {
        InteractionList::new(interactions, matchers(), repeats, NullList::shared())
    }

    fn get(uri: &str) -> Request {
        Request::new(Method::Get, uri)
    }

    fn body_of(response: Option<Response>) -> String {
        String::from_utf8(response.unwrap().body().to_vec()).unwrap()
    }

    #[test]
    fn test_null_list() {
        let null = NullList::shared();
        assert!(!null.has_interaction_matching(&get("http://a.com/")));
        assert!(null.response_for(&get("http://a.com/")).is_none());
    }

    #[test]
    fn test_consumes_in_recorded_order() {
        let list = list(
            vec![
                interaction("http://a.com/", "first"),
                interaction("http://a.com/", "second"),
            ],
            false,
        );
        let request = get("http://a.com/");

        assert!(list.has_interaction_matching(&request));
        assert_eq!(body_of(list.response_for(&request)), "first");
        assert_eq!(body_of(list.response_for(&request)), "second");
        assert!(list.response_for(&request).is_none());
        assert!(!list.has_interaction_matching(&request));
        assert_eq!(list.remaining_unused_interaction_count(), 0);
    }

    #[test]
    fn test_has_interaction_matching_does_not_consume() {
        let list = list(vec![interaction("http://a.com/", "only")], false);
        let request = get("http://a.com/");

        assert!(list.has_interaction_matching(&request));
        assert!(list.has_interaction_matching(&request));
        assert_eq!(list.remaining_unused_interaction_count(), 1);
    }

    #[test]
    fn test_playback_repeats_serves_unused_first() {
        let list = list(
            vec![
                interaction("http://a.com/", "first"),
                interaction("http://a.com/", "second"),
            ],
            true,
        );
        let request = get("http://a.com/");

        assert_eq!(body_of(list.response_for(&request)), "first");
        assert_eq!(body_of(list.response_for(&request)), "second");
        assert_eq!(body_of(list.response_for(&request)), "second");
        assert!(list.has_interaction_matching(&request));
    }

    #[test]
    fn test_parent_fallback() {
        let parent: Arc<dyn InteractionLookup> =
            Arc::new(list(vec![interaction("http://a.com/p", "parent")], false));
        let child = InteractionList::new(
            vec![interaction("http://a.com/c", "child")],
            matchers(),
            false,
            Arc::clone(&parent),
        );

        assert!(child.has_interaction_matching(&get("http://a.com/p")));
        assert_eq!(body_of(child.response_for(&get("http://a.com/p"))), "parent");
        assert_eq!(body_of(child.response_for(&get("http://a.com/c"))), "child");
        assert!(child.response_for(&get("http://a.com/p")).is_none());
    }

    #[test]
    fn test_child_consumption_leaves_parent_alone() {
        let parent = Arc::new(list(vec![interaction("http://a.com/", "parent")], false));
        let child = InteractionList::new(
            vec![interaction("http://a.com/", "child")],
            matchers(),
            false,
            Arc::clone(&parent) as Arc<dyn InteractionLookup>,
        );
        let request = get("http://a.com/");

        assert_eq!(body_of(child.response_for(&request)), "child");
        assert_eq!(parent.remaining_unused_interaction_count(), 1);
        assert_eq!(body_of(child.response_for(&request)), "parent");
        assert_eq!(parent.remaining_unused_interaction_count(), 0);
    }

    #[test]
    fn test_concurrent_response_for_consumes_each_once() {
        let interactions = (0..64)
            .map(|i| interaction("http://a.com/", &i.to_string()))
            .collect();
        let list = Arc::new(list(interactions, false));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let list = Arc::clone(&list);
                std::thread::spawn(move || {
                    let mut served = Vec::new();
                    while let Some(response) = list.response_for(&get("http://a.com/")) {
                        served.push(response.body().to_vec());
                    }
                    served
                })
            })
            .collect();

        let mut served: Vec<Vec<u8>> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        served.sort();
        served.dedup();
        assert_eq!(served.len(), 64);
    }
}

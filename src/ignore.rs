//! Requests that bypass cassettes entirely

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::interaction::Request;

/// Hosts treated as localhost
pub const LOCALHOST_ALIASES: [&str; 4] = ["localhost", "127.0.0.1", "0.0.0.0", "[::1]"];

type IgnorePredicate = dyn Fn(&Request) -> bool + Send + Sync;

/// Decides which requests are never played back nor recorded
#[derive(Default)]
pub struct RequestIgnorer {
    hosts: HashSet<String>,
    predicates: Vec<Arc<IgnorePredicate>>,
}

impl RequestIgnorer {
    /// Create a policy that ignores nothing
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore requests to these hosts (case-insensitive)
    pub fn ignore_hosts<I, S>(&mut self, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.hosts
            .extend(hosts.into_iter().map(|h| h.as_ref().to_ascii_lowercase()));
    }

    /// Ignore requests to any localhost alias
    pub fn ignore_localhost(&mut self) {
        self.ignore_hosts(LOCALHOST_ALIASES);
        self.hosts.insert("::1".to_string());
    }

    /// Ignore requests for which `predicate` returns true
    pub fn ignore_request<F>(&mut self, predicate: F)
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Arc::new(predicate));
    }

    /// Whether `request` should bypass cassettes
    #[must_use]
    pub fn should_ignore(&self, request: &Request) -> bool {
        let host_ignored = request
            .host()
            .is_some_and(|host| self.hosts.contains(&host));

        host_ignored || self.predicates.iter().any(|predicate| predicate(request))
    }
}

impl fmt::Debug for RequestIgnorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestIgnorer")
            .field("hosts", &self.hosts)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

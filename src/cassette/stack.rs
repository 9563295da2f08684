//! Stack of active cassettes, innermost last

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::Cassette;
use crate::replay::{InteractionLookup, NullList};
use crate::{Result, VcrError};

/// Cassettes currently inserted, outer to inner
#[derive(Debug, Default)]
pub struct CassetteStack {
    cassettes: Mutex<Vec<Arc<Cassette>>>,
}

impl CassetteStack {
    /// Create an empty stack
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Cassette>>> {
        self.cassettes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build a cassette on top of the current innermost one and push it.
    ///
    /// `build` runs without the stack locked, so hooks and the staleness
    /// probe it triggers may use the stack. The push fails if another
    /// insertion or ejection changed the innermost cassette meanwhile.
    pub(crate) fn push_with<F>(&self, build: F) -> Result<Arc<Cassette>>
    where
        F: FnOnce(Option<&Arc<Cassette>>) -> Result<Cassette>,
    {
        let outer = self.current();
        let cassette = Arc::new(build(outer.as_ref())?);

        let mut cassettes = self.lock();
        let unchanged = match (cassettes.last(), outer.as_ref()) {
            (Some(last), Some(outer)) => Arc::ptr_eq(last, outer),
            (None, None) => true,
            _ => false,
        };
        if !unchanged {
            return Err(VcrError::StackChanged(cassette.name().to_string()));
        }

        cassettes.push(Arc::clone(&cassette));
        Ok(cassette)
    }

    /// Remove the innermost cassette
    pub(crate) fn pop(&self) -> Option<Arc<Cassette>> {
        self.lock().pop()
    }

    /// Innermost cassette
    #[must_use]
    pub fn current(&self) -> Option<Arc<Cassette>> {
        self.lock().last().cloned()
    }

    /// Number of inserted cassettes
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no cassette is inserted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Names of inserted cassettes, outer to inner
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|c| c.name().to_string()).collect()
    }

    /// The innermost cassette's list, or the null list when empty
    ///
    /// # Errors
    ///
    /// Returns error if the innermost cassette cannot load its recording
    pub fn http_interactions(&self) -> Result<Arc<dyn InteractionLookup>> {
        match self.current() {
            Some(cassette) => Ok(cassette.http_interactions()? as Arc<dyn InteractionLookup>),
            None => Ok(NullList::shared()),
        }
    }
}

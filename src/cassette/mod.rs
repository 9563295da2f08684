//! Cassettes: load, replay, record and persist interactions

mod options;
mod stack;
pub mod storage;

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::hooks::{CassetteInfo, HookKind};
use crate::interaction::Interaction;
use crate::matcher::{RequestMatchers, DEFAULT_MATCHERS};
use crate::replay::{InteractionList, InteractionLookup, NullList};
use crate::serializer::{Serializer, DEFAULT_SERIALIZER};
use crate::vcr::VcrContext;
use crate::Result;

pub use options::{CassetteOptions, ErbOption, RecordMode, VALID_OPTION_KEYS};
pub use stack::CassetteStack;

/// A named set of recorded interactions plus the policy for using them
pub struct Cassette {
    name: String,
    record_mode: RecordMode,
    matchers: RequestMatchers,
    erb: Option<ErbOption>,
    re_record_interval: Option<Duration>,
    tag: Option<String>,
    update_content_length_header: bool,
    allow_playback_repeats: bool,
    exclusive: bool,
    serializer: Arc<dyn Serializer>,
    parent: Arc<dyn InteractionLookup>,
    context: Arc<VcrContext>,
    previously_recorded: OnceLock<Vec<Interaction>>,
    load_lock: Mutex<()>,
    http_interactions: OnceLock<Arc<InteractionList>>,
    build_lock: Mutex<()>,
    new_recorded: Mutex<Vec<Interaction>>,
}

impl Cassette {
    /// Build a cassette on top of `outer`, the innermost active cassette
    ///
    /// # Errors
    ///
    /// Returns error if a matcher or serializer is unregistered, or if the
    /// staleness check needs the recording and it cannot be loaded
    pub(crate) fn new(
        name: &str,
        options: CassetteOptions,
        context: Arc<VcrContext>,
        outer: Option<&Arc<Cassette>>,
    ) -> Result<Self> {
        let options = options.merge(&context.defaults);

        let matchers = match &options.match_requests_on {
            Some(names) => context.matchers.resolve(names.as_slice())?,
            None => context.matchers.resolve(&DEFAULT_MATCHERS)?,
        };
        let serializer = context
            .serializers
            .get(options.serialize_with.as_deref().unwrap_or(DEFAULT_SERIALIZER))?;
        let exclusive = options.exclusive.unwrap_or(false);

        let parent: Arc<dyn InteractionLookup> = match outer {
            Some(outer) if !exclusive => outer.http_interactions()? as Arc<dyn InteractionLookup>,
            _ => NullList::shared(),
        };

        let mut cassette = Self {
            name: name.to_string(),
            record_mode: options.record.unwrap_or_default(),
            matchers,
            erb: options.erb,
            re_record_interval: options.re_record_interval,
            tag: options.tag,
            update_content_length_header: options.update_content_length_header.unwrap_or(false),
            allow_playback_repeats: options.allow_playback_repeats.unwrap_or(false),
            exclusive,
            serializer,
            parent,
            context,
            previously_recorded: OnceLock::new(),
            load_lock: Mutex::new(()),
            http_interactions: OnceLock::new(),
            build_lock: Mutex::new(()),
            new_recorded: Mutex::new(Vec::new()),
        };

        if cassette.should_re_record()? {
            info!(
                "Cassette '{}' is older than its re-record interval; recording all",
                cassette.name
            );
            cassette.record_mode = RecordMode::All;
        }

        Ok(cassette)
    }

    /// Cassette name as given
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective record mode
    #[must_use]
    pub fn record_mode(&self) -> RecordMode {
        self.record_mode
    }

    /// Matcher set
    #[must_use]
    pub fn match_requests_on(&self) -> &RequestMatchers {
        &self.matchers
    }

    /// Template rendering setting
    #[must_use]
    pub fn erb(&self) -> Option<&ErbOption> {
        self.erb.as_ref()
    }

    /// Re-record interval
    #[must_use]
    pub fn re_record_interval(&self) -> Option<Duration> {
        self.re_record_interval
    }

    /// Hook tag
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Whether this cassette never falls back to outer cassettes
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Whether matched interactions may be served repeatedly
    #[must_use]
    pub fn allow_playback_repeats(&self) -> bool {
        self.allow_playback_repeats
    }

    /// Whether loaded responses get their content-length rewritten
    #[must_use]
    pub fn update_content_length_header(&self) -> bool {
        self.update_content_length_header
    }

    /// Storage path, if a library directory is configured
    #[must_use]
    pub fn file(&self) -> Option<PathBuf> {
        self.context.config.cassette_library_dir.as_deref().map(|dir| {
            storage::cassette_path(dir, &self.name, self.serializer.file_extension())
        })
    }

    /// What hooks get to see of this cassette
    #[must_use]
    pub fn info(&self) -> CassetteInfo {
        CassetteInfo {
            name: self.name.clone(),
            tag: self.tag.clone(),
            record_mode: self.record_mode,
        }
    }

    /// Whether a live call may be made for an unmatched request
    #[must_use]
    pub fn recording(&self) -> bool {
        match self.record_mode {
            RecordMode::None => false,
            RecordMode::Once => self
                .file()
                .map_or(true, |file| !storage::file_has_content(&file)),
            RecordMode::All | RecordMode::NewEpisodes => true,
        }
    }

    /// Recorded interactions are replayed unless everything is re-recorded
    #[must_use]
    pub fn should_stub_requests(&self) -> bool {
        self.record_mode != RecordMode::All
    }

    /// Interactions loaded from storage, loaded once per cassette.
    ///
    /// Concurrent first callers wait for a single load; a failed load is
    /// retried by the next caller.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or decoded, or does not
    /// have the cassette document shape
    pub fn previously_recorded_interactions(&self) -> Result<&[Interaction]> {
        if let Some(loaded) = self.previously_recorded.get() {
            return Ok(loaded);
        }

        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(loaded) = self.previously_recorded.get() {
            return Ok(loaded);
        }
        let loaded = self.load_interactions()?;
        Ok(self.previously_recorded.get_or_init(|| loaded))
    }

    /// The list requests are answered from, built once
    ///
    /// # Errors
    ///
    /// Returns error if previously recorded interactions cannot be loaded
    pub fn http_interactions(&self) -> Result<Arc<InteractionList>> {
        if let Some(list) = self.http_interactions.get() {
            return Ok(Arc::clone(list));
        }

        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = self.http_interactions.get() {
            return Ok(Arc::clone(list));
        }
        let interactions = if self.should_stub_requests() {
            self.previously_recorded_interactions()?.to_vec()
        } else {
            Vec::new()
        };
        let list = Arc::new(InteractionList::new(
            interactions,
            self.matchers.clone(),
            self.allow_playback_repeats,
            Arc::clone(&self.parent),
        ));

        Ok(Arc::clone(self.http_interactions.get_or_init(|| list)))
    }

    /// Remember a genuinely new interaction for persisting on eject
    pub fn record_http_interaction(&self, interaction: Interaction) {
        debug!(
            "Recording {} {} in cassette '{}'",
            interaction.request().method(),
            interaction.request().uri(),
            self.name
        );
        self.lock_new_recorded().push(interaction);
    }

    /// Interactions recorded since insertion
    #[must_use]
    pub fn new_recorded_interactions(&self) -> Vec<Interaction> {
        self.lock_new_recorded().clone()
    }

    /// Persist new interactions merged with the previous recording.
    ///
    /// Nothing is written when there is no library directory, nothing new
    /// was recorded, or hooks filtered everything out.
    pub(crate) fn eject(&self) -> Result<()> {
        let Some(file) = self.file() else {
            return Ok(());
        };

        let new_interactions = self.new_recorded_interactions();
        if new_interactions.is_empty() {
            debug!("Cassette '{}' recorded nothing new; not writing", self.name);
            return Ok(());
        }

        let mut interactions = self.merged_interactions(new_interactions)?;
        self.context
            .hooks
            .invoke(HookKind::BeforeRecord, &mut interactions, &self.info());
        if interactions.is_empty() {
            return Ok(());
        }

        let document = storage::build_document(&interactions)?;
        storage::write_cassette_file(&file, &self.serializer.serialize(&document)?)?;

        info!(
            "Wrote cassette '{}': {} interactions to {}",
            self.name,
            interactions.len(),
            file.display()
        );
        Ok(())
    }

    fn merged_interactions(&self, new_interactions: Vec<Interaction>) -> Result<Vec<Interaction>> {
        let mut merged = self.previously_recorded_interactions()?.to_vec();

        if self.record_mode == RecordMode::All {
            let new_list = InteractionList::new(
                new_interactions.clone(),
                self.matchers.clone(),
                false,
                NullList::shared(),
            );
            merged.retain(|old| !new_list.has_interaction_matching(old.request()));
        }

        merged.extend(new_interactions);
        Ok(merged)
    }

    fn load_interactions(&self) -> Result<Vec<Interaction>> {
        let Some(file) = self.file() else {
            return Ok(Vec::new());
        };
        let Some(content) = storage::read_cassette_file(&file, self.erb.as_ref())? else {
            return Ok(Vec::new());
        };

        let document = self.serializer.deserialize(&content)?;
        let mut interactions = storage::parse_document(&document, &file)?;

        self.context
            .hooks
            .invoke(HookKind::BeforePlayback, &mut interactions, &self.info());
        interactions.retain(|i| !self.context.ignorer.should_ignore(i.request()));

        if self.update_content_length_header {
            for interaction in &mut interactions {
                interaction.response_mut().update_content_length_header();
            }
        }

        info!(
            "Loaded cassette '{}': {} interactions",
            self.name,
            interactions.len()
        );
        Ok(interactions)
    }

    fn should_re_record(&self) -> Result<bool> {
        let Some(interval) = self.re_record_interval else {
            return Ok(false);
        };
        let Some(earliest) = self
            .previously_recorded_interactions()?
            .iter()
            .map(Interaction::recorded_at)
            .min()
        else {
            return Ok(false);
        };
        if !self.file().is_some_and(|file| file.exists()) {
            return Ok(false);
        }

        let stale = chrono::Duration::from_std(interval)
            .ok()
            .and_then(|interval| earliest.checked_add_signed(interval))
            .is_some_and(|due| due < Utc::now());
        if !stale {
            return Ok(false);
        }

        let available = self.context.probe.is_available();
        if !available {
            info!(
                "Cassette '{}' is stale but the network is unreachable; replaying",
                self.name
            );
        }
        Ok(available)
    }

    fn lock_new_recorded(&self) -> MutexGuard<'_, Vec<Interaction>> {
        self.new_recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Cassette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cassette")
            .field("name", &self.name)
            .field("record_mode", &self.record_mode)
            .field("match_requests_on", &self.matchers)
            .field("tag", &self.tag)
            .field("exclusive", &self.exclusive)
            .field("allow_playback_repeats", &self.allow_playback_repeats)
            .finish_non_exhaustive()
    }
}

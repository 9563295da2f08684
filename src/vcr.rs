//! Harness-owned recording context
//!
//! A [`Vcr`] holds the configuration, the matcher and serializer registries,
//! the hooks and the stack of inserted cassettes. Tests create one per
//! harness, usually behind an `Arc` shared with a [`Transport`].
//!
//! [`Transport`]: crate::transport::Transport

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cassette::{Cassette, CassetteOptions, CassetteStack};
use crate::config::Config;
use crate::hooks::{CassetteInfo, HookKind, Hooks};
use crate::ignore::RequestIgnorer;
use crate::interaction::{HookedInteraction, Request};
use crate::matcher::MatcherRegistry;
use crate::network::{ConnectivityProbe, TcpProbe};
use crate::replay::InteractionLookup;
use crate::serializer::{Serializer, SerializerRegistry};
use crate::Result;

/// Everything a cassette needs from its harness
pub(crate) struct VcrContext {
    pub config: Config,
    pub matchers: MatcherRegistry,
    pub serializers: SerializerRegistry,
    pub hooks: Hooks,
    pub ignorer: RequestIgnorer,
    pub probe: Arc<dyn ConnectivityProbe>,
    pub defaults: CassetteOptions,
}

/// Recording context: configuration plus the active cassette stack
pub struct Vcr {
    context: Arc<VcrContext>,
    stack: CassetteStack,
}

impl Vcr {
    /// Create a context with no hooks beyond those in `config`
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start building a context
    #[must_use]
    pub fn builder(config: Config) -> VcrBuilder {
        VcrBuilder::new(config)
    }

    /// Insert a cassette on top of the stack
    ///
    /// # Errors
    ///
    /// Returns error if a named matcher or serializer is not registered, or
    /// if the cassette's recording is needed and cannot be loaded
    pub fn insert_cassette(&self, name: &str, options: CassetteOptions) -> Result<Arc<Cassette>> {
        let cassette = self.stack.push_with(|outer| {
            Cassette::new(name, options, Arc::clone(&self.context), outer)
        })?;

        info!(
            "Inserted cassette '{}' (record: {}, depth: {})",
            cassette.name(),
            cassette.record_mode(),
            self.stack.len()
        );
        Ok(cassette)
    }

    /// Insert a cassette with options given as a TOML table
    ///
    /// # Errors
    ///
    /// Returns `InvalidCassetteOptions` for unknown keys, plus everything
    /// [`Vcr::insert_cassette`] returns
    pub fn insert_cassette_with_table(
        &self,
        name: &str,
        options: &toml::Table,
    ) -> Result<Arc<Cassette>> {
        self.insert_cassette(name, CassetteOptions::from_table(options)?)
    }

    /// Remove the innermost cassette and persist what it recorded.
    ///
    /// The cassette leaves the stack even when writing it fails.
    ///
    /// # Errors
    ///
    /// Returns error if the cassette file cannot be written
    pub fn eject_cassette(&self) -> Result<Option<Arc<Cassette>>> {
        let Some(cassette) = self.stack.pop() else {
            debug!("Eject with no cassette inserted");
            return Ok(None);
        };

        if let Err(e) = cassette.eject() {
            warn!("Failed to write cassette '{}': {e}", cassette.name());
            return Err(e);
        }

        info!("Ejected cassette '{}'", cassette.name());
        Ok(Some(cassette))
    }

    /// Run `f` with a cassette inserted, ejecting it afterwards.
    ///
    /// The cassette is ejected even when `f` fails; `f`'s error wins over
    /// an eject error.
    ///
    /// # Errors
    ///
    /// Returns insertion errors, `f`'s error, or the eject error
    pub fn use_cassette<T, F>(&self, name: &str, options: CassetteOptions, f: F) -> Result<T>
    where
        F: FnOnce(&Arc<Cassette>) -> Result<T>,
    {
        let cassette = self.insert_cassette(name, options)?;
        let result = f(&cassette);
        let ejected = self.eject_cassette();
        let value = result?;
        ejected?;
        Ok(value)
    }

    /// Async variant of [`Vcr::use_cassette`]
    ///
    /// # Errors
    ///
    /// Same as [`Vcr::use_cassette`]
    pub async fn use_cassette_async<T, F, Fut>(
        &self,
        name: &str,
        options: CassetteOptions,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(Arc<Cassette>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cassette = self.insert_cassette(name, options)?;
        let result = f(cassette).await;
        let ejected = self.eject_cassette();
        let value = result?;
        ejected?;
        Ok(value)
    }

    /// Innermost cassette
    #[must_use]
    pub fn current_cassette(&self) -> Option<Arc<Cassette>> {
        self.stack.current()
    }

    /// Number of inserted cassettes
    #[must_use]
    pub fn cassette_depth(&self) -> usize {
        self.stack.len()
    }

    /// Names of inserted cassettes, outer to inner
    #[must_use]
    pub fn cassette_names(&self) -> Vec<String> {
        self.stack.names()
    }

    /// Interactions visible to the innermost cassette
    ///
    /// # Errors
    ///
    /// Returns error if the innermost cassette cannot load its recording
    pub fn http_interactions(&self) -> Result<Arc<dyn InteractionLookup>> {
        self.stack.http_interactions()
    }

    /// Register a matcher usable by cassettes inserted from now on
    pub fn register_matcher<F>(&self, name: impl Into<String>, matcher: F)
    where
        F: Fn(&Request, &Request) -> bool + Send + Sync + 'static,
    {
        self.context.matchers.register(name, matcher);
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.context.config
    }

    /// Requests never played back or recorded
    #[must_use]
    pub fn ignorer(&self) -> &RequestIgnorer {
        &self.context.ignorer
    }

    /// Matcher registry
    #[must_use]
    pub fn matchers(&self) -> &MatcherRegistry {
        &self.context.matchers
    }

    /// Serializer registry
    #[must_use]
    pub fn serializers(&self) -> &SerializerRegistry {
        &self.context.serializers
    }
}

impl std::fmt::Debug for Vcr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vcr")
            .field("config", &self.context.config)
            .field("cassettes", &self.stack.names())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Vcr`]
pub struct VcrBuilder {
    config: Config,
    matchers: MatcherRegistry,
    serializers: SerializerRegistry,
    hooks: Hooks,
    ignorer: RequestIgnorer,
    probe: Option<Arc<dyn ConnectivityProbe>>,
}

impl VcrBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            matchers: MatcherRegistry::new(),
            serializers: SerializerRegistry::new(),
            hooks: Hooks::new(),
            ignorer: RequestIgnorer::new(),
            probe: None,
        }
    }

    /// Register a named matcher
    #[must_use]
    pub fn register_matcher<F>(self, name: impl Into<String>, matcher: F) -> Self
    where
        F: Fn(&Request, &Request) -> bool + Send + Sync + 'static,
    {
        self.matchers.register(name, matcher);
        self
    }

    /// Register a named serializer
    #[must_use]
    pub fn register_serializer(
        self,
        name: impl Into<String>,
        serializer: impl Serializer + 'static,
    ) -> Self {
        self.serializers.register(name, serializer);
        self
    }

    /// Hook run on each interaction before it is written
    #[must_use]
    pub fn before_record<F>(mut self, tag: Option<&str>, hook: F) -> Self
    where
        F: Fn(&mut HookedInteraction<'_>, &CassetteInfo) + Send + Sync + 'static,
    {
        self.hooks.register(HookKind::BeforeRecord, tag, hook);
        self
    }

    /// Hook run on each interaction after it is loaded.
    ///
    /// Loading happens on first access to a cassette's interactions, which
    /// may be during insertion of a nested cassette. The hook may inspect the
    /// [`Vcr`], but must not access the cassette being loaded.
    #[must_use]
    pub fn before_playback<F>(mut self, tag: Option<&str>, hook: F) -> Self
    where
        F: Fn(&mut HookedInteraction<'_>, &CassetteInfo) + Send + Sync + 'static,
    {
        self.hooks.register(HookKind::BeforePlayback, tag, hook);
        self
    }

    /// Write `secret` to cassettes as `placeholder`
    #[must_use]
    pub fn filter_sensitive_data(
        mut self,
        placeholder: &str,
        secret: &str,
        tag: Option<&str>,
    ) -> Self {
        self.hooks.filter_sensitive_data(placeholder, secret, tag);
        self
    }

    /// Never play back or record requests for which `predicate` holds
    #[must_use]
    pub fn ignore_request<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.ignorer.ignore_request(predicate);
        self
    }

    /// Replace the reachability probe used by re-recording
    #[must_use]
    pub fn probe(mut self, probe: impl ConnectivityProbe + 'static) -> Self {
        let probe: Arc<dyn ConnectivityProbe> = Arc::new(probe);
        self.probe = Some(probe);
        self
    }

    /// Validate the configuration and build the context
    ///
    /// # Errors
    ///
    /// Returns error if the configuration or its default cassette options
    /// are invalid
    pub fn build(self) -> Result<Vcr> {
        let Self {
            config,
            matchers,
            serializers,
            mut hooks,
            mut ignorer,
            probe,
        } = self;

        config.validate()?;
        let defaults = config.cassette_defaults()?;

        if config.ignore_localhost {
            ignorer.ignore_localhost();
        }
        ignorer.ignore_hosts(config.ignore_hosts.iter());

        for filter in &config.filter_sensitive_data {
            hooks.filter_sensitive_data(&filter.placeholder, &filter.secret, filter.tag.as_deref());
        }

        let probe = probe.unwrap_or_else(|| {
            Arc::new(TcpProbe::new(
                config.network_probe.address.clone(),
                Duration::from_millis(config.network_probe.timeout_ms),
            )) as Arc<dyn ConnectivityProbe>
        });

        debug!("Built recording context: {:?}", config);

        Ok(Vcr {
            context: Arc::new(VcrContext {
                config,
                matchers,
                serializers,
                hooks,
                ignorer,
                probe,
                defaults,
            }),
            stack: CassetteStack::new(),
        })
    }
}

//! `before_record` / `before_playback` hooks

use std::fmt;
use std::sync::Arc;

use crate::cassette::RecordMode;
use crate::interaction::{HookedInteraction, Interaction};

/// Hook callback
pub type HookFn = dyn Fn(&mut HookedInteraction<'_>, &CassetteInfo) + Send + Sync;

/// When a hook runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Just before interactions are written on eject
    BeforeRecord,
    /// Just after interactions are loaded from disk
    BeforePlayback,
}

/// The view of a cassette handed to hooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CassetteInfo {
    /// Cassette name as given on insertion
    pub name: String,
    /// Cassette tag, if any
    pub tag: Option<String>,
    /// Effective record mode
    pub record_mode: RecordMode,
}

struct RegisteredHook {
    tag: Option<String>,
    hook: Arc<HookFn>,
}

impl RegisteredHook {
    /// Untagged hooks apply everywhere; tagged hooks only to that tag
    fn applies_to(&self, info: &CassetteInfo) -> bool {
        match &self.tag {
            None => true,
            Some(tag) => info.tag.as_deref() == Some(tag.as_str()),
        }
    }
}

/// Registered hooks, in registration order
#[derive(Default)]
pub struct Hooks {
    before_record: Vec<RegisteredHook>,
    before_playback: Vec<RegisteredHook>,
}

impl Hooks {
    /// Create an empty hook set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook, optionally restricted to cassettes carrying `tag`
    pub fn register<F>(&mut self, kind: HookKind, tag: Option<&str>, hook: F)
    where
        F: Fn(&mut HookedInteraction<'_>, &CassetteInfo) + Send + Sync + 'static,
    {
        let registered = RegisteredHook {
            tag: tag.map(str::to_string),
            hook: Arc::new(hook),
        };
        match kind {
            HookKind::BeforeRecord => self.before_record.push(registered),
            HookKind::BeforePlayback => self.before_playback.push(registered),
        }
    }

    /// Keep `secret` out of cassette files: it is written as `placeholder`
    /// and restored when played back.
    pub fn filter_sensitive_data(&mut self, placeholder: &str, secret: &str, tag: Option<&str>) {
        let (from, to) = (secret.to_string(), placeholder.to_string());
        self.register(HookKind::BeforeRecord, tag, move |interaction, _| {
            interaction.filter_text(&from, &to);
        });

        let (from, to) = (placeholder.to_string(), secret.to_string());
        self.register(HookKind::BeforePlayback, tag, move |interaction, _| {
            interaction.filter_text(&from, &to);
        });
    }

    /// Run the hooks of `kind` over every interaction, dropping the ones
    /// a hook marked ignored.
    pub(crate) fn invoke(
        &self,
        kind: HookKind,
        interactions: &mut Vec<Interaction>,
        info: &CassetteInfo,
    ) {
        let hooks: Vec<&RegisteredHook> = match kind {
            HookKind::BeforeRecord => &self.before_record,
            HookKind::BeforePlayback => &self.before_playback,
        }
        .iter()
        .filter(|hook| hook.applies_to(info))
        .collect();

        if hooks.is_empty() {
            return;
        }

        interactions.retain_mut(|interaction| {
            let mut hooked = HookedInteraction::new(interaction);
            for registered in &hooks {
                (registered.hook)(&mut hooked, info);
            }
            !hooked.is_ignored()
        });
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_record", &self.before_record.len())
            .field("before_playback", &self.before_playback.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{Method, Request, Response};
    use chrono::Utc;

    fn info(tag: Option<&str>) -> CassetteInfo {
        CassetteInfo {
            name: "example".to_string(),
            tag: tag.map(str::to_string),
            record_mode: RecordMode::Once,
        }
    }

    fn interactions() -> Vec<Interaction> {
        ["http://a.com/keep", "http://a.com/drop"]
            .iter()
            .map(|uri| {
                Interaction::new(
                    Request::new(Method::Get, uri),
                    Response::new(200).with_body("token=abc123"),
                    Utc::now(),
                )
            })
            .collect()
    }

    #[test]
    fn test_ignored_interactions_are_dropped() {
        let mut hooks = Hooks::new();
        hooks.register(HookKind::BeforeRecord, None, |interaction, _| {
            if interaction.request().uri().ends_with("/drop") {
                interaction.ignore();
            }
        });

        let mut list = interactions();
        hooks.invoke(HookKind::BeforeRecord, &mut list, &info(None));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].request().uri(), "http://a.com/keep");

        let mut list = interactions();
        hooks.invoke(HookKind::BeforePlayback, &mut list, &info(None));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_tagged_hooks_only_run_for_their_tag() {
        let mut hooks = Hooks::new();
        hooks.register(HookKind::BeforeRecord, Some("private"), |interaction, _| {
            interaction.ignore();
        });

        let mut list = interactions();
        hooks.invoke(HookKind::BeforeRecord, &mut list, &info(Some("public")));
        assert_eq!(list.len(), 2);

        hooks.invoke(HookKind::BeforeRecord, &mut list, &info(Some("private")));
        assert!(list.is_empty());
    }

    #[test]
    fn test_filter_sensitive_data_round_trip() {
        let mut hooks = Hooks::new();
        hooks.filter_sensitive_data("<TOKEN>", "abc123", None);

        let mut list = interactions();
        hooks.invoke(HookKind::BeforeRecord, &mut list, &info(None));
        assert_eq!(list[0].response().body().as_ref(), b"token=<TOKEN>");

        hooks.invoke(HookKind::BeforePlayback, &mut list, &info(None));
        assert_eq!(list[0].response().body().as_ref(), b"token=abc123");
    }
}

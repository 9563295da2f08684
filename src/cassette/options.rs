//! Cassette options and record modes

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, VcrError};

/// Option keys a cassette accepts
pub const VALID_OPTION_KEYS: [&str; 9] = [
    "record",
    "erb",
    "match_requests_on",
    "re_record_interval",
    "tag",
    "update_content_length_header",
    "allow_playback_repeats",
    "exclusive",
    "serialize_with",
];

/// Whether live calls are allowed and new interactions saved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Always call live; replace matching recorded interactions on eject
    All,
    /// Never call live; replay only
    None,
    /// Replay what matches, record everything else
    NewEpisodes,
    /// Record only while no recording exists yet
    #[default]
    Once,
}

impl RecordMode {
    /// Name as used in configuration
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::None => "none",
            Self::NewEpisodes => "new_episodes",
            Self::Once => "once",
        }
    }
}

impl fmt::Display for RecordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordMode {
    type Err = VcrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Self::All),
            "none" => Ok(Self::None),
            "new_episodes" => Ok(Self::NewEpisodes),
            "once" => Ok(Self::Once),
            other => Err(VcrError::InvalidRecordMode(other.to_string())),
        }
    }
}

/// Template rendering of cassette files before decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErbOption {
    /// Turn rendering on or off without variables
    Enabled(bool),
    /// Render with these `<%= name %>` substitutions
    Variables(BTreeMap<String, String>),
}

impl ErbOption {
    /// Whether rendering happens at all
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Enabled(false))
    }
}

/// Per-cassette options; unset fields fall back to configured defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CassetteOptions {
    /// Record mode
    pub record: Option<RecordMode>,
    /// Template rendering
    pub erb: Option<ErbOption>,
    /// Ordered matcher names
    pub match_requests_on: Option<Vec<String>>,
    /// Force re-recording once the recording is older than this
    pub re_record_interval: Option<Duration>,
    /// Label used to select hooks
    pub tag: Option<String>,
    /// Rewrite content-length headers of loaded responses
    pub update_content_length_header: Option<bool>,
    /// Serve matched interactions more than once
    pub allow_playback_repeats: Option<bool>,
    /// Never fall back to outer cassettes
    pub exclusive: Option<bool>,
    /// Serializer name
    pub serialize_with: Option<String>,
}

impl CassetteOptions {
    /// Empty options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the record mode
    #[must_use]
    pub fn record(mut self, mode: RecordMode) -> Self {
        self.record = Some(mode);
        self
    }

    /// Set template rendering
    #[must_use]
    pub fn erb(mut self, erb: ErbOption) -> Self {
        self.erb = Some(erb);
        self
    }

    /// Set the matcher names
    #[must_use]
    pub fn match_requests_on<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.match_requests_on = Some(names.iter().map(|n| n.as_ref().to_string()).collect());
        self
    }

    /// Set the re-record interval
    #[must_use]
    pub fn re_record_interval(mut self, interval: Duration) -> Self {
        self.re_record_interval = Some(interval);
        self
    }

    /// Set the tag
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Toggle content-length rewriting
    #[must_use]
    pub fn update_content_length_header(mut self, enabled: bool) -> Self {
        self.update_content_length_header = Some(enabled);
        self
    }

    /// Toggle playback repeats
    #[must_use]
    pub fn allow_playback_repeats(mut self, enabled: bool) -> Self {
        self.allow_playback_repeats = Some(enabled);
        self
    }

    /// Toggle exclusivity
    #[must_use]
    pub fn exclusive(mut self, enabled: bool) -> Self {
        self.exclusive = Some(enabled);
        self
    }

    /// Set the serializer name
    #[must_use]
    pub fn serialize_with(mut self, name: impl Into<String>) -> Self {
        self.serialize_with = Some(name.into());
        self
    }

    /// Fill unset fields from `defaults`
    #[must_use]
    pub fn merge(self, defaults: &Self) -> Self {
        Self {
            record: self.record.or(defaults.record),
            erb: self.erb.or_else(|| defaults.erb.clone()),
            match_requests_on: self
                .match_requests_on
                .or_else(|| defaults.match_requests_on.clone()),
            re_record_interval: self.re_record_interval.or(defaults.re_record_interval),
            tag: self.tag.or_else(|| defaults.tag.clone()),
            update_content_length_header: self
                .update_content_length_header
                .or(defaults.update_content_length_header),
            allow_playback_repeats: self
                .allow_playback_repeats
                .or(defaults.allow_playback_repeats),
            exclusive: self.exclusive.or(defaults.exclusive),
            serialize_with: self.serialize_with.or_else(|| defaults.serialize_with.clone()),
        }
    }

    /// Parse options from a generic table (e.g. a TOML section)
    ///
    /// # Errors
    ///
    /// Returns error naming every unknown key, or if a value has the wrong
    /// type, or if `record` is not a valid record mode
    pub fn from_table(table: &toml::Table) -> Result<Self> {
        let mut invalid: Vec<String> = table
            .keys()
            .filter(|key| !VALID_OPTION_KEYS.contains(&key.as_str()))
            .cloned()
            .collect();
        if !invalid.is_empty() {
            invalid.sort();
            return Err(VcrError::InvalidCassetteOptions(invalid));
        }

        let mut options = Self::new();
        for (key, value) in table {
            match key.as_str() {
                "record" => {
                    let mode = value
                        .as_str()
                        .ok_or_else(|| VcrError::InvalidRecordMode(value.to_string()))?;
                    options.record = Some(mode.parse()?);
                }
                "erb" => options.erb = Some(parse_erb(value)?),
                "match_requests_on" => {
                    let names = value
                        .as_array()
                        .ok_or_else(|| type_error(key, "an array of matcher names"))?
                        .iter()
                        .map(|name| {
                            name.as_str()
                                .map(str::to_string)
                                .ok_or_else(|| type_error(key, "an array of matcher names"))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    options.match_requests_on = Some(names);
                }
                "re_record_interval" => {
                    options.re_record_interval = Some(parse_seconds(key, value)?);
                }
                "tag" => {
                    let tag = value.as_str().ok_or_else(|| type_error(key, "a string"))?;
                    options.tag = Some(tag.to_string());
                }
                "update_content_length_header" => {
                    options.update_content_length_header = Some(parse_bool(key, value)?);
                }
                "allow_playback_repeats" => {
                    options.allow_playback_repeats = Some(parse_bool(key, value)?);
                }
                "exclusive" => options.exclusive = Some(parse_bool(key, value)?),
                "serialize_with" => {
                    let name = value.as_str().ok_or_else(|| type_error(key, "a string"))?;
                    options.serialize_with = Some(name.to_string());
                }
                // unknown keys were rejected above
                _ => {}
            }
        }

        Ok(options)
    }
}

fn type_error(key: &str, expected: &str) -> VcrError {
    VcrError::ConfigError(format!("cassette option `{key}` must be {expected}"))
}

fn parse_bool(key: &str, value: &toml::Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| type_error(key, "a boolean"))
}

fn parse_seconds(key: &str, value: &toml::Value) -> Result<Duration> {
    match value {
        toml::Value::Integer(secs) if *secs >= 0 => Ok(Duration::from_secs(secs.unsigned_abs())),
        toml::Value::Float(secs) if secs.is_finite() && *secs >= 0.0 => {
            Ok(Duration::from_secs_f64(*secs))
        }
        _ => Err(type_error(key, "a non-negative number of seconds")),
    }
}

fn parse_erb(value: &toml::Value) -> Result<ErbOption> {
    match value {
        toml::Value::Boolean(enabled) => Ok(ErbOption::Enabled(*enabled)),
        toml::Value::Table(vars) => Ok(ErbOption::Variables(
            vars.iter()
                .map(|(name, value)| {
                    let rendered = value
                        .as_str()
                        .map_or_else(|| value.to_string(), str::to_string);
                    (name.clone(), rendered)
                })
                .collect(),
        )),
        _ => Err(type_error("erb", "a boolean or a table of variables")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(source: &str) -> toml::Table {
        source.parse().unwrap()
    }

    #[test]
    fn test_parse_all_keys() {
        let options = CassetteOptions::from_table(&table(
            r#"
            record = "new_episodes"
            match_requests_on = ["method", "host", "path"]
            re_record_interval = 3600
            tag = "slow"
            update_content_length_header = true
            allow_playback_repeats = true
            exclusive = true
            serialize_with = "json"
            erb = { api_key = "abc" }
            "#,
        ))
        .unwrap();

        assert_eq!(options.record, Some(RecordMode::NewEpisodes));
        assert_eq!(
            options.match_requests_on,
            Some(vec!["method".into(), "host".into(), "path".into()])
        );
        assert_eq!(options.re_record_interval, Some(Duration::from_secs(3600)));
        assert_eq!(options.tag.as_deref(), Some("slow"));
        assert_eq!(options.update_content_length_header, Some(true));
        assert_eq!(options.allow_playback_repeats, Some(true));
        assert_eq!(options.exclusive, Some(true));
        assert_eq!(options.serialize_with.as_deref(), Some("json"));
        assert!(matches!(options.erb, Some(ErbOption::Variables(ref v)) if v["api_key"] == "abc"));
    }

    #[test]
    fn test_unknown_keys_are_all_named() {
        let result = CassetteOptions::from_table(&table(
            r#"
            record = "once"
            recrod = "all"
            colour = "blue"
            "#,
        ));
        match result {
            Err(VcrError::InvalidCassetteOptions(keys)) => {
                assert_eq!(keys, vec!["colour".to_string(), "recrod".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_record_mode() {
        let result = CassetteOptions::from_table(&table(r#"record = "sometimes""#));
        assert!(matches!(result, Err(VcrError::InvalidRecordMode(mode)) if mode == "sometimes"));
    }

    #[test]
    fn test_wrong_value_type() {
        let result = CassetteOptions::from_table(&table(r#"exclusive = "yes""#));
        assert!(matches!(result, Err(VcrError::ConfigError(_))));
    }

    #[test]
    fn test_merge_prefers_explicit_values() {
        let defaults = CassetteOptions::new()
            .record(RecordMode::NewEpisodes)
            .tag("default")
            .allow_playback_repeats(true);
        let merged = CassetteOptions::new()
            .record(RecordMode::None)
            .merge(&defaults);

        assert_eq!(merged.record, Some(RecordMode::None));
        assert_eq!(merged.tag.as_deref(), Some("default"));
        assert_eq!(merged.allow_playback_repeats, Some(true));
        assert_eq!(merged.exclusive, None);
    }

    #[test]
    fn test_record_mode_parse_and_display() {
        for mode in [
            RecordMode::All,
            RecordMode::None,
            RecordMode::NewEpisodes,
            RecordMode::Once,
        ] {
            assert_eq!(mode.as_str().parse::<RecordMode>().unwrap(), mode);
        }
        assert_eq!(RecordMode::default(), RecordMode::Once);
    }
}

//! Configuration types for Tapedeck

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cassette::CassetteOptions;
use crate::network::{CONNECT_TIMEOUT_MS, DEFAULT_PROBE_ADDRESS};
use crate::{Result, VcrError};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding cassette files; without it nothing is loaded or written
    #[serde(default)]
    pub cassette_library_dir: Option<PathBuf>,
    /// Options applied to every cassette unless it overrides them
    #[serde(default)]
    pub default_cassette_options: toml::Table,
    /// Permit live calls while no cassette is inserted
    #[serde(default)]
    pub allow_http_connections_when_no_cassette: bool,
    /// Never play back or record requests to localhost
    #[serde(default)]
    pub ignore_localhost: bool,
    /// Never play back or record requests to these hosts
    #[serde(default)]
    pub ignore_hosts: Vec<String>,
    /// Reachability probe used by re-recording
    #[serde(default)]
    pub network_probe: ProbeConfig,
    /// Secrets replaced by placeholders in cassette files
    #[serde(default)]
    pub filter_sensitive_data: Vec<SensitiveDataConfig>,
}

/// Reachability probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// `host:port` to connect to
    #[serde(default = "default_probe_address")]
    pub address: String,
    /// Connect timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_probe_address() -> String {
    DEFAULT_PROBE_ADDRESS.to_string()
}

fn default_probe_timeout_ms() -> u64 {
    CONNECT_TIMEOUT_MS
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            address: default_probe_address(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

/// A secret kept out of cassette files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitiveDataConfig {
    /// Text written to the cassette instead of the secret
    pub placeholder: String,
    /// The secret itself
    pub secret: String,
    /// Restrict the filter to cassettes with this tag
    #[serde(default)]
    pub tag: Option<String>,
}

impl Config {
    /// Create a configuration storing cassettes under `dir`
    #[must_use]
    pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            cassette_library_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or validated
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VcrError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| VcrError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        // Default cassette options must be valid on their own
        self.cassette_defaults()?;

        if self.network_probe.address.trim().is_empty() {
            return Err(VcrError::ConfigError(
                "network_probe.address cannot be empty".to_string(),
            ));
        }

        if self.network_probe.timeout_ms == 0 {
            return Err(VcrError::ConfigError(
                "network_probe.timeout_ms must be > 0".to_string(),
            ));
        }

        for (i, filter) in self.filter_sensitive_data.iter().enumerate() {
            if filter.placeholder.is_empty() || filter.secret.is_empty() {
                return Err(VcrError::ConfigError(format!(
                    "filter_sensitive_data {i}: placeholder and secret cannot be empty"
                )));
            }
        }

        Ok(())
    }

    /// Parsed default cassette options
    ///
    /// # Errors
    ///
    /// Returns error if the table holds unknown keys or invalid values
    pub fn cassette_defaults(&self) -> Result<CassetteOptions> {
        CassetteOptions::from_table(&self.default_cassette_options)
    }
}

//! Error types for Tapedeck

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for Tapedeck operations
pub type Result<T> = std::result::Result<T, VcrError>;

/// Errors that can occur in Tapedeck
#[derive(Debug, Error)]
pub enum VcrError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Cassette options contained keys outside the accepted set
    #[error("You passed the following invalid options to a cassette: {0:?}")]
    InvalidCassetteOptions(Vec<String>),

    /// Record mode is not one of `all`, `none`, `new_episodes`, `once`
    #[error("{0} is not a valid cassette record mode. Valid modes are: all, none, new_episodes, once")]
    InvalidRecordMode(String),

    /// The decoded cassette document does not have the expected shape
    #[error(
        "{} does not appear to be a valid cassette: expected a map with an \
         `http_interactions` array. Delete the file and re-record it.",
        path.display()
    )]
    InvalidCassetteFormat {
        /// Path of the offending cassette file
        path: PathBuf,
    },

    /// The serializer could not encode or decode a document
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// `match_requests_on` named a matcher that was never registered
    #[error("There is no matcher registered for {0:?}")]
    UnregisteredMatcher(String),

    /// `serialize_with` named a serializer that was never registered
    #[error("There is no serializer registered for {0:?}")]
    UnregisteredSerializer(String),

    /// A request arrived while no cassette was inserted and live traffic is disallowed
    #[error("Real HTTP connections are disabled and no cassette is inserted")]
    NoCassetteInserted,

    /// No recorded interaction matched and the cassette does not allow recording
    #[error(
        "Unhandled HTTP request: {method} {uri} (cassette {cassette:?}, record mode {record_mode})"
    )]
    UnhandledRequest {
        /// Request method
        method: String,
        /// Request URI
        uri: String,
        /// Name of the innermost cassette
        cassette: String,
        /// Record mode of the innermost cassette
        record_mode: String,
    },

    /// Another insertion or ejection changed the stack while a cassette was being built
    #[error("The cassette stack changed while cassette {0:?} was being inserted")]
    StackChanged(String),

    /// Live HTTP call failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for VcrError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for VcrError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

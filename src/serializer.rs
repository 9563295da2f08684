//! Pluggable cassette serializers
//!
//! Serializers only translate between text and a generic document
//! (`serde_json::Value`); the cassette decides what the document means.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::{Result, VcrError};

/// Serializer used when a cassette does not name one
pub const DEFAULT_SERIALIZER: &str = "yaml";

/// Encodes and decodes cassette documents
pub trait Serializer: Send + Sync {
    /// File extension, without the dot
    fn file_extension(&self) -> &str;

    /// Encode a document
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be encoded
    fn serialize(&self, document: &Value) -> Result<String>;

    /// Decode a document
    ///
    /// # Errors
    ///
    /// Returns error if `content` is not valid for this encoding
    fn deserialize(&self, content: &str) -> Result<Value>;
}

/// YAML serializer (`.yml`)
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlSerializer;

impl Serializer for YamlSerializer {
    fn file_extension(&self) -> &str {
        "yml"
    }

    fn serialize(&self, document: &Value) -> Result<String> {
        Ok(serde_yaml::to_string(document)?)
    }

    fn deserialize(&self, content: &str) -> Result<Value> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// JSON serializer (`.json`)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn file_extension(&self) -> &str {
        "json"
    }

    fn serialize(&self, document: &Value) -> Result<String> {
        Ok(serde_json::to_string_pretty(document)?)
    }

    fn deserialize(&self, content: &str) -> Result<Value> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Serializers keyed by name
pub struct SerializerRegistry {
    serializers: DashMap<String, Arc<dyn Serializer>>,
}

impl SerializerRegistry {
    /// Create a registry holding `yaml` and `json`
    #[must_use]
    pub fn new() -> Self {
        let registry = Self {
            serializers: DashMap::new(),
        };
        registry.register("yaml", YamlSerializer);
        registry.register("json", JsonSerializer);
        registry
    }

    /// Register (or replace) a serializer under `name`
    pub fn register(&self, name: impl Into<String>, serializer: impl Serializer + 'static) {
        self.serializers.insert(name.into(), Arc::new(serializer));
    }

    /// Look up a serializer by name
    ///
    /// # Errors
    ///
    /// Returns error if no serializer is registered under `name`
    pub fn get(&self, name: &str) -> Result<Arc<dyn Serializer>> {
        self.serializers
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| VcrError::UnregisteredSerializer(name.to_string()))
    }

    /// Find a serializer by file extension
    #[must_use]
    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn Serializer>> {
        self.serializers
            .iter()
            .find(|entry| entry.value().file_extension() == extension)
            .map(|entry| Arc::clone(entry.value()))
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

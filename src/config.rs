//! Configuration options for MARC to BIBFRAME conversion.
//!
//! This module provides the [`ConverterConfig`] struct which controls the IRI
//! bases used for generated relationships and entities, output framing, and
//! how many records a run processes.

use serde::Deserialize;

use crate::error::{ConvertError, Result};
use crate::namespaces::{is_absolute, BL};

/// Configuration for a conversion run.
///
/// # Examples
///
/// ```ignore
/// use marc2bf::ConverterConfig;
///
/// let config = ConverterConfig::new()
///     .with_entity_base("http://example.org/")
///     .with_max_records(10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Vocabulary base prefixed to relative relationship and type names.
    pub vocab_base: String,

    /// Base IRI for generated entity ids.
    ///
    /// When `None` (default), ids are bare hashes.
    pub entity_base: Option<String>,

    /// Stop after this many records.
    pub max_records: Option<usize>,

    /// Suppress incremental JSON output.
    ///
    /// Canonical output is produced downstream from the finished graph, so the
    /// per-record stream is disabled entirely.
    pub canonical: bool,

    /// Capacity of the bounded record queue feeding the converter.
    pub channel_capacity: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            vocab_base: BL.to_string(),
            entity_base: None,
            max_records: None,
            canonical: false,
            channel_capacity: 1000,
        }
    }
}

impl ConverterConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the vocabulary base.
    #[must_use]
    pub fn with_vocab_base(mut self, base: impl Into<String>) -> Self {
        self.vocab_base = base.into();
        self
    }

    /// Sets the entity base.
    #[must_use]
    pub fn with_entity_base(mut self, base: impl Into<String>) -> Self {
        self.entity_base = Some(base.into());
        self
    }

    /// Limits the number of records processed.
    #[must_use]
    pub const fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = Some(max);
        self
    }

    /// Enables or disables canonical mode.
    #[must_use]
    pub const fn with_canonical(mut self, canonical: bool) -> Self {
        self.canonical = canonical;
        self
    }

    /// Sets the record queue capacity.
    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Parses a JSON configuration document; missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or fails [`Self::validate`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that both bases are absolute IRIs and the queue can hold a record.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if !is_absolute(&self.vocab_base) {
            return Err(ConvertError::Config(format!(
                "vocabulary base must be absolute: {}",
                self.vocab_base
            )));
        }
        if let Some(base) = &self.entity_base {
            if !is_absolute(base) {
                return Err(ConvertError::Config(format!(
                    "entity base must be absolute: {base}"
                )));
            }
        }
        if self.channel_capacity == 0 {
            return Err(ConvertError::Config(
                "channel capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

//! Content-addressed entity materialization.
//!
//! Every generated entity (Work, Instance, agent, subject, ...) gets its id from
//! the canonical encoding of its type and ordered `(relationship, value)` data:
//!
//! ```text
//! [["http://bibfra.me/purl/versa/type","http://bibfra.me/vocab/lite/Work"],
//!  ["http://bibfra.me/vocab/lite/title","Title"]]
//! ```
//!
//! serialized as compact JSON (no whitespace). Equal type and data give
//! byte-identical encodings and so the same id: two records describing the
//! same Work fold onto one node.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::trace;

use crate::config::ConverterConfig;
use crate::error::{ConvertError, Result};
use crate::graph::{add_or_warn, Link, StatementStore};
use crate::idgen::{HashIdGenerator, IdGenerator};
use crate::namespaces::{absolutize, TYPE_REL};
use crate::plugin::Plugin;

/// One `(relationship, value)` pair of entity data.
pub type Pair = (String, String);

/// Outcome of a materialization, also handed to materialization hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    /// The entity id.
    pub id: String,
    /// True if the id was not in the existing-id set before this call.
    pub first_seen: bool,
    /// Canonical encoding the id was derived from.
    pub encoding: String,
}

/// Mints entity ids and tracks which ids a run has produced.
pub struct Materializer {
    vocab_base: String,
    entity_base: Option<String>,
    ids: Box<dyn IdGenerator>,
    existing_ids: HashSet<String>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl std::fmt::Debug for Materializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materializer")
            .field("vocab_base", &self.vocab_base)
            .field("entity_base", &self.entity_base)
            .field("existing_ids", &self.existing_ids.len())
            .field("plugins", &self.plugins.len())
            .finish_non_exhaustive()
    }
}

impl Materializer {
    /// Creates a materializer with a [`HashIdGenerator`] scoped to the entity base.
    #[must_use]
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            vocab_base: config.vocab_base.clone(),
            entity_base: config.entity_base.clone(),
            ids: Box::new(HashIdGenerator::new(config.entity_base.as_deref())),
            existing_ids: HashSet::new(),
            plugins: Vec::new(),
        }
    }

    /// Replaces the id generator.
    #[must_use]
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Sets the plugins whose materialization hooks run on every call.
    #[must_use]
    pub fn with_plugins(mut self, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        self.plugins = plugins;
        self
    }

    /// The vocabulary base.
    #[must_use]
    pub fn vocab_base(&self) -> &str {
        &self.vocab_base
    }

    /// The entity base, if any.
    #[must_use]
    pub fn entity_base(&self) -> Option<&str> {
        self.entity_base.as_deref()
    }

    /// Resolves a relationship or type name against the vocabulary base.
    #[must_use]
    pub fn vocab(&self, name: &str) -> String {
        absolutize(name, &self.vocab_base)
    }

    /// Resolves an id against the entity base, if one is configured.
    #[must_use]
    pub fn entity(&self, id: &str) -> String {
        match &self.entity_base {
            Some(base) => absolutize(id, base),
            None => id.to_string(),
        }
    }

    /// Builds the canonical encoding for an entity, returning the absolute type
    /// IRI and the encoding.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Serialization`] if JSON encoding fails.
    pub fn canonical_encoding(
        &self,
        entity_type: &str,
        data: &[Pair],
        add_type: bool,
    ) -> Result<(String, String)> {
        let type_iri = self.vocab(entity_type);
        let mut full: Vec<(String, &str)> = Vec::with_capacity(data.len() + 1);
        if add_type {
            full.push((TYPE_REL.to_string(), type_iri.as_str()));
        }
        for (rel, value) in data {
            full.push((self.vocab(rel), value.as_str()));
        }
        let encoding = serde_json::to_string(&full)?;
        Ok((type_iri, encoding))
    }

    /// Materializes an entity and returns its id and first-seen status.
    ///
    /// When `target` is given, the `(id, type, entity_type)` statement is added
    /// to it straight away. Every plugin's materialization hook then sees the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Collaborator`] if a hook fails; hook failures are
    /// not caught here.
    pub fn materialize(
        &mut self,
        entity_type: &str,
        data: &[Pair],
        add_type: bool,
        target: Option<&mut dyn StatementStore>,
    ) -> Result<Materialized> {
        let (type_iri, encoding) = self.canonical_encoding(entity_type, data, add_type)?;
        let raw_id = self.ids.generate(encoding.as_bytes());
        let id = self.entity(&raw_id);

        if let Some(store) = target {
            add_or_warn(store, Link::new(id.as_str(), TYPE_REL, type_iri));
        }

        let first_seen = self.existing_ids.insert(id.clone());
        trace!(id = %id, first_seen, "Materialized entity");

        let event = Materialized {
            id,
            first_seen,
            encoding,
        };
        for plugin in &self.plugins {
            plugin
                .materialized(&event)
                .map_err(|e| ConvertError::collaborator("materialize", e.to_string()))?;
        }
        Ok(event)
    }
}

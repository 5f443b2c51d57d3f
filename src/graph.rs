//! Statement graph storage.
//!
//! Both the per-record input model and the run's output graph are sequences of
//! statements: `(origin, relationship, target, attributes)` tuples keyed by a
//! numeric statement id. [`StatementStore`] is the interface the converter uses
//! to read and edit them; [`MemoryGraph`] is the in-memory implementation.
//!
//! Attribute maps preserve key order and the order of values under each key.
//! That order feeds entity hashing, so it must survive every copy and merge.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeTuple, Serializer};
use tracing::warn;

use crate::error::{ConvertError, Result};

/// Numeric statement id, stable for the lifetime of a graph.
pub type StatementId = u64;

/// Attribute map: subfield code or indicator name to an ordered list of values.
pub type Attributes = IndexMap<String, Vec<String>>;

/// A single statement (subject, predicate, object, attributes).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Link {
    /// Subject of the statement.
    pub origin: String,
    /// Predicate IRI.
    pub relationship: String,
    /// Object value (IRI or literal text).
    pub target: String,
    /// Attribute map.
    pub attributes: Attributes,
}

impl Link {
    /// Creates a statement without attributes.
    #[must_use]
    pub fn new(
        origin: impl Into<String>,
        relationship: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            relationship: relationship.into(),
            target: target.into(),
            attributes: Attributes::new(),
        }
    }

    /// Creates a statement with the given attributes.
    #[must_use]
    pub fn with_attributes(
        origin: impl Into<String>,
        relationship: impl Into<String>,
        target: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        Self {
            attributes,
            ..Self::new(origin, relationship, target)
        }
    }

    /// Returns the values of one attribute key, or an empty slice.
    #[must_use]
    pub fn attribute(&self, key: &str) -> &[String] {
        self.attributes.get(key).map_or(&[], Vec::as_slice)
    }
}

/// Statements serialize as `[origin, relationship, target, {attributes}]`.
impl Serialize for Link {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&self.origin)?;
        tuple.serialize_element(&self.relationship)?;
        tuple.serialize_element(&self.target)?;
        tuple.serialize_element(&self.attributes)?;
        tuple.end()
    }
}

/// Read and write access to a statement graph.
pub trait StatementStore {
    /// Iterates statements matching an optional origin and relationship, in
    /// the store's natural order.
    fn match_links<'a>(
        &'a self,
        origin: Option<&'a str>,
        relationship: Option<&'a str>,
    ) -> Box<dyn Iterator<Item = (StatementId, &'a Link)> + 'a>;

    /// Adds a statement, returning its new id.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::UnrepresentableStatement`] if the statement cannot
    /// be stored.
    fn add(&mut self, link: Link) -> Result<StatementId>;

    /// Adds several statements in order.
    ///
    /// # Errors
    ///
    /// Stops at the first statement the store refuses.
    fn add_many(&mut self, links: Vec<Link>) -> Result<Vec<StatementId>> {
        links.into_iter().map(|link| self.add(link)).collect()
    }

    /// Stores a statement under a caller-chosen id, replacing nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::UnrepresentableStatement`] if the id is taken or
    /// the statement cannot be stored.
    fn put(&mut self, id: StatementId, link: Link) -> Result<()>;

    /// Removes every statement whose id is in `ids`.
    fn remove(&mut self, ids: &BTreeSet<StatementId>);

    /// Number of statements.
    fn len(&self) -> usize;

    /// Returns true if the store holds no statements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if an identical (origin, relationship, target) is present.
    fn contains(&self, origin: &str, relationship: &str, target: &str) -> bool {
        self.match_links(Some(origin), Some(relationship))
            .any(|(_, link)| link.target == target)
    }
}

/// Adds a statement, logging and skipping it if the store refuses it.
///
/// Returns the new statement id, or `None` when the statement was skipped.
pub fn add_or_warn(store: &mut dyn StatementStore, link: Link) -> Option<StatementId> {
    match store.add(link) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(error = %e, "Skipping statement");
            None
        },
    }
}

/// Adds a statement unless an identical triple is already present.
pub fn add_unique(store: &mut dyn StatementStore, link: Link) -> Option<StatementId> {
    if store.contains(&link.origin, &link.relationship, &link.target) {
        return None;
    }
    add_or_warn(store, link)
}

/// In-memory statement graph.
///
/// Statements iterate in insertion order; [`MemoryGraph::sorted`] gives id
/// order. The two differ only after [`StatementStore::put`] re-inserts a
/// statement under an earlier id.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    links: IndexMap<StatementId, Link>,
    next_id: StatementId,
}

impl MemoryGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates all statements in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (StatementId, &Link)> {
        self.links.iter().map(|(id, link)| (*id, link))
    }

    /// Returns all statements ordered by statement id.
    #[must_use]
    pub fn sorted(&self) -> Vec<(StatementId, &Link)> {
        let mut all: Vec<_> = self.iter().collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    /// Looks up a statement by id.
    #[must_use]
    pub fn get(&self, id: StatementId) -> Option<&Link> {
        self.links.get(&id)
    }

    /// The id the next added statement will receive.
    ///
    /// Statements added after taking this mark are exactly those returned by
    /// [`MemoryGraph::links_since`].
    #[must_use]
    pub fn mark(&self) -> StatementId {
        self.next_id
    }

    /// Statements with an id at or above `mark`, in insertion order.
    pub fn links_since(&self, mark: StatementId) -> impl Iterator<Item = &Link> {
        self.links
            .iter()
            .filter(move |(id, _)| **id >= mark)
            .map(|(_, link)| link)
    }

    /// Iterates statements in insertion order without ids.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    fn check(link: &Link) -> Result<()> {
        if link.origin.is_empty() {
            return Err(ConvertError::UnrepresentableStatement(format!(
                "empty origin for relationship {}",
                link.relationship
            )));
        }
        if link.relationship.is_empty() || link.relationship.chars().any(char::is_whitespace) {
            return Err(ConvertError::UnrepresentableStatement(format!(
                "invalid relationship {:?} on {}",
                link.relationship, link.origin
            )));
        }
        Ok(())
    }
}

impl StatementStore for MemoryGraph {
    fn match_links<'a>(
        &'a self,
        origin: Option<&'a str>,
        relationship: Option<&'a str>,
    ) -> Box<dyn Iterator<Item = (StatementId, &'a Link)> + 'a> {
        Box::new(self.iter().filter(move |(_, link)| {
            origin.map_or(true, |o| link.origin == o)
                && relationship.map_or(true, |r| link.relationship == r)
        }))
    }

    fn add(&mut self, link: Link) -> Result<StatementId> {
        Self::check(&link)?;
        let id = self.next_id;
        self.next_id += 1;
        self.links.insert(id, link);
        Ok(id)
    }

    fn put(&mut self, id: StatementId, link: Link) -> Result<()> {
        Self::check(&link)?;
        if self.links.contains_key(&id) {
            return Err(ConvertError::UnrepresentableStatement(format!(
                "statement id {id} already in use"
            )));
        }
        self.links.insert(id, link);
        self.next_id = self.next_id.max(id + 1);
        Ok(())
    }

    fn remove(&mut self, ids: &BTreeSet<StatementId>) {
        self.links.retain(|id, _| !ids.contains(id));
    }

    fn len(&self) -> usize {
        self.links.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &[&str])]) -> Attributes {
        pairs
            .iter()
            .map(|(k, vs)| ((*k).to_string(), vs.iter().map(|v| (*v).to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_add_and_match() {
        let mut graph = MemoryGraph::new();
        graph.add(Link::new("w1", "http://x/title", "A")).unwrap();
        graph.add(Link::new("w1", "http://x/note", "B")).unwrap();
        graph.add(Link::new("w2", "http://x/title", "C")).unwrap();

        let titles: Vec<_> = graph
            .match_links(None, Some("http://x/title"))
            .map(|(_, l)| l.target.as_str())
            .collect();
        assert_eq!(titles, vec!["A", "C"]);
        assert_eq!(graph.match_links(Some("w1"), None).count(), 2);
        assert!(graph.contains("w2", "http://x/title", "C"));
    }

    #[test]
    fn test_rejects_unrepresentable() {
        let mut graph = MemoryGraph::new();
        let err = graph.add(Link::new("w1", "not an iri", "x")).unwrap_err();
        assert!(matches!(err, ConvertError::UnrepresentableStatement(_)));
        assert!(graph.add(Link::new("", "http://x/a", "x")).is_err());
        assert_eq!(add_or_warn(&mut graph, Link::new("w", "", "x")), None);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_remove_then_put_keeps_sorted_position() {
        let mut graph = MemoryGraph::new();
        let a = graph.add(Link::new("r", "http://x/a", "1")).unwrap();
        let b = graph.add(Link::new("r", "http://x/b", "2")).unwrap();
        graph.remove(&BTreeSet::from([a]));
        graph.put(a, Link::new("r", "http://x/a", "merged")).unwrap();

        let natural: Vec<_> = graph.iter().map(|(id, _)| id).collect();
        assert_eq!(natural, vec![b, a]);
        let sorted: Vec<_> = graph.sorted().into_iter().map(|(id, _)| id).collect();
        assert_eq!(sorted, vec![a, b]);
        assert!(graph.put(b, Link::new("r", "http://x/c", "3")).is_err());
    }

    #[test]
    fn test_links_since_mark() {
        let mut graph = MemoryGraph::new();
        graph.add(Link::new("r", "http://x/a", "1")).unwrap();
        let mark = graph.mark();
        graph.add(Link::new("r", "http://x/b", "2")).unwrap();
        let fresh: Vec<_> = graph.links_since(mark).map(|l| l.target.as_str()).collect();
        assert_eq!(fresh, vec!["2"]);
    }

    #[test]
    fn test_serialize_preserves_attribute_order() {
        let link = Link::with_attributes(
            "r",
            "http://x/data/245",
            "",
            attrs(&[("tag", &["245"]), ("b", &["sub"]), ("a", &["one", "two"])]),
        );
        let json = serde_json::to_string(&link).unwrap();
        assert_eq!(
            json,
            r#"["r","http://x/data/245","",{"tag":["245"],"b":["sub"],"a":["one","two"]}]"#
        );
    }

    #[test]
    fn test_add_unique_suppresses_duplicates() {
        let mut graph = MemoryGraph::new();
        assert!(add_unique(&mut graph, Link::new("r", "http://x/a", "1")).is_some());
        assert!(add_unique(&mut graph, Link::new("r", "http://x/a", "1")).is_none());
        assert_eq!(graph.len(), 1);
    }
}

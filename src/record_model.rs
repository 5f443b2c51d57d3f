//! Record models: one MARC record as a sequence of statements.
//!
//! A record model holds one statement per leader, control field and data field,
//! all sharing the record's origin handle:
//!
//! | statement   | relationship              | target       | attributes                     |
//! |-------------|---------------------------|--------------|--------------------------------|
//! | leader      | `.../MARC21/slim/leader`  | leader text  | none                           |
//! | control 001 | `.../control/001`         | field value  | `tag`                          |
//! | data 245    | `.../data/245`            | empty        | `tag`, `ind1`, `ind2`, subfields |
//!
//! Subfield values are grouped per code in first-appearance order, keeping the
//! order of repeated values.

use crate::graph::{Attributes, Link, MemoryGraph, StatementStore};
use crate::namespaces::{CONTROL_REL, DATA_REL, LEADER_REL};
use crate::record::Record;

/// Builds the record model for a decoded record.
///
/// `origin` is the handle every statement hangs off; it doubles as the
/// placeholder Work id during the signature pass.
#[must_use]
pub fn from_record(record: &Record, origin: &str) -> MemoryGraph {
    let mut model = MemoryGraph::new();
    let mut links = Vec::new();

    links.push(Link::new(origin, LEADER_REL, record.leader.to_marc_string()));

    for (tag, value) in record.control_fields_iter() {
        let mut attributes = Attributes::new();
        attributes.insert("tag".to_string(), vec![tag.to_string()]);
        links.push(Link::with_attributes(
            origin,
            format!("{CONTROL_REL}{tag}"),
            value,
            attributes,
        ));
    }

    for field in record.fields() {
        let mut attributes = Attributes::new();
        attributes.insert("tag".to_string(), vec![field.tag.clone()]);
        attributes.insert("ind1".to_string(), vec![field.indicator1.to_string()]);
        attributes.insert("ind2".to_string(), vec![field.indicator2.to_string()]);
        for subfield in &field.subfields {
            attributes
                .entry(subfield.code.to_string())
                .or_default()
                .push(subfield.value.clone());
        }
        links.push(Link::with_attributes(
            origin,
            format!("{DATA_REL}{}", field.tag),
            "",
            attributes,
        ));
    }

    for link in links {
        // Origins and relationships built above are always representable.
        let _ = model.add(link);
    }
    model
}

/// Looks up values by `TAG` or `TAG$code`, in the order the codes are given.
///
/// Data fields yield their subfield values; control fields yield their value.
/// Order is kept because callers use the result as hash input.
#[must_use]
pub fn marc_lookup(model: &dyn StatementStore, codes: &[&str]) -> Vec<(String, String)> {
    let mut results = Vec::new();
    for code in codes {
        let (tag, subfield) = match code.split_once('$') {
            Some((tag, sf)) => (tag, Some(sf)),
            None => (*code, None),
        };

        let data_rel = format!("{DATA_REL}{tag}");
        for (_, link) in model.match_links(None, Some(&data_rel)) {
            if let Some(sf) = subfield {
                for value in link.attribute(sf) {
                    results.push(((*code).to_string(), value.clone()));
                }
            }
        }

        let control_rel = format!("{CONTROL_REL}{tag}");
        for (_, link) in model.match_links(None, Some(&control_rel)) {
            results.push(((*code).to_string(), link.target.clone()));
        }
    }
    results
}

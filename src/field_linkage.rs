//! Field linkage resolution for MARC 880 (Alternate Graphical Representation) fields.
//!
//! The 880 field carries an alternate-script form of data that appears in
//! another field. The two are tied together through **subfield 6** (Linkage):
//!
//! - `100: $6 880-01$a Smith, John` (original field, pointing at 880 occurrence 01)
//! - `880: $6 100-01$a سميث، جون` (880 field, pointing back at the 100)
//!
//! Before conversion each linked pair is collapsed into one statement carrying
//! the original field's tag, so the alternate-script values are transformed by
//! the same rules as the originals. An 880 whose occurrence number is `00` has
//! no counterpart and is simply relabeled with the tag it names.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::{ConvertError, Result};
use crate::graph::{Attributes, Link, MemoryGraph, StatementId, StatementStore};
use crate::namespaces::{DATA_REL, LEADER_REL};

/// Tag of alternate graphical representation fields.
pub const ALTERNATE_TAG: &str = "880";

/// Information extracted from MARC subfield 6 (Linkage).
///
/// # Examples
///
/// ```
/// use marc2bf::field_linkage::LinkageInfo;
///
/// let info = LinkageInfo::parse("245-02/(3/r").unwrap();
/// assert_eq!(info.tag, "245");
/// assert_eq!(info.occurrence, "02");
/// assert_eq!(info.script.as_deref(), Some("(3/r"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkageInfo {
    /// The linked field tag (e.g., "880", "245")
    pub tag: String,

    /// Occurrence number linking fields together
    pub occurrence: String,

    /// Script identification and orientation, everything after the first `/`
    pub script: Option<String>,
}

impl LinkageInfo {
    /// Parse a MARC subfield 6 value of the form `TAG-SEQ[/lang]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::MalformedLinkage`] unless the value splits on `-`
    /// into exactly two parts.
    pub fn parse(value: &str) -> Result<Self> {
        let mut parts = value.split('-');
        let (Some(tag), Some(rest), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ConvertError::MalformedLinkage(value.to_string()));
        };
        let (occurrence, script) = match rest.split_once('/') {
            Some((occ, script)) => (occ, Some(script.to_string())),
            None => (rest, None),
        };
        Ok(LinkageInfo {
            tag: tag.to_string(),
            occurrence: occurrence.to_string(),
            script,
        })
    }

    /// True when the occurrence is all zeros: an 880 with no linked field.
    #[must_use]
    pub fn is_unlinked(&self) -> bool {
        !self.occurrence.is_empty() && self.occurrence.chars().all(|c| c == '0')
    }

    /// True if this linkage points at `tag` with the given occurrence.
    #[must_use]
    pub fn points_to(&self, tag: &str, occurrence: &str) -> bool {
        self.tag == tag && self.occurrence == occurrence
    }
}

/// Counts of what cross-reference resolution did to a record model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XrefReport {
    /// Linked pairs merged into one statement.
    pub merged: usize,
    /// Unlinked 880s relabeled with their named tag.
    pub relabeled: usize,
    /// `$6` values skipped as malformed.
    pub skipped: usize,
}

/// Merges alternate-script (880) statements into their linked counterparts.
///
/// The model is scanned without modification. Removals are applied first,
/// then all replacement statements, each under the statement id of the field
/// it replaces so id order still reflects field order. Local 9XX fields take
/// part in neither side of a link.
pub fn resolve_xrefs(model: &mut MemoryGraph) -> XrefReport {
    let mut report = XrefReport::default();
    let mut removals = BTreeSet::new();
    let mut relabels: Vec<(StatementId, Link)> = Vec::new();
    // original field id -> linked 880 ids, in discovery order
    let mut pairs: IndexMap<StatementId, Vec<StatementId>> = IndexMap::new();

    for (id, link) in model.iter() {
        if link.relationship == LEADER_REL || !link.relationship.starts_with(DATA_REL) {
            continue;
        }
        let Some(tag) = link.attribute("tag").first() else {
            continue;
        };
        if tag.starts_with('9') {
            continue;
        }

        for xref in link.attribute("6") {
            let linkage = match LinkageInfo::parse(xref) {
                Ok(linkage) => linkage,
                Err(e) => {
                    warn!(error = %e, origin = %link.origin, "Skipping invalid $6");
                    report.skipped += 1;
                    continue;
                },
            };

            if tag == ALTERNATE_TAG && linkage.is_unlinked() {
                let mut relabeled = link.clone();
                relabeled.relationship = format!("{DATA_REL}{}", linkage.tag);
                relabeled
                    .attributes
                    .insert("tag".to_string(), vec![linkage.tag.clone()]);
                removals.insert(id);
                relabels.push((id, relabeled));
                report.relabeled += 1;
                continue;
            }

            if linkage.tag.starts_with('9') {
                continue;
            }
            let target_rel = format!("{DATA_REL}{}", linkage.tag);
            for (other_id, other) in model.match_links(None, Some(&target_rel)) {
                let links_back = other
                    .attribute("6")
                    .iter()
                    .filter_map(|dest| LinkageInfo::parse(dest).ok())
                    .any(|dest| dest.points_to(tag, &linkage.occurrence));
                if !links_back {
                    continue;
                }
                let pair = if tag == ALTERNATE_TAG {
                    Some((other_id, id))
                } else if linkage.tag == ALTERNATE_TAG {
                    Some((id, other_id))
                } else {
                    None
                };
                if let Some((original, alternate)) = pair {
                    let alternates = pairs.entry(original).or_default();
                    if !alternates.contains(&alternate) {
                        alternates.push(alternate);
                    }
                }
            }
        }
    }

    let mut additions = relabels;
    for (original, alternates) in &pairs {
        let Some(base) = model.get(*original) else {
            continue;
        };
        let mut merged = base.clone();
        for alternate in alternates {
            if let Some(alt) = model.get(*alternate) {
                merge_attributes(&mut merged.attributes, &alt.attributes);
            }
            removals.insert(*alternate);
        }
        removals.insert(*original);
        additions.push((*original, merged));
        report.merged += alternates.len();
    }
    // An 880 consumed by a merge is not also relabeled.
    additions.retain(|(id, _)| !pairs.values().flatten().any(|alt| alt == id));

    model.remove(&removals);
    for (id, link) in additions {
        if let Err(e) = model.put(id, link) {
            warn!(error = %e, "Skipping resolved cross-reference");
        }
    }

    debug!(
        merged = report.merged,
        relabeled = report.relabeled,
        skipped = report.skipped,
        "Resolved cross-references"
    );
    report
}

/// Appends every subfield list of `from` onto `into`, skipping the tag and
/// indicator keys.
fn merge_attributes(into: &mut Attributes, from: &Attributes) {
    for (key, values) in from {
        if key.starts_with("tag") || key.starts_with("ind") {
            continue;
        }
        into.entry(key.clone()).or_default().extend(values.iter().cloned());
    }
}

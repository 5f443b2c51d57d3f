//! Namespace definitions and IRI helpers.
//!
//! This module defines the IRI prefixes used throughout conversion: the MARC/XML
//! relationship space used by record models, the default vocabulary for the
//! generated graph, and the small amount of IRI arithmetic the converter needs.

use lazy_static::lazy_static;
use regex::Regex;

/// Relationship of the leader statement in a record model.
pub const LEADER_REL: &str = "http://www.loc.gov/MARC21/slim/leader";

/// Prefix of control field relationships in a record model (`.../control/001`).
pub const CONTROL_REL: &str = "http://www.loc.gov/MARC21/slim/control/";

/// Prefix of data field relationships in a record model (`.../data/245`).
pub const DATA_REL: &str = "http://www.loc.gov/MARC21/slim/data/";

/// Default vocabulary base for generated relationships and types.
pub const BL: &str = "http://bibfra.me/vocab/lite/";

/// MARC-derived vocabulary (ISBN statements and positional data).
pub const MARC: &str = "http://bibfra.me/vocab/marc/";

/// The type relationship.
pub const TYPE_REL: &str = "http://bibfra.me/purl/versa/type";

/// ISBN relationship on Instances.
pub const ISBN_REL: &str = "http://bibfra.me/vocab/marc/isbn";

/// ISBN qualifier relationship on Instances (e.g. `pbk`).
pub const ISBN_TYPE_REL: &str = "http://bibfra.me/vocab/marc/isbnType";

/// Entity type local names.
pub mod classes {
    /// Work - the conceptual essence of a resource.
    pub const WORK: &str = "Work";
    /// Instance - a material embodiment of a Work.
    pub const INSTANCE: &str = "Instance";
    /// Person agent.
    pub const PERSON: &str = "Person";
    /// Organization agent.
    pub const ORGANIZATION: &str = "Organization";
    /// Meeting agent.
    pub const MEETING: &str = "Meeting";
    /// Collection (uniform title grouping).
    pub const COLLECTION: &str = "Collection";
    /// Provider event (publication, manufacture, ...).
    pub const PROVIDER_EVENT: &str = "ProviderEvent";
    /// Topical subject.
    pub const TOPIC: &str = "Topic";
    /// Geographic subject.
    pub const GEOGRAPHIC: &str = "Geographic";
    /// Genre/form term.
    pub const GENRE: &str = "Genre";
    /// Place named in a provider statement.
    pub const PLACE: &str = "Place";
    /// Agent named in a provider statement.
    pub const AGENT: &str = "Agent";
    /// Uniform title used as a subject.
    pub const TITLE: &str = "Title";
    /// Holding of an Instance by an institution.
    pub const HELD_ITEM: &str = "HeldItem";
}

/// Common relationship local names.
pub mod properties {
    /// Instance to Work link.
    pub const INSTANTIATES: &str = "instantiates";
    /// Main title.
    pub const TITLE: &str = "title";
    /// Remainder of title.
    pub const SUBTITLE: &str = "subtitle";
    /// Number of part/section.
    pub const PART_NUMBER: &str = "partNumber";
    /// Name of part/section.
    pub const PART_NAME: &str = "partName";
    /// Uniform title grouping.
    pub const UNIFORM_TITLE: &str = "uniformTitle";
    /// Creator agent.
    pub const CREATOR: &str = "creator";
    /// Contributor agent.
    pub const CONTRIBUTOR: &str = "contributor";
    /// Agent or entity label.
    pub const LABEL: &str = "label";
}

lazy_static! {
    static ref IRI_SCHEME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("valid regex");
}

/// Returns true if `iri` starts with a URI scheme such as `http:` or `urn:`.
#[must_use]
pub fn is_absolute(iri: &str) -> bool {
    IRI_SCHEME.is_match(iri)
}

/// Resolves `reference` against `base` unless it is already absolute.
///
/// Resolution is plain concatenation with a `/` inserted when the base does not
/// already end in a path or fragment delimiter. Applying it twice is a no-op.
#[must_use]
pub fn absolutize(reference: &str, base: &str) -> String {
    if is_absolute(reference) || base.is_empty() {
        return reference.to_string();
    }
    if base.ends_with('/') || base.ends_with('#') {
        format!("{base}{reference}")
    } else {
        format!("{base}/{reference}")
    }
}

/// Resolves a sibling directory of the base's last path segment.
///
/// `sibling("http://bibfra.me/vocab/lite/", "marcext/")` is
/// `http://bibfra.me/vocab/marcext/`.
#[must_use]
pub fn sibling(base: &str, name: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) if pos > trimmed.find("//").map_or(0, |p| p + 1) => {
            format!("{}{name}", &trimmed[..=pos])
        },
        _ => absolutize(name, base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_absolute() {
        assert!(is_absolute("http://example.org/x"));
        assert!(is_absolute("urn:isbn:0198526636"));
        assert!(!is_absolute("title"));
        assert!(!is_absolute("../marcext/tag-245"));
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(absolutize("title", BL), "http://bibfra.me/vocab/lite/title");
        assert_eq!(
            absolutize("abc123", "http://example.org/res"),
            "http://example.org/res/abc123"
        );
        let once = absolutize("Work", BL);
        assert_eq!(absolutize(&once, BL), once);
    }

    #[test]
    fn test_sibling() {
        assert_eq!(sibling(BL, "marcext/"), "http://bibfra.me/vocab/marcext/");
        assert_eq!(
            sibling("http://example.org/", "marcext/"),
            "http://example.org/marcext/"
        );
    }
}

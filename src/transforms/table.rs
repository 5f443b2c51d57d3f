//! Declarative field transform tables.
//!
//! A table maps lookup keys to the actions applied to matching data. Keys come
//! in two shapes, most specific first:
//!
//! | key          | matches                                       |
//! |--------------|-----------------------------------------------|
//! | `245-10$a`   | tag, both indicators, subfield                 |
//! | `245-?0$a`   | tag, second indicator, subfield                |
//! | `245-1?$a`   | tag, first indicator, subfield                 |
//! | `245$a`      | tag and subfield, any indicators               |
//! | `264-?1`     | whole field: the same four forms without `$`   |
//! | `100`        | whole field, any indicators                    |
//!
//! A blank indicator is written `#`. Tables are static and read-only.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::namespaces::{classes, properties};

/// Which entity an action attaches its statements to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The record's Work.
    Work,
    /// The record's first (default) Instance.
    Instance,
}

/// A transform action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The matched value becomes `(anchor, rel, value)`.
    Link {
        /// Entity the statement hangs off.
        on: Anchor,
        /// Relationship, relative to the vocabulary base.
        rel: &'static str,
    },
    /// Build a typed entity from the field's subfields and link the anchor to it.
    ///
    /// Entity data is every `(prop, value)` for each `(code, prop)` in `props`,
    /// in `props` order, then value order.
    Materialize {
        /// Entity the link hangs off.
        on: Anchor,
        /// Relationship from the anchor to the new entity.
        rel: &'static str,
        /// Entity type, relative to the vocabulary base.
        entity: &'static str,
        /// Subfield code to property name.
        props: &'static [(&'static str, &'static str)],
        /// Constant `(property, value)` pairs placed before the subfield data.
        fixed: &'static [(&'static str, &'static str)],
    },
    /// Build a typed entity labelled with the matched value alone and link the
    /// anchor to it.
    Labelled {
        /// Entity the link hangs off.
        on: Anchor,
        /// Relationship from the anchor to the new entity.
        rel: &'static str,
        /// Entity type, relative to the vocabulary base.
        entity: &'static str,
    },
    /// Materialize an additional Instance of the Work from an ISBN value and
    /// request that it be registered as one of the record's Instances.
    InstanceFrom,
    /// Claim the value without producing output.
    Ignore,
}

const fn on_work(rel: &'static str) -> Action {
    Action::Link {
        on: Anchor::Work,
        rel,
    }
}

const fn on_instance(rel: &'static str) -> Action {
    Action::Link {
        on: Anchor::Instance,
        rel,
    }
}

const fn entity(
    on: Anchor,
    rel: &'static str,
    entity: &'static str,
    props: &'static [(&'static str, &'static str)],
) -> Action {
    Action::Materialize {
        on,
        rel,
        entity,
        props,
        fixed: &[],
    }
}

const fn labelled(on: Anchor, rel: &'static str, entity: &'static str) -> Action {
    Action::Labelled { on, rel, entity }
}

const PERSON_PROPS: &[(&str, &str)] = &[
    ("a", properties::LABEL),
    ("b", "numeration"),
    ("c", "titles"),
    ("d", "date"),
];

const CORPORATE_PROPS: &[(&str, &str)] = &[("a", properties::LABEL), ("d", "date")];

const UNIFORM_TITLE_PROPS: &[(&str, &str)] = &[
    ("a", properties::TITLE),
    ("n", "workSection"),
    ("l", "language"),
];

const ADDED_TITLE_PROPS: &[(&str, &str)] = &[("a", properties::LABEL)];

const SERIES_PROPS: &[(&str, &str)] = &[("a", properties::TITLE)];

const TITLE_SUBJECT_PROPS: &[(&str, &str)] = &[
    ("a", properties::LABEL),
    ("h", "medium"),
    ("l", "language"),
    ("v", "formSubdivision"),
    ("x", "generalSubdivision"),
    ("y", "chronologicalSubdivision"),
    ("z", "geographicSubdivision"),
];

const TOPIC_PROPS: &[(&str, &str)] = &[
    ("a", properties::LABEL),
    ("c", "locationOfEvent"),
    ("d", "date"),
    ("v", "formSubdivision"),
    ("x", "generalSubdivision"),
    ("y", "chronologicalSubdivision"),
    ("z", "geographicSubdivision"),
];

const GEOGRAPHIC_PROPS: &[(&str, &str)] = &[
    ("a", properties::LABEL),
    ("d", "date"),
    ("v", "formSubdivision"),
    ("x", "generalSubdivision"),
    ("y", "chronologicalSubdivision"),
    ("z", "geographicSubdivision"),
];

const GENRE_PROPS: &[(&str, &str)] = &[("a", properties::LABEL), ("2", "source")];

const PROVIDER_PROPS: &[(&str, &str)] = &[
    ("a", "providerPlace"),
    ("b", "providerAgent"),
    ("c", "providerDate"),
    ("e", "providerPlace"),
    ("f", "providerAgent"),
    ("g", "providerDate"),
];

const HELD_ITEM_PROPS: &[(&str, &str)] = &[
    ("a", "location"),
    ("b", "subLocation"),
    ("h", "callNumber"),
    ("n", "code"),
    ("u", "link"),
    ("e", "streetAddress"),
];

const CREATORS: &[(&str, &[Action])] = &[
    (
        "100",
        &[entity(Anchor::Work, properties::CREATOR, classes::PERSON, PERSON_PROPS)],
    ),
    (
        "110",
        &[entity(Anchor::Work, properties::CREATOR, classes::ORGANIZATION, CORPORATE_PROPS)],
    ),
    (
        "111",
        &[entity(Anchor::Work, properties::CREATOR, classes::MEETING, CORPORATE_PROPS)],
    ),
    (
        "130",
        &[entity(Anchor::Work, properties::UNIFORM_TITLE, classes::COLLECTION, UNIFORM_TITLE_PROPS)],
    ),
    (
        "240",
        &[entity(Anchor::Work, properties::UNIFORM_TITLE, classes::COLLECTION, UNIFORM_TITLE_PROPS)],
    ),
    ("245$a", &[on_work(properties::TITLE)]),
    ("245$b", &[on_work(properties::SUBTITLE)]),
    ("245$n", &[on_work(properties::PART_NUMBER)]),
    ("245$p", &[on_work(properties::PART_NAME)]),
];

const MAIN_ONLY: &[(&str, &[Action])] = &[
    // Control fields and identifiers
    ("001", &[on_instance("controlCode")]),
    ("005", &[Action::Ignore]),
    ("006", &[Action::Ignore]),
    ("007", &[Action::Ignore]),
    ("008", &[Action::Ignore]),
    ("010$a", &[on_instance("lccn")]),
    ("017$a", &[on_instance("legalDeposit")]),
    ("019$a", &[on_instance("localControlNumber")]),
    ("020", &[Action::Ignore]),
    ("022$a", &[on_instance("issn")]),
    ("024$a", &[on_instance("otherControlNumber")]),
    ("025$a", &[on_instance("lcOverseasAcq")]),
    ("034$a", &[on_instance("cartographicMathematicalDataScaleStatement")]),
    ("034$b", &[on_instance("cartographicMathematicalDataProjectionStatement")]),
    ("034$c", &[on_instance("cartographicMathematicalDataCoordinateStatement")]),
    ("035$a", &[on_instance("systemControlNumber")]),
    ("037$a", &[on_instance("stockNumber")]),
    ("040$a", &[on_work("catalogingSource")]),
    ("041$a", &[on_work("language")]),
    ("050$a", &[on_work("lcCallNumber")]),
    ("050$b", &[on_instance("lcItemNumber")]),
    ("050$3", &[on_instance("material")]),
    ("060$a", &[on_instance("nlmCallNumber")]),
    ("060$b", &[on_instance("nlmItemNumber")]),
    ("061$a", &[on_instance("nlmCopyStatement")]),
    ("070$a", &[on_instance("nalCallNumber")]),
    ("070$b", &[on_instance("nalItemNumber")]),
    ("071$a", &[on_instance("nalCopyStatement")]),
    ("082$a", &[on_work("deweyNumber")]),
    // Titles
    ("210$a", &[on_work("abbreviatedTitle")]),
    ("222$a", &[on_work("keyTitle")]),
    ("240$d", &[on_work("legalDate")]),
    ("240$h", &[on_work("medium")]),
    ("240$m", &[on_work("musicMedium")]),
    ("240$r", &[on_work("musicKey")]),
    (
        "243",
        &[entity(Anchor::Work, properties::UNIFORM_TITLE, classes::COLLECTION, UNIFORM_TITLE_PROPS)],
    ),
    ("245$c", &[on_instance("statement")]),
    ("245$f", &[on_work("inclusiveDates")]),
    ("245$h", &[on_instance("medium")]),
    ("245$k", &[on_work("formDesignation")]),
    ("246$a", &[on_instance("titleVariation")]),
    ("246$f", &[on_instance("titleVariationDate")]),
    ("247$a", &[on_work("formerTitle")]),
    // Edition, imprint and physical description
    ("250$a", &[on_instance("edition")]),
    ("250$b", &[on_instance("edition")]),
    ("254$a", &[on_instance("musicalPresentation")]),
    ("255$a", &[on_instance("cartographicMathematicalDataScaleStatement")]),
    ("255$b", &[on_instance("cartographicMathematicalDataProjectionStatement")]),
    ("255$c", &[on_instance("cartographicMathematicalDataCoordinateStatement")]),
    ("256$a", &[on_instance("computerFileCharacteristics")]),
    (
        "260",
        &[entity(Anchor::Instance, "publication", classes::PROVIDER_EVENT, PROVIDER_PROPS)],
    ),
    ("260$a", &[labelled(Anchor::Instance, "providerPlace", classes::PLACE)]),
    ("260$b", &[labelled(Anchor::Instance, "providerAgent", classes::AGENT)]),
    ("260$e", &[labelled(Anchor::Instance, "providerPlace", classes::PLACE)]),
    ("260$f", &[labelled(Anchor::Instance, "providerAgent", classes::AGENT)]),
    (
        "264-?0",
        &[entity(Anchor::Instance, "production", classes::PROVIDER_EVENT, PROVIDER_PROPS)],
    ),
    (
        "264-?1",
        &[entity(Anchor::Instance, "publication", classes::PROVIDER_EVENT, PROVIDER_PROPS)],
    ),
    (
        "264-?2",
        &[entity(Anchor::Instance, "distribution", classes::PROVIDER_EVENT, PROVIDER_PROPS)],
    ),
    (
        "264-?3",
        &[entity(Anchor::Instance, "manufacture", classes::PROVIDER_EVENT, PROVIDER_PROPS)],
    ),
    ("264$a", &[labelled(Anchor::Instance, "providerPlace", classes::PLACE)]),
    ("264$b", &[labelled(Anchor::Instance, "providerAgent", classes::AGENT)]),
    ("300$a", &[on_instance("extent")]),
    ("300$b", &[on_instance("otherPhysicalDetails")]),
    ("300$c", &[on_instance("dimensions")]),
    ("300$e", &[on_instance("accompanyingMaterial")]),
    ("300$f", &[on_instance("typeOfUnit")]),
    ("300$g", &[on_instance("size")]),
    ("300$3", &[on_instance("materials")]),
    ("310$a", &[on_instance("publicationFrequency")]),
    ("310$b", &[on_instance("publicationDateFrequency")]),
    ("336$a", &[on_instance("contentCategory")]),
    ("336$b", &[on_instance("contentTypeCode")]),
    ("336$2", &[on_instance("contentTypeRdaSource")]),
    ("337$a", &[on_instance("mediaCategory")]),
    ("337$b", &[on_instance("mediaTypeCode")]),
    ("337$2", &[on_instance("mediaRdaSource")]),
    ("338$a", &[on_instance("carrierCategory")]),
    ("338$b", &[on_instance("carrierCategoryCode")]),
    ("338$2", &[on_instance("carrierRdaSource")]),
    ("340$a", &[on_instance("physicalSubstance")]),
    ("340$b", &[on_instance("dimensions")]),
    ("340$c", &[on_instance("materialsApplied")]),
    ("340$d", &[on_instance("recordingTechnique")]),
    ("340$e", &[on_instance("physicalSupport")]),
    ("351$a", &[on_instance("organizationMethod")]),
    ("351$b", &[on_instance("arrangement")]),
    ("351$c", &[on_instance("hierarchy")]),
    ("351$3", &[on_instance("materialsSpecified")]),
    // Series
    ("490$a", &[on_work("seriesStatement")]),
    ("490$v", &[on_work("seriesVolume")]),
    // Notes
    ("500$a", &[on_work("note")]),
    ("501$a", &[on_work("note")]),
    ("502$a", &[on_work("dissertationNote")]),
    ("502$b", &[on_work("degree")]),
    ("502$c", &[on_work("grantingInstitution")]),
    ("502$d", &[on_work("dissertationYear")]),
    ("502$g", &[on_work("dissertationNote")]),
    ("502$o", &[on_work("dissertationId")]),
    ("504$a", &[on_work("bibliographyNote")]),
    ("505$a", &[on_instance("contentsNote")]),
    ("506$a", &[on_instance("governingAccessNote")]),
    ("506$b", &[on_instance("jurisdictionNote")]),
    ("506$c", &[on_instance("physicalAccess")]),
    ("506$d", &[on_instance("authorizedUsers")]),
    ("506$e", &[on_instance("authorization")]),
    ("506$u", &[on_instance("uriNote")]),
    ("507$a", &[on_instance("representativeFractionOfScale")]),
    ("507$b", &[on_instance("remainderOfScale")]),
    ("508$a", &[on_instance("creditsNote")]),
    ("510$a", &[on_work("citationSource")]),
    ("510$b", &[on_work("citationCoverage")]),
    ("510$c", &[on_work("citationLocationWithinSource")]),
    ("510$u", &[on_work("citationUri")]),
    ("511$a", &[on_work("performerNote")]),
    ("513$a", &[on_work("typeOfReport")]),
    ("513$b", &[on_work("periodCovered")]),
    ("514$a", &[on_work("dataQuality")]),
    ("515$a", &[on_instance("numberingPeculiarities")]),
    ("516$a", &[on_instance("typeOfComputerFile")]),
    ("518$a", &[on_work("dateTimePlace")]),
    ("518$d", &[on_work("dateOfEvent")]),
    ("518$o", &[on_work("otherEventInformation")]),
    ("518$p", &[on_work("placeOfEvent")]),
    ("520$a", &[on_work("summary")]),
    ("520$b", &[on_work("summaryExpansion")]),
    ("520$c", &[on_work("assigningSource")]),
    ("520$u", &[on_work("summaryUri")]),
    ("521$a", &[on_work("intendedAudience")]),
    ("521$b", &[on_work("intendedAudienceSource")]),
    ("522$a", &[on_work("geographicCoverage")]),
    ("525$a", &[on_instance("supplement")]),
    ("526$a", &[on_work("studyProgramName")]),
    ("526$b", &[on_work("interestLevel")]),
    ("526$c", &[on_work("readingLevel")]),
    ("530$a", &[on_instance("additionalPhysicalForm")]),
    ("533$a", &[on_instance("reproductionNote")]),
    ("534$a", &[on_instance("originalVersionNote")]),
    ("535$a", &[on_instance("locationOfOriginalsDuplicates")]),
    ("536$a", &[on_work("fundingInformation")]),
    ("538$a", &[on_instance("systemDetails")]),
    ("540$a", &[on_instance("termsGoverningUse")]),
    ("541$a", &[on_instance("immediateSourceOfAcquisition")]),
    ("542$a", &[on_instance("informationRelatingToCopyrightStatus")]),
    ("544$a", &[on_work("locationOfOtherArchivalMaterial")]),
    ("545$a", &[on_work("biographicalOrHistoricalData")]),
    ("546$a", &[on_work("languageNote")]),
    ("547$a", &[on_work("formerTitleComplexity")]),
    ("550$a", &[on_work("issuingBody")]),
    ("552$a", &[on_work("entityAndAttributeInformation")]),
    ("555$a", &[on_work("cumulativeIndexFindingAids")]),
    ("556$a", &[on_work("informationAboutDocumentation")]),
    ("561$a", &[on_instance("ownership")]),
    ("583$a", &[on_work("action")]),
    // Subjects and genre
    (
        "600",
        &[entity(Anchor::Work, "subject", classes::PERSON, PERSON_PROPS)],
    ),
    (
        "610",
        &[entity(Anchor::Work, "subject", classes::ORGANIZATION, CORPORATE_PROPS)],
    ),
    (
        "611",
        &[entity(Anchor::Work, "subject", classes::MEETING, CORPORATE_PROPS)],
    ),
    (
        "630",
        &[entity(Anchor::Work, properties::UNIFORM_TITLE, classes::TITLE, TITLE_SUBJECT_PROPS)],
    ),
    (
        "650",
        &[entity(Anchor::Work, "subject", classes::TOPIC, TOPIC_PROPS)],
    ),
    (
        "651",
        &[entity(Anchor::Work, "subject", classes::GEOGRAPHIC, GEOGRAPHIC_PROPS)],
    ),
    (
        "655",
        &[entity(Anchor::Work, "genre", classes::GENRE, GENRE_PROPS)],
    ),
    // Added entries
    (
        "700",
        &[entity(Anchor::Work, properties::CONTRIBUTOR, classes::PERSON, PERSON_PROPS)],
    ),
    (
        "710",
        &[entity(Anchor::Work, properties::CONTRIBUTOR, classes::ORGANIZATION, CORPORATE_PROPS)],
    ),
    (
        "711",
        &[entity(Anchor::Work, properties::CONTRIBUTOR, classes::MEETING, CORPORATE_PROPS)],
    ),
    (
        "730",
        &[entity(Anchor::Work, "uniformMemberOf", classes::COLLECTION, ADDED_TITLE_PROPS)],
    ),
    (
        "740",
        &[entity(Anchor::Work, properties::CONTRIBUTOR, classes::PERSON, ADDED_TITLE_PROPS)],
    ),
    ("776$z", &[Action::InstanceFrom]),
    (
        "830",
        &[entity(Anchor::Work, "uniformMemberOf", classes::COLLECTION, SERIES_PROPS)],
    ),
    // Holdings and links
    (
        "852",
        &[Action::Materialize {
            on: Anchor::Instance,
            rel: "institution",
            entity: classes::HELD_ITEM,
            props: HELD_ITEM_PROPS,
            fixed: &[("holderType", "Library")],
        }],
    ),
    ("856$u", &[on_instance("link")]),
    ("880$a", &[on_work(properties::TITLE)]),
];

/// Relationships (relative to the vocabulary base) whose values on the
/// placeholder Work make up the Work's identity.
pub const WORK_SIGNATURE_RELS: &[&str] = &[
    properties::TITLE,
    properties::SUBTITLE,
    properties::PART_NUMBER,
    properties::PART_NAME,
    properties::UNIFORM_TITLE,
    properties::CREATOR,
];

/// A read-only mapping from lookup keys to actions.
#[derive(Debug, Clone, Default)]
pub struct TransformTable {
    entries: HashMap<&'static str, &'static [Action]>,
}

impl TransformTable {
    /// Builds a table; later entries with the same key replace earlier ones.
    #[must_use]
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = &'a (&'static str, &'static [Action])>,
    ) -> Self {
        Self {
            entries: entries.into_iter().copied().collect(),
        }
    }

    /// Actions registered under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'static [Action]> {
        self.entries.get(key).copied()
    }

    /// Returns true if `key` has an entry.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

lazy_static! {
    /// The full table applied in the main pass.
    pub static ref MAIN_TRANSFORMS: TransformTable =
        TransformTable::from_entries(CREATORS.iter().chain(MAIN_ONLY));

    /// The restricted table applied in the Work signature pass.
    pub static ref SIGNATURE_TRANSFORMS: TransformTable = TransformTable::from_entries(CREATORS);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_table_is_subset_of_main() {
        for (key, actions) in CREATORS {
            assert_eq!(MAIN_TRANSFORMS.get(key), Some(*actions), "key {key}");
            assert_eq!(SIGNATURE_TRANSFORMS.get(key), Some(*actions));
        }
        assert!(SIGNATURE_TRANSFORMS.len() < MAIN_TRANSFORMS.len());
        assert!(!SIGNATURE_TRANSFORMS.contains_key("500$a"));
    }

    #[test]
    fn test_lookup_shapes() {
        assert_eq!(
            MAIN_TRANSFORMS.get("245$a"),
            Some(&[on_work(properties::TITLE)][..])
        );
        assert!(MAIN_TRANSFORMS.contains_key("264-?1"));
        assert!(MAIN_TRANSFORMS.get("999").is_none());
    }

    #[test]
    fn test_keys_are_not_repeated() {
        let mut seen = std::collections::HashSet::new();
        for (key, _) in CREATORS.iter().chain(MAIN_ONLY) {
            assert!(seen.insert(*key), "duplicate key {key}");
        }
        assert_eq!(MAIN_TRANSFORMS.len(), seen.len());
    }

    #[test]
    fn test_provider_fields_do_not_double_fire() {
        assert!(!MAIN_TRANSFORMS.contains_key("264"));
        assert_eq!(
            MAIN_TRANSFORMS.get("260$b"),
            Some(&[labelled(Anchor::Instance, "providerAgent", classes::AGENT)][..])
        );
    }

    #[test]
    fn test_signature_rels_are_produced_by_signature_table() {
        let produced: Vec<&str> = CREATORS
            .iter()
            .flat_map(|(_, actions)| actions.iter())
            .filter_map(|action| match action {
                Action::Link { rel, .. }
                | Action::Materialize { rel, .. }
                | Action::Labelled { rel, .. } => Some(*rel),
                _ => None,
            })
            .collect();
        for rel in WORK_SIGNATURE_RELS {
            assert!(produced.contains(rel), "{rel} never produced");
        }
    }
}

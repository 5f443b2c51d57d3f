//! Positional transforms for the leader and the 006/007/008 control fields.
//!
//! These fields carry coded values at fixed character positions rather than
//! in subfields, so they bypass the tag-keyed tables. The engine collects them
//! during the main pass and calls an [`ExtraTransforms`] once per record.

use crate::namespaces::{absolutize, MARC, TYPE_REL};

/// One statement (or one relationship with several values) from a positional
/// transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraStatement {
    /// Subject; `None` means the record's Work.
    pub origin: Option<String>,
    /// Absolute relationship IRI.
    pub relationship: String,
    /// One statement is emitted per value.
    pub values: Vec<String>,
}

impl ExtraStatement {
    fn on_work(relationship: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            origin: None,
            relationship: relationship.into(),
            values,
        }
    }

    fn on(origin: &str, relationship: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.to_string()),
            relationship: relationship.into(),
            values: vec![value.into()],
        }
    }
}

/// Ids and bases available to positional transforms.
#[derive(Debug, Clone, Copy)]
pub struct ExtraContext<'a> {
    /// The record's Work.
    pub work_id: &'a str,
    /// The record's default Instance.
    pub instance_id: &'a str,
    /// Vocabulary base of the run.
    pub vocab_base: &'a str,
}

/// Decoders for positional fields. Missing evidence yields no statements.
#[allow(unused_variables)]
pub trait ExtraTransforms: Send + Sync {
    /// Decodes the leader.
    fn process_leader(&self, leader: Option<&str>, ctx: &ExtraContext<'_>) -> Vec<ExtraStatement> {
        Vec::new()
    }

    /// Decodes every 006 (additional material characteristics).
    fn process_006(&self, fields: &[String], ctx: &ExtraContext<'_>) -> Vec<ExtraStatement> {
        Vec::new()
    }

    /// Decodes every 007 (physical description).
    fn process_007(&self, fields: &[String], ctx: &ExtraContext<'_>) -> Vec<ExtraStatement> {
        Vec::new()
    }

    /// Decodes the 008 (fixed-length data elements).
    fn process_008(&self, field: Option<&str>, ctx: &ExtraContext<'_>) -> Vec<ExtraStatement> {
        Vec::new()
    }
}

/// MARC 21 bibliographic positional decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExtraTransforms;

/// Leader/06 and 006/00 type of record to resource types.
fn resource_types(code: char) -> &'static [&'static str] {
    match code {
        'a' => &["LanguageMaterial"],
        't' => &["LanguageMaterial", "Manuscript"],
        'c' => &["NotatedMusic"],
        'd' => &["NotatedMusic", "Manuscript"],
        'e' => &["Cartography"],
        'f' => &["Cartography", "Manuscript"],
        'g' => &["MovingImage"],
        'i' => &["Audio", "Nonmusical"],
        'j' => &["Audio", "Musical"],
        'k' => &["StillImage"],
        'm' => &["Software"],
        'o' => &["Kit"],
        'p' => &["MixedMaterial"],
        'r' => &["ThreeDimensionalObject"],
        _ => &[],
    }
}

fn mode_of_issuance(code: char) -> Option<&'static str> {
    Some(match code {
        'a' => "monographic component part",
        'b' => "serial component part",
        'c' => "collection",
        'd' => "subunit",
        'i' => "integrating resource",
        'm' => "monograph",
        's' => "serial",
        _ => return None,
    })
}

fn category_of_material(code: char) -> Option<&'static str> {
    Some(match code {
        'a' => "map",
        'c' => "electronic resource",
        'd' => "globe",
        'f' => "tactile material",
        'g' => "projected graphic",
        'h' => "microform",
        'k' => "nonprojected graphic",
        'm' => "motion picture",
        'o' => "kit",
        'q' => "notated music",
        'r' => "remote-sensing image",
        's' => "sound recording",
        't' => "text",
        'v' => "videorecording",
        'z' => "unspecified",
        _ => return None,
    })
}

/// Characters `start..end` of a fixed field, trimmed of fill and blanks.
fn coded(field: &str, start: usize, end: usize) -> Option<String> {
    let value: String = field.chars().skip(start).take(end - start).collect();
    let value = value.trim_matches(|c: char| c == ' ' || c == '|' || c == '#');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn marc(name: &str) -> String {
    absolutize(name, MARC)
}

impl ExtraTransforms for DefaultExtraTransforms {
    fn process_leader(&self, leader: Option<&str>, ctx: &ExtraContext<'_>) -> Vec<ExtraStatement> {
        let Some(leader) = leader else {
            return Vec::new();
        };
        let mut positions = leader.chars().skip(6);
        let mut out = Vec::new();
        if let Some(code) = positions.next() {
            let types: Vec<String> = resource_types(code)
                .iter()
                .map(|name| absolutize(name, ctx.vocab_base))
                .collect();
            if !types.is_empty() {
                out.push(ExtraStatement::on_work(TYPE_REL, types));
            }
        }
        if let Some(mode) = positions.next().and_then(mode_of_issuance) {
            out.push(ExtraStatement::on(ctx.instance_id, marc("modeOfIssuance"), mode));
        }
        out
    }

    fn process_006(&self, fields: &[String], ctx: &ExtraContext<'_>) -> Vec<ExtraStatement> {
        fields
            .iter()
            .filter_map(|field| field.chars().next())
            .flat_map(resource_types)
            .map(|name| {
                ExtraStatement::on(
                    ctx.instance_id,
                    marc("additionalMaterial"),
                    absolutize(name, ctx.vocab_base),
                )
            })
            .collect()
    }

    fn process_007(&self, fields: &[String], ctx: &ExtraContext<'_>) -> Vec<ExtraStatement> {
        fields
            .iter()
            .filter_map(|field| field.chars().next().and_then(category_of_material))
            .map(|category| ExtraStatement::on(ctx.instance_id, marc("categoryOfMaterial"), category))
            .collect()
    }

    fn process_008(&self, field: Option<&str>, ctx: &ExtraContext<'_>) -> Vec<ExtraStatement> {
        let Some(field) = field else {
            return Vec::new();
        };
        let mut out = Vec::new();
        if let Some(date) = coded(field, 7, 11) {
            out.push(ExtraStatement::on(ctx.instance_id, marc("publicationDate"), date));
        }
        if let Some(place) = coded(field, 15, 18) {
            out.push(ExtraStatement::on(
                ctx.instance_id,
                marc("countryOfPublication"),
                place,
            ));
        }
        if let Some(language) = coded(field, 35, 38) {
            out.push(ExtraStatement::on_work(
                absolutize("language", ctx.vocab_base),
                vec![language],
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::BL;

    const CTX: ExtraContext<'static> = ExtraContext {
        work_id: "W",
        instance_id: "I",
        vocab_base: BL,
    };

    #[test]
    fn test_leader_type_and_mode() {
        let out = DefaultExtraTransforms.process_leader(Some("01000cjm a2200100 a 4500"), &CTX);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].origin, None);
        assert_eq!(out[0].relationship, TYPE_REL);
        assert_eq!(
            out[0].values,
            vec![
                "http://bibfra.me/vocab/lite/Audio".to_string(),
                "http://bibfra.me/vocab/lite/Musical".to_string()
            ]
        );
        assert_eq!(out[1].origin.as_deref(), Some("I"));
        assert_eq!(out[1].values, vec!["monograph".to_string()]);
    }

    #[test]
    fn test_missing_evidence_is_empty() {
        assert!(DefaultExtraTransforms.process_leader(None, &CTX).is_empty());
        assert!(DefaultExtraTransforms.process_008(None, &CTX).is_empty());
        assert!(DefaultExtraTransforms.process_007(&[], &CTX).is_empty());
        assert!(DefaultExtraTransforms.process_leader(Some("short"), &CTX).is_empty());
    }

    #[test]
    fn test_008_positions() {
        let f008 = "850101s1985    enk           000 0 eng d";
        let out = DefaultExtraTransforms.process_008(Some(f008), &CTX);
        let find = |rel: &str| {
            out.iter()
                .find(|s| s.relationship.ends_with(rel))
                .map(|s| s.values[0].clone())
        };
        assert_eq!(find("publicationDate").as_deref(), Some("1985"));
        assert_eq!(find("countryOfPublication").as_deref(), Some("enk"));
        assert_eq!(find("language").as_deref(), Some("eng"));
    }

    #[test]
    fn test_007_category() {
        let out = DefaultExtraTransforms.process_007(&["cr |n|||||||||".to_string()], &CTX);
        assert_eq!(out[0].values, vec!["electronic resource".to_string()]);
        assert_eq!(out[0].relationship, "http://bibfra.me/vocab/marc/categoryOfMaterial");
    }
}

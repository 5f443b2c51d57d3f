//! The rule engine: applies a [`TransformTable`] to every statement of a
//! record model.
//!
//! Each data statement is decomposed into tag, indicator pair (blank becomes
//! `#`) and subfield map. Every subfield value is tried against four keys,
//! most specific first, and then the field as a whole against four more; all
//! matching keys fire. In the main pass, statements no key matched are kept as
//! fallback statements on the Work under the `marcext/` namespace, and the
//! leader and 006/007/008 are handed to the positional [`ExtraTransforms`].

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::Result;
use crate::graph::{add_or_warn, add_unique, Link, MemoryGraph, StatementId, StatementStore};
use crate::isbn::parse_isbn;
use crate::materialize::{Materializer, Pair};
use crate::namespaces::{properties, sibling, CONTROL_REL, DATA_REL, LEADER_REL};
use crate::split::materialize_instance;

use super::extra::{ExtraContext, ExtraTransforms};
use super::table::{Action, Anchor, TransformTable, MAIN_TRANSFORMS, SIGNATURE_TRANSFORMS};

/// Subfield code to its values, in field order.
pub type SubfieldMap<'a> = IndexMap<&'a str, &'a [String]>;

/// Follow-up work a handler asks for once the main pass is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostprocessRequest {
    /// Register the id as one more Instance of the record's Work.
    AsInstance(String),
}

/// Which rule set runs and how statements are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Work identity rules only, over statements in statement id order.
    Signature,
    /// Every rule in natural order, with fallback and diagnostics.
    Main,
}

impl Pass {
    /// The table this pass applies.
    #[must_use]
    pub fn table(self) -> &'static TransformTable {
        match self {
            Pass::Signature => &SIGNATURE_TRANSFORMS,
            Pass::Main => &MAIN_TRANSFORMS,
        }
    }
}

/// The ids anchor-relative actions attach to.
#[derive(Debug, Clone, Copy)]
pub struct Anchors<'a> {
    /// Work id (the placeholder handle during the signature pass).
    pub work: &'a str,
    /// Default Instance id.
    pub instance: &'a str,
}

/// Everything a handler sees for one matched value.
pub struct HandlerContext<'a> {
    /// Origin of the statement being transformed.
    pub origin: &'a str,
    /// Field tag.
    pub tag: &'a str,
    /// The matched value (the field target for whole-field matches).
    pub value: &'a str,
    /// The field's subfields.
    pub subfields: &'a SubfieldMap<'a>,
    /// Read access to the record model.
    pub model: &'a dyn StatementStore,
    /// Write access to the graph under construction.
    pub output: &'a mut dyn StatementStore,
    /// Materialization callback and existing-id set.
    pub materializer: &'a mut Materializer,
    /// Statement anchors.
    pub anchors: Anchors<'a>,
    /// Requests appended by the handler.
    pub postprocessing: Vec<PostprocessRequest>,
}

impl HandlerContext<'_> {
    fn anchor(&self, on: Anchor) -> &str {
        match on {
            Anchor::Work => self.anchors.work,
            Anchor::Instance => self.anchors.instance,
        }
    }
}

impl Action {
    /// Applies the action to one matched value.
    ///
    /// # Errors
    ///
    /// Only materialization hook failures propagate; refused statements are
    /// logged and skipped.
    pub fn apply(&self, ctx: &mut HandlerContext<'_>) -> Result<()> {
        match *self {
            Action::Link { on, rel } => {
                let link = Link::new(ctx.anchor(on), ctx.materializer.vocab(rel), ctx.value);
                add_or_warn(&mut *ctx.output, link);
            },
            Action::Materialize {
                on,
                rel,
                entity,
                props,
                fixed,
            } => {
                let from_subfields = props.iter().flat_map(|(code, prop)| {
                    ctx.subfields
                        .get(*code)
                        .into_iter()
                        .flat_map(|values| values.iter())
                        .map(move |value| ((*prop).to_string(), value.clone()))
                });
                let mut data: Vec<Pair> = fixed
                    .iter()
                    .map(|(prop, value)| ((*prop).to_string(), (*value).to_string()))
                    .collect();
                data.extend(from_subfields);
                if data.len() == fixed.len() {
                    return Ok(());
                }
                link_entity(ctx, on, rel, entity, &data)?;
            },
            Action::Labelled { on, rel, entity } => {
                let data = [(properties::LABEL.to_string(), ctx.value.to_string())];
                link_entity(ctx, on, rel, entity, &data)?;
            },
            Action::InstanceFrom => {
                let Some((number, kind)) = parse_isbn(ctx.value) else {
                    trace!(value = ctx.value, tag = ctx.tag, "No ISBN in linked entry");
                    return Ok(());
                };
                let id = materialize_instance(
                    ctx.materializer,
                    &mut *ctx.output,
                    ctx.anchors.work,
                    &number,
                    kind.as_deref(),
                )?;
                ctx.postprocessing.push(PostprocessRequest::AsInstance(id));
            },
            Action::Ignore => {},
        }
        Ok(())
    }
}

/// Materializes an entity, adds its data statements and links the anchor to it.
fn link_entity(
    ctx: &mut HandlerContext<'_>,
    on: Anchor,
    rel: &str,
    entity: &str,
    data: &[Pair],
) -> Result<()> {
    let entity = ctx
        .materializer
        .materialize(entity, data, true, Some(&mut *ctx.output))?;
    for (prop, value) in data {
        let link = Link::new(entity.id.as_str(), ctx.materializer.vocab(prop), value.as_str());
        add_unique(&mut *ctx.output, link);
    }
    let link = Link::new(ctx.anchor(on), ctx.materializer.vocab(rel), entity.id);
    add_unique(&mut *ctx.output, link);
    Ok(())
}

/// What a pass produced besides statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Handler requests, in the order they were made.
    pub postprocessing: Vec<PostprocessRequest>,
    /// Per unmatched lookup key, how many values were dropped.
    pub dropped_codes: IndexMap<String, usize>,
}

/// Positional evidence gathered while visiting a record.
#[derive(Debug, Default)]
struct Evidence<'a> {
    leader: Option<&'a str>,
    f006: Vec<String>,
    f007: Vec<String>,
    f008: Option<&'a str>,
}

fn indicator(link: &Link, key: &str) -> char {
    match link.attribute(key).first().and_then(|v| v.chars().next()) {
        None | Some(' ') => '#',
        Some(c) => c,
    }
}

/// Runs one pass of the rule engine over a record model.
///
/// # Errors
///
/// Propagates materialization hook failures.
pub fn process_patterns(
    pass: Pass,
    model: &MemoryGraph,
    output: &mut dyn StatementStore,
    materializer: &mut Materializer,
    anchors: Anchors<'_>,
    extra: &dyn ExtraTransforms,
) -> Result<PassOutcome> {
    let table = pass.table();
    let main = pass == Pass::Main;
    let statements: Vec<(StatementId, &Link)> = match pass {
        Pass::Signature => model.sorted(),
        Pass::Main => model.iter().collect(),
    };
    let fallback_base = sibling(materializer.vocab_base(), "marcext/");
    let mut outcome = PassOutcome::default();
    let mut evidence = Evidence::default();

    for (_, link) in statements {
        if link.relationship == LEADER_REL {
            evidence.leader = Some(link.target.as_str());
            continue;
        }
        let is_control = link.relationship.starts_with(CONTROL_REL);
        if !is_control && !link.relationship.starts_with(DATA_REL) {
            continue;
        }
        let Some(tag) = link.attribute("tag").first() else {
            continue;
        };
        let tag = tag.as_str();
        if is_control {
            match tag {
                "006" => evidence.f006.push(link.target.clone()),
                "007" => evidence.f007.push(link.target.clone()),
                "008" => evidence.f008 = Some(link.target.as_str()),
                _ => {},
            }
        }

        let subfields: SubfieldMap<'_> = link
            .attributes
            .iter()
            .filter(|(key, _)| !key.starts_with("tag") && !key.starts_with("ind"))
            .map(|(key, values)| (key.as_str(), values.as_slice()))
            .collect();
        let (i1, i2) = (indicator(link, "ind1"), indicator(link, "ind2"));

        let mut to_process: Vec<(&'static [Action], &str)> = Vec::new();
        for (code, values) in &subfields {
            let lookups = [
                format!("{tag}-{i1}{i2}${code}"),
                format!("{tag}-?{i2}${code}"),
                format!("{tag}-{i1}?${code}"),
                format!("{tag}${code}"),
            ];
            for value in values.iter() {
                for (n, key) in lookups.iter().enumerate() {
                    if let Some(actions) = table.get(key) {
                        to_process.push((actions, value.as_str()));
                    } else if main && n != 1 && n != 2 && !table.contains_key(tag) {
                        *outcome.dropped_codes.entry(key.clone()).or_default() += 1;
                    }
                }
            }
        }
        let subfield_hits = to_process.len();

        let lookups = [
            format!("{tag}-{i1}{i2}"),
            format!("{tag}-?{i2}"),
            format!("{tag}-{i1}?"),
            tag.to_string(),
        ];
        for key in &lookups {
            if let Some(actions) = table.get(key) {
                to_process.push((actions, link.target.as_str()));
            }
        }
        if main && subfield_hits == to_process.len() && subfields.is_empty() {
            *outcome.dropped_codes.entry(tag.to_string()).or_default() += 1;
        }

        if main && to_process.is_empty() {
            if subfields.is_empty() {
                let rel = format!("{fallback_base}tag-{tag}");
                add_or_warn(output, Link::new(anchors.work, rel, link.target.as_str()));
            }
            let marker = |c: char| if c == '#' { 'X' } else { c };
            for (code, values) in &subfields {
                let rel = format!("{fallback_base}tag-{tag}-{}{}-{code}", marker(i1), marker(i2));
                for value in values.iter() {
                    add_or_warn(output, Link::new(anchors.work, rel.as_str(), value.as_str()));
                }
            }
            continue;
        }

        for (actions, value) in to_process {
            for action in actions {
                let mut ctx = HandlerContext {
                    origin: &link.origin,
                    tag,
                    value,
                    subfields: &subfields,
                    model,
                    output: &mut *output,
                    materializer: &mut *materializer,
                    anchors,
                    postprocessing: Vec::new(),
                };
                action.apply(&mut ctx)?;
                outcome.postprocessing.append(&mut ctx.postprocessing);
            }
        }
    }

    if main {
        apply_extra(extra, &evidence, materializer.vocab_base(), anchors, output);
    }
    Ok(outcome)
}

/// Adds the positional transforms' statements, suppressing exact duplicates.
fn apply_extra(
    extra: &dyn ExtraTransforms,
    evidence: &Evidence<'_>,
    vocab_base: &str,
    anchors: Anchors<'_>,
    output: &mut dyn StatementStore,
) {
    let ctx = ExtraContext {
        work_id: anchors.work,
        instance_id: anchors.instance,
        vocab_base,
    };
    let mut statements = extra.process_leader(evidence.leader, &ctx);
    statements.extend(extra.process_006(&evidence.f006, &ctx));
    statements.extend(extra.process_007(&evidence.f007, &ctx));
    statements.extend(extra.process_008(evidence.f008, &ctx));

    let mut seen = HashSet::new();
    for statement in statements {
        let origin = statement
            .origin
            .unwrap_or_else(|| anchors.work.to_string());
        for value in statement.values {
            let key = (origin.clone(), statement.relationship.clone(), value);
            if seen.contains(&key) {
                continue;
            }
            add_or_warn(output, Link::new(key.0.as_str(), key.1.as_str(), key.2.as_str()));
            seen.insert(key);
        }
    }
}

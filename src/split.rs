//! Work/Instance splitting.
//!
//! Each record yields one Work and one or more Instances. The Work id comes
//! from a signature pass over the record model: only the rules that bear on
//! Work identity run, into a scratch graph, and the Work is materialized from
//! the signature statements they hang off the placeholder handle. Instances
//! come from ISBN evidence in 020 $a, one per distinct normalized ISBN, or a
//! single default Instance when there is none.

use tracing::debug;

use crate::error::Result;
use crate::graph::{add_unique, Link, MemoryGraph, StatementStore};
use crate::isbn::{compute_ean13_check, isbn_list};
use crate::materialize::{Materializer, Pair};
use crate::namespaces::{classes, properties, ISBN_REL, ISBN_TYPE_REL, TYPE_REL};
use crate::record_model::marc_lookup;
use crate::transforms::{
    process_patterns, Anchors, ExtraTransforms, Pass, PostprocessRequest, WORK_SIGNATURE_RELS,
};

/// The Work produced for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOutcome {
    /// Work id, absolute under the entity base when one is configured.
    pub id: String,
    /// True if an earlier record already produced this Work.
    pub folded: bool,
}

/// Collects the Work signature: the placeholder's `(relationship, value)`
/// pairs, grouped by relationship in signature-set order.
///
/// Field order in the record only affects the order of values under one
/// relationship, so the same evidence always gives the same Work id.
#[must_use]
pub fn gather_work_signature(
    scratch: &MemoryGraph,
    placeholder: &str,
    materializer: &Materializer,
) -> Vec<Pair> {
    let mut signature = Vec::new();
    for rel in WORK_SIGNATURE_RELS {
        let rel = materializer.vocab(rel);
        signature.extend(
            scratch
                .match_links(Some(placeholder), Some(&rel))
                .map(|(_, link)| (link.relationship.clone(), link.target.clone())),
        );
    }
    signature
}

/// Runs the signature pass and materializes the record's Work.
///
/// The Work's type statement goes to `output`; nothing else from the
/// signature pass does.
///
/// # Errors
///
/// Propagates materialization hook failures.
pub fn materialize_work(
    model: &MemoryGraph,
    placeholder: &str,
    materializer: &mut Materializer,
    extra: &dyn ExtraTransforms,
    output: &mut dyn StatementStore,
) -> Result<WorkOutcome> {
    let mut scratch = MemoryGraph::new();
    let anchors = Anchors {
        work: placeholder,
        instance: placeholder,
    };
    process_patterns(Pass::Signature, model, &mut scratch, materializer, anchors, extra)?;

    let signature = gather_work_signature(&scratch, placeholder, materializer);
    let work = materializer.materialize(classes::WORK, &signature, true, None)?;
    let id = materializer.entity(&work.id);
    add_unique(output, Link::new(id.as_str(), TYPE_REL, materializer.vocab(classes::WORK)));

    Ok(WorkOutcome {
        id,
        folded: !work.first_seen,
    })
}

/// Materializes the Instance of `work_id` identified by an ISBN and adds its
/// identifying statements.
///
/// # Errors
///
/// Propagates materialization hook failures.
pub fn materialize_instance(
    materializer: &mut Materializer,
    output: &mut dyn StatementStore,
    work_id: &str,
    number: &str,
    kind: Option<&str>,
) -> Result<String> {
    let mut data: Vec<Pair> = vec![
        (properties::INSTANTIATES.to_string(), work_id.to_string()),
        (ISBN_REL.to_string(), number.to_string()),
    ];
    if let Some(kind) = kind {
        data.push((ISBN_TYPE_REL.to_string(), kind.to_string()));
    }
    let instance = materializer.materialize(classes::INSTANCE, &data, true, Some(&mut *output))?;
    let id = materializer.entity(&instance.id);

    add_unique(output, Link::new(id.as_str(), ISBN_REL, compute_ean13_check(number)));
    add_unique(
        output,
        Link::new(id.as_str(), materializer.vocab(properties::INSTANTIATES), work_id),
    );
    if let Some(kind) = kind {
        add_unique(output, Link::new(id.as_str(), ISBN_TYPE_REL, kind));
    }
    Ok(id)
}

/// Materializes the record's Instances from 020 $a, sorted by normalized
/// ISBN, or one default Instance if there are none.
///
/// # Errors
///
/// Propagates materialization hook failures.
pub fn generate_instances(
    model: &MemoryGraph,
    work_id: &str,
    materializer: &mut Materializer,
    output: &mut dyn StatementStore,
) -> Result<Vec<String>> {
    let raw = marc_lookup(model, &["020$a"]);
    let isbns = isbn_list(raw.iter().map(|(_, value)| value.as_str()));
    debug!(raw = ?raw, normalized = ?isbns, "ISBN evidence");

    if isbns.is_empty() {
        let data = [(properties::INSTANTIATES.to_string(), work_id.to_string())];
        let instance = materializer.materialize(classes::INSTANCE, &data, true, Some(&mut *output))?;
        let id = materializer.entity(&instance.id);
        add_unique(
            output,
            Link::new(id.as_str(), materializer.vocab(properties::INSTANTIATES), work_id),
        );
        return Ok(vec![id]);
    }

    isbns
        .iter()
        .map(|(number, kind)| {
            materialize_instance(&mut *materializer, &mut *output, work_id, number, kind.as_deref())
        })
        .collect()
}

/// Appends the Instances requested during the main pass.
pub fn register_requested(instance_ids: &mut Vec<String>, requests: &[PostprocessRequest]) {
    for request in requests {
        match request {
            PostprocessRequest::AsInstance(id) => {
                if !instance_ids.contains(id) {
                    instance_ids.push(id.clone());
                }
            },
        }
    }
}

/// Copies the first Instance's statements onto every other Instance.
///
/// The Instance type statement, ISBN and ISBN type statements, and the
/// `instantiates` link stay with the first Instance.
pub fn merge_instances(
    output: &mut dyn StatementStore,
    instance_ids: &[String],
    materializer: &Materializer,
) {
    let [first, rest @ ..] = instance_ids else {
        return;
    };
    if rest.is_empty() {
        return;
    }
    let instance_type = materializer.vocab(classes::INSTANCE);
    let instantiates = materializer.vocab(properties::INSTANTIATES);

    let shared: Vec<Link> = output
        .match_links(Some(first), None)
        .map(|(_, link)| link)
        .filter(|link| {
            !(link.relationship == TYPE_REL && link.target == instance_type)
                && link.relationship != ISBN_REL
                && link.relationship != ISBN_TYPE_REL
                && link.relationship != instantiates
        })
        .cloned()
        .collect();

    for other in rest {
        for link in &shared {
            add_unique(
                output,
                Link::with_attributes(
                    other.as_str(),
                    link.relationship.as_str(),
                    link.target.as_str(),
                    link.attributes.clone(),
                ),
            );
        }
    }
}

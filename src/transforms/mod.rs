//! Field transforms: the declarative tables, the rule engine that applies
//! them, and the positional decoders for the leader and 006/007/008.

pub mod engine;
pub mod extra;
pub mod table;

pub use engine::{
    process_patterns, Anchors, HandlerContext, Pass, PassOutcome, PostprocessRequest, SubfieldMap,
};
pub use extra::{DefaultExtraTransforms, ExtraContext, ExtraStatement, ExtraTransforms};
pub use table::{
    Action, Anchor, TransformTable, MAIN_TRANSFORMS, SIGNATURE_TRANSFORMS, WORK_SIGNATURE_RELS,
};

#![warn(missing_docs)]

//! # marc2bf: MARC to BIBFRAME Lite conversion
//!
//! Converts MARC bibliographic records into a content-addressed entity graph.
//! Every record is split into one Work and one or more Instances; entity ids
//! are derived from each entity's own data, so two records describing the
//! same Work fold onto the same node.
//!
//! ## Quick Start
//!
//! ```
//! use marc2bf::{ConverterConfig, Field, Leader, Record, RecordHandler};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let record = Record::builder(Leader::default())
//!     .control_field_str("001", "123")
//!     .field(
//!         Field::builder("245".to_string(), '1', '0')
//!             .subfield_str('a', "Title")
//!             .build(),
//!     )
//!     .build();
//!
//! let handler = RecordHandler::with_output(ConverterConfig::default(), Vec::new())?;
//! let output = handler.convert(vec![record])?;
//! output.finalize.wait()?;
//!
//! assert_eq!(output.summary.processed, 1);
//! let json = String::from_utf8(output.sink.unwrap_or_default())?;
//! assert!(json.contains("http://bibfra.me/vocab/lite/title"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`record`] and [`leader`]: decoded MARC records
//! - [`record_model`]: a record as a sequence of statements
//! - [`graph`]: the statement store and in-memory graph
//! - [`field_linkage`]: 880 alternate-script merging
//! - [`transforms`]: field transform tables and the rule engine
//! - [`materialize`] and [`idgen`]: content-addressed entity ids
//! - [`split`]: Work and Instance generation
//! - [`pipeline`]: the record-driving pipeline
//! - [`plugin`]: stage hooks
//! - [`isbn`]: ISBN normalization and check digits
//! - [`config`], [`error`], [`namespaces`]

pub mod config;
pub mod error;
pub mod field_linkage;
pub mod graph;
pub mod idgen;
pub mod isbn;
pub mod leader;
pub mod materialize;
pub mod namespaces;
pub mod pipeline;
pub mod plugin;
/// Core MARC record structures (`Record`, `Field`, `Subfield`)
pub mod record;
pub mod record_model;
pub mod split;
pub mod transforms;

pub use config::ConverterConfig;
pub use error::{ConvertError, Result};
pub use field_linkage::{resolve_xrefs, LinkageInfo, XrefReport};
pub use graph::{Attributes, Link, MemoryGraph, StatementId, StatementStore};
pub use idgen::{HashIdGenerator, IdGenerator};
pub use leader::Leader;
pub use materialize::{Materialized, Materializer};
pub use pipeline::{channel, feed, Flow, Limiter, RecordHandler, RunOutput, RunSummary, Stage};
pub use plugin::{FinalizeGroup, HookResult, Plugin, RecordContext};
pub use record::{Field, FieldBuilder, Record, RecordBuilder, Subfield};
pub use transforms::{DefaultExtraTransforms, ExtraTransforms};

//! MARC bibliographic record structures.
//!
//! This module provides the decoded record types conversion starts from:
//! - [`Record`]: Main bibliographic record structure
//! - [`Field`]: Variable data fields (010+)
//! - [`Subfield`]: Named data elements within fields
//!
//! A [`Record`] is turned into the statement form the converter works on with
//! [`crate::record_model::from_record`].
//!
//! # Examples
//!
//! ```ignore
//! use marc2bf::{Record, Field, Leader};
//!
//! let record = Record::builder(Leader::default())
//!     .control_field_str("001", "12345")
//!     .field(
//!         Field::builder("245".to_string(), '1', '0')
//!             .subfield_str('a', "Title")
//!             .build()
//!     )
//!     .build();
//! ```

use crate::leader::Leader;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A decoded MARC bibliographic record.
///
/// Control fields are grouped by tag. Data fields keep document order, which
/// the record model and the 880 pairing both rely on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Record leader (24 bytes)
    pub leader: Leader,
    /// Control fields (000-009), tag -> values
    pub control_fields: IndexMap<String, Vec<String>>,
    /// Data fields (010+) in document order
    pub fields: Vec<Field>,
}

/// A data field in a MARC record (fields 010 and higher)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field tag (3 digits)
    pub tag: String,
    /// First indicator
    pub indicator1: char,
    /// Second indicator
    pub indicator2: char,
    /// Subfields (stored in `SmallVec` to avoid allocation for typical fields with 4 or fewer subfields)
    pub subfields: SmallVec<[Subfield; 4]>,
}

/// A subfield within a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield value
    pub value: String,
}

impl Record {
    /// Create a new MARC record with the given leader
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            control_fields: IndexMap::new(),
            fields: Vec::new(),
        }
    }

    /// Create a builder for fluently constructing MARC records
    #[must_use]
    pub fn builder(leader: Leader) -> RecordBuilder {
        RecordBuilder {
            record: Record::new(leader),
        }
    }

    /// Add a control field (000-009)
    ///
    /// Repeatable control fields (006, 007) keep every occurrence.
    pub fn add_control_field(&mut self, tag: String, value: String) {
        self.control_fields.entry(tag).or_default().push(value);
    }

    /// Add a control field using string slices
    pub fn add_control_field_str(&mut self, tag: &str, value: &str) {
        self.add_control_field(tag.to_string(), value.to_string());
    }

    /// Append a data field
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Iterate over all data fields in document order
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Iterate over control fields as (tag, value) pairs
    pub fn control_fields_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.control_fields
            .iter()
            .flat_map(|(tag, values)| values.iter().map(move |v| (tag.as_str(), v.as_str())))
    }
}

impl Field {
    /// Create a new data field
    #[must_use]
    pub fn new(tag: String, indicator1: char, indicator2: char) -> Self {
        Field {
            tag,
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        }
    }

    /// Create a builder for fluently constructing fields
    #[must_use]
    pub fn builder(tag: String, indicator1: char, indicator2: char) -> FieldBuilder {
        FieldBuilder {
            field: Field::new(tag, indicator1, indicator2),
        }
    }

    /// Add a subfield
    pub fn add_subfield(&mut self, code: char, value: String) {
        self.subfields.push(Subfield { code, value });
    }

    /// Add a subfield using a string slice
    pub fn add_subfield_str(&mut self, code: char, value: &str) {
        self.add_subfield(code, value.to_string());
    }
}

/// Builder for [`Record`]
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Add a control field
    #[must_use]
    pub fn control_field_str(mut self, tag: &str, value: &str) -> Self {
        self.record.add_control_field_str(tag, value);
        self
    }

    /// Add a data field
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.record.add_field(field);
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> Record {
        self.record
    }
}

/// Builder for [`Field`]
#[derive(Debug)]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    /// Add a subfield
    #[must_use]
    pub fn subfield_str(mut self, code: char, value: &str) -> Self {
        self.field.add_subfield_str(code, value);
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> Field {
        self.field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let record = Record::builder(Leader::default())
            .control_field_str("001", "12345")
            .control_field_str("007", "ta")
            .control_field_str("007", "cr")
            .field(
                Field::builder("245".to_string(), '1', '0')
                    .subfield_str('a', "Title")
                    .subfield_str('a', "Again")
                    .build(),
            )
            .build();

        let control: Vec<_> = record.control_fields_iter().collect();
        assert_eq!(control, [("001", "12345"), ("007", "ta"), ("007", "cr")]);
        let f245 = record.fields().next().unwrap();
        let values: Vec<&str> = f245.subfields.iter().map(|sf| sf.value.as_str()).collect();
        assert_eq!(values, ["Title", "Again"]);
    }

    #[test]
    fn test_fields_keep_document_order() {
        let mut record = Record::new(Leader::default());
        for tag in ["245", "100", "880", "245"] {
            record.add_field(Field::new(tag.to_string(), ' ', ' '));
        }
        let tags: Vec<&str> = record.fields().map(|f| f.tag.as_str()).collect();
        assert_eq!(tags, ["245", "100", "880", "245"]);
    }
}

//! MARC record leader.
//!
//! The MARC leader is a 24-byte fixed-length field at the start of every MARC record.
//! Conversion only needs its rendered form (the leader statement of a record
//! model) and a handful of positions, decoded by [`crate::transforms::extra`].
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Record type (a = language material, c = music, etc.)
//! - Position 7: Bibliographic level (m = monograph, s = serial, etc.)
//! - Position 8: Control record type
//! - Position 9: Character coding (space = MARC-8, a = UTF-8)
//! - Position 10: Indicator count (usually 2)
//! - Position 11: Subfield code count (usually 2)
//! - Positions 12-16: Base address of data (5 digits)
//! - Positions 17-19: Encoding level, cataloging form, multipart level
//! - Positions 20-23: Reserved (usually "4500")

use serde::{Deserialize, Serialize};

/// MARC Leader - 24 bytes at the start of every MARC record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    /// Record length (5 digits) - positions 0-4
    pub record_length: u32,
    /// Record status (1 char) - position 5
    pub record_status: char,
    /// Type of record (1 char) - position 6
    pub record_type: char,
    /// Bibliographic level (1 char) - position 7
    pub bibliographic_level: char,
    /// Type of control record (1 char) - position 8
    pub control_record_type: char,
    /// Character coding scheme (1 char) - position 9
    pub character_coding: char,
    /// Indicator count (1 digit) - position 10 (usually 2)
    pub indicator_count: u8,
    /// Subfield code count (1 digit) - position 11 (usually 2)
    pub subfield_code_count: u8,
    /// Base address of data (5 digits) - positions 12-16
    pub data_base_address: u32,
    /// Encoding level (1 char) - position 17
    pub encoding_level: char,
    /// Cataloging form (1 char) - position 18
    pub cataloging_form: char,
    /// Multipart resource record level (1 char) - position 19
    pub multipart_level: char,
    /// Reserved (4 chars) - positions 20-23
    pub reserved: String,
}

impl Default for Leader {
    fn default() -> Self {
        Leader {
            record_length: 0,
            record_status: 'n',
            record_type: 'a',
            bibliographic_level: 'm',
            control_record_type: ' ',
            character_coding: 'a',
            indicator_count: 2,
            subfield_code_count: 2,
            data_base_address: 0,
            encoding_level: ' ',
            cataloging_form: 'a',
            multipart_level: ' ',
            reserved: "4500".to_string(),
        }
    }
}

impl Leader {
    /// Renders the leader as its 24-character MARC form.
    ///
    /// A reserved section that is not exactly four characters is padded or cut
    /// to fit, so the rendered positions always line up.
    #[must_use]
    pub fn to_marc_string(&self) -> String {
        let mut reserved: String = self.reserved.chars().take(4).collect();
        while reserved.chars().count() < 4 {
            reserved.push(' ');
        }
        format!(
            "{:05}{}{}{}{}{}{}{}{:05}{}{}{}{}",
            self.record_length % 100_000,
            self.record_status,
            self.record_type,
            self.bibliographic_level,
            self.control_record_type,
            self.character_coding,
            self.indicator_count % 10,
            self.subfield_code_count % 10,
            self.data_base_address % 100_000,
            self.encoding_level,
            self.cataloging_form,
            self.multipart_level,
            reserved,
        )
    }
}

//! Record leader parsing and serialization.
//!
//! The leader is a 24-byte fixed-length header at the start of every record.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Record type (a = language material, z = authority, etc.)
//! - Position 7: Bibliographic level (m = monograph, s = serial, etc.)
//! - Position 8: Control record type
//! - Position 9: Character coding (a = UTF-8)
//! - Position 10: Indicator count (usually 2)
//! - Position 11: Subfield code count (usually 2)
//! - Positions 12-16: Base address of data (5 digits)
//! - Positions 17-19: Encoding level, cataloging form, multipart level
//! - Positions 20-23: Entry map (usually "4500")
//!
//! The record length and base address stored here are whatever the input
//! said. Serialization never trusts them: both are recomputed from the
//! field list by [`crate::writer::encode_record`].

use crate::error::{MarcError, Result};
use crate::layout::{self, LEADER_LENGTH, RECORD_LENGTH_WIDTH};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Record leader, the 24 bytes at the start of every record.
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
    /// Indicator count (1 digit) - position 10
    pub indicator_count: u8,
    /// Subfield code count (1 digit) - position 11
    pub subfield_code_count: u8,
    /// Base address of data (5 digits) - positions 12-16
    pub data_base_address: u32,
    /// Encoding level (1 char) - position 17
    pub encoding_level: char,
    /// Cataloging form (1 char) - position 18
    pub cataloging_form: char,
    /// Multipart resource record level (1 char) - position 19
    pub multipart_level: char,
    /// Entry map (4 chars) - positions 20-23
    pub entry_map: String,
}

/// Broad record category derived from leader position 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// Bibliographic description (`a c d e f g i j k m o p r t`).
    Bibliographic,
    /// Authority record (`z`).
    Authority,
    /// Classification record (`w`).
    Classification,
    /// Holdings record (`u v x y`).
    Holdings,
    /// Anything else.
    Unknown,
}

impl RecordType {
    /// Classify a leader/06 value.
    #[must_use]
    pub fn from_leader_char(c: char) -> Self {
        match c {
            'a' | 'c' | 'd' | 'e' | 'f' | 'g' | 'i' | 'j' | 'k' | 'm' | 'o' | 'p' | 'r' | 't' => {
                RecordType::Bibliographic
            }
            'z' => RecordType::Authority,
            'w' => RecordType::Classification,
            'u' | 'v' | 'x' | 'y' => RecordType::Holdings,
            _ => RecordType::Unknown,
        }
    }
}

/// Bibliographic level from leader position 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BibliographicLevel {
    /// `a`
    MonographicComponentPart,
    /// `b`
    SerialComponentPart,
    /// `c`
    Collection,
    /// `d`
    Subunit,
    /// `i`
    IntegratingResource,
    /// `m`
    Monograph,
    /// `s`
    Serial,
    /// Any other value.
    Other(char),
}

impl BibliographicLevel {
    /// Classify a leader/07 value.
    #[must_use]
    pub fn from_leader_char(c: char) -> Self {
        match c {
            'a' => BibliographicLevel::MonographicComponentPart,
            'b' => BibliographicLevel::SerialComponentPart,
            'c' => BibliographicLevel::Collection,
            'd' => BibliographicLevel::Subunit,
            'i' => BibliographicLevel::IntegratingResource,
            'm' => BibliographicLevel::Monograph,
            's' => BibliographicLevel::Serial,
            other => BibliographicLevel::Other(other),
        }
    }

    /// Whether this level describes a component part (article or chapter).
    #[must_use]
    pub fn is_component_part(self) -> bool {
        matches!(
            self,
            BibliographicLevel::MonographicComponentPart | BibliographicLevel::SerialComponentPart
        )
    }
}

impl Default for Leader {
    /// A blank leader for a new UTF-8 monograph; lengths are filled in on write.
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
            cataloging_form: ' ',
            multipart_level: ' ',
            entry_map: "4500".to_string(),
        }
    }
}

impl Leader {
    /// Parse a leader from exactly 24 bytes.
    ///
    /// Every position must be ASCII, and the record length, base address,
    /// indicator count and subfield code count must be digits.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] describing the first bad position.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::parse(bytes, true)
    }

    /// Parse a leader whose numeric positions may be blank or garbage.
    ///
    /// Non-digit length and base address read as 0 and non-digit counts read
    /// as 2. Used for XML input, where both counters are recomputed anyway.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidLeader`] if the input is not 24 ASCII bytes.
    pub fn from_bytes_relaxed(bytes: &[u8]) -> Result<Self> {
        Self::parse(bytes, false)
    }

    fn parse(bytes: &[u8], strict: bool) -> Result<Self> {
        if bytes.len() != LEADER_LENGTH {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be exactly {LEADER_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
            return Err(MarcError::InvalidLeader(format!(
                "Non-ASCII byte 0x{:02x} at position {pos}",
                bytes[pos]
            )));
        }

        let record_length = numeric(bytes, 0, RECORD_LENGTH_WIDTH, strict, 0)?;
        let indicator_count = numeric(bytes, 10, 1, strict, 2)?;
        let subfield_code_count = numeric(bytes, 11, 1, strict, 2)?;
        let data_base_address = numeric(bytes, 12, RECORD_LENGTH_WIDTH, strict, 0)?;

        Ok(Leader {
            record_length: u32::try_from(record_length).unwrap_or(u32::MAX),
            record_status: bytes[5] as char,
            record_type: bytes[6] as char,
            bibliographic_level: bytes[7] as char,
            control_record_type: bytes[8] as char,
            character_coding: bytes[9] as char,
            indicator_count: u8::try_from(indicator_count).unwrap_or(2),
            subfield_code_count: u8::try_from(subfield_code_count).unwrap_or(2),
            data_base_address: u32::try_from(data_base_address).unwrap_or(u32::MAX),
            encoding_level: bytes[17] as char,
            cataloging_form: bytes[18] as char,
            multipart_level: bytes[19] as char,
            entry_map: String::from_utf8_lossy(&bytes[20..24]).into_owned(),
        })
    }

    /// Validate that the leader is suitable for binary record reading.
    ///
    /// The record must at least hold its own leader, and the base address
    /// must lie past the leader and not beyond the record end.
    ///
    /// # Errors
    ///
    /// Returns an error describing the inconsistent counter.
    pub fn validate_for_reading(&self) -> Result<()> {
        if (self.record_length as usize) < LEADER_LENGTH {
            return Err(MarcError::InvalidLeader(format!(
                "Record length must be at least {LEADER_LENGTH}, got {}",
                self.record_length
            )));
        }
        if (self.data_base_address as usize) <= LEADER_LENGTH {
            return Err(MarcError::InvalidLeader(format!(
                "Base address of data must be greater than {LEADER_LENGTH}, got {}",
                self.data_base_address
            )));
        }
        if self.data_base_address > self.record_length {
            return Err(MarcError::InvalidLeader(format!(
                "Base address of data {} lies beyond the record length {}",
                self.data_base_address, self.record_length
            )));
        }
        Ok(())
    }

    /// Serialize the leader with its stored counters.
    ///
    /// # Errors
    ///
    /// Returns an error if a counter does not fit its width or a position
    /// holds a non-ASCII character.
    pub fn as_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(LEADER_LENGTH);
        self.encode_with(
            self.record_length as usize,
            self.data_base_address as usize,
            &mut bytes,
        )?;
        Ok(bytes)
    }

    /// Append the 24 leader bytes, substituting the given counters.
    pub(crate) fn encode_with(
        &self,
        record_length: usize,
        base_address: usize,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let start = out.len();
        let result = self.encode_inner(record_length, base_address, out);
        if result.is_err() {
            out.truncate(start);
        }
        result
    }

    fn encode_inner(&self, record_length: usize, base_address: usize, out: &mut Vec<u8>) -> Result<()> {
        if !layout::write_digits(record_length, RECORD_LENGTH_WIDTH, out) {
            return Err(MarcError::RecordTooLong {
                length: record_length,
                max: layout::MAX_RECORD_LENGTH,
            });
        }
        for c in [
            self.record_status,
            self.record_type,
            self.bibliographic_level,
            self.control_record_type,
            self.character_coding,
        ] {
            out.push(ascii(c)?);
        }
        for count in [self.indicator_count, self.subfield_code_count] {
            if count > 9 {
                return Err(MarcError::InvalidLeader(format!(
                    "Count {count} does not fit one digit"
                )));
            }
            out.push(b'0' + count);
        }
        if !layout::write_digits(base_address, RECORD_LENGTH_WIDTH, out) {
            return Err(MarcError::InvalidLeader(format!(
                "Base address {base_address} does not fit {RECORD_LENGTH_WIDTH} digits"
            )));
        }
        for c in [self.encoding_level, self.cataloging_form, self.multipart_level] {
            out.push(ascii(c)?);
        }
        if self.entry_map.len() != 4 || !self.entry_map.is_ascii() {
            return Err(MarcError::InvalidLeader(format!(
                "Entry map must be 4 ASCII characters, got {:?}",
                self.entry_map
            )));
        }
        out.extend_from_slice(self.entry_map.as_bytes());
        Ok(())
    }

    /// Broad record category from position 6.
    #[must_use]
    pub fn record_type_kind(&self) -> RecordType {
        RecordType::from_leader_char(self.record_type)
    }

    /// Bibliographic level from position 7.
    #[must_use]
    pub fn bibliographic_level_kind(&self) -> BibliographicLevel {
        BibliographicLevel::from_leader_char(self.bibliographic_level)
    }
}

impl fmt::Display for Leader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_bytes() {
            Ok(bytes) => f.write_str(&String::from_utf8_lossy(&bytes)),
            Err(_) => Err(fmt::Error),
        }
    }
}

fn ascii(c: char) -> Result<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| MarcError::InvalidLeader(format!("Non-ASCII leader character {c:?}")))
}

fn numeric(bytes: &[u8], start: usize, width: usize, strict: bool, fallback: usize) -> Result<usize> {
    let slice = &bytes[start..start + width];
    match layout::parse_digits(slice) {
        Some(value) => Ok(value),
        None if strict => Err(MarcError::InvalidLeader(format!(
            "Expected {width} digit(s) at position {start}, found \"{}\"",
            layout::describe_bytes(slice)
        ))),
        None => Ok(fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_from_bytes() {
        let leader = Leader::from_bytes(b"00070naa a2200049 c 4500").unwrap();

        assert_eq!(leader.record_length, 70);
        assert_eq!(leader.record_status, 'n');
        assert_eq!(leader.record_type, 'a');
        assert_eq!(leader.bibliographic_level, 'a');
        assert_eq!(leader.control_record_type, ' ');
        assert_eq!(leader.character_coding, 'a');
        assert_eq!(leader.indicator_count, 2);
        assert_eq!(leader.subfield_code_count, 2);
        assert_eq!(leader.data_base_address, 49);
        assert_eq!(leader.encoding_level, ' ');
        assert_eq!(leader.cataloging_form, 'c');
        assert_eq!(leader.multipart_level, ' ');
        assert_eq!(leader.entry_map, "4500");
    }

    #[test]
    fn test_leader_roundtrip() {
        let bytes = b"02048cam a2200256 i 4500";
        let leader = Leader::from_bytes(bytes).unwrap();
        assert_eq!(leader.as_bytes().unwrap(), bytes.to_vec());
        assert_eq!(leader.to_string(), "02048cam a2200256 i 4500");
    }

    #[test]
    fn test_leader_wrong_length() {
        assert!(Leader::from_bytes(b"0123456789012").is_err());
        assert!(Leader::from_bytes(b"00070naa a2200049 c 45000").is_err());
    }

    #[test]
    fn test_leader_non_digit_length_is_rejected() {
        let err = Leader::from_bytes(b"0007Xnaa a2200049 c 4500").unwrap_err();
        assert!(err.to_string().contains("position 0"), "got: {err}");
    }

    #[test]
    fn test_leader_invalid_indicator_count() {
        assert!(Leader::from_bytes(b"00070naa aX200049 c 4500").is_err());
    }

    #[test]
    fn test_relaxed_parse_defaults_counters() {
        let leader = Leader::from_bytes_relaxed(b"     nam a22     uu 4500").unwrap();
        assert_eq!(leader.record_length, 0);
        assert_eq!(leader.data_base_address, 0);
        assert_eq!(leader.record_type, 'a');
        assert!(Leader::from_bytes_relaxed(b"short").is_err());
    }

    #[test]
    fn test_encode_with_rejects_oversized_length() {
        let mut out = b"keep".to_vec();
        let err = Leader::default()
            .encode_with(100_000, 49, &mut out)
            .unwrap_err();
        assert!(err.is_capacity_error());
        assert_eq!(out, b"keep");
    }

    #[test]
    fn test_non_ascii_leader_char_is_rejected() {
        let leader = Leader {
            record_status: 'é',
            ..Leader::default()
        };
        assert!(leader.as_bytes().is_err());
    }

    #[test]
    fn test_record_type_classification() {
        assert_eq!(RecordType::from_leader_char('a'), RecordType::Bibliographic);
        assert_eq!(RecordType::from_leader_char('m'), RecordType::Bibliographic);
        assert_eq!(RecordType::from_leader_char('z'), RecordType::Authority);
        assert_eq!(RecordType::from_leader_char('w'), RecordType::Classification);
        assert_eq!(RecordType::from_leader_char('y'), RecordType::Holdings);
        assert_eq!(RecordType::from_leader_char('#'), RecordType::Unknown);
    }

    #[test]
    fn test_bibliographic_level_component_parts() {
        assert!(BibliographicLevel::from_leader_char('a').is_component_part());
        assert!(BibliographicLevel::from_leader_char('b').is_component_part());
        assert!(!BibliographicLevel::from_leader_char('m').is_component_part());
        assert_eq!(
            BibliographicLevel::from_leader_char('q'),
            BibliographicLevel::Other('q')
        );
    }

    #[test]
    fn test_validate_for_reading_rejects_small_record_length() {
        let leader = Leader::from_bytes(b"00010nam a2200025 i 4500").unwrap();
        let err = leader.validate_for_reading().unwrap_err().to_string();
        assert!(err.contains("Record length must be at least 24"), "got: {err}");
    }

    #[test]
    fn test_validate_for_reading_rejects_small_base_address() {
        let leader = Leader::from_bytes(b"00050nam a2200010 i 4500").unwrap();
        let err = leader.validate_for_reading().unwrap_err().to_string();
        assert!(err.contains("Base address of data"), "got: {err}");
    }

    #[test]
    fn test_validate_for_reading_rejects_base_beyond_length() {
        let leader = Leader::from_bytes(b"00050nam a2200060 i 4500").unwrap();
        assert!(leader.validate_for_reading().is_err());
    }
}

//! The binary directory: one `(tag, length, offset)` entry per field.
//!
//! Entries are derived from a record's field list when it is serialized and
//! parsed back when a record is read. A [`crate::Record`] never stores them.

use crate::error::{MarcError, Result};
use crate::layout::{
    self, DIRECTORY_ENTRY_LENGTH, FIELD_LENGTH_WIDTH, FIELD_OFFSET_WIDTH, FIELD_TERMINATOR,
    MAX_FIELD_LENGTH, TAG_LENGTH,
};
use crate::record::Field;
use crate::recovery::RecoveryContext;
use crate::tag::Tag;

/// One directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Field tag.
    pub tag: Tag,
    /// Field length in bytes, terminator included.
    pub length: usize,
    /// Start of the field relative to the base address of data.
    pub offset: usize,
}

impl DirectoryEntry {
    /// Parse a 12-byte entry.
    ///
    /// # Errors
    ///
    /// Fails on an invalid tag or non-digit length or offset.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != DIRECTORY_ENTRY_LENGTH {
            return Err(MarcError::InvalidRecord(format!(
                "Directory entry must be {DIRECTORY_ENTRY_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        let tag = Tag::from_bytes(&bytes[..TAG_LENGTH])?;
        let (length_bytes, offset_bytes) = bytes[TAG_LENGTH..].split_at(FIELD_LENGTH_WIDTH);
        let length = layout::parse_digits(length_bytes).ok_or_else(|| {
            MarcError::InvalidRecord(format!(
                "Directory entry for {tag}: non-digit length \"{}\"",
                layout::describe_bytes(length_bytes)
            ))
        })?;
        let offset = layout::parse_digits(offset_bytes).ok_or_else(|| {
            MarcError::InvalidRecord(format!(
                "Directory entry for {tag}: non-digit offset \"{}\"",
                layout::describe_bytes(offset_bytes)
            ))
        })?;
        Ok(DirectoryEntry {
            tag,
            length,
            offset,
        })
    }

    /// Append the 12-byte form.
    ///
    /// # Errors
    ///
    /// Fails if the length or offset does not fit its width.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(self.tag.as_bytes());
        if !layout::write_digits(self.length, FIELD_LENGTH_WIDTH, out) {
            return Err(MarcError::FieldTooLong {
                tag: self.tag.to_string(),
                length: self.length,
                max: MAX_FIELD_LENGTH,
            });
        }
        if !layout::write_digits(self.offset, FIELD_OFFSET_WIDTH, out) {
            return Err(MarcError::RecordTooLong {
                length: self.offset,
                max: layout::MAX_RECORD_LENGTH,
            });
        }
        Ok(())
    }
}

/// Derive the directory for a field list, with cumulative offsets.
///
/// # Errors
///
/// Returns [`MarcError::FieldTooLong`] for a field over 9,999 bytes.
pub fn derive(fields: &[Field]) -> Result<Vec<DirectoryEntry>> {
    let mut offset = 0;
    fields
        .iter()
        .map(|field| {
            let length = field.encoded_len();
            if length > MAX_FIELD_LENGTH {
                return Err(MarcError::FieldTooLong {
                    tag: field.tag().to_string(),
                    length,
                    max: MAX_FIELD_LENGTH,
                });
            }
            let entry = DirectoryEntry {
                tag: field.tag(),
                length,
                offset,
            };
            offset += length;
            Ok(entry)
        })
        .collect()
}

/// Parse the directory area (the bytes between the leader and the base
/// address, terminator included).
///
/// A missing directory terminator is a recoverable defect; an area that does
/// not divide into whole entries is not.
pub(crate) fn parse(area: &[u8], ctx: &mut RecoveryContext) -> Result<Vec<DirectoryEntry>> {
    let entries = match area.split_last() {
        Some((&FIELD_TERMINATOR, entries)) => entries,
        _ => {
            ctx.tolerate(MarcError::InvalidRecord(
                "Directory is not terminated by a field terminator".to_string(),
            ))?;
            area
        },
    };
    if entries.len() % DIRECTORY_ENTRY_LENGTH != 0 {
        return Err(MarcError::InvalidRecord(format!(
            "Directory length {} is not a multiple of {DIRECTORY_ENTRY_LENGTH}",
            entries.len()
        )));
    }
    entries
        .chunks_exact(DIRECTORY_ENTRY_LENGTH)
        .map(DirectoryEntry::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::RecoveryMode;
    use crate::subfields::Subfields;

    #[test]
    fn test_derive_offsets_are_cumulative() {
        let fields = vec![
            Field::control("001", "123456789").unwrap(),
            Field::data("245", Subfields::from_pairs(' ', '0', [('a', "Title")])).unwrap(),
        ];
        let entries = derive(&fields).unwrap();
        assert_eq!(entries[0].length, 10);
        assert_eq!(entries[0].offset, 0);
        assert_eq!(entries[1].length, 10);
        assert_eq!(entries[1].offset, 10);
    }

    #[test]
    fn test_entry_encode_parse() {
        let entry = DirectoryEntry {
            tag: Tag::new("245").unwrap(),
            length: 10,
            offset: 10,
        };
        let mut out = Vec::new();
        entry.encode_into(&mut out).unwrap();
        assert_eq!(out, b"245001000010");
        assert_eq!(DirectoryEntry::parse(&out).unwrap(), entry);
    }

    #[test]
    fn test_parse_rejects_non_digit_length() {
        assert!(DirectoryEntry::parse(b"24500x000010").is_err());
        assert!(DirectoryEntry::parse(b"2450010000 0").is_err());
    }

    #[test]
    fn test_parse_directory_area() {
        let mut ctx = RecoveryContext::default();
        let entries = parse(b"001001000000245001000010\x1E", &mut ctx).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].tag.as_str(), "245");
    }

    #[test]
    fn test_parse_directory_missing_terminator() {
        let area = b"001001000000";
        assert!(parse(area, &mut RecoveryContext::new(RecoveryMode::Strict)).is_err());

        let mut lenient = RecoveryContext::new(RecoveryMode::Lenient);
        assert_eq!(parse(area, &mut lenient).unwrap().len(), 1);
        assert!(lenient.has_errors());
    }

    #[test]
    fn test_parse_directory_partial_entry_is_fatal() {
        let mut lenient = RecoveryContext::new(RecoveryMode::Lenient);
        assert!(parse(b"0010010000\x1E", &mut lenient).is_err());
    }
}

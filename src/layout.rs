//! Fixed-width layout of the binary record format.
//!
//! The leader and directory carry their lengths and offsets as zero-padded
//! ASCII digits. The functions here are the only place those fields are
//! decoded or encoded; they are pure and strict: a field either consists of
//! exactly `width` ASCII digits or it is rejected.

/// Length of the leader in bytes.
pub const LEADER_LENGTH: usize = 24;

/// Length of one directory entry: tag (3) + field length (4) + offset (5).
pub const DIRECTORY_ENTRY_LENGTH: usize = 12;

/// Width of the tag part of a directory entry.
pub const TAG_LENGTH: usize = 3;

/// Width of the field-length part of a directory entry.
pub const FIELD_LENGTH_WIDTH: usize = 4;

/// Width of the starting-offset part of a directory entry.
pub const FIELD_OFFSET_WIDTH: usize = 5;

/// Width of the record-length and base-address leader fields.
pub const RECORD_LENGTH_WIDTH: usize = 5;

/// Largest record the 5-digit leader length can describe.
pub const MAX_RECORD_LENGTH: usize = 99_999;

/// Largest field the 4-digit directory length can describe (terminator included).
pub const MAX_FIELD_LENGTH: usize = 9_999;

/// Terminates every field and the directory.
pub const FIELD_TERMINATOR: u8 = 0x1E;

/// Precedes every subfield code.
pub const SUBFIELD_DELIMITER: u8 = 0x1F;

/// Terminates every record.
pub const RECORD_TERMINATOR: u8 = 0x1D;

/// Parse a fixed-width field of ASCII digits.
///
/// Returns `None` unless `bytes` is non-empty and every byte is an ASCII digit.
/// Leading zeros are allowed; signs and whitespace are not.
///
/// # Examples
///
/// ```
/// use marcio::layout::parse_digits;
///
/// assert_eq!(parse_digits(b"00125"), Some(125));
/// assert_eq!(parse_digits(b"0012 "), None);
/// ```
#[must_use]
pub fn parse_digits(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }
    let mut value = 0usize;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add(usize::from(byte - b'0'))?;
    }
    Some(value)
}

/// Append `value` as exactly `width` zero-padded ASCII digits.
///
/// Returns `false` (and appends nothing) if the value needs more than
/// `width` digits.
///
/// # Examples
///
/// ```
/// use marcio::layout::write_digits;
///
/// let mut out = Vec::new();
/// assert!(write_digits(42, 5, &mut out));
/// assert_eq!(out, b"00042");
/// assert!(!write_digits(100_000, 5, &mut out));
/// assert_eq!(out, b"00042");
/// ```
#[must_use]
pub fn write_digits(value: usize, width: usize, out: &mut Vec<u8>) -> bool {
    let digits = format!("{value:0width$}");
    if digits.len() != width {
        return false;
    }
    out.extend_from_slice(digits.as_bytes());
    true
}

/// Render raw bytes for diagnostics.
pub(crate) fn describe_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).escape_debug().to_string()
}

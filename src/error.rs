//! Error types for MARC operations.
//!
//! This module provides the [`MarcError`] type for all record, codec, and
//! stream operations and the [`Result`] convenience type.
//!
//! Absence of a tag or subfield is never an error: lookups return `Option`
//! or an empty iterator. Structural findings such as a local block without a
//! control number are reported by
//! [`RecordStructureValidator`](crate::record_validation::RecordStructureValidator)
//! and are not errors either.

use thiserror::Error;

/// Error type for all MARC library operations.
#[derive(Error, Debug)]
pub enum MarcError {
    /// Error indicating an invalid or malformed MARC record.
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid leader (24-byte header).
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// A tag that is not exactly three ASCII alphanumeric characters.
    #[error("Invalid tag: {0:?}")]
    InvalidTag(String),

    /// Field or subfield content that is not valid UTF-8.
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// An XML prolog declared an encoding other than UTF-8.
    #[error("Unsupported XML encoding: {0:?} (only UTF-8 is accepted)")]
    UnsupportedEncoding(String),

    /// Error indicating a truncated or incomplete record.
    #[error("Truncated record: {0}")]
    TruncatedRecord(String),

    /// XML well-formedness or MARCXML structure error.
    #[error("XML error at byte {position}: {message}")]
    Xml {
        /// Absolute byte position in the input stream.
        position: u64,
        /// Diagnostic.
        message: String,
    },

    /// A record-level error annotated with the stream offset of the record.
    #[error("Malformed record at byte offset {offset}: {source}")]
    MalformedRecord {
        /// Offset of the first byte of the failing record.
        offset: u64,
        /// Underlying structural error.
        #[source]
        source: Box<MarcError>,
    },

    /// The serialized record would exceed the maximum record length.
    #[error("Record length {length} exceeds the maximum of {max} bytes")]
    RecordTooLong {
        /// Serialized length the record would have.
        length: usize,
        /// Format ceiling.
        max: usize,
    },

    /// A single field would exceed the 4-digit directory length.
    #[error("Field {tag} length {length} exceeds the maximum of {max} bytes")]
    FieldTooLong {
        /// Tag of the offending field.
        tag: String,
        /// Encoded length including the field terminator.
        length: usize,
        /// Format ceiling.
        max: usize,
    },

    /// Attempt to add a second occurrence of a non-repeatable field.
    #[error("Field {0} is not repeatable and is already present")]
    NonRepeatableField(String),

    /// The record read at a stored offset is not the one that was indexed.
    #[error("Offset {offset} is stale: expected control number {expected:?}, found {found:?}")]
    StaleOffset {
        /// The offset that was seeked to.
        offset: u64,
        /// Control number recorded when the offset was captured.
        expected: String,
        /// Control number actually found there.
        found: Option<String>,
    },

    /// The input format could not be determined.
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    /// A write was attempted after `finish`.
    #[error("Cannot write to a finished writer")]
    WriterFinished,

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MarcError {
    /// Attach the stream offset of the record being decoded.
    pub(crate) fn at_offset(self, offset: u64) -> Self {
        match self {
            MarcError::IoError(_) | MarcError::MalformedRecord { .. } => self,
            other => MarcError::MalformedRecord {
                offset,
                source: Box::new(other),
            },
        }
    }

    /// Whether this is a capacity error (record or field too long).
    #[must_use]
    pub fn is_capacity_error(&self) -> bool {
        matches!(
            self,
            MarcError::RecordTooLong { .. } | MarcError::FieldTooLong { .. }
        )
    }
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;

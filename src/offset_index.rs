//! Random access to records by previously captured stream offsets.
//!
//! A [`RecordOffset`] is what `tell()` returns just before a record is read
//! or written. Seeking back to it and reading yields that record again,
//! provided the file has not been rewritten since the offset was captured.
//! Nothing can enforce that precondition, so [`OffsetIndex::fetch`] checks the
//! control number of whatever it reads and reports a mismatch as
//! [`MarcError::StaleOffset`].
//!
//! # Examples
//!
//! ```no_run
//! use marcio::{FileType, OffsetIndex, Reader};
//!
//! let mut reader = Reader::open("authority.mrc", FileType::Auto)?;
//! let index = OffsetIndex::build(&mut reader)?;
//! if let Some(record) = index.fetch(&mut reader, "040000001")? {
//!     println!("{:?}", record.get_first_subfield_value("100", 'a'));
//! }
//! # Ok::<(), marcio::MarcError>(())
//! ```

use crate::error::{MarcError, Result};
use crate::formats::Reader;
use crate::record::Record;
use indexmap::IndexMap;
use std::fmt;
use std::io::{Read, Seek};
use tracing::{debug, warn};

/// Opaque byte offset of a record within a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RecordOffset(u64);

impl RecordOffset {
    /// Wrap a raw byte offset.
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        RecordOffset(offset)
    }

    /// The raw byte offset.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<RecordOffset> for u64 {
    fn from(offset: RecordOffset) -> Self {
        offset.0
    }
}

/// Control number to offset map built by one sequential scan.
#[derive(Debug, Clone, Default)]
pub struct OffsetIndex {
    offsets: IndexMap<String, RecordOffset>,
    duplicates: usize,
    without_control_number: usize,
}

impl OffsetIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `reader` from its current position to the end.
    ///
    /// Records without a control number are skipped and counted. For a
    /// control number seen more than once the first offset wins.
    ///
    /// # Errors
    ///
    /// Propagates the first read error.
    pub fn build<R: Read + Seek>(reader: &mut Reader<R>) -> Result<Self> {
        let mut index = OffsetIndex::new();
        loop {
            let offset = reader.tell();
            let Some(record) = reader.read()? else {
                break;
            };
            match record.control_number() {
                Some(id) => {
                    index.insert(id, offset);
                },
                None => index.without_control_number += 1,
            }
        }
        debug!(
            records = index.len(),
            duplicates = index.duplicates,
            "built offset index"
        );
        Ok(index)
    }

    /// Remember `offset` for `control_number` unless it is already known.
    ///
    /// Returns `false` for a duplicate.
    pub fn insert(&mut self, control_number: &str, offset: RecordOffset) -> bool {
        if self.offsets.contains_key(control_number) {
            warn!(control_number, %offset, "duplicate control number, keeping first offset");
            self.duplicates += 1;
            return false;
        }
        self.offsets.insert(control_number.to_string(), offset);
        true
    }

    /// Offset recorded for `control_number`.
    #[must_use]
    pub fn get(&self, control_number: &str) -> Option<RecordOffset> {
        self.offsets.get(control_number).copied()
    }

    /// Seek to the record for `control_number`, read it, and verify it.
    ///
    /// Returns `Ok(None)` if the control number is not in the index.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::StaleOffset`] if the record found at the offset
    /// has a different control number, plus any seek or read error.
    pub fn fetch<R: Read + Seek>(
        &self,
        reader: &mut Reader<R>,
        control_number: &str,
    ) -> Result<Option<Record>> {
        let Some(offset) = self.get(control_number) else {
            return Ok(None);
        };
        reader.seek(offset)?;
        let record = reader.read()?;
        let found = record
            .as_ref()
            .and_then(Record::control_number)
            .map(str::to_string);
        match record {
            Some(record) if found.as_deref() == Some(control_number) => Ok(Some(record)),
            _ => Err(MarcError::StaleOffset {
                offset: offset.get(),
                expected: control_number.to_string(),
                found,
            }),
        }
    }

    /// Number of indexed control numbers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// How many repeated control numbers were ignored.
    #[must_use]
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// How many scanned records had no control number.
    #[must_use]
    pub fn without_control_number(&self) -> usize {
        self.without_control_number
    }

    /// Entries in scan order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, RecordOffset)> {
        self.offsets.iter().map(|(id, offset)| (id.as_str(), *offset))
    }
}

//! Writing records in the binary format.
//!
//! [`encode_record`] derives the leader counters and the directory from the
//! current field list, so a record mutated in any way serializes
//! consistently. [`MarcWriter`] streams encoded records to any
//! [`std::io::Write`] and tracks the byte offset of the next record.
//!
//! # Examples
//!
//! ```
//! use marcio::{MarcReader, MarcWriter, Record};
//! use std::io::Cursor;
//!
//! let mut record = Record::default();
//! record.insert_control_field("001", "123456789")?;
//! record.insert_data_field("245", ' ', '0', [('a', "Title")])?;
//!
//! let mut writer = MarcWriter::new(Vec::new());
//! let offset = writer.tell();
//! writer.write_record(&record)?;
//! let bytes = writer.into_inner()?;
//!
//! let mut reader = MarcReader::new(Cursor::new(bytes));
//! reader.seek(offset)?;
//! let back = reader.read_record()?.expect("one record");
//! assert_eq!(back.fields(), record.fields());
//! assert_eq!(back.leader().record_length, 70);
//! # Ok::<(), marcio::MarcError>(())
//! ```

use crate::directory;
use crate::error::{MarcError, Result};
use crate::formats::FormatWriter;
use crate::layout::{
    DIRECTORY_ENTRY_LENGTH, FIELD_TERMINATOR, LEADER_LENGTH, MAX_RECORD_LENGTH, RECORD_TERMINATOR,
};
use crate::offset_index::RecordOffset;
use crate::record::Record;
use std::io::Write;
use tracing::{debug, trace};

/// Serialize a record: leader, directory, field data, record terminator.
///
/// The leader's record length and base address are recomputed; every other
/// leader position is written as stored.
///
/// # Errors
///
/// - [`MarcError::RecordTooLong`] if the record exceeds 99,999 bytes;
/// - [`MarcError::FieldTooLong`] if a field exceeds 9,999 bytes;
/// - [`MarcError::InvalidField`] or [`MarcError::InvalidLeader`] for content
///   that cannot be framed.
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let size = record.size();
    if size > MAX_RECORD_LENGTH {
        return Err(MarcError::RecordTooLong {
            length: size,
            max: MAX_RECORD_LENGTH,
        });
    }
    let entries = directory::derive(record.fields())?;
    let base_address = LEADER_LENGTH + entries.len() * DIRECTORY_ENTRY_LENGTH + 1;

    let mut out = Vec::with_capacity(size);
    record.leader().encode_with(size, base_address, &mut out)?;
    for entry in &entries {
        entry.encode_into(&mut out)?;
    }
    out.push(FIELD_TERMINATOR);
    for field in record.fields() {
        field.encode_into(&mut out)?;
    }
    out.push(RECORD_TERMINATOR);
    debug_assert_eq!(out.len(), size);
    Ok(out)
}

/// Writer for the binary format.
///
/// A record that cannot be encoded is rejected before anything reaches the
/// destination, so the stream stays a valid sequence of records.
#[derive(Debug)]
pub struct MarcWriter<W: Write> {
    writer: W,
    records_written: usize,
    position: u64,
    finished: bool,
}

impl<W: Write> MarcWriter<W> {
    /// Create a writer positioned at offset 0.
    pub fn new(writer: W) -> Self {
        debug!("binary writer created");
        MarcWriter {
            writer,
            records_written: 0,
            position: 0,
            finished: false,
        }
    }

    /// Start offset accounting at `offset`, for destinations that already
    /// hold data.
    #[must_use]
    pub fn with_start_offset(mut self, offset: u64) -> Self {
        self.position = offset;
        self
    }

    /// Write one record.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::WriterFinished`] after [`MarcWriter::finish`], an
    /// encoding error from [`encode_record`], or an I/O error.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(MarcError::WriterFinished);
        }
        let bytes = encode_record(record)?;
        self.writer.write_all(&bytes)?;
        trace!(
            offset = self.position,
            length = bytes.len(),
            control_number = record.control_number(),
            "wrote binary record"
        );
        self.position += bytes.len() as u64;
        self.records_written += 1;
        Ok(())
    }

    /// Offset the next record will be written at.
    #[must_use]
    pub fn tell(&self) -> RecordOffset {
        RecordOffset::new(self.position)
    }

    /// Number of records written.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush and refuse further writes.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn finish(&mut self) -> Result<()> {
        if !self.finished {
            self.writer.flush()?;
            self.finished = true;
            debug!(records = self.records_written, "binary writer finished");
        }
        Ok(())
    }

    /// Finish and return the destination.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        Ok(self.writer)
    }
}

impl<W: Write + std::fmt::Debug> FormatWriter for MarcWriter<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        MarcWriter::write_record(self, record)
    }

    fn finish(&mut self) -> Result<()> {
        MarcWriter::finish(self)
    }

    fn records_written(&self) -> Option<usize> {
        Some(self.records_written)
    }

    fn tell(&self) -> RecordOffset {
        MarcWriter::tell(self)
    }
}

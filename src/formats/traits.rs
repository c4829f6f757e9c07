//! Format reader and writer traits.
//!
//! Every codec implements the same pair of traits, so code that moves records
//! between formats does not need to know which one it is talking to.
//!
//! # Example
//!
//! ```
//! use marcio::formats::{FormatReader, FormatWriter};
//!
//! fn copy_records<R: FormatReader, W: FormatWriter>(
//!     reader: &mut R,
//!     writer: &mut W,
//! ) -> marcio::Result<usize> {
//!     let mut count = 0;
//!     while let Some(record) = reader.read_record()? {
//!         writer.write_record(&record)?;
//!         count += 1;
//!     }
//!     writer.finish()?;
//!     Ok(count)
//! }
//! ```

use crate::error::Result;
use crate::offset_index::RecordOffset;
use crate::record::Record;

/// A source of records.
///
/// Implementations return `Ok(None)` once the source is exhausted and
/// preserve field order, subfield order, indicators and whitespace exactly
/// as found in the source.
pub trait FormatReader: std::fmt::Debug {
    /// Read the next record.
    ///
    /// # Errors
    ///
    /// Returns an error if the source contains malformed data or I/O fails.
    fn read_record(&mut self) -> Result<Option<Record>>;

    /// Read all remaining records into a vector.
    ///
    /// # Errors
    ///
    /// Returns the first error; records read before it are discarded.
    fn read_all(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Number of records read so far, if tracked.
    fn records_read(&self) -> Option<usize> {
        None
    }

    /// Offset of the next record to be read.
    fn tell(&self) -> RecordOffset;
}

/// A sink for records.
///
/// [`finish`](Self::finish) must be called to complete the output; some
/// formats write a closing element there.
pub trait FormatWriter: std::fmt::Debug {
    /// Write a single record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or writing fails.
    fn write_record(&mut self, record: &Record) -> Result<()>;

    /// Write several records in order.
    ///
    /// # Errors
    ///
    /// Returns the first error; earlier records stay written.
    fn write_batch(&mut self, records: &[Record]) -> Result<()> {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Complete the output and flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be finalized.
    fn finish(&mut self) -> Result<()>;

    /// Number of records written so far, if tracked.
    fn records_written(&self) -> Option<usize> {
        None
    }

    /// Offset at which the next record will be written.
    fn tell(&self) -> RecordOffset;
}

/// Iterator-style access for format readers.
pub trait FormatReaderExt: FormatReader {
    /// Iterate over the remaining records.
    ///
    /// ```
    /// use marcio::formats::{FormatReaderExt, FormatWriter};
    /// use marcio::{MarcReader, MarcWriter, Record};
    /// use std::io::Cursor;
    ///
    /// let mut writer = MarcWriter::new(Vec::new());
    /// writer.write_batch(&[Record::default(), Record::default()])?;
    /// let bytes = writer.into_inner()?;
    ///
    /// let mut reader = MarcReader::new(Cursor::new(bytes));
    /// assert_eq!(reader.records().count(), 2);
    /// # Ok::<(), marcio::MarcError>(())
    /// ```
    fn records(&mut self) -> RecordIterator<'_, Self>
    where
        Self: Sized,
    {
        RecordIterator { reader: self }
    }
}

impl<T: FormatReader> FormatReaderExt for T {}

/// Iterator adapter returned by [`FormatReaderExt::records`].
#[derive(Debug)]
pub struct RecordIterator<'a, R: FormatReader> {
    reader: &'a mut R,
}

impl<R: FormatReader> Iterator for RecordIterator<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarcError;
    use crate::leader::Leader;

    fn test_record(id: &str) -> Record {
        Record::builder(Leader::default())
            .control_field("001", id)
            .build()
            .unwrap()
    }

    #[derive(Debug)]
    struct MockReader {
        records: Vec<Record>,
        index: usize,
    }

    impl FormatReader for MockReader {
        fn read_record(&mut self) -> Result<Option<Record>> {
            let record = self.records.get(self.index).cloned();
            if record.is_some() {
                self.index += 1;
            }
            Ok(record)
        }

        fn records_read(&self) -> Option<usize> {
            Some(self.index)
        }

        fn tell(&self) -> RecordOffset {
            RecordOffset::new(self.index as u64)
        }
    }

    #[derive(Debug, Default)]
    struct MockWriter {
        records: Vec<Record>,
        finished: bool,
    }

    impl FormatWriter for MockWriter {
        fn write_record(&mut self, record: &Record) -> Result<()> {
            if self.finished {
                return Err(MarcError::WriterFinished);
            }
            self.records.push(record.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }

        fn records_written(&self) -> Option<usize> {
            Some(self.records.len())
        }

        fn tell(&self) -> RecordOffset {
            RecordOffset::new(self.records.len() as u64)
        }
    }

    #[test]
    fn test_reader_read_all() {
        let mut reader = MockReader {
            records: vec![test_record("1"), test_record("2"), test_record("3")],
            index: 0,
        };
        assert_eq!(reader.read_all().unwrap().len(), 3);
        assert_eq!(reader.records_read(), Some(3));
        assert_eq!(reader.tell().get(), 3);
    }

    #[test]
    fn test_reader_iterator() {
        let mut reader = MockReader {
            records: vec![test_record("1"), test_record("2")],
            index: 0,
        };
        let ids: Vec<String> = reader
            .records()
            .map(|r| r.unwrap().control_number().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[test]
    fn test_writer_batch_then_finish() {
        let mut writer = MockWriter::default();
        writer
            .write_batch(&[test_record("1"), test_record("2")])
            .unwrap();
        assert_eq!(writer.records_written(), Some(2));
        writer.finish().unwrap();
        assert!(matches!(
            writer.write_record(&test_record("3")),
            Err(MarcError::WriterFinished)
        ));
    }
}

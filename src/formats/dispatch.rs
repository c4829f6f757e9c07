//! [`Reader`] and [`Writer`]: one type per direction over either codec.

use super::{sniff, FileType, Format, FormatReader, FormatWriter};
use crate::error::Result;
use crate::marcxml::{MarcXmlReader, MarcXmlWriter};
use crate::offset_index::RecordOffset;
use crate::reader::MarcReader;
use crate::record::Record;
use crate::recovery::RecoveryMode;
use crate::writer::MarcWriter;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

enum ReaderInner<R: Read + Seek> {
    Binary(MarcReader<BufReader<R>>),
    Xml(MarcXmlReader<BufReader<R>>),
}

/// Format-agnostic record reader with random access.
///
/// # Examples
///
/// ```
/// use marcio::{FileType, Format, Reader, Record, Writer};
/// use std::io::Cursor;
///
/// let mut writer = Writer::from_writer(Vec::new(), Format::Xml)?;
/// let mut offsets = Vec::new();
/// for id in ["1", "2"] {
///     offsets.push(writer.tell());
///     let mut record = Record::default();
///     record.insert_control_field("001", id)?;
///     writer.write(&record)?;
/// }
/// let bytes = writer.into_inner()?;
///
/// let mut reader = Reader::from_reader(Cursor::new(bytes), FileType::Auto)?;
/// assert_eq!(reader.format(), Format::Xml);
/// reader.seek(offsets[1])?;
/// let record = reader.read()?.expect("record at offset");
/// assert_eq!(record.control_number(), Some("2"));
/// # Ok::<(), marcio::MarcError>(())
/// ```
pub struct Reader<R: Read + Seek = File> {
    inner: ReaderInner<R>,
    path: Option<PathBuf>,
}

impl<R: Read + Seek> fmt::Debug for Reader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("format", &self.format())
            .field("path", &self.path)
            .field("position", &self.tell())
            .field("records_read", &self.records_read())
            .finish()
    }
}

impl Reader<File> {
    /// Open a file. [`FileType::Auto`] inspects the file's first bytes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened, or
    /// [`MarcError::UnknownFormat`](crate::MarcError::UnknownFormat) if
    /// auto-detection fails.
    pub fn open(path: impl AsRef<Path>, file_type: FileType) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut reader = Self::from_reader(file, file_type)?;
        debug!(path = %path.display(), format = %reader.format(), "opened reader");
        reader.path = Some(path.to_path_buf());
        Ok(reader)
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Wrap a seekable source positioned at offset 0.
    ///
    /// # Errors
    ///
    /// Returns an error if auto-detection cannot read or recognize the
    /// stream.
    pub fn from_reader(inner: R, file_type: FileType) -> Result<Self> {
        let mut buffered = BufReader::new(inner);
        let format = match file_type.format() {
            Some(format) => format,
            None => {
                let format = sniff(buffered.fill_buf()?)?;
                debug!(%format, "detected format from content");
                format
            },
        };
        let inner = match format {
            Format::Binary => ReaderInner::Binary(MarcReader::new(buffered)),
            Format::Xml => ReaderInner::Xml(MarcXmlReader::new(buffered)),
        };
        Ok(Reader { inner, path: None })
    }

    /// Set the recovery mode for handling malformed records.
    #[must_use]
    pub fn with_recovery_mode(self, mode: RecoveryMode) -> Self {
        let inner = match self.inner {
            ReaderInner::Binary(r) => ReaderInner::Binary(r.with_recovery_mode(mode)),
            ReaderInner::Xml(r) => ReaderInner::Xml(r.with_recovery_mode(mode)),
        };
        Reader {
            inner,
            path: self.path,
        }
    }

    /// Read the next record; `Ok(None)` at end of stream.
    ///
    /// # Errors
    ///
    /// Malformed records surface as
    /// [`MarcError::MalformedRecord`](crate::MarcError::MalformedRecord)
    /// carrying their offset.
    pub fn read(&mut self) -> Result<Option<Record>> {
        match &mut self.inner {
            ReaderInner::Binary(r) => r.read_record(),
            ReaderInner::Xml(r) => r.read_record(),
        }
    }

    /// Offset of the next record to be read.
    #[must_use]
    pub fn tell(&self) -> RecordOffset {
        match &self.inner {
            ReaderInner::Binary(r) => r.tell(),
            ReaderInner::Xml(r) => r.tell(),
        }
    }

    /// Reposition to an offset previously returned by a `tell()` on this
    /// stream or on the writer that produced it.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying seek fails.
    pub fn seek(&mut self, offset: RecordOffset) -> Result<()> {
        match &mut self.inner {
            ReaderInner::Binary(r) => r.seek(offset),
            ReaderInner::Xml(r) => r.seek(offset),
        }
    }

    /// Format in use.
    #[must_use]
    pub fn format(&self) -> Format {
        match self.inner {
            ReaderInner::Binary(_) => Format::Binary,
            ReaderInner::Xml(_) => Format::Xml,
        }
    }

    /// Path the reader was opened from, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of records read successfully.
    #[must_use]
    pub fn records_read(&self) -> usize {
        match &self.inner {
            ReaderInner::Binary(r) => r.records_read(),
            ReaderInner::Xml(r) => r.records_read(),
        }
    }

    /// Repairs made in lenient mode while reading the most recent record.
    #[must_use]
    pub fn recovery_messages(&self) -> &[String] {
        match &self.inner {
            ReaderInner::Binary(r) => r.recovery_messages(),
            ReaderInner::Xml(r) => r.recovery_messages(),
        }
    }
}

impl<R: Read + Seek> FormatReader for Reader<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        self.read()
    }

    fn records_read(&self) -> Option<usize> {
        Some(Reader::records_read(self))
    }

    fn tell(&self) -> RecordOffset {
        Reader::tell(self)
    }
}

enum WriterInner<W: Write> {
    Binary(MarcWriter<BufWriter<W>>),
    Xml(MarcXmlWriter<BufWriter<W>>),
}

/// Format-agnostic record writer.
///
/// Call [`Writer::finish`] (or [`Writer::into_inner`]) when done. An XML
/// writer dropped without it still closes its collection.
pub struct Writer<W: Write = File> {
    inner: WriterInner<W>,
    path: Option<PathBuf>,
}

impl<W: Write> fmt::Debug for Writer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("format", &self.format())
            .field("path", &self.path)
            .field("position", &self.tell())
            .field("records_written", &self.records_written())
            .finish()
    }
}

impl Writer<File> {
    /// Create (or truncate) a file. [`FileType::Auto`] goes by the
    /// extension and falls back to binary.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or the XML header
    /// cannot be written.
    pub fn open(path: impl AsRef<Path>, file_type: FileType) -> Result<Self> {
        let path = path.as_ref();
        let format = file_type
            .format()
            .or_else(|| Format::from_path(path))
            .unwrap_or(Format::Binary);
        let file = File::create(path)?;
        let mut writer = Self::from_writer(file, format)?;
        debug!(path = %path.display(), %format, "opened writer");
        writer.path = Some(path.to_path_buf());
        Ok(writer)
    }
}

impl<W: Write> Writer<W> {
    /// Wrap a destination positioned at offset 0.
    ///
    /// # Errors
    ///
    /// For XML, returns an error if the collection header cannot be written.
    pub fn from_writer(inner: W, format: Format) -> Result<Self> {
        let buffered = BufWriter::new(inner);
        let inner = match format {
            Format::Binary => WriterInner::Binary(MarcWriter::new(buffered)),
            Format::Xml => WriterInner::Xml(MarcXmlWriter::new(buffered)?),
        };
        Ok(Writer { inner, path: None })
    }

    /// Write one record.
    ///
    /// # Errors
    ///
    /// See [`MarcWriter::write_record`] and [`MarcXmlWriter::write_record`].
    pub fn write(&mut self, record: &Record) -> Result<()> {
        match &mut self.inner {
            WriterInner::Binary(w) => w.write_record(record),
            WriterInner::Xml(w) => w.write_record(record),
        }
    }

    /// Offset at which the next record will be written.
    #[must_use]
    pub fn tell(&self) -> RecordOffset {
        match &self.inner {
            WriterInner::Binary(w) => w.tell(),
            WriterInner::Xml(w) => w.tell(),
        }
    }

    /// Complete the output and flush.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    pub fn finish(&mut self) -> Result<()> {
        match &mut self.inner {
            WriterInner::Binary(w) => w.finish(),
            WriterInner::Xml(w) => w.finish(),
        }
    }

    /// Format in use.
    #[must_use]
    pub fn format(&self) -> Format {
        match self.inner {
            WriterInner::Binary(_) => Format::Binary,
            WriterInner::Xml(_) => Format::Xml,
        }
    }

    /// Path the writer was opened at, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of records written.
    #[must_use]
    pub fn records_written(&self) -> usize {
        match &self.inner {
            WriterInner::Binary(w) => w.records_written(),
            WriterInner::Xml(w) => w.records_written(),
        }
    }

    /// Finish and return the destination.
    ///
    /// # Errors
    ///
    /// Returns an error if finishing or flushing fails.
    pub fn into_inner(self) -> Result<W> {
        let buffered = match self.inner {
            WriterInner::Binary(w) => w.into_inner()?,
            WriterInner::Xml(w) => w.into_inner()?,
        };
        buffered.into_inner().map_err(|e| e.into_error().into())
    }
}

impl<W: Write> FormatWriter for Writer<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        self.write(record)
    }

    fn finish(&mut self) -> Result<()> {
        Writer::finish(self)
    }

    fn records_written(&self) -> Option<usize> {
        Some(Writer::records_written(self))
    }

    fn tell(&self) -> RecordOffset {
        Writer::tell(self)
    }
}

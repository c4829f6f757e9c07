//! Format selection and the format-agnostic reader/writer facade.
//!
//! | Format | Codec | Extensions |
//! |--------|-------|------------|
//! | Binary | [`MarcReader`](crate::MarcReader) / [`MarcWriter`](crate::MarcWriter) | `mrc`, `marc`, `raw` |
//! | XML | [`MarcXmlReader`](crate::MarcXmlReader) / [`MarcXmlWriter`](crate::MarcXmlWriter) | `xml` |
//!
//! [`Reader`] and [`Writer`] pick the codec from a [`FileType`]. With
//! [`FileType::Auto`] a reader sniffs the first non-whitespace byte of the
//! stream and a writer goes by the file extension.
//!
//! # Usage
//!
//! ```no_run
//! use marcio::{FileType, Reader, Writer};
//!
//! let mut reader = Reader::open("in.xml", FileType::Auto)?;
//! let mut writer = Writer::open("out.mrc", FileType::Auto)?;
//! while let Some(mut record) = reader.read()? {
//!     record.insert_subfield("082", 'a', "004")?;
//!     writer.write(&record)?;
//! }
//! writer.finish()?;
//! # Ok::<(), marcio::MarcError>(())
//! ```

mod dispatch;
mod traits;

pub use dispatch::{Reader, Writer};
pub use traits::{FormatReader, FormatReaderExt, FormatWriter, RecordIterator};

use crate::error::{MarcError, Result};
use std::path::Path;

/// Codec selection for opening a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileType {
    /// Binary records.
    Binary,
    /// MARCXML.
    Xml,
    /// Detect from content (readers) or file extension (writers).
    #[default]
    Auto,
}

impl FileType {
    /// Map a file extension to a concrete file type.
    ///
    /// ```
    /// use marcio::FileType;
    ///
    /// assert_eq!(FileType::from_extension("MRC"), Some(FileType::Binary));
    /// assert_eq!(FileType::from_extension("xml"), Some(FileType::Xml));
    /// assert_eq!(FileType::from_extension("json"), None);
    /// ```
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        Format::from_extension(ext).map(Self::from)
    }

    /// The concrete format, unless this is [`FileType::Auto`].
    #[must_use]
    pub const fn format(self) -> Option<Format> {
        match self {
            Self::Binary => Some(Format::Binary),
            Self::Xml => Some(Format::Xml),
            Self::Auto => None,
        }
    }
}

impl From<Format> for FileType {
    fn from(format: Format) -> Self {
        match format {
            Format::Binary => Self::Binary,
            Format::Xml => Self::Xml,
        }
    }
}

/// A concrete serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Binary records: leader, directory, field data.
    Binary,
    /// MARCXML collection document.
    Xml,
}

impl Format {
    /// Detect format from file extension.
    ///
    /// ```
    /// use marcio::Format;
    ///
    /// assert_eq!(Format::from_extension("marc"), Some(Format::Binary));
    /// assert_eq!(Format::from_extension("unknown"), None);
    /// ```
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mrc" | "marc" | "raw" => Some(Self::Binary),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }

    /// Detect format from a path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical file extension.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Binary => "mrc",
            Self::Xml => "xml",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Xml => "MARCXML",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Guess the format from the first bytes of a stream.
///
/// A leading digit, or an empty stream, means binary: the leader must sit at
/// offset 0. A `<` after optional byte order mark and whitespace means XML.
///
/// # Errors
///
/// Returns [`MarcError::UnknownFormat`] for anything else, including a
/// leader digit that only appears after such a prefix.
///
/// ```
/// use marcio::formats::{sniff, Format};
///
/// assert_eq!(sniff(b"00070naa a2200049 c 4500").unwrap(), Format::Binary);
/// assert_eq!(sniff(b"\n  <?xml version=\"1.0\"?>").unwrap(), Format::Xml);
/// assert!(sniff(b"\n00070naa a2200049 c 4500").is_err());
/// assert!(sniff(b"{\"leader\": \"\"}").is_err());
/// ```
pub fn sniff(head: &[u8]) -> Result<Format> {
    match head.first() {
        None => return Ok(Format::Binary),
        Some(b) if b.is_ascii_digit() => return Ok(Format::Binary),
        Some(_) => {},
    }
    let trimmed = head.strip_prefix(UTF8_BOM).unwrap_or(head);
    match trimmed.iter().position(|b| !b.is_ascii_whitespace()) {
        Some(pos) if trimmed[pos] == b'<' => Ok(Format::Xml),
        Some(pos) if trimmed[pos].is_ascii_digit() => Err(MarcError::UnknownFormat(format!(
            "leader digit at byte {} but binary records must start at offset 0",
            pos + head.len() - trimmed.len()
        ))),
        Some(pos) => Err(MarcError::UnknownFormat(format!(
            "stream starts with byte 0x{:02x}, expected a leader digit or '<'",
            trimmed[pos]
        ))),
        None => Err(MarcError::UnknownFormat(
            "stream holds only whitespace".to_string(),
        )),
    }
}

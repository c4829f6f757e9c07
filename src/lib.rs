#![warn(missing_docs)]

//! # marcio: MARC record model and codecs
//!
//! A library for reading, mutating, and writing bibliographic records in the
//! binary exchange format (leader, directory, field data) and in MARCXML.
//!
//! ## Quick Start
//!
//! ### Reading records
//!
//! ```no_run
//! use marcio::{FileType, Reader};
//!
//! let mut reader = Reader::open("records.mrc", FileType::Auto)?;
//! while let Some(record) = reader.read()? {
//!     if let Some(title) = record.get_first_subfield_value("245", 'a') {
//!         println!("{}: {title}", record.control_number().unwrap_or("?"));
//!     }
//! }
//! # Ok::<(), marcio::MarcError>(())
//! ```
//!
//! ### Building and writing a record
//!
//! ```
//! use marcio::{Format, Leader, Record, Writer};
//!
//! let record = Record::builder(Leader::default())
//!     .control_field("001", "12345")
//!     .data_field("245", '1', '0', [('a', "The Great Gatsby"), ('c', "F. Scott Fitzgerald")])
//!     .build()?;
//!
//! let mut writer = Writer::from_writer(Vec::new(), Format::Binary)?;
//! writer.write(&record)?;
//! let bytes = writer.into_inner()?;
//! assert_eq!(bytes.len(), record.size());
//! # Ok::<(), marcio::MarcError>(())
//! ```
//!
//! ## Modules
//!
//! - [`record`]: `Record`, `Field`, and field insertion that keeps tags ordered and contiguous
//! - [`subfields`]: indicators and subfield lists
//! - [`leader`]: the 24-byte leader
//! - [`reader`] / [`writer`]: the binary codec
//! - [`marcxml`]: the MARCXML codec
//! - [`formats`]: format detection and the [`Reader`] / [`Writer`] facade
//! - [`offset_index`]: random access by recorded offsets
//! - [`record_validation`]: structural consistency findings
//! - [`error`]: error types and result type

pub mod directory;
pub mod error;
pub mod formats;
pub mod layout;
pub mod leader;
pub mod local_data;
pub mod marcxml;
pub mod offset_index;
pub mod reader;
/// Core record structures (`Record`, `Field`, `FieldContent`).
pub mod record;
pub mod record_helpers;
pub mod record_validation;
pub mod recovery;
pub mod subfields;
pub mod tag;
pub mod writer;

pub use error::{MarcError, Result};
pub use formats::{FileType, Format, FormatReader, FormatReaderExt, FormatWriter, Reader, Writer};
pub use leader::{BibliographicLevel, Leader, RecordType};
pub use marcxml::{MarcXmlReader, MarcXmlWriter};
pub use offset_index::{OffsetIndex, RecordOffset};
pub use reader::MarcReader;
pub use record::{Field, FieldContent, Record, RecordBuilder, TagRange};
pub use record_helpers::RecordHelpers;
pub use record_validation::{ConsistencyViolation, RecordStructureValidator};
pub use recovery::{RecoveryContext, RecoveryMode};
pub use subfields::{Subfield, Subfields, ValuesForCode};
pub use tag::Tag;
pub use writer::MarcWriter;

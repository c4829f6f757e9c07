//! MARCXML reading and writing.
//!
//! The XML form carries the same logical structure as the binary format:
//! a `collection` of `record` elements, each with a `leader`, `controlfield`
//! elements (attribute `tag`) and `datafield` elements (attributes `tag`,
//! `ind1`, `ind2`) holding `subfield` elements (attribute `code`).
//!
//! [`MarcXmlReader`] is a single-pass, non-validating event parser built on
//! `quick-xml`. Element names are matched by local name, so both
//! `<marc:record>` and `<record xmlns="...">` are accepted. Records may sit
//! at any depth, which lets OAI-PMH envelopes through unchanged and lets a
//! reader resume at any offset previously returned by
//! [`MarcXmlReader::tell`]. Only UTF-8 documents are accepted.
//!
//! [`MarcXmlWriter`] writes the `marc:collection` start tag with its
//! namespace declarations when it is created and closes the collection on
//! [`MarcXmlWriter::finish`] (or, as a fallback, on drop).
//!
//! # Examples
//!
//! ```
//! use marcio::{marcxml, Record};
//!
//! let mut record = Record::default();
//! record.insert_control_field("001", "123456789")?;
//! record.insert_data_field("245", ' ', '0', [('a', "Fish & Chips")])?;
//!
//! let xml = marcxml::record_to_marcxml(&record)?;
//! assert!(xml.contains("Fish &amp; Chips"));
//!
//! let restored = marcxml::marcxml_to_record(&xml)?;
//! assert_eq!(restored.fields(), record.fields());
//! # Ok::<(), marcio::MarcError>(())
//! ```

use crate::error::{MarcError, Result};
use crate::formats::{FormatReader, FormatWriter};
use crate::layout::{DIRECTORY_ENTRY_LENGTH, LEADER_LENGTH, MAX_RECORD_LENGTH};
use crate::leader::Leader;
use crate::offset_index::RecordOffset;
use crate::record::{Field, FieldContent, Record};
use crate::recovery::{RecoveryContext, RecoveryMode};
use crate::subfields::Subfields;
use crate::tag::Tag;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::fmt;
use std::io::{self, BufRead, Seek, SeekFrom, Write};
use tracing::{debug, trace, warn};

/// The MARCXML namespace URI.
pub const MARCXML_NS: &str = "http://www.loc.gov/MARC21/slim";

/// The XML Schema instance namespace URI.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Value of `xsi:schemaLocation` on the collection element.
pub const SCHEMA_LOCATION: &str =
    "http://www.loc.gov/MARC21/slim http://www.loc.gov/standards/marcxml/schema/MARC21slim.xsd";

fn xml_error(position: u64, message: impl fmt::Display) -> MarcError {
    MarcError::Xml {
        position,
        message: message.to_string(),
    }
}

fn from_quick_xml(position: u64, err: quick_xml::Error) -> MarcError {
    match err {
        quick_xml::Error::Io(e) => MarcError::IoError(io::Error::new(e.kind(), e.to_string())),
        other => xml_error(position, other),
    }
}

fn configured<R: BufRead>(inner: R) -> quick_xml::Reader<R> {
    let mut xml = quick_xml::Reader::from_reader(inner);
    xml.trim_text(false);
    xml.expand_empty_elements(true);
    // Nesting is checked against our own stack so that a reader resumed in
    // the middle of a document can tolerate the closing collection tag.
    xml.check_end_names(false);
    xml
}

/// What the innermost open element of a pending record is collecting.
#[derive(Debug)]
enum Open {
    Nothing,
    Leader(String),
    Control(Tag, String),
    Data {
        tag: Tag,
        subfields: Subfields,
        subfield: Option<(char, String)>,
    },
}

#[derive(Debug)]
struct PendingRecord {
    /// Stack depth outside the `record` element.
    depth: usize,
    leader: Option<Leader>,
    fields: Vec<Field>,
    open: Open,
}

impl PendingRecord {
    fn new(depth: usize) -> Self {
        PendingRecord {
            depth,
            leader: None,
            fields: Vec::new(),
            open: Open::Nothing,
        }
    }

    fn text_target(&mut self) -> Option<&mut String> {
        match &mut self.open {
            Open::Leader(text) | Open::Control(_, text) => Some(text),
            Open::Data {
                subfield: Some((_, text)),
                ..
            } => Some(text),
            Open::Nothing | Open::Data { subfield: None, .. } => None,
        }
    }

    fn open_element(&mut self, name: &[u8], e: &BytesStart<'_>, position: u64) -> Result<()> {
        let next = match (name, &mut self.open) {
            (b"subfield", Open::Data { subfield, .. }) if subfield.is_none() => {
                let code = char_attribute(e, "code", position)?.ok_or_else(|| {
                    xml_error(position, "subfield element without a code attribute")
                })?;
                *subfield = Some((code, String::new()));
                return Ok(());
            },
            (b"leader", Open::Nothing) => Open::Leader(String::new()),
            (b"controlfield", Open::Nothing) => Open::Control(tag_attribute(e, position)?, String::new()),
            (b"datafield", Open::Nothing) => {
                let tag = tag_attribute(e, position)?;
                let ind1 = char_attribute(e, "ind1", position)?.unwrap_or(' ');
                let ind2 = char_attribute(e, "ind2", position)?.unwrap_or(' ');
                Open::Data {
                    tag,
                    subfields: Subfields::new(ind1, ind2),
                    subfield: None,
                }
            },
            _ => {
                return Err(xml_error(
                    position,
                    format!("unexpected element <{}>", String::from_utf8_lossy(name)),
                ))
            },
        };
        self.open = next;
        Ok(())
    }

    fn close_element(&mut self, name: &[u8], ctx: &mut RecoveryContext) -> Result<()> {
        match (name, std::mem::replace(&mut self.open, Open::Nothing)) {
            (b"leader", Open::Leader(text)) => {
                let parsed = match ctx.mode() {
                    RecoveryMode::Strict => Leader::from_bytes(text.as_bytes()),
                    RecoveryMode::Lenient => Leader::from_bytes_relaxed(text.as_bytes()),
                };
                match parsed {
                    Ok(leader) => self.leader = Some(leader),
                    Err(e) => ctx.tolerate(e)?,
                }
            },
            (b"controlfield", Open::Control(tag, text)) => {
                self.push(Field::new(tag, FieldContent::Control(text)), ctx)?;
            },
            (
                b"subfield",
                Open::Data {
                    tag,
                    mut subfields,
                    subfield: Some((code, text)),
                },
            ) => {
                subfields.add_subfield(code, text);
                self.open = Open::Data {
                    tag,
                    subfields,
                    subfield: None,
                };
            },
            (
                b"datafield",
                Open::Data {
                    tag,
                    subfields,
                    subfield: None,
                },
            ) => {
                self.push(Field::new(tag, FieldContent::Data(subfields)), ctx)?;
            },
            (_, other) => self.open = other,
        }
        Ok(())
    }

    fn push(&mut self, field: Result<Field>, ctx: &mut RecoveryContext) -> Result<()> {
        match field {
            Ok(field) => self.fields.push(field),
            Err(e) => ctx.tolerate(e)?,
        }
        Ok(())
    }

    fn finish(self, ctx: &mut RecoveryContext) -> Result<Record> {
        let leader = match self.leader {
            Some(leader) => leader,
            None => {
                ctx.tolerate(MarcError::InvalidRecord(
                    "record element has no leader".to_string(),
                ))?;
                Leader::default()
            },
        };
        let mut record = Record::new(leader);
        for field in self.fields {
            record.push_field(field);
        }
        Ok(record)
    }
}

/// Element stack and record under construction.
#[derive(Debug, Default)]
struct ParseState {
    stack: Vec<Vec<u8>>,
    pending: Option<PendingRecord>,
    /// While set, events are ignored until the stack shrinks to this depth.
    skip_until: Option<usize>,
    /// Set on well-formedness errors; the document cannot be resumed.
    broken: bool,
}

impl ParseState {
    fn fatal(&mut self, err: MarcError) -> MarcError {
        self.broken = true;
        err
    }

    fn on_start(&mut self, e: &BytesStart<'_>, position: u64, ctx: &mut RecoveryContext) -> Result<()> {
        let name = e.local_name().as_ref().to_vec();
        let depth = self.stack.len();
        self.stack.push(name);
        if self.skip_until.is_some() {
            return Ok(());
        }
        let name = &self.stack[depth];
        match self.pending.as_mut() {
            None => {
                if name == b"record" {
                    self.pending = Some(PendingRecord::new(depth));
                }
            },
            Some(pending) => {
                if let Err(err) = pending.open_element(name, e, position) {
                    ctx.tolerate(err)?;
                    self.skip_until = Some(depth);
                }
            },
        }
        Ok(())
    }

    fn on_end(
        &mut self,
        e: &BytesEnd<'_>,
        position: u64,
        ctx: &mut RecoveryContext,
    ) -> Result<Option<Record>> {
        let name = e.local_name();
        let name = name.as_ref();
        match self.stack.pop() {
            Some(open) if open == name => {},
            Some(open) => {
                return Err(self.fatal(xml_error(
                    position,
                    format!(
                        "closing tag </{}> does not match <{}>",
                        String::from_utf8_lossy(name),
                        String::from_utf8_lossy(&open)
                    ),
                )))
            },
            // A reader resumed inside a collection meets its closing tag last.
            None if name == b"collection" => return Ok(None),
            None => {
                return Err(self.fatal(xml_error(
                    position,
                    format!("closing tag </{}> without an open element", String::from_utf8_lossy(name)),
                )))
            },
        }

        if let Some(depth) = self.skip_until {
            if self.stack.len() <= depth {
                self.skip_until = None;
            }
            return Ok(None);
        }
        let depth = self.stack.len();
        let closes_record =
            matches!(&self.pending, Some(pending) if name == b"record" && depth == pending.depth);
        if closes_record {
            return match self.pending.take() {
                Some(pending) => pending.finish(ctx).map(Some),
                None => Ok(None),
            };
        }
        match self.pending.as_mut() {
            Some(pending) => pending.close_element(name, ctx).map(|()| None),
            None => Ok(None),
        }
    }

    fn on_text(&mut self, text: &str, position: u64, ctx: &mut RecoveryContext) -> Result<()> {
        if self.skip_until.is_some() {
            return Ok(());
        }
        if let Some(pending) = self.pending.as_mut() {
            match pending.text_target() {
                Some(target) => target.push_str(text),
                None if !text.trim().is_empty() => ctx.tolerate(xml_error(
                    position,
                    format!("unexpected text {:?} inside a record", text.trim()),
                ))?,
                None => {},
            }
        }
        Ok(())
    }

    fn on_eof(&mut self, position: u64) -> Result<()> {
        match self.stack.last() {
            Some(open) => {
                let message = format!(
                    "document ends inside <{}>",
                    String::from_utf8_lossy(open)
                );
                Err(self.fatal(xml_error(position, message)))
            },
            None => Ok(()),
        }
    }

    /// Drop a record that failed to decode; skip the rest of its element.
    fn abandon_record(&mut self) {
        if let Some(pending) = self.pending.take() {
            if self.stack.len() > pending.depth {
                self.skip_until = Some(pending.depth);
            }
        }
    }
}

fn tag_attribute(e: &BytesStart<'_>, position: u64) -> Result<Tag> {
    let value = attribute(e, "tag", position)?
        .ok_or_else(|| xml_error(position, "field element without a tag attribute"))?;
    Tag::new(&value)
}

fn char_attribute(e: &BytesStart<'_>, name: &str, position: u64) -> Result<Option<char>> {
    let Some(value) = attribute(e, name, position)? else {
        return Ok(None);
    };
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Some(c)),
        _ => Err(xml_error(
            position,
            format!("attribute {name}={value:?} must be a single character"),
        )),
    }
}

fn attribute(e: &BytesStart<'_>, name: &str, position: u64) -> Result<Option<String>> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| xml_error(position, err))?;
    match attr {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|err| xml_error(position, err))?;
            Ok(Some(value.into_owned()))
        },
        None => Ok(None),
    }
}

fn check_declaration(decl: &BytesDecl<'_>, position: u64) -> Result<()> {
    let Some(encoding) = decl.encoding() else {
        return Ok(());
    };
    let encoding = encoding.map_err(|err| xml_error(position, err))?;
    let name = String::from_utf8_lossy(&encoding);
    if name.eq_ignore_ascii_case("utf-8") || name.eq_ignore_ascii_case("utf8") {
        Ok(())
    } else {
        Err(MarcError::UnsupportedEncoding(name.into_owned()))
    }
}

/// Streaming MARCXML reader.
pub struct MarcXmlReader<R: BufRead> {
    xml: Option<quick_xml::Reader<R>>,
    buf: Vec<u8>,
    /// Stream offset of the parser's position 0.
    base_offset: u64,
    state: ParseState,
    recovery: RecoveryContext,
    records_read: usize,
    exhausted: bool,
}

impl<R: BufRead> fmt::Debug for MarcXmlReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarcXmlReader")
            .field("position", &self.tell())
            .field("records_read", &self.records_read)
            .field("mode", &self.recovery.mode())
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl<R: BufRead> MarcXmlReader<R> {
    /// Create a reader in strict mode.
    pub fn new(inner: R) -> Self {
        debug!("MARCXML reader created");
        MarcXmlReader {
            xml: Some(configured(inner)),
            buf: Vec::new(),
            base_offset: 0,
            state: ParseState::default(),
            recovery: RecoveryContext::default(),
            records_read: 0,
            exhausted: false,
        }
    }

    /// Set the recovery mode for handling malformed records.
    #[must_use]
    pub fn with_recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.recovery = RecoveryContext::new(mode);
        self
    }

    /// Read the next record.
    ///
    /// A record-level defect (bad attribute, unknown element, unparsable
    /// leader) fails only that record; the next call resumes after it. A
    /// well-formedness error or a non-UTF-8 declaration ends the document:
    /// later calls return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Errors are wrapped in [`MarcError::MalformedRecord`] with the offset
    /// the read started at.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        self.recovery.clear();
        if self.exhausted {
            return Ok(None);
        }
        let start = self.tell().get();
        match self.next_record() {
            Ok(Some(record)) => {
                self.records_read += 1;
                trace!(
                    offset = start,
                    control_number = record.control_number(),
                    "read MARCXML record"
                );
                Ok(Some(record))
            },
            Ok(None) => {
                self.exhausted = true;
                Ok(None)
            },
            Err(e) => {
                if self.state.broken {
                    self.exhausted = true;
                } else {
                    self.state.abandon_record();
                }
                Err(e.at_offset(start))
            },
        }
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        let xml = self
            .xml
            .as_mut()
            .ok_or_else(|| xml_error(self.base_offset, "reader lost after a failed seek"))?;
        loop {
            self.buf.clear();
            let event = xml.read_event_into(&mut self.buf);
            let position = self.base_offset + xml.buffer_position() as u64;
            let event = match event {
                Ok(event) => event,
                Err(err) => return Err(self.state.fatal(from_quick_xml(position, err))),
            };
            match event {
                Event::Start(e) => self.state.on_start(&e, position, &mut self.recovery)?,
                Event::End(e) => {
                    if let Some(record) = self.state.on_end(&e, position, &mut self.recovery)? {
                        return Ok(Some(record));
                    }
                },
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|err| self.state.fatal(xml_error(position, err)))?;
                    self.state.on_text(&text, position, &mut self.recovery)?;
                },
                Event::CData(e) => {
                    let raw = e.into_inner();
                    let text = std::str::from_utf8(&raw)
                        .map_err(|err| self.state.fatal(xml_error(position, err)))?;
                    self.state.on_text(text, position, &mut self.recovery)?;
                },
                Event::Decl(e) => {
                    check_declaration(&e, position).map_err(|err| self.state.fatal(err))?;
                },
                Event::Eof => {
                    self.state.on_eof(position)?;
                    return Ok(None);
                },
                Event::Empty(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {},
            }
        }
    }

    /// Offset at which the next read starts looking for a record.
    #[must_use]
    pub fn tell(&self) -> RecordOffset {
        let parsed = self.xml.as_ref().map_or(0, |xml| xml.buffer_position() as u64);
        RecordOffset::new(self.base_offset + parsed)
    }

    /// Number of records read successfully.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Repairs made in lenient mode while reading the most recent record.
    ///
    /// Cleared at the start of every [`MarcXmlReader::read_record`].
    #[must_use]
    pub fn recovery_messages(&self) -> &[String] {
        self.recovery.messages()
    }
}

impl<R: BufRead + Seek> MarcXmlReader<R> {
    /// Reposition so that the next read starts at `offset`.
    ///
    /// `offset` must come from [`MarcXmlReader::tell`] or
    /// [`MarcXmlWriter::tell`] on the same, unmodified document.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying seek fails.
    pub fn seek(&mut self, offset: RecordOffset) -> Result<()> {
        let xml = self
            .xml
            .take()
            .ok_or_else(|| xml_error(self.base_offset, "reader lost after a failed seek"))?;
        let mut inner = xml.into_inner();
        inner.seek(SeekFrom::Start(offset.get()))?;
        self.xml = Some(configured(inner));
        self.base_offset = offset.get();
        self.state = ParseState::default();
        self.exhausted = false;
        Ok(())
    }
}

impl<R: BufRead> FormatReader for MarcXmlReader<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        MarcXmlReader::read_record(self)
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.records_read)
    }

    fn tell(&self) -> RecordOffset {
        MarcXmlReader::tell(self)
    }
}

/// Counts bytes passed through to the destination.
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streaming MARCXML writer.
pub struct MarcXmlWriter<W: Write> {
    writer: Option<quick_xml::Writer<CountingWriter<W>>>,
    records_written: usize,
    finished: bool,
}

impl<W: Write> fmt::Debug for MarcXmlWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarcXmlWriter")
            .field("position", &self.tell())
            .field("records_written", &self.records_written)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<W: Write> MarcXmlWriter<W> {
    /// Create an indented writer and emit the collection header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(inner: W) -> Result<Self> {
        Self::with_indent(inner, true)
    }

    /// Create a writer, choosing indented or compact output, and emit the
    /// collection header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn with_indent(inner: W, indent: bool) -> Result<Self> {
        let counting = CountingWriter { inner, written: 0 };
        let mut writer = if indent {
            quick_xml::Writer::new_with_indent(counting, b' ', 2)
        } else {
            quick_xml::Writer::new(counting)
        };
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .and_then(|()| {
                writer.write_event(Event::Start(BytesStart::new("marc:collection").with_attributes([
                    ("xmlns:marc", MARCXML_NS),
                    ("xmlns:xsi", XSI_NS),
                    ("xsi:schemaLocation", SCHEMA_LOCATION),
                ])))
            })
            .map_err(|err| from_quick_xml(0, err))?;
        debug!(indent, "MARCXML writer created");
        Ok(MarcXmlWriter {
            writer: Some(writer),
            records_written: 0,
            finished: false,
        })
    }

    /// Write one record.
    ///
    /// A record too large for the binary format is still written; its
    /// leader length reads `99999`.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::WriterFinished`] after [`MarcXmlWriter::finish`],
    /// a leader that cannot be rendered, or an I/O error.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(MarcError::WriterFinished);
        }
        let leader = leader_text(record)?;
        let offset = self.tell().get();
        let writer = self.writer.as_mut().ok_or(MarcError::WriterFinished)?;
        write_record_element(writer, record, &leader).map_err(|err| from_quick_xml(offset, err))?;
        self.records_written += 1;
        trace!(
            offset,
            control_number = record.control_number(),
            "wrote MARCXML record"
        );
        Ok(())
    }

    /// Offset at which the next record will be written.
    #[must_use]
    pub fn tell(&self) -> RecordOffset {
        RecordOffset::new(self.writer.as_ref().map_or(0, |w| w.get_ref().written))
    }

    /// Number of records written.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Close the collection element and flush.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    pub fn finish(&mut self) -> Result<()> {
        let offset = self.tell().get();
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        // Finished only once the closing tag is out.
        if !self.finished {
            writer
                .write_event(Event::End(BytesEnd::new("marc:collection")))
                .map_err(|err| from_quick_xml(offset, err))?;
            writer.get_mut().write_all(b"\n")?;
            self.finished = true;
            debug!(records = self.records_written, "MARCXML writer finished");
        }
        writer.get_mut().flush()?;
        Ok(())
    }

    /// Finish and return the destination.
    ///
    /// # Errors
    ///
    /// Returns an error if closing the collection fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        self.writer
            .take()
            .map(|w| w.into_inner().inner)
            .ok_or(MarcError::WriterFinished)
    }
}

impl<W: Write> Drop for MarcXmlWriter<W> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(error) = self.finish() {
                warn!(%error, "could not close MARCXML collection on drop");
            }
        }
    }
}

impl<W: Write> FormatWriter for MarcXmlWriter<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        MarcXmlWriter::write_record(self, record)
    }

    fn finish(&mut self) -> Result<()> {
        MarcXmlWriter::finish(self)
    }

    fn records_written(&self) -> Option<usize> {
        Some(self.records_written)
    }

    fn tell(&self) -> RecordOffset {
        MarcXmlWriter::tell(self)
    }
}

/// Leader as written to XML, with counters matching the binary form.
fn leader_text(record: &Record) -> Result<String> {
    let size = record.size();
    if size > MAX_RECORD_LENGTH {
        warn!(
            size,
            control_number = record.control_number(),
            "record exceeds the binary size limit; writing leader length 99999"
        );
    }
    let base = LEADER_LENGTH + record.number_of_fields() * DIRECTORY_ENTRY_LENGTH + 1;
    let mut out = Vec::with_capacity(LEADER_LENGTH);
    record.leader().encode_with(
        size.min(MAX_RECORD_LENGTH),
        base.min(MAX_RECORD_LENGTH),
        &mut out,
    )?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn write_record_element<W: Write>(
    writer: &mut quick_xml::Writer<W>,
    record: &Record,
    leader: &str,
) -> quick_xml::Result<()> {
    writer
        .create_element("marc:record")
        .write_inner_content(|w| {
            w.create_element("marc:leader")
                .write_text_content(BytesText::new(leader))?;
            for field in record.fields() {
                let tag = field.tag();
                match field.content() {
                    FieldContent::Control(value) => {
                        w.create_element("marc:controlfield")
                            .with_attribute(("tag", tag.as_str()))
                            .write_text_content(BytesText::new(value))?;
                    },
                    FieldContent::Data(subfields) => {
                        let ind1 = subfields.indicator1().to_string();
                        let ind2 = subfields.indicator2().to_string();
                        w.create_element("marc:datafield")
                            .with_attributes([
                                ("tag", tag.as_str()),
                                ("ind1", ind1.as_str()),
                                ("ind2", ind2.as_str()),
                            ])
                            .write_inner_content(|w| {
                                for subfield in subfields {
                                    let code = subfield.code.to_string();
                                    w.create_element("marc:subfield")
                                        .with_attribute(("code", code.as_str()))
                                        .write_text_content(BytesText::new(&subfield.value))?;
                                }
                                Ok::<(), quick_xml::Error>(())
                            })?;
                    },
                }
            }
            Ok::<(), quick_xml::Error>(())
        })?;
    Ok(())
}

/// Serialize one record as a complete MARCXML collection document.
///
/// # Errors
///
/// Returns an error if the leader cannot be rendered.
pub fn record_to_marcxml(record: &Record) -> Result<String> {
    let mut writer = MarcXmlWriter::new(Vec::new())?;
    writer.write_record(record)?;
    let bytes = writer.into_inner()?;
    String::from_utf8(bytes).map_err(|e| MarcError::EncodingError(e.to_string()))
}

/// Parse the first record of a MARCXML document.
///
/// # Errors
///
/// Returns an error if the document is malformed or holds no record.
pub fn marcxml_to_record(xml: &str) -> Result<Record> {
    MarcXmlReader::new(xml.as_bytes())
        .read_record()?
        .ok_or_else(|| MarcError::InvalidRecord("MARCXML document contains no record".to_string()))
}

/// Parse every record of a MARCXML document.
///
/// # Errors
///
/// Returns the first error encountered.
pub fn marcxml_to_records(xml: &str) -> Result<Vec<Record>> {
    MarcXmlReader::new(xml.as_bytes()).read_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> Record {
        let leader = Leader::from_bytes(b"00000naa a2200000 c 4500").unwrap();
        Record::builder(leader)
            .control_field("001", "123456789")
            .data_field("245", ' ', '0', [('a', "Title"), ('b', "a <subtitle> & more")])
            .data_field("650", ' ', '7', [('a', "History"), ('2', "gnd")])
            .build()
            .unwrap()
    }

    #[test]
    fn test_writer_emits_collection_with_namespaces() {
        let xml = record_to_marcxml(&sample()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("xmlns:marc=\"http://www.loc.gov/MARC21/slim\""));
        assert!(xml.contains("xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\""));
        assert!(xml.contains("xsi:schemaLocation="));
        assert!(xml.contains("<marc:leader>00120naa a2200061 c 4500</marc:leader>"));
        assert!(xml.contains("a &lt;subtitle&gt; &amp; more"));
        assert!(xml.trim_end().ends_with("</marc:collection>"));
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let record = sample();
        let xml = record_to_marcxml(&record).unwrap();
        let back = marcxml_to_record(&xml).unwrap();
        assert_eq!(back.fields(), record.fields());
        assert_eq!(back.leader().record_type, 'a');
        assert_eq!(back.leader().record_length as usize, record.size());
    }

    #[test]
    fn test_reads_default_namespace_and_entities() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<collection xmlns="http://www.loc.gov/MARC21/slim">
  <record>
    <leader>00000nam a2200000 c 4500</leader>
    <controlfield tag="001">42</controlfield>
    <datafield tag="245" ind1="1" ind2="0">
      <subfield code="a">Caf&#233; &amp; Bar&apos;s</subfield>
    </datafield>
  </record>
</collection>"#;
        let records = marcxml_to_records(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].control_number(), Some("42"));
        assert_eq!(
            records[0].get_first_subfield_value("245", 'a'),
            Some("Café & Bar's")
        );
    }

    #[test]
    fn test_preserves_whitespace_in_values() {
        let xml = r#"<record><leader>00000nam a2200000 c 4500</leader>
<datafield tag="500" ind1=" " ind2=" "><subfield code="a">  padded  </subfield></datafield></record>"#;
        let record = marcxml_to_record(xml).unwrap();
        assert_eq!(record.get_first_subfield_value("500", 'a'), Some("  padded  "));
        let sf = record.get_first_field("500").unwrap().subfields().unwrap();
        assert_eq!((sf.indicator1(), sf.indicator2()), (' ', ' '));
    }

    #[test]
    fn test_rejects_non_utf8_declaration() {
        let xml = r#"<?xml version="1.0" encoding="ISO-8859-1"?><collection/>"#;
        let err = marcxml_to_records(xml).unwrap_err();
        assert!(err.to_string().contains("ISO-8859-1"), "got: {err}");
    }

    #[test]
    fn test_rejects_mismatched_nesting() {
        let xml = "<collection><record><leader>00000nam a2200000 c 4500</leader></collection>";
        let mut reader = MarcXmlReader::new(xml.as_bytes());
        assert!(matches!(
            reader.read_record(),
            Err(MarcError::MalformedRecord { .. })
        ));
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_rejects_unterminated_document() {
        let xml = "<collection><record><leader>00000nam a2200000 c 4500</leader>";
        assert!(marcxml_to_records(xml).is_err());
    }

    #[test]
    fn test_unknown_element_strict_and_lenient() {
        let xml = r#"<collection>
<record><leader>00000nam a2200000 c 4500</leader><bogus><x/></bogus>
<controlfield tag="001">1</controlfield></record>
<record><leader>00000nam a2200000 c 4500</leader><controlfield tag="001">2</controlfield></record>
</collection>"#;
        let mut strict = MarcXmlReader::new(xml.as_bytes());
        assert!(strict.read_record().is_err());
        let next = strict.read_record().unwrap().unwrap();
        assert_eq!(next.control_number(), Some("2"));

        let mut lenient =
            MarcXmlReader::new(xml.as_bytes()).with_recovery_mode(RecoveryMode::Lenient);
        let first = lenient.read_record().unwrap().unwrap();
        assert_eq!(first.control_number(), Some("1"));
        assert_eq!(lenient.recovery_messages().len(), 1);
        let second = lenient.read_record().unwrap().unwrap();
        assert_eq!(second.control_number(), Some("2"));
        assert!(lenient.recovery_messages().is_empty());
    }

    #[test]
    fn test_bad_tag_attribute() {
        let xml = r#"<record><leader>00000nam a2200000 c 4500</leader><controlfield tag="1">x</controlfield></record>"#;
        assert!(matches!(
            marcxml_to_record(xml),
            Err(MarcError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_tell_and_seek() {
        let mut writer = MarcXmlWriter::new(Vec::new()).unwrap();
        let mut offsets = Vec::new();
        for id in ["a", "b", "c"] {
            offsets.push(writer.tell());
            let record = Record::builder(Leader::default())
                .control_field("001", id)
                .build()
                .unwrap();
            writer.write_record(&record).unwrap();
        }
        let bytes = writer.into_inner().unwrap();

        let mut reader = MarcXmlReader::new(Cursor::new(bytes));
        reader.seek(offsets[1]).unwrap();
        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.control_number(), Some("b"));
        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.control_number(), Some("c"));
        assert!(reader.read_record().unwrap().is_none());

        reader.seek(offsets[0]).unwrap();
        assert_eq!(
            reader.read_record().unwrap().unwrap().control_number(),
            Some("a")
        );
    }

    #[test]
    fn test_oversized_record_written_with_capped_length() {
        let mut record = sample();
        for _ in 0..12 {
            record.push_field(
                Field::data(
                    "500",
                    Subfields::from_pairs(' ', ' ', [('a', "z".repeat(9_000))]),
                )
                .unwrap(),
            );
        }
        let xml = record_to_marcxml(&record).unwrap();
        assert!(xml.contains("<marc:leader>99999"));
        let back = marcxml_to_record(&xml).unwrap();
        assert!(back.is_oversized());
    }

    #[test]
    fn test_drop_closes_collection() {
        let mut out = Vec::new();
        {
            let mut writer = MarcXmlWriter::with_indent(&mut out, false).unwrap();
            writer.write_record(&sample()).unwrap();
        }
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.trim_end().ends_with("</marc:collection>"));
        assert_eq!(marcxml_to_records(&xml).unwrap().len(), 1);
    }

    /// Destination that refuses every write while `failing` is set.
    struct FlakyDestination {
        out: std::rc::Rc<std::cell::RefCell<Vec<u8>>>,
        failing: std::rc::Rc<std::cell::Cell<bool>>,
    }

    impl Write for FlakyDestination {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.failing.get() {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            self.out.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if self.failing.get() {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            Ok(())
        }
    }

    fn flaky_writer() -> (
        MarcXmlWriter<FlakyDestination>,
        std::rc::Rc<std::cell::RefCell<Vec<u8>>>,
        std::rc::Rc<std::cell::Cell<bool>>,
    ) {
        let out = std::rc::Rc::default();
        let failing = std::rc::Rc::default();
        let destination = FlakyDestination {
            out: std::rc::Rc::clone(&out),
            failing: std::rc::Rc::clone(&failing),
        };
        let mut writer = MarcXmlWriter::with_indent(destination, false).unwrap();
        writer.write_record(&sample()).unwrap();
        (writer, out, failing)
    }

    #[test]
    fn test_finish_retries_after_io_error() {
        let (mut writer, out, failing) = flaky_writer();
        failing.set(true);
        assert!(matches!(writer.finish(), Err(MarcError::IoError(_))));
        failing.set(false);
        writer.finish().unwrap();
        drop(writer);

        let xml = String::from_utf8(out.borrow().clone()).unwrap();
        assert_eq!(xml.matches("</marc:collection>").count(), 1);
        assert_eq!(marcxml_to_records(&xml).unwrap().len(), 1);
    }

    #[test]
    fn test_drop_closes_collection_after_failed_finish() {
        let (mut writer, out, failing) = flaky_writer();
        failing.set(true);
        assert!(writer.finish().is_err());
        failing.set(false);
        drop(writer);

        let xml = String::from_utf8(out.borrow().clone()).unwrap();
        assert!(xml.trim_end().ends_with("</marc:collection>"));
        assert_eq!(xml.matches("</marc:collection>").count(), 1);
    }

    #[test]
    fn test_write_after_finish() {
        let mut writer = MarcXmlWriter::new(Vec::new()).unwrap();
        writer.finish().unwrap();
        assert!(matches!(
            writer.write_record(&sample()),
            Err(MarcError::WriterFinished)
        ));
    }
}

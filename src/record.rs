//! Record and field structures and the mutation API used by pipeline tools.
//!
//! A [`Record`] is a leader plus an ordered list of [`Field`]s. The binary
//! directory is never stored: it is derived from the field list every time
//! the record is serialized, so any sequence of mutations leaves the record
//! serializable.
//!
//! Two ordering rules hold for every record built through this API:
//!
//! - fields ascend by tag (byte order, so `LOK` follows `999`);
//! - fields sharing a tag are contiguous.
//!
//! Records decoded from a stream keep the file order, whatever it is, so that
//! an unmodified record serializes to the same bytes. Insertion into such a
//! record still keeps an existing same-tag run contiguous.
//!
//! # Examples
//!
//! ```
//! use marcio::{Record, Subfields};
//!
//! let mut record = Record::default();
//! record.insert_control_field("001", "123456789")?;
//! record.insert_subfields("245", [('a', "Title")])?;
//! record.insert_subfield("082", 'a', "004")?;
//!
//! let tags: Vec<String> = record.fields().iter().map(|f| f.tag().as_str().to_string()).collect();
//! assert_eq!(tags, vec!["001", "082", "245"]);
//! assert_eq!(record.control_number(), Some("123456789"));
//! # Ok::<(), marcio::MarcError>(())
//! ```

use crate::error::{MarcError, Result};
use crate::layout::{
    DIRECTORY_ENTRY_LENGTH, FIELD_TERMINATOR, LEADER_LENGTH, MAX_FIELD_LENGTH, MAX_RECORD_LENGTH,
};
use crate::leader::Leader;
use crate::subfields::{self, Subfields};
use crate::tag::{Tag, CONTROL_NUMBER};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Content of a field: raw text for control fields, subfields otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldContent {
    /// Raw content of a control field (`00x`).
    Control(String),
    /// Indicators and subfields of a data field.
    Data(Subfields),
}

/// A tagged field.
///
/// The content kind always matches the tag: control tags (`00x`) carry
/// [`FieldContent::Control`], all others [`FieldContent::Data`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawField")]
pub struct Field {
    tag: Tag,
    content: FieldContent,
}

#[derive(Deserialize)]
struct RawField {
    tag: Tag,
    content: FieldContent,
}

impl TryFrom<RawField> for Field {
    type Error = MarcError;

    fn try_from(raw: RawField) -> Result<Self> {
        Field::new(raw.tag, raw.content)
    }
}

impl Field {
    /// Create a field, checking that the content kind matches the tag.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidField`] for control content under a data
    /// tag or subfields under a control tag.
    pub fn new(tag: Tag, content: FieldContent) -> Result<Self> {
        match (&content, tag.is_control()) {
            (FieldContent::Control(_), true) | (FieldContent::Data(_), false) => {
                Ok(Field { tag, content })
            },
            (FieldContent::Control(_), false) => Err(MarcError::InvalidField(format!(
                "Tag {tag} is a data field tag and cannot hold control content"
            ))),
            (FieldContent::Data(_), true) => Err(MarcError::InvalidField(format!(
                "Tag {tag} is a control field tag and cannot hold subfields"
            ))),
        }
    }

    /// Create a control field.
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is invalid or not a control tag.
    pub fn control(tag: &str, value: impl Into<String>) -> Result<Self> {
        Field::new(Tag::new(tag)?, FieldContent::Control(value.into()))
    }

    /// Create a data field.
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is invalid or is a control tag.
    pub fn data(tag: &str, subfields: Subfields) -> Result<Self> {
        Field::new(Tag::new(tag)?, FieldContent::Data(subfields))
    }

    /// Field tag
    #[must_use]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Field content
    #[must_use]
    pub fn content(&self) -> &FieldContent {
        &self.content
    }

    /// Whether this is a control field.
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(self.content, FieldContent::Control(_))
    }

    /// Whether the tag may repeat within a record.
    #[must_use]
    pub fn is_repeatable(&self) -> bool {
        self.tag.is_repeatable()
    }

    /// Whether this field is part of an embedded local data block.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.local_tag().is_some()
    }

    /// Raw content of a control field.
    #[must_use]
    pub fn control_value(&self) -> Option<&str> {
        match &self.content {
            FieldContent::Control(value) => Some(value),
            FieldContent::Data(_) => None,
        }
    }

    /// Mutable raw content of a control field.
    pub fn control_value_mut(&mut self) -> Option<&mut String> {
        match &mut self.content {
            FieldContent::Control(value) => Some(value),
            FieldContent::Data(_) => None,
        }
    }

    /// Subfields of a data field.
    #[must_use]
    pub fn subfields(&self) -> Option<&Subfields> {
        match &self.content {
            FieldContent::Data(subfields) => Some(subfields),
            FieldContent::Control(_) => None,
        }
    }

    /// Mutable subfields of a data field.
    pub fn subfields_mut(&mut self) -> Option<&mut Subfields> {
        match &mut self.content {
            FieldContent::Data(subfields) => Some(subfields),
            FieldContent::Control(_) => None,
        }
    }

    /// First value of subfield `code`; `None` for control fields.
    #[must_use]
    pub fn first_subfield_value(&self, code: char) -> Option<&str> {
        self.subfields().and_then(|sf| sf.get_first_value(code))
    }

    /// Local tag of a `LOK` field: the first three characters of its leading `$0`.
    ///
    /// `None` for any other field.
    #[must_use]
    pub fn local_tag(&self) -> Option<&str> {
        if !self.tag.is_local() {
            return None;
        }
        let first = self.subfields()?.first()?;
        if first.code != '0' {
            return None;
        }
        first.value.get(..3)
    }

    /// Bytes the field occupies in the data area, terminator included.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let body = match &self.content {
            FieldContent::Control(value) => value.len(),
            FieldContent::Data(subfields) => subfields.encoded_len(),
        };
        body + 1
    }

    /// Append the field's data-area bytes, terminator included.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be framed (see
    /// [`Subfields::encode_into`]).
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        match &self.content {
            FieldContent::Control(value) => {
                subfields::check_value(self.tag, value)?;
                out.extend_from_slice(value.as_bytes());
            },
            FieldContent::Data(subfields) => subfields.encode_into(self.tag, out)?,
        }
        out.push(FIELD_TERMINATOR);
        Ok(())
    }
}

/// A bibliographic record: leader plus ordered fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Record {
    leader: Leader,
    fields: Vec<Field>,
}

impl Record {
    /// Create an empty record with the given leader.
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            fields: Vec::new(),
        }
    }

    /// Create a builder for fluently constructing records.
    ///
    /// # Examples
    ///
    /// ```
    /// use marcio::{Leader, Record};
    ///
    /// let record = Record::builder(Leader::default())
    ///     .control_field("001", "12345")
    ///     .data_field("245", '1', '0', [('a', "Title")])
    ///     .build()?;
    /// assert_eq!(record.number_of_fields(), 2);
    /// # Ok::<(), marcio::MarcError>(())
    /// ```
    #[must_use]
    pub fn builder(leader: Leader) -> RecordBuilder {
        RecordBuilder {
            record: Ok(Record::new(leader)),
        }
    }

    /// Record leader
    #[must_use]
    pub fn leader(&self) -> &Leader {
        &self.leader
    }

    /// Mutable record leader. Length and base address are recomputed on write.
    pub fn leader_mut(&mut self) -> &mut Leader {
        &mut self.leader
    }

    /// All fields in record order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field at `index`.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Mutable field at `index`. The tag of a field can never change.
    pub fn field_mut(&mut self, index: usize) -> Option<&mut Field> {
        self.fields.get_mut(index)
    }

    /// Number of fields.
    #[must_use]
    pub fn number_of_fields(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Index of the first field with `tag`.
    #[must_use]
    pub fn find_field_index(&self, tag: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.tag == tag)
    }

    /// Whether a field with `tag` exists.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.find_field_index(tag).is_some()
    }

    /// First field with `tag`.
    #[must_use]
    pub fn get_first_field(&self, tag: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Mutable first field with `tag`.
    pub fn get_first_field_mut(&mut self, tag: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.tag == tag)
    }

    /// Value of the first `code` subfield of the first `tag` field.
    #[must_use]
    pub fn get_first_subfield_value(&self, tag: &str, code: char) -> Option<&str> {
        self.get_first_field(tag)
            .and_then(|f| f.first_subfield_value(code))
    }

    /// Index range of the contiguous run of `tag` fields starting at its first
    /// occurrence. Empty if the tag is absent.
    #[must_use]
    pub fn tag_range_indices(&self, tag: &str) -> Range<usize> {
        match self.find_field_index(tag) {
            Some(start) => {
                let len = self.fields[start..]
                    .iter()
                    .take_while(|f| f.tag == tag)
                    .count();
                start..start + len
            },
            None => 0..0,
        }
    }

    /// The contiguous run of fields with `tag`.
    ///
    /// The iterator is lazy, finite, and cheap to clone for a second pass.
    #[must_use]
    pub fn get_tag_range(&self, tag: &str) -> TagRange<'_> {
        let range = self.tag_range_indices(tag);
        TagRange {
            inner: self.fields[range].iter(),
        }
    }

    /// Mutable access to the contiguous run of fields with `tag`.
    pub fn tag_range_mut(&mut self, tag: &str) -> std::slice::IterMut<'_, Field> {
        let range = self.tag_range_indices(tag);
        self.fields[range].iter_mut()
    }

    /// Control number: the content of a leading `001` field.
    ///
    /// `None` if the first field is not a `001` control field.
    #[must_use]
    pub fn control_number(&self) -> Option<&str> {
        self.fields
            .first()
            .filter(|f| f.tag == CONTROL_NUMBER)
            .and_then(Field::control_value)
    }

    /// Serialized length of the record in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        LEADER_LENGTH
            + self.fields.len() * DIRECTORY_ENTRY_LENGTH
            + 1
            + self.fields.iter().map(Field::encoded_len).sum::<usize>()
            + 1
    }

    /// Whether the record is too large for the binary format.
    #[must_use]
    pub fn is_oversized(&self) -> bool {
        self.size() > MAX_RECORD_LENGTH
    }

    /// Serialize to the binary format.
    ///
    /// # Errors
    ///
    /// See [`crate::writer::encode_record`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crate::writer::encode_record(self)
    }

    /// Position a new field with `tag` would be inserted at.
    fn insertion_index(&self, tag: Tag) -> usize {
        let run = self.tag_range_indices(tag.as_str());
        if !run.is_empty() {
            return run.end;
        }
        self.fields
            .iter()
            .position(|f| f.tag > tag)
            .unwrap_or(self.fields.len())
    }

    /// Insert a field keeping tags ascending and same-tag fields contiguous.
    ///
    /// A field whose tag is already present goes right after the existing
    /// run; otherwise it goes before the first field with a greater tag.
    /// Returns the index of the new field.
    ///
    /// # Errors
    ///
    /// Leaves the record unchanged and returns:
    /// - [`MarcError::NonRepeatableField`] if the tag is non-repeatable and
    ///   already present;
    /// - [`MarcError::FieldTooLong`] if the field exceeds 9,999 bytes;
    /// - [`MarcError::RecordTooLong`] if the record would exceed 99,999 bytes.
    pub fn insert_field(&mut self, field: Field) -> Result<usize> {
        if !field.is_repeatable() && self.has_tag(field.tag.as_str()) {
            return Err(MarcError::NonRepeatableField(field.tag.to_string()));
        }
        let field_len = field.encoded_len();
        if field_len > MAX_FIELD_LENGTH {
            return Err(MarcError::FieldTooLong {
                tag: field.tag.to_string(),
                length: field_len,
                max: MAX_FIELD_LENGTH,
            });
        }
        let new_size = self.size() + DIRECTORY_ENTRY_LENGTH + field_len;
        if new_size > MAX_RECORD_LENGTH {
            return Err(MarcError::RecordTooLong {
                length: new_size,
                max: MAX_RECORD_LENGTH,
            });
        }
        let index = self.insertion_index(field.tag);
        self.fields.insert(index, field);
        Ok(index)
    }

    /// Insert a control field.
    ///
    /// # Errors
    ///
    /// See [`Field::control`] and [`Record::insert_field`].
    pub fn insert_control_field(&mut self, tag: &str, value: impl Into<String>) -> Result<usize> {
        self.insert_field(Field::control(tag, value)?)
    }

    /// Insert a data field with the given indicators and subfields.
    ///
    /// # Errors
    ///
    /// See [`Field::data`] and [`Record::insert_field`].
    pub fn insert_data_field<I, S>(
        &mut self,
        tag: &str,
        indicator1: char,
        indicator2: char,
        pairs: I,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<String>,
    {
        let subfields = Subfields::from_pairs(indicator1, indicator2, pairs);
        self.insert_field(Field::data(tag, subfields)?)
    }

    /// Insert a data field with blank indicators and the given subfields.
    ///
    /// # Errors
    ///
    /// See [`Record::insert_field`].
    pub fn insert_subfields<I, S>(&mut self, tag: &str, pairs: I) -> Result<usize>
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<String>,
    {
        self.insert_data_field(tag, ' ', ' ', pairs)
    }

    /// Insert a data field with blank indicators and a single subfield.
    ///
    /// # Errors
    ///
    /// See [`Record::insert_field`].
    pub fn insert_subfield(&mut self, tag: &str, code: char, value: impl Into<String>) -> Result<usize> {
        self.insert_subfields(tag, [(code, value.into())])
    }

    /// Remove and return the field at `index`.
    pub fn delete_field(&mut self, index: usize) -> Option<Field> {
        (index < self.fields.len()).then(|| self.fields.remove(index))
    }

    /// Remove every field with `tag`, returning how many were removed.
    pub fn delete_fields(&mut self, tag: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|f| f.tag != tag);
        before - self.fields.len()
    }

    /// Keep only the fields matching `keep`.
    pub fn retain_fields<F>(&mut self, keep: F)
    where
        F: FnMut(&Field) -> bool,
    {
        self.fields.retain(keep);
    }

    /// Append a field in stream order, bypassing placement and capacity
    /// checks. Used by decoders so that unmodified records round-trip.
    pub(crate) fn push_field(&mut self, field: Field) {
        self.fields.push(field);
    }
}

/// Contiguous run of same-tag fields. See [`Record::get_tag_range`].
#[derive(Debug, Clone)]
pub struct TagRange<'a> {
    inner: std::slice::Iter<'a, Field>,
}

impl<'a> Iterator for TagRange<'a> {
    type Item = &'a Field;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for TagRange<'_> {}

impl DoubleEndedIterator for TagRange<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

/// Builder for fluently constructing records.
///
/// Fields go through [`Record::insert_field`], so the built record is
/// ordered. The first error is kept and returned by [`RecordBuilder::build`].
#[derive(Debug)]
pub struct RecordBuilder {
    record: Result<Record>,
}

impl RecordBuilder {
    fn apply<F>(mut self, op: F) -> Self
    where
        F: FnOnce(&mut Record) -> Result<usize>,
    {
        if let Ok(record) = &mut self.record {
            if let Err(e) = op(record) {
                self.record = Err(e);
            }
        }
        self
    }

    /// Add a control field.
    #[must_use]
    pub fn control_field(self, tag: &str, value: &str) -> Self {
        self.apply(|r| r.insert_control_field(tag, value))
    }

    /// Add a data field.
    #[must_use]
    pub fn data_field<I, S>(self, tag: &str, indicator1: char, indicator2: char, pairs: I) -> Self
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<String>,
    {
        self.apply(|r| r.insert_data_field(tag, indicator1, indicator2, pairs))
    }

    /// Add a prebuilt field.
    #[must_use]
    pub fn field(self, field: Field) -> Self {
        self.apply(|r| r.insert_field(field))
    }

    /// Finish building.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while adding fields.
    pub fn build(self) -> Result<Record> {
        self.record
    }
}

//! Field tags.
//!
//! A [`Tag`] is exactly three ASCII alphanumeric characters. Tags order by
//! their bytes, so numeric tags sort before alphabetic local tags such as
//! `LOK`. That ordering is what [`crate::Record::insert_field`] uses to keep
//! fields ascending.

use crate::error::{MarcError, Result};
use crate::layout::TAG_LENGTH;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tags that may occur at most once in a bibliographic record.
const NON_REPEATABLE: &[&str] = &[
    "001", "003", "005", "008", "010", "018", "036", "038", "040", "042", "043", "044", "045",
    "066", "100", "110", "111", "130", "240", "243", "245", "250", "254", "256", "263", "306",
    "357", "384", "507", "514", "841", "842", "844", "882",
];

/// Tag of the control number field.
pub const CONTROL_NUMBER: Tag = Tag(*b"001");

/// Tag carrying embedded local data blocks.
pub const LOCAL: Tag = Tag(*b"LOK");

/// A validated 3-character field tag.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag([u8; TAG_LENGTH]);

impl Tag {
    /// Validate and build a tag.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidTag`] unless `tag` is three ASCII
    /// alphanumeric characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use marcio::Tag;
    ///
    /// assert!(Tag::new("245").is_ok());
    /// assert!(Tag::new("LOK").is_ok());
    /// assert!(Tag::new("24").is_err());
    /// ```
    pub fn new(tag: &str) -> Result<Self> {
        Self::from_bytes(tag.as_bytes())
    }

    /// Validate a tag taken from a directory entry or attribute.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidTag`] on anything but three ASCII
    /// alphanumeric bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match <[u8; TAG_LENGTH]>::try_from(bytes) {
            Ok(arr) if arr.iter().all(u8::is_ascii_alphanumeric) => Ok(Tag(arr)),
            _ => Err(MarcError::InvalidTag(
                String::from_utf8_lossy(bytes).into_owned(),
            )),
        }
    }

    /// The tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ASCII bytes are ever stored.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }

    /// The raw tag bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; TAG_LENGTH] {
        &self.0
    }

    /// Whether fields with this tag carry raw content instead of subfields.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.0[0] == b'0' && self.0[1] == b'0'
    }

    /// Whether this is the tag of embedded local data fields.
    #[must_use]
    pub fn is_local(&self) -> bool {
        *self == LOCAL
    }

    /// Whether a record may hold more than one field with this tag.
    #[must_use]
    pub fn is_repeatable(&self) -> bool {
        !NON_REPEATABLE.contains(&self.as_str())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.as_str())
    }
}

impl FromStr for Tag {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self> {
        Tag::new(s)
    }
}

impl TryFrom<String> for Tag {
    type Error = MarcError;

    fn try_from(value: String) -> Result<Self> {
        Tag::new(&value)
    }
}

impl TryFrom<&str> for Tag {
    type Error = MarcError;

    fn try_from(value: &str) -> Result<Self> {
        Tag::new(value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.as_str().to_string()
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        self.0.as_slice() == other.as_bytes()
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_slice() == other.as_bytes()
    }
}

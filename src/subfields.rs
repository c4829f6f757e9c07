//! Indicators and subfields of a data field.
//!
//! [`Subfields`] keeps the two indicator characters and the ordered
//! `(code, value)` pairs of a data field. Codes may repeat; nothing here
//! enforces uniqueness.
//!
//! # Examples
//!
//! ```
//! use marcio::Subfields;
//!
//! let mut subfields = Subfields::new(' ', '0');
//! subfields.add_subfield('a', "Title");
//! subfields.add_subfield('a', "Other title");
//!
//! let values: Vec<&str> = subfields.values_for_code('a').collect();
//! assert_eq!(values, vec!["Title", "Other title"]);
//!
//! if !subfields.replace_first_subfield('b', "remainder") {
//!     subfields.add_subfield('b', "remainder");
//! }
//! assert_eq!(subfields.get_first_value('b'), Some("remainder"));
//! ```

use crate::error::{MarcError, Result};
use crate::layout::{self, SUBFIELD_DELIMITER};
use crate::recovery::RecoveryContext;
use crate::tag::Tag;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// A subfield within a data field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield value
    pub value: String,
}

impl Subfield {
    /// Create a subfield.
    pub fn new(code: char, value: impl Into<String>) -> Self {
        Subfield {
            code,
            value: value.into(),
        }
    }
}

/// Two indicators plus an ordered list of subfields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfields {
    indicator1: char,
    indicator2: char,
    /// Stored in a `SmallVec`: most fields have four or fewer subfields.
    items: SmallVec<[Subfield; 4]>,
}

impl Default for Subfields {
    fn default() -> Self {
        Subfields::new(' ', ' ')
    }
}

impl Subfields {
    /// Create an empty subfield list with the given indicators.
    #[must_use]
    pub fn new(indicator1: char, indicator2: char) -> Self {
        Subfields {
            indicator1,
            indicator2,
            items: SmallVec::new(),
        }
    }

    /// Create from `(code, value)` pairs.
    pub fn from_pairs<I, S>(indicator1: char, indicator2: char, pairs: I) -> Self
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<String>,
    {
        let mut subfields = Subfields::new(indicator1, indicator2);
        for (code, value) in pairs {
            subfields.add_subfield(code, value);
        }
        subfields
    }

    /// First indicator.
    #[must_use]
    pub fn indicator1(&self) -> char {
        self.indicator1
    }

    /// Second indicator.
    #[must_use]
    pub fn indicator2(&self) -> char {
        self.indicator2
    }

    /// Replace both indicators.
    pub fn set_indicators(&mut self, indicator1: char, indicator2: char) {
        self.indicator1 = indicator1;
        self.indicator2 = indicator2;
    }

    /// Whether any subfield has `code`.
    #[must_use]
    pub fn has_subfield(&self, code: char) -> bool {
        self.items.iter().any(|sf| sf.code == code)
    }

    /// Whether some subfield has `code` and exactly `value`.
    #[must_use]
    pub fn has_subfield_with_value(&self, code: char, value: &str) -> bool {
        self.values_for_code(code).any(|v| v == value)
    }

    /// Value of the first subfield with `code`.
    #[must_use]
    pub fn get_first_value(&self, code: char) -> Option<&str> {
        self.values_for_code(code).next()
    }

    /// All values for `code`, in field order.
    ///
    /// The iterator is lazy and can be cloned to restart from the current
    /// position.
    #[must_use]
    pub fn values_for_code(&self, code: char) -> ValuesForCode<'_> {
        ValuesForCode {
            inner: self.items.iter(),
            code,
        }
    }

    /// Append a subfield. Never replaces.
    pub fn add_subfield(&mut self, code: char, value: impl Into<String>) {
        self.items.push(Subfield::new(code, value));
    }

    /// Replace the value of the first subfield with `code`.
    ///
    /// Returns `false`, leaving the list untouched, if there is no such
    /// subfield.
    pub fn replace_first_subfield(&mut self, code: char, value: impl Into<String>) -> bool {
        match self.items.iter_mut().find(|sf| sf.code == code) {
            Some(sf) => {
                sf.value = value.into();
                true
            },
            None => false,
        }
    }

    /// Remove every subfield with `code`, returning how many were removed.
    pub fn delete_all_with_code(&mut self, code: char) -> usize {
        let before = self.items.len();
        self.items.retain(|sf| sf.code != code);
        before - self.items.len()
    }

    /// Iterate over the subfields in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Subfield> {
        self.items.iter()
    }

    /// Iterate mutably over the subfields in order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Subfield> {
        self.items.iter_mut()
    }

    /// First subfield, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Subfield> {
        self.items.first()
    }

    /// Number of subfields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no subfields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bytes this payload occupies on disk, excluding the field terminator.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.indicator1.len_utf8()
            + self.indicator2.len_utf8()
            + self
                .items
                .iter()
                .map(|sf| 1 + sf.code.len_utf8() + sf.value.len())
                .sum::<usize>()
    }

    /// Append the on-disk form: indicators, then delimiter, code and value
    /// for each subfield.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidField`] if an indicator or code is not a
    /// single ASCII character, or a value contains a delimiter or terminator.
    pub fn encode_into(&self, tag: Tag, out: &mut Vec<u8>) -> Result<()> {
        for ind in [self.indicator1, self.indicator2] {
            if !ind.is_ascii() || ind.is_ascii_control() {
                return Err(MarcError::InvalidField(format!(
                    "Field {tag}: indicator {ind:?} is not a printable ASCII character"
                )));
            }
        }
        out.push(self.indicator1 as u8);
        out.push(self.indicator2 as u8);
        for sf in &self.items {
            if !sf.code.is_ascii_graphic() {
                return Err(MarcError::InvalidField(format!(
                    "Field {tag}: subfield code {:?} is not a printable ASCII character",
                    sf.code
                )));
            }
            check_value(tag, &sf.value)?;
            out.push(SUBFIELD_DELIMITER);
            out.push(sf.code as u8);
            out.extend_from_slice(sf.value.as_bytes());
        }
        Ok(())
    }

    /// Decode a data field payload (without its field terminator).
    pub(crate) fn decode(tag: Tag, bytes: &[u8], ctx: &mut RecoveryContext) -> Result<Option<Self>> {
        if bytes.len() < 2 {
            ctx.tolerate(MarcError::InvalidField(format!(
                "Field {tag}: {} byte(s) cannot hold two indicators",
                bytes.len()
            )))?;
            return Ok(None);
        }
        let mut subfields = Subfields::new(
            indicator(tag, bytes[0], ctx)?,
            indicator(tag, bytes[1], ctx)?,
        );

        let mut chunks = bytes[2..].split(|&b| b == SUBFIELD_DELIMITER);
        if let Some(leading) = chunks.next() {
            if !leading.is_empty() {
                ctx.tolerate(MarcError::InvalidField(format!(
                    "Field {tag}: data \"{}\" before the first subfield delimiter",
                    layout::describe_bytes(leading)
                )))?;
            }
        }
        for chunk in chunks {
            let text = decode_value(tag, chunk, ctx)?;
            let mut chars = text.chars();
            match chars.next() {
                Some(code) if code.is_ascii_graphic() => {
                    subfields.add_subfield(code, chars.as_str());
                },
                Some(code) => ctx.tolerate(MarcError::InvalidField(format!(
                    "Field {tag}: subfield code {code:?} is not a printable ASCII character"
                )))?,
                None => ctx.tolerate(MarcError::InvalidField(format!(
                    "Field {tag}: subfield delimiter without a code"
                )))?,
            }
        }
        Ok(Some(subfields))
    }
}

impl<'a> IntoIterator for &'a Subfields {
    type Item = &'a Subfield;
    type IntoIter = std::slice::Iter<'a, Subfield>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for Subfields {
    /// The canonical on-disk form including indicators, with `0x1F` before
    /// each code.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.indicator1, self.indicator2)?;
        for sf in &self.items {
            write!(f, "\u{1F}{}{}", sf.code, sf.value)?;
        }
        Ok(())
    }
}

/// Iterator over the values of one subfield code. See [`Subfields::values_for_code`].
#[derive(Debug, Clone)]
pub struct ValuesForCode<'a> {
    inner: std::slice::Iter<'a, Subfield>,
    code: char,
}

impl<'a> Iterator for ValuesForCode<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let code = self.code;
        self.inner
            .by_ref()
            .find(|sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }
}

/// Reject content that would corrupt the binary framing.
pub(crate) fn check_value(tag: Tag, value: &str) -> Result<()> {
    if value
        .bytes()
        .any(|b| matches!(b, layout::SUBFIELD_DELIMITER | layout::FIELD_TERMINATOR | layout::RECORD_TERMINATOR))
    {
        return Err(MarcError::InvalidField(format!(
            "Field {tag}: content contains a delimiter or terminator byte"
        )));
    }
    Ok(())
}

/// Decode field content as UTF-8, lossily when tolerated.
fn decode_text(tag: Tag, bytes: &[u8], ctx: &mut RecoveryContext) -> Result<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(e) => {
            ctx.tolerate(MarcError::EncodingError(format!(
                "Field {tag}: invalid UTF-8 at byte {}",
                e.valid_up_to()
            )))?;
            Ok(String::from_utf8_lossy(bytes).into_owned())
        },
    }
}

/// Decode field content and apply the same framing rule as the encoder.
///
/// Lenient mode drops embedded delimiter and terminator characters.
pub(crate) fn decode_value(tag: Tag, bytes: &[u8], ctx: &mut RecoveryContext) -> Result<String> {
    let text = decode_text(tag, bytes, ctx)?;
    if let Err(error) = check_value(tag, &text) {
        ctx.tolerate(error)?;
        return Ok(text
            .chars()
            .filter(|c| !matches!(*c, '\u{1D}' | '\u{1E}' | '\u{1F}'))
            .collect());
    }
    Ok(text)
}

fn indicator(tag: Tag, byte: u8, ctx: &mut RecoveryContext) -> Result<char> {
    if byte.is_ascii() && !byte.is_ascii_control() {
        return Ok(byte as char);
    }
    ctx.tolerate(MarcError::InvalidField(format!(
        "Field {tag}: indicator byte 0x{byte:02x} is not printable ASCII"
    )))?;
    Ok(' ')
}

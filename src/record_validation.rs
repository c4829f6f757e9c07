//! Structural consistency checks.
//!
//! [`RecordStructureValidator::check`] reports findings; it never fails.
//! Whether a finding is fatal is for the caller to decide.

use crate::layout::MAX_RECORD_LENGTH;
use crate::record::Record;
use crate::tag::{Tag, CONTROL_NUMBER};
use std::collections::HashSet;
use std::fmt;

/// A structural inconsistency found in a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyViolation {
    /// The record has no fields at all.
    NoFields,
    /// There is no `001` field.
    MissingControlNumber,
    /// A `001` exists but is not the first field.
    ControlNumberNotFirst,
    /// A local data block does not hold exactly one local `001`.
    LocalBlockControlNumber {
        /// Index of the block's opening field.
        block_start: usize,
        /// Number of local `001` fields found in it.
        count: usize,
    },
    /// The field at `index` has a smaller tag than its predecessor.
    TagOutOfOrder {
        /// Index of the offending field.
        index: usize,
    },
    /// Fields with `tag` are split into more than one run.
    NonContiguousTag {
        /// The split tag.
        tag: Tag,
    },
    /// A non-repeatable tag occurs more than once.
    NonRepeatableRepeated {
        /// The repeated tag.
        tag: Tag,
    },
    /// The record is too large for the binary format.
    Oversized {
        /// Serialized size in bytes.
        size: usize,
    },
}

impl fmt::Display for ConsistencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFields => f.write_str("record has no fields"),
            Self::MissingControlNumber => f.write_str("record has no 001 field"),
            Self::ControlNumberNotFirst => f.write_str("001 is not the first field"),
            Self::LocalBlockControlNumber { block_start, count } => write!(
                f,
                "local block at field {block_start} has {count} local 001 fields, expected 1"
            ),
            Self::TagOutOfOrder { index } => write!(f, "field {index} is out of tag order"),
            Self::NonContiguousTag { tag } => write!(f, "fields {tag} are not contiguous"),
            Self::NonRepeatableRepeated { tag } => write!(f, "non-repeatable field {tag} is repeated"),
            Self::Oversized { size } => write!(
                f,
                "record is {size} bytes, over the {MAX_RECORD_LENGTH} byte limit"
            ),
        }
    }
}

/// Validator for record structure.
#[derive(Debug)]
pub struct RecordStructureValidator;

impl RecordStructureValidator {
    /// Collect every structural finding, in field order where applicable.
    ///
    /// ```
    /// use marcio::{ConsistencyViolation, Record, RecordStructureValidator};
    ///
    /// let mut record = Record::default();
    /// record.insert_data_field("245", ' ', '0', [('a', "Untitled")])?;
    /// assert_eq!(
    ///     RecordStructureValidator::check(&record),
    ///     vec![ConsistencyViolation::MissingControlNumber]
    /// );
    /// # Ok::<(), marcio::MarcError>(())
    /// ```
    #[must_use]
    pub fn check(record: &Record) -> Vec<ConsistencyViolation> {
        let mut findings = Vec::new();
        let fields = record.fields();
        if fields.is_empty() {
            findings.push(ConsistencyViolation::NoFields);
            return findings;
        }

        match record.find_field_index(CONTROL_NUMBER.as_str()) {
            None => findings.push(ConsistencyViolation::MissingControlNumber),
            Some(0) => {},
            Some(_) => findings.push(ConsistencyViolation::ControlNumberNotFirst),
        }

        let mut closed_runs: HashSet<Tag> = HashSet::new();
        let mut reported_split: HashSet<Tag> = HashSet::new();
        let mut reported_repeat: HashSet<Tag> = HashSet::new();
        let mut seen: HashSet<Tag> = HashSet::new();
        for (index, pair) in fields.windows(2).enumerate() {
            let (prev, next) = (pair[0].tag(), pair[1].tag());
            if next < prev {
                findings.push(ConsistencyViolation::TagOutOfOrder { index: index + 1 });
            }
            if next != prev {
                closed_runs.insert(prev);
                if closed_runs.contains(&next) && reported_split.insert(next) {
                    findings.push(ConsistencyViolation::NonContiguousTag { tag: next });
                }
            }
        }
        for field in fields {
            let tag = field.tag();
            if !seen.insert(tag) && !tag.is_repeatable() && reported_repeat.insert(tag) {
                findings.push(ConsistencyViolation::NonRepeatableRepeated { tag });
            }
        }

        for block_start in record.find_start_of_all_local_data_blocks() {
            let count = record
                .find_fields_in_local_block(CONTROL_NUMBER.as_str(), block_start)
                .len();
            if count != 1 {
                findings.push(ConsistencyViolation::LocalBlockControlNumber { block_start, count });
            }
        }

        let size = record.size();
        if size > MAX_RECORD_LENGTH {
            findings.push(ConsistencyViolation::Oversized { size });
        }
        findings
    }

    /// Whether [`RecordStructureValidator::check`] finds nothing.
    #[must_use]
    pub fn is_valid(record: &Record) -> bool {
        Self::check(record).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leader::Leader;
    use crate::record::Field;
    use crate::subfields::Subfields;

    fn valid_record() -> Record {
        Record::builder(Leader::default())
            .control_field("001", "123")
            .control_field("008", "700101s1970    xx            000 0 ger d")
            .data_field("245", '1', '0', [('a', "Title")])
            .data_field("650", ' ', '7', [('a', "One")])
            .data_field("650", ' ', '7', [('a', "Two")])
            .build()
            .unwrap()
    }

    fn data(tag: &str, pairs: &[(char, &str)]) -> Field {
        Field::data(tag, Subfields::from_pairs(' ', ' ', pairs.iter().copied())).unwrap()
    }

    #[test]
    fn test_valid_record() {
        assert!(RecordStructureValidator::is_valid(&valid_record()));
    }

    #[test]
    fn test_empty_record() {
        assert_eq!(
            RecordStructureValidator::check(&Record::default()),
            vec![ConsistencyViolation::NoFields]
        );
    }

    #[test]
    fn test_control_number_not_first() {
        let mut record = Record::default();
        record.push_field(data("245", &[('a', "T")]));
        record.push_field(Field::control("001", "1").unwrap());
        let findings = RecordStructureValidator::check(&record);
        assert!(findings.contains(&ConsistencyViolation::ControlNumberNotFirst));
        assert!(findings.contains(&ConsistencyViolation::TagOutOfOrder { index: 1 }));
    }

    #[test]
    fn test_split_and_repeated_tags() {
        let mut record = Record::default();
        record.push_field(Field::control("001", "1").unwrap());
        record.push_field(data("245", &[('a', "T")]));
        record.push_field(data("650", &[('a', "A")]));
        record.push_field(data("245", &[('a', "again")]));
        record.push_field(data("650", &[('a', "B")]));
        let findings = RecordStructureValidator::check(&record);
        let tag = |t: &str| Tag::new(t).unwrap();
        assert!(findings.contains(&ConsistencyViolation::NonContiguousTag { tag: tag("245") }));
        assert!(findings.contains(&ConsistencyViolation::NonContiguousTag { tag: tag("650") }));
        assert!(findings.contains(&ConsistencyViolation::NonRepeatableRepeated { tag: tag("245") }));
        assert!(!findings.contains(&ConsistencyViolation::NonRepeatableRepeated { tag: tag("650") }));
        assert!(findings.contains(&ConsistencyViolation::TagOutOfOrder { index: 3 }));
    }

    #[test]
    fn test_local_block_control_numbers() {
        let record = Record::builder(Leader::default())
            .control_field("001", "1")
            .data_field("LOK", ' ', ' ', [('0', "000 xxxxxnu  a22 zn  4500")])
            .data_field("LOK", ' ', ' ', [('0', "001"), ('a', "A")])
            .data_field("LOK", ' ', ' ', [('0', "001"), ('a', "B")])
            .data_field("LOK", ' ', ' ', [('0', "000 xxxxxnu  a22 zn  4500")])
            .data_field("LOK", ' ', ' ', [('0', "852"), ('a', "DE-21")])
            .build()
            .unwrap();
        assert_eq!(
            RecordStructureValidator::check(&record),
            vec![
                ConsistencyViolation::LocalBlockControlNumber {
                    block_start: 1,
                    count: 2
                },
                ConsistencyViolation::LocalBlockControlNumber {
                    block_start: 4,
                    count: 0
                },
            ]
        );
    }

    #[test]
    fn test_oversized() {
        let mut record = valid_record();
        let filler = "z".repeat(9_000);
        for _ in 0..12 {
            record.push_field(data("500", &[('a', filler.as_str())]));
        }
        let findings = RecordStructureValidator::check(&record);
        assert!(matches!(
            findings.last(),
            Some(ConsistencyViolation::Oversized { size }) if *size > MAX_RECORD_LENGTH
        ));
    }

    #[test]
    fn test_display() {
        let finding = ConsistencyViolation::LocalBlockControlNumber {
            block_start: 4,
            count: 0,
        };
        assert_eq!(
            finding.to_string(),
            "local block at field 4 has 0 local 001 fields, expected 1"
        );
    }
}

//! Local data blocks embedded in a record.
//!
//! Holding-institution data is carried in `LOK` data fields whose first
//! subfield is `$0`. The first three characters of that `$0` are the local
//! tag. A `LOK` field with local tag `000` opens a block; the block runs
//! until the next block start or the end of the contiguous `LOK` run it
//! belongs to.
//!
//! ```
//! use marcio::Record;
//!
//! let mut record = Record::default();
//! record.insert_control_field("001", "123")?;
//! record.insert_subfields("LOK", [('0', "000 xxxxxnu  a22 zn  4500")])?;
//! record.insert_subfields("LOK", [('0', "001"), ('a', "local-1")])?;
//! record.insert_subfields("LOK", [('0', "852"), ('a', "DE-21")])?;
//! record.insert_subfields("LOK", [('0', "000 xxxxxnu  a22 zn  4500")])?;
//! record.insert_subfields("LOK", [('0', "001"), ('a', "local-2")])?;
//!
//! let blocks = record.find_start_of_all_local_data_blocks();
//! assert_eq!(blocks, vec![1, 4]);
//! assert_eq!(record.find_fields_in_local_block("852", blocks[0]), vec![3]);
//! assert!(record.find_fields_in_local_block("852", blocks[1]).is_empty());
//! # Ok::<(), marcio::MarcError>(())
//! ```

use crate::record::{Field, Record};
use crate::tag::LOCAL;
use std::ops::Range;

/// Local tag that opens a block.
pub const BLOCK_START_LOCAL_TAG: &str = "000";

impl Record {
    /// Indices of every `LOK` field that opens a local data block.
    #[must_use]
    pub fn find_start_of_all_local_data_blocks(&self) -> Vec<usize> {
        self.local_fields()
            .filter(|(_, field)| field.local_tag() == Some(BLOCK_START_LOCAL_TAG))
            .map(|(index, _)| index)
            .collect()
    }

    /// Field index range covered by the block starting at `block_start`.
    ///
    /// The range excludes the block start itself. Empty if `block_start` is
    /// not a block start.
    #[must_use]
    pub fn local_block_range(&self, block_start: usize) -> Range<usize> {
        let opens_block = self
            .field(block_start)
            .and_then(Field::local_tag)
            .is_some_and(|t| t == BLOCK_START_LOCAL_TAG);
        if !opens_block {
            return block_start..block_start;
        }
        let first = block_start + 1;
        let len = self.fields()[first..]
            .iter()
            .take_while(|f| f.tag() == LOCAL && f.local_tag() != Some(BLOCK_START_LOCAL_TAG))
            .count();
        first..first + len
    }

    /// Indices of the fields with `local_tag` inside the block starting at
    /// `block_start`, in field order.
    #[must_use]
    pub fn find_fields_in_local_block(&self, local_tag: &str, block_start: usize) -> Vec<usize> {
        self.local_block_range(block_start)
            .filter(|&index| {
                self.field(index)
                    .and_then(Field::local_tag)
                    .is_some_and(|t| t == local_tag)
            })
            .collect()
    }

    /// Every `LOK` field with its index, including any outside the first
    /// contiguous run of a record read in stream order.
    fn local_fields(&self) -> impl Iterator<Item = (usize, &Field)> {
        self.fields()
            .iter()
            .enumerate()
            .filter(|(_, field)| field.tag() == LOCAL)
    }
}

//! Reading records in the binary format.
//!
//! [`decode_record`] turns the bytes of exactly one record into a
//! [`Record`]. [`MarcReader`] streams records from any [`std::io::Read`],
//! tracking the byte offset of each record so it can be revisited with
//! [`MarcReader::seek`].
//!
//! # Examples
//!
//! ```no_run
//! use marcio::{MarcError, MarcReader};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let file = File::open("records.mrc")?;
//! let mut reader = MarcReader::new(BufReader::new(file));
//!
//! loop {
//!     let offset = reader.tell();
//!     match reader.read_record() {
//!         Ok(Some(record)) => println!("{offset}: {:?}", record.control_number()),
//!         Ok(None) => break,
//!         // Only the leader was consumed: find the next record boundary.
//!         Err(MarcError::MalformedRecord { source, .. })
//!             if matches!(*source, MarcError::InvalidLeader(_)) =>
//!         {
//!             if !reader.skip_to_next_record()? {
//!                 break;
//!             }
//!         },
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::directory;
use crate::error::{MarcError, Result};
use crate::formats::FormatReader;
use crate::layout::{FIELD_TERMINATOR, LEADER_LENGTH, RECORD_TERMINATOR};
use crate::leader::Leader;
use crate::offset_index::RecordOffset;
use crate::record::{Field, FieldContent, Record};
use crate::recovery::{RecoveryContext, RecoveryMode};
use crate::subfields::{self, Subfields};
use std::io::{self, BufRead, Read, Seek, SeekFrom};
use tracing::{debug, trace};

/// Decode the bytes of exactly one record.
///
/// # Errors
///
/// Returns a structural error for any defect the mode does not tolerate.
/// A slice shorter than the leader's record length is a
/// [`MarcError::TruncatedRecord`]; a longer one is an
/// [`MarcError::InvalidRecord`].
pub fn decode_record(bytes: &[u8], mode: RecoveryMode) -> Result<Record> {
    let leader_bytes = bytes.get(..LEADER_LENGTH).ok_or_else(|| {
        MarcError::TruncatedRecord(format!(
            "{} byte(s) cannot hold a {LEADER_LENGTH}-byte leader",
            bytes.len()
        ))
    })?;
    let leader = Leader::from_bytes(leader_bytes)?;
    leader.validate_for_reading()?;
    let declared = leader.record_length as usize;
    if bytes.len() < declared {
        return Err(MarcError::TruncatedRecord(format!(
            "Leader declares {declared} bytes but only {} are present",
            bytes.len()
        )));
    }
    if bytes.len() > declared {
        return Err(MarcError::InvalidRecord(format!(
            "{} trailing byte(s) after the {declared}-byte record",
            bytes.len() - declared
        )));
    }
    decode_body(leader, bytes, &mut RecoveryContext::new(mode))
}

/// Decode a record whose leader has already been parsed and validated.
/// `bytes` holds the whole record, leader included.
fn decode_body(leader: Leader, bytes: &[u8], ctx: &mut RecoveryContext) -> Result<Record> {
    let base = leader.data_base_address as usize;
    let entries = directory::parse(&bytes[LEADER_LENGTH..base], ctx)?;
    let data = &bytes[base..];

    let mut record = Record::new(leader);
    let mut expected_offset = 0;
    for entry in entries {
        let end = entry.offset + entry.length;
        if entry.length == 0 || end > data.len() {
            return Err(MarcError::InvalidRecord(format!(
                "Field {} at offset {} with length {} lies outside the data area of {} bytes",
                entry.tag,
                entry.offset,
                entry.length,
                data.len()
            )));
        }
        if entry.offset != expected_offset {
            ctx.tolerate(MarcError::InvalidRecord(format!(
                "Field {} starts at offset {} but the previous field ends at {expected_offset}",
                entry.tag, entry.offset
            )))?;
        }
        expected_offset = end;

        let raw = &data[entry.offset..end];
        let body = match raw.split_last() {
            Some((&FIELD_TERMINATOR, body)) => body,
            _ => {
                ctx.tolerate(MarcError::InvalidField(format!(
                    "Field {} is not terminated by a field terminator",
                    entry.tag
                )))?;
                raw
            },
        };

        let content = if entry.tag.is_control() {
            Some(FieldContent::Control(subfields::decode_value(
                entry.tag, body, ctx,
            )?))
        } else {
            Subfields::decode(entry.tag, body, ctx)?.map(FieldContent::Data)
        };
        if let Some(content) = content {
            record.push_field(Field::new(entry.tag, content)?);
        }
    }

    if expected_offset + 1 != data.len() {
        ctx.tolerate(MarcError::InvalidRecord(format!(
            "Directory accounts for {} byte(s) of field data but the record holds {}",
            expected_offset,
            data.len().saturating_sub(1)
        )))?;
    }
    match bytes.last() {
        Some(&RECORD_TERMINATOR) => {},
        Some(&other) => ctx.tolerate(MarcError::InvalidRecord(format!(
            "Record ends with byte 0x{other:02x} instead of a record terminator"
        )))?,
        None => {},
    }
    Ok(record)
}

/// Reader for the binary format.
///
/// Offsets reported by [`MarcReader::tell`] count bytes consumed since the
/// reader was created, plus the start offset (0 unless set with
/// [`MarcReader::with_start_offset`]).
#[derive(Debug)]
pub struct MarcReader<R: Read> {
    reader: R,
    recovery: RecoveryContext,
    records_read: usize,
    position: u64,
}

impl<R: Read> MarcReader<R> {
    /// Create a reader in strict mode.
    pub fn new(reader: R) -> Self {
        debug!("binary reader created");
        MarcReader {
            reader,
            recovery: RecoveryContext::default(),
            records_read: 0,
            position: 0,
        }
    }

    /// Set the recovery mode for handling malformed records.
    ///
    /// # Examples
    ///
    /// ```
    /// use marcio::{MarcReader, RecoveryMode};
    /// use std::io::Cursor;
    ///
    /// let reader = MarcReader::new(Cursor::new(Vec::new()))
    ///     .with_recovery_mode(RecoveryMode::Lenient);
    /// ```
    #[must_use]
    pub fn with_recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.recovery = RecoveryContext::new(mode);
        self
    }

    /// Declare the stream offset the reader starts at.
    #[must_use]
    pub fn with_start_offset(mut self, offset: u64) -> Self {
        self.position = offset;
        self
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` at a clean end of stream. On error the reader has
    /// consumed the leader (if unreadable) or the full declared record, so
    /// the next call starts after it; [`MarcReader::tell`] reports that
    /// position.
    ///
    /// # Errors
    ///
    /// Structural errors are wrapped in [`MarcError::MalformedRecord`] with
    /// the offset of the failing record. I/O errors are returned as is.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        self.recovery.clear();
        let start = self.position;
        let mut leader_bytes = [0u8; LEADER_LENGTH];
        let got = self.read_fully(&mut leader_bytes)?;
        if got == 0 {
            return Ok(None);
        }
        if got < LEADER_LENGTH {
            return Err(MarcError::TruncatedRecord(format!(
                "Stream ends {got} byte(s) into a leader"
            ))
            .at_offset(start));
        }

        let leader = Leader::from_bytes(&leader_bytes)
            .and_then(|leader| leader.validate_for_reading().map(|()| leader))
            .map_err(|e| e.at_offset(start))?;

        let length = leader.record_length as usize;
        let mut bytes = vec![0u8; length];
        bytes[..LEADER_LENGTH].copy_from_slice(&leader_bytes);
        let got = self.read_fully(&mut bytes[LEADER_LENGTH..])?;
        if got < length - LEADER_LENGTH {
            return Err(MarcError::TruncatedRecord(format!(
                "Leader declares {length} bytes but the stream ends after {}",
                LEADER_LENGTH + got
            ))
            .at_offset(start));
        }

        let record =
            decode_body(leader, &bytes, &mut self.recovery).map_err(|e| e.at_offset(start))?;
        self.records_read += 1;
        trace!(
            offset = start,
            length,
            control_number = record.control_number(),
            "read binary record"
        );
        Ok(Some(record))
    }

    /// Offset of the next record to be read.
    #[must_use]
    pub fn tell(&self) -> RecordOffset {
        RecordOffset::new(self.position)
    }

    /// Number of records read successfully.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Repairs made in lenient mode while reading the most recent record.
    ///
    /// Cleared at the start of every [`MarcReader::read_record`].
    #[must_use]
    pub fn recovery_messages(&self) -> &[String] {
        self.recovery.messages()
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Return the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Fill `buf` as far as the stream allows, returning the byte count.
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => {
                    filled += n;
                    self.position += n as u64;
                },
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl<R: Read + Seek> MarcReader<R> {
    /// Reposition so that the next read starts at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying seek fails.
    pub fn seek(&mut self, offset: RecordOffset) -> Result<()> {
        self.reader.seek(SeekFrom::Start(offset.get()))?;
        self.position = offset.get();
        Ok(())
    }
}

impl<R: BufRead> MarcReader<R> {
    /// Skip forward past the next record terminator.
    ///
    /// Returns `false` if the stream ended first. Use after a failed read
    /// to resynchronise on the following record.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub fn skip_to_next_record(&mut self) -> Result<bool> {
        let mut skipped = 0u64;
        loop {
            let (consumed, found) = {
                let buf = match self.reader.fill_buf() {
                    Ok(buf) => buf,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                };
                if buf.is_empty() {
                    break;
                }
                match memchr::memchr(RECORD_TERMINATOR, buf) {
                    Some(pos) => (pos + 1, true),
                    None => (buf.len(), false),
                }
            };
            self.reader.consume(consumed);
            self.position += consumed as u64;
            skipped += consumed as u64;
            if found {
                debug!(skipped, offset = self.position, "resynchronised on record terminator");
                return Ok(true);
            }
        }
        debug!(skipped, "no record terminator before end of stream");
        Ok(false)
    }
}

impl<R: Read + std::fmt::Debug> FormatReader for MarcReader<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        MarcReader::read_record(self)
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.records_read)
    }

    fn tell(&self) -> RecordOffset {
        MarcReader::tell(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// 001 "123456789", 245 " 0" $a "Title".
    const SCENARIO: &[u8] = b"00070naa a2200049 c 4500\
001001000000245001000010\x1E\
123456789\x1E 0\x1FaTitle\x1E\x1D";

    fn with_byte(bytes: &[u8], index: usize, value: u8) -> Vec<u8> {
        let mut copy = bytes.to_vec();
        copy[index] = value;
        copy
    }

    #[test]
    fn test_decode_scenario() {
        let record = decode_record(SCENARIO, RecoveryMode::Strict).unwrap();
        assert_eq!(record.control_number(), Some("123456789"));
        assert_eq!(record.get_first_subfield_value("245", 'a'), Some("Title"));
        let field = record.get_first_field("245").unwrap();
        let sf = field.subfields().unwrap();
        assert_eq!((sf.indicator1(), sf.indicator2()), (' ', '0'));
    }

    #[test]
    fn test_decode_round_trips() {
        let record = decode_record(SCENARIO, RecoveryMode::Strict).unwrap();
        assert_eq!(record.to_bytes().unwrap(), SCENARIO);
    }

    #[test]
    fn test_decode_rejects_bad_leader_in_both_modes() {
        let bad = with_byte(SCENARIO, 2, b'x');
        assert!(decode_record(&bad, RecoveryMode::Strict).is_err());
        assert!(decode_record(&bad, RecoveryMode::Lenient).is_err());
    }

    #[test]
    fn test_decode_length_mismatch() {
        assert!(matches!(
            decode_record(&SCENARIO[..60], RecoveryMode::Strict),
            Err(MarcError::TruncatedRecord(_))
        ));
        let mut longer = SCENARIO.to_vec();
        longer.push(b'x');
        assert!(matches!(
            decode_record(&longer, RecoveryMode::Strict),
            Err(MarcError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_decode_field_outside_record_is_fatal() {
        // 245 length 0010 -> 0910
        let bad = with_byte(SCENARIO, 40, b'9');
        assert!(decode_record(&bad, RecoveryMode::Lenient).is_err());
    }

    #[test]
    fn test_decode_missing_field_terminator() {
        // Overwrite the terminator after "123456789".
        let bad = with_byte(SCENARIO, 58, b'X');
        assert!(decode_record(&bad, RecoveryMode::Strict).is_err());
        let record = decode_record(&bad, RecoveryMode::Lenient).unwrap();
        assert_eq!(record.control_number(), Some("123456789X"));
    }

    #[test]
    fn test_decode_wrong_record_terminator() {
        let bad = with_byte(SCENARIO, 69, FIELD_TERMINATOR);
        assert!(decode_record(&bad, RecoveryMode::Strict).is_err());
        let record = decode_record(&bad, RecoveryMode::Lenient).unwrap();
        assert_eq!(record.number_of_fields(), 2);
    }

    #[test]
    fn test_decode_embedded_terminator_in_control_field() {
        // "123456789" -> "1234\x1E6789"
        let bad = with_byte(SCENARIO, 53, FIELD_TERMINATOR);
        assert!(matches!(
            decode_record(&bad, RecoveryMode::Strict),
            Err(MarcError::InvalidField(_))
        ));

        let record = decode_record(&bad, RecoveryMode::Lenient).unwrap();
        assert_eq!(record.control_number(), Some("12346789"));
        assert!(record.to_bytes().is_ok());
    }

    #[test]
    fn test_decode_embedded_terminator_in_subfield() {
        // "Title" -> "Ti\x1Dle"
        let bad = with_byte(SCENARIO, 65, RECORD_TERMINATOR);
        assert!(decode_record(&bad, RecoveryMode::Strict).is_err());

        let record = decode_record(&bad, RecoveryMode::Lenient).unwrap();
        assert_eq!(record.get_first_subfield_value("245", 'a'), Some("Tile"));
        assert!(record.to_bytes().is_ok());
    }

    #[test]
    fn test_decode_space_as_subfield_code() {
        let bad = with_byte(SCENARIO, 62, b' ');
        assert!(decode_record(&bad, RecoveryMode::Strict).is_err());

        let record = decode_record(&bad, RecoveryMode::Lenient).unwrap();
        let field = record.get_first_field("245").unwrap();
        assert!(field.subfields().unwrap().is_empty());
        assert!(record.to_bytes().is_ok());
    }

    #[test]
    fn test_decode_non_cumulative_offsets() {
        // Directory claims 245 starts at 00011 and lasts 0009 bytes.
        let mut bad = with_byte(SCENARIO, 42, b'9');
        bad[41] = b'0';
        bad[47] = b'1';
        assert!(decode_record(&bad, RecoveryMode::Strict).is_err());
        let record = decode_record(&bad, RecoveryMode::Lenient).unwrap();
        assert_eq!(record.number_of_fields(), 2);
    }

    #[test]
    fn test_reader_reads_sequence_and_tracks_offsets() {
        let mut data = SCENARIO.to_vec();
        data.extend_from_slice(SCENARIO);
        let mut reader = MarcReader::new(Cursor::new(data));

        assert_eq!(reader.tell().get(), 0);
        assert!(reader.read_record().unwrap().is_some());
        assert_eq!(reader.tell().get(), 70);
        assert!(reader.read_record().unwrap().is_some());
        assert!(reader.read_record().unwrap().is_none());
        assert_eq!(reader.records_read(), 2);
    }

    #[test]
    fn test_reader_seek() {
        let mut data = SCENARIO.to_vec();
        data.extend_from_slice(SCENARIO);
        let mut reader = MarcReader::new(Cursor::new(data));
        reader.seek(RecordOffset::new(70)).unwrap();
        assert_eq!(reader.tell().get(), 70);
        assert!(reader.read_record().unwrap().is_some());
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_reader_error_carries_offset_and_position_advances() {
        let mut data = SCENARIO.to_vec();
        data.extend_from_slice(&with_byte(SCENARIO, 58, b'X'));
        data.extend_from_slice(SCENARIO);
        let mut reader = MarcReader::new(Cursor::new(data));

        reader.read_record().unwrap();
        match reader.read_record() {
            Err(MarcError::MalformedRecord { offset, .. }) => assert_eq!(offset, 70),
            other => panic!("expected malformed record, got {other:?}"),
        }
        assert_eq!(reader.tell().get(), 140);
        assert!(reader.read_record().unwrap().is_some());
    }

    #[test]
    fn test_reader_unreadable_leader_consumes_leader_only() {
        let mut data = b"garbage!garbage!garbage!".to_vec();
        data.extend_from_slice(SCENARIO);
        let mut reader = MarcReader::new(Cursor::new(data));
        assert!(reader.read_record().is_err());
        assert_eq!(reader.tell().get(), 24);
        assert!(reader.read_record().unwrap().is_some());
    }

    #[test]
    fn test_reader_truncated_stream() {
        let mut reader = MarcReader::new(Cursor::new(SCENARIO[..50].to_vec()));
        let err = reader.read_record().unwrap_err();
        assert!(err.to_string().contains("Truncated"), "got: {err}");
    }

    #[test]
    fn test_skip_to_next_record() {
        let mut data = b"noise\x1Dmore".to_vec();
        data.extend_from_slice(SCENARIO);
        let mut reader = MarcReader::new(Cursor::new(data));
        assert!(reader.skip_to_next_record().unwrap());
        assert_eq!(reader.tell().get(), 6);

        let mut reader = MarcReader::new(Cursor::new(b"no terminator".to_vec()));
        assert!(!reader.skip_to_next_record().unwrap());
        assert_eq!(reader.tell().get(), 13);
    }

    #[test]
    fn test_lenient_reader_collects_messages() {
        let bad = with_byte(SCENARIO, 69, FIELD_TERMINATOR);
        let mut reader =
            MarcReader::new(Cursor::new(bad)).with_recovery_mode(RecoveryMode::Lenient);
        assert!(reader.read_record().unwrap().is_some());
        assert_eq!(reader.recovery_messages().len(), 1);
    }

    #[test]
    fn test_recovery_messages_describe_latest_record() {
        let mut data = with_byte(SCENARIO, 69, FIELD_TERMINATOR);
        data.extend_from_slice(SCENARIO);
        data.extend(with_byte(SCENARIO, 69, FIELD_TERMINATOR));
        let mut reader =
            MarcReader::new(Cursor::new(data)).with_recovery_mode(RecoveryMode::Lenient);

        assert!(reader.read_record().unwrap().is_some());
        assert_eq!(reader.recovery_messages().len(), 1);
        assert!(reader.read_record().unwrap().is_some());
        assert!(reader.recovery_messages().is_empty());
        assert!(reader.read_record().unwrap().is_some());
        assert_eq!(reader.recovery_messages().len(), 1);
        assert!(reader.read_record().unwrap().is_none());
        assert!(reader.recovery_messages().is_empty());
    }
}

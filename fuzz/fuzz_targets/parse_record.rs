#![no_main]

use libfuzzer_sys::fuzz_target;
use marcio::{MarcReader, RecoveryMode};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    for mode in [RecoveryMode::Strict, RecoveryMode::Lenient] {
        let mut reader = MarcReader::new(Cursor::new(data)).with_recovery_mode(mode);
        // Every failed read consumes input, so this terminates.
        for _ in 0..64 {
            match reader.read_record() {
                Ok(Some(_)) | Err(_) => {},
                Ok(None) => break,
            }
        }
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use marcio::{MarcXmlReader, RecoveryMode};

fuzz_target!(|data: &[u8]| {
    for mode in [RecoveryMode::Strict, RecoveryMode::Lenient] {
        let mut reader = MarcXmlReader::new(data).with_recovery_mode(mode);
        for _ in 0..64 {
            match reader.read_record() {
                Ok(Some(_)) | Err(_) => {},
                Ok(None) => break,
            }
        }
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use marcio::{reader::decode_record, writer::encode_record, RecoveryMode};

fuzz_target!(|data: &[u8]| {
    if let Ok(record) = decode_record(data, RecoveryMode::Strict) {
        let bytes = encode_record(&record).expect("strictly decoded record re-encodes");
        assert_eq!(bytes, data);
    }
    if let Ok(repaired) = decode_record(data, RecoveryMode::Lenient) {
        if let Ok(bytes) = encode_record(&repaired) {
            decode_record(&bytes, RecoveryMode::Strict).expect("repaired record decodes strictly");
        }
    }
});

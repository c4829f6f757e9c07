//! Common test helpers shared across the integration tests.

#![allow(dead_code)]

use marcio::{Leader, Record};

/// The binary form of the record from [`scenario_record`].
///
/// Leader, directory for `001` and `245`, then the field data.
pub const SCENARIO_BYTES: &[u8] = b"00070naa a2200049 c 4500\
001001000000245001000010\x1E\
123456789\x1E 0\x1FaTitle\x1E\x1D";

/// Frame raw field bodies as one binary record.
///
/// Lengths, offsets, and the leader counters are computed; the bodies are
/// copied as given, so they may carry bytes the encoder would refuse.
pub fn assemble_record<B: AsRef<[u8]>>(fields: &[(&str, B)]) -> Vec<u8> {
    let mut directory = Vec::new();
    let mut data = Vec::new();
    for (tag, body) in fields {
        let body = body.as_ref();
        directory.extend(format!("{tag}{:04}{:05}", body.len() + 1, data.len()).bytes());
        data.extend_from_slice(body);
        data.push(0x1E);
    }
    directory.push(0x1E);
    data.push(0x1D);

    let base = 24 + directory.len();
    let mut out = format!("{:05}nam a22{base:05} c 4500", base + data.len()).into_bytes();
    out.extend(directory);
    out.extend(data);
    out
}

/// Leader used by the scenario record: new, language material, article.
pub fn scenario_leader() -> Leader {
    Leader::from_bytes(b"00000naa a2200000 c 4500").expect("valid leader literal")
}

/// `001 123456789` and `245 _0 $a Title`.
pub fn scenario_record() -> Record {
    Record::builder(scenario_leader())
        .control_field("001", "123456789")
        .data_field("245", ' ', '0', [('a', "Title")])
        .build()
        .expect("scenario record builds")
}

/// A monograph with a handful of typical fields.
pub fn book_record(id: &str, title: &str) -> Record {
    Record::builder(Leader::default())
        .control_field("001", id)
        .control_field("008", "200101s2020    gw            000 0 ger d")
        .data_field("020", ' ', ' ', [('a', "9783161484100")])
        .data_field("100", '1', ' ', [('a', "Mustermann, Erika"), ('e', "author")])
        .data_field("245", '1', '0', [('a', title), ('b', "a subtitle"), ('c', "Erika Mustermann")])
        .data_field("650", ' ', '7', [('a', "Bibliotheken"), ('2', "gnd")])
        .data_field("650", ' ', '7', [('a', "Metadaten"), ('2', "gnd")])
        .build()
        .expect("book record builds")
}

/// `count` distinct book records with control numbers `rec-0000`, `rec-0001`, ...
pub fn book_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| book_record(&format!("rec-{i:04}"), &format!("Title number {i:04}")))
        .collect()
}

/// A record carrying two local data blocks.
///
/// The first block holds two local `001` fields, which is a consistency
/// violation; the second block is well formed.
pub fn record_with_local_blocks() -> Record {
    Record::builder(Leader::default())
        .control_field("001", "555")
        .data_field("245", '0', '0', [('a', "Holdings test")])
        .data_field("LOK", ' ', ' ', [('0', "000 xxxxxnu  a22 zn  4500")])
        .data_field("LOK", ' ', ' ', [('0', "001"), ('a', "1000")])
        .data_field("LOK", ' ', ' ', [('0', "001"), ('a', "1001")])
        .data_field("LOK", ' ', ' ', [('0', "852"), ('a', "DE-21")])
        .data_field("LOK", ' ', ' ', [('0', "000 xxxxxnu  a22 zn  4500")])
        .data_field("LOK", ' ', ' ', [('0', "001"), ('a', "2000")])
        .build()
        .expect("local block record builds")
}

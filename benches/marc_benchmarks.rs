#![allow(missing_docs)]
//! Benchmarks for reading, writing, and mutating records with Criterion.rs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use marcio::{
    FileType, Format, Leader, MarcReader, MarcWriter, OffsetIndex, Reader, Record, RecordHelpers,
    Writer,
};
use std::io::Cursor;

/// A typical monograph of roughly 600 bytes.
fn sample_record(i: usize) -> Record {
    Record::builder(Leader::default())
        .control_field("001", &format!("bench-{i:06}"))
        .control_field("008", "200101s2020    gw            000 0 ger d")
        .data_field("020", ' ', ' ', [('a', "9783161484100")])
        .data_field("100", '1', ' ', [('a', "Mustermann, Erika"), ('e', "author")])
        .data_field(
            "245",
            '1',
            '0',
            [('a', "Benchmarking bibliographic pipelines"), ('b', "a practical guide")],
        )
        .data_field("264", ' ', '1', [('a', "Tübingen"), ('b', "Example Press"), ('c', "2020")])
        .data_field("650", ' ', '7', [('a', "Bibliotheken"), ('2', "gnd")])
        .data_field("650", ' ', '7', [('a', "Metadaten"), ('2', "gnd")])
        .data_field("LOK", ' ', ' ', [('0', "000 xxxxxnu  a22 zn  4500")])
        .data_field("LOK", ' ', ' ', [('0', "001"), ('a', "local")])
        .build()
        .unwrap()
}

fn encoded_stream(format: Format, count: usize) -> Vec<u8> {
    let mut writer = Writer::from_writer(Vec::new(), format).unwrap();
    for i in 0..count {
        writer.write(&sample_record(i)).unwrap();
    }
    writer.into_inner().unwrap()
}

fn benchmark_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    for count in [1_000, 10_000] {
        let binary = encoded_stream(Format::Binary, count);
        group.bench_with_input(BenchmarkId::new("binary", count), &binary, |b, data| {
            b.iter(|| {
                let mut reader = MarcReader::new(Cursor::new(data.as_slice()));
                let mut n = 0;
                while let Ok(Some(record)) = reader.read_record() {
                    black_box(record.main_title());
                    n += 1;
                }
                n
            });
        });
        let xml = encoded_stream(Format::Xml, count);
        group.bench_with_input(BenchmarkId::new("marcxml", count), &xml, |b, data| {
            b.iter(|| {
                let mut reader =
                    Reader::from_reader(Cursor::new(data.as_slice()), FileType::Xml).unwrap();
                let mut n = 0;
                while let Ok(Some(record)) = reader.read() {
                    black_box(record.control_number().map(str::len));
                    n += 1;
                }
                n
            });
        });
    }
    group.finish();
}

fn benchmark_write(c: &mut Criterion) {
    let records: Vec<Record> = (0..1_000).map(sample_record).collect();
    c.bench_function("write_1k_binary", |b| {
        b.iter(|| {
            let mut writer = MarcWriter::new(Vec::with_capacity(1 << 20));
            for record in &records {
                writer.write_record(black_box(record)).unwrap();
            }
            writer.into_inner().unwrap().len()
        });
    });
    c.bench_function("write_1k_marcxml", |b| {
        b.iter(|| {
            let mut writer = Writer::from_writer(Vec::with_capacity(1 << 21), Format::Xml).unwrap();
            for record in &records {
                writer.write(black_box(record)).unwrap();
            }
            writer.into_inner().unwrap().len()
        });
    });
}

fn benchmark_mutation(c: &mut Criterion) {
    let record = sample_record(0);
    c.bench_function("insert_and_serialize", |b| {
        b.iter(|| {
            let mut r = record.clone();
            r.insert_subfield("082", 'a', "004").unwrap();
            r.insert_subfields("700", [('a', "Beispiel, Max"), ('4', "edt")]).unwrap();
            r.delete_fields("020");
            black_box(r.to_bytes().unwrap())
        });
    });
}

fn benchmark_random_access(c: &mut Criterion) {
    let data = encoded_stream(Format::Binary, 10_000);
    let mut reader = Reader::from_reader(Cursor::new(data), FileType::Binary).unwrap();
    let index = OffsetIndex::build(&mut reader).unwrap();
    c.bench_function("fetch_by_control_number", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 7_919) % 10_000;
            let id = format!("bench-{i:06}");
            index.fetch(&mut reader, &id).unwrap()
        });
    });
}

criterion_group!(
    benches,
    benchmark_read,
    benchmark_write,
    benchmark_mutation,
    benchmark_random_access
);
criterion_main!(benches);

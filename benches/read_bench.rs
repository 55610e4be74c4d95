// Read-path benchmarks: full scans and point lookups, cached and uncached.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hfile::{BlockCache, Reader, SeekOutcome, Writer, WriterOptions};
use std::hint::black_box;
use std::io::Cursor;
use std::sync::Arc;

const ENTRIES: usize = 10_000;

fn build_file() -> Vec<u8> {
    let mut sink = Vec::new();
    let mut writer = Writer::new(&mut sink, WriterOptions::default()).unwrap();
    for i in 0..ENTRIES {
        let key = format!("key{:08}", i);
        let value = format!("value{:08}", i);
        writer.append(key.as_bytes(), value.as_bytes()).unwrap();
    }
    writer.close().unwrap();
    sink
}

fn open_reader(bytes: Vec<u8>, cache: Option<Arc<BlockCache>>) -> Reader<Cursor<Vec<u8>>> {
    let length = bytes.len() as u64;
    let mut reader = Reader::new(Cursor::new(bytes), length, "bench.hf", cache);
    reader.load_metadata().unwrap();
    reader
}

fn benchmark_full_scan(c: &mut Criterion) {
    let reader = open_reader(build_file(), None);

    let mut group = c.benchmark_group("full_scan");
    group.throughput(Throughput::Elements(ENTRIES as u64));
    group.bench_function("scan", |b| {
        b.iter(|| {
            let mut scanner = reader.scanner();
            assert!(scanner.seek_to_first().unwrap());
            let mut count = 1;
            while scanner.next().unwrap() {
                black_box(scanner.value().unwrap());
                count += 1;
            }
            assert_eq!(count, ENTRIES);
        });
    });
    group.finish();
}

fn benchmark_point_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_lookup");

    for (label, cache) in [
        ("uncached", None),
        ("cached", Some(Arc::new(BlockCache::new(64 * 1024 * 1024)))),
    ] {
        let reader = open_reader(build_file(), cache);
        group.bench_with_input(BenchmarkId::from_parameter(label), &reader, |b, reader| {
            let mut scanner = reader.scanner();
            let mut i = 0usize;
            b.iter(|| {
                let key = format!("key{:08}", (i * 37) % ENTRIES);
                i += 1;
                assert_eq!(
                    scanner.seek_to(key.as_bytes()).unwrap(),
                    SeekOutcome::Exact
                );
                black_box(scanner.value().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_full_scan, benchmark_point_lookup);
criterion_main!(benches);

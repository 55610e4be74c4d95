// Write-path benchmarks: appending sorted entries and closing the file.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hfile::{Compression, Writer, WriterOptions};
use std::hint::black_box;

fn benchmark_sequential_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_append");

    for size in [1_000, 10_000, 100_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut writer =
                    Writer::new(Vec::new(), WriterOptions::default()).unwrap();
                for i in 0..size {
                    let key = format!("key{:08}", i);
                    let value = format!("value{:08}", i);
                    writer.append(key.as_bytes(), value.as_bytes()).unwrap();
                }
                black_box(writer.close().unwrap());
            });
        });
    }

    group.finish();
}

fn benchmark_append_by_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_by_codec");

    let mut codecs = vec![Compression::None];
    #[cfg(feature = "gzip")]
    codecs.push(Compression::Gz);
    #[cfg(feature = "snappy")]
    codecs.push(Compression::Snappy);

    for codec in codecs {
        group.bench_with_input(
            BenchmarkId::from_parameter(codec.name()),
            &codec,
            |b, &codec| {
                b.iter(|| {
                    let options = WriterOptions::default().compression(codec);
                    let mut writer = Writer::new(Vec::new(), options).unwrap();
                    for i in 0..10_000 {
                        let key = format!("key{:08}", i);
                        let value = format!("value{:08}", i).repeat(4);
                        writer.append(key.as_bytes(), value.as_bytes()).unwrap();
                    }
                    black_box(writer.close().unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_sequential_append, benchmark_append_by_codec);
criterion_main!(benches);

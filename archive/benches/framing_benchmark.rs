use std::hint::black_box;

use adr_archive::{ByteReader, ByteWriter};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};

/// Benchmark LEB128 encode/decode over a mixed value distribution
fn bench_leb(c: &mut Criterion) {
    let values: Vec<u64> = (0..1024u64).map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15)).collect();

    c.bench_function("uleb encode", |b| {
        b.iter(|| {
            let mut wr = ByteWriter::with_capacity(10 * values.len());
            for &v in black_box(&values) {
                wr.write_uleb64(v);
            }
            black_box(wr.len())
        })
    });

    let mut wr = ByteWriter::with_capacity(10 * values.len());
    for &v in &values {
        wr.write_uleb64(v);
    }
    let blob = wr.into_vec();

    let mut group = c.benchmark_group("uleb decode");
    group.throughput(Throughput::Bytes(blob.len() as u64));
    group.bench_function("mixed", |b| {
        b.iter(|| {
            let mut rd = ByteReader::new(black_box(&blob));
            let mut sum = 0u64;
            while !rd.is_empty() {
                sum = sum.wrapping_add(rd.read_uleb64().expect("blob should decode"));
            }
            black_box(sum)
        })
    });
    group.finish();
}

/// Benchmark a record-shaped blob: string + coords + times
fn bench_record(c: &mut Criterion) {
    let mut wr = ByteWriter::new();
    for _ in 0..256 {
        wr.write_string("DITON");
        wr.write_i32(551_234_567);
        wr.write_i32(72_345_678);
        wr.write_u64(1_400_000_000);
        wr.write_u64(u64::MAX);
    }
    let blob = wr.into_vec();

    let mut group = c.benchmark_group("record decode");
    group.throughput(Throughput::Bytes(blob.len() as u64));
    group.bench_function("point slices", |b| {
        b.iter(|| {
            let mut rd = ByteReader::new(black_box(&blob));
            while !rd.is_empty() {
                let _ = rd.read_string().expect("ident");
                let _ = rd.read_i32().expect("lat");
                let _ = rd.read_i32().expect("lon");
                let _ = rd.read_u64().expect("start");
                let _ = rd.read_u64().expect("end");
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_leb, bench_record);
criterion_main!(benches);

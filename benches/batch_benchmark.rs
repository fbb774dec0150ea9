//! Benchmarks for prefilter batch throughput.
//!
//! Run with: cargo bench
//!
//! This benchmark suite measures:
//! - Committed insert+delete batches of increasing size
//! - Rollback cost when a batch fails on its last element
//! - Dump cost over populated maps

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ipnet::IpNet;
use prefilter::cidrmap::MemoryMapOpener;
use prefilter::{PreFilter, PreFilterConfig};
use std::net::{IpAddr, Ipv4Addr};

fn prefilter() -> PreFilter {
    let prefilter = PreFilter::new(&PreFilterConfig::new(true), Box::new(MemoryMapOpener));
    prefilter.start().unwrap();
    prefilter
}

/// Generate a batch mixing /24 prefixes and host addresses.
fn generate_batch(count: usize) -> Vec<IpNet> {
    (0..count as u32)
        .map(|i| {
            let addr = IpAddr::V4(Ipv4Addr::from(0x0A00_0000 + (i << 8)));
            let prefix_len = if i % 2 == 0 { 24 } else { 32 };
            IpNet::new(addr, prefix_len).unwrap().trunc()
        })
        .collect()
}

fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");

    for size in [1usize, 64, 1024] {
        let batch = generate_batch(size);
        let prefilter = prefilter();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("insert_delete", size), &batch, |b, batch| {
            b.iter(|| {
                prefilter.insert(0, black_box(batch)).unwrap();
                prefilter.delete(0, black_box(batch)).unwrap();
            })
        });
    }

    group.finish();
}

fn bench_rollback(c: &mut Criterion) {
    let mut group = c.benchmark_group("rollback");

    for size in [64usize, 1024] {
        let batch = generate_batch(size);
        let prefilter = prefilter();
        // Pre-insert the last element so each batch fails on it
        prefilter.insert(0, &batch[size - 1..]).unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("insert", size), &batch, |b, batch| {
            b.iter(|| assert!(prefilter.insert(0, black_box(batch)).is_err()))
        });
    }

    group.finish();
}

fn bench_dump(c: &mut Criterion) {
    let prefilter = prefilter();
    prefilter.insert(0, &generate_batch(10_000)).unwrap();

    c.bench_function("dump_10000", |b| {
        b.iter(|| black_box(prefilter.dump(Vec::with_capacity(10_000))))
    });
}

criterion_group!(benches, bench_commit, bench_rollback, bench_dump);
criterion_main!(benches);

//! Performance benchmarks for the serial BER tester
//!
//! Measures the per-trial hot path: comparing echoes against their payloads,
//! building samples and computing the confidence level.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serial_bert::{
    compare::{align_and_compare, compare_equal_length},
    models::LoopbackSample,
    pattern::cyclic_pattern,
    stats::confidence_level,
    types::FrameStructure,
};
use std::time::Duration;

/// Flip one bit in every `stride`-th byte
fn corrupt(data: &[u8], stride: usize) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, b)| if i % stride == 0 { b ^ 0x04 } else { *b })
        .collect()
}

/// Drop every `stride`-th byte
fn drop_bytes(data: &[u8], stride: usize) -> Vec<u8> {
    data.iter()
        .enumerate()
        .filter(|(i, _)| i % stride != 0)
        .map(|(_, b)| *b)
        .collect()
}

fn bench_compare_equal_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_equal_length");

    for size in [64usize, 255, 1024] {
        let sent = cyclic_pattern(size);
        let received = corrupt(&sent, 16);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| compare_equal_length(black_box(&sent), black_box(&received)))
        });
    }

    group.finish();
}

fn bench_align_and_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("align_and_compare");

    for size in [64usize, 255, 1024] {
        let sent = cyclic_pattern(size);
        let received = drop_bytes(&corrupt(&sent, 23), 31);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| align_and_compare(black_box(&sent), black_box(&received)))
        });
    }

    group.finish();
}

fn bench_sample_construction(c: &mut Criterion) {
    let sent = cyclic_pattern(255);
    let received = drop_bytes(&sent, 50);
    let frame = FrameStructure::default();

    c.bench_function("loopback_sample_new", |b| {
        b.iter(|| {
            LoopbackSample::new(
                black_box(sent.clone()),
                black_box(received.clone()),
                Duration::from_millis(270),
                frame,
            )
        })
    });
}

fn bench_confidence_level(c: &mut Criterion) {
    let mut group = c.benchmark_group("confidence_level");

    for bits in [1e4, 1e6, 1e8] {
        group.bench_with_input(BenchmarkId::from_parameter(bits as u64), &bits, |b, bits| {
            b.iter(|| confidence_level(black_box(*bits), 1e-6, black_box(3.0)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compare_equal_length,
    bench_align_and_compare,
    bench_sample_construction,
    bench_confidence_level
);
criterion_main!(benches);

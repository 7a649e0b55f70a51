//! Micro-benchmarks for the hot scanning paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use virascan::codec::{self, KeyStream};
use virascan::config::Config;
use virascan::scanner::Scanner;
use virascan::unique::UniqueKmerIndex;

/// Deterministic pseudo-random DNA for benchmarking.
fn synthetic_sequence(len: usize) -> Vec<u8> {
    const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            BASES[(state >> 33) as usize % 4]
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let seq = synthetic_sequence(25);
    c.bench_function("encode_25mer", |b| {
        b.iter(|| codec::encode(black_box(&seq), 0, 25));
    });
}

fn bench_key_stream(c: &mut Criterion) {
    let seq = synthetic_sequence(150);
    c.bench_function("key_stream_150bp", |b| {
        b.iter(|| KeyStream::new(black_box(&seq), 25).count());
    });
}

fn bench_scan(c: &mut Criterion) {
    let mut config = Config {
        kmer_key_len: 25,
        ..Config::default()
    };
    let target = synthetic_sequence(25);
    let records = [(String::from("target"), target)].into_iter().collect();
    let unique = UniqueKmerIndex::from_records(records, &mut config, "bench").unwrap();

    let read = synthetic_sequence(150);
    c.bench_function("scan_150bp_read", |b| {
        let mut scanner = Scanner::new(&config, Some(&unique), None, None);
        b.iter(|| scanner.scan(black_box(&read)));
    });
}

criterion_group!(benches, bench_encode, bench_key_stream, bench_scan);
criterion_main!(benches);

//! Benchmark measuring encode, decode, and query throughput for the templog
//! codec against a synthetic HDFS-style log corpus.
//!
//! Compares:
//! 1. **encode** — archival vs. query-optimized packet sizing, across corpus
//!    sizes.
//! 2. **decode_all** — full decompression and line rehydration.
//! 3. **query** — keyword search with Bloom pruning, measuring the benefit
//!    of selective decompression against a rare vs. a common token.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use templog::config::{EncodeMode, EncodeOptions, QueryOptions};
use templog::{Bank, Index};

const TPL_TEXT: &str = "EventId,EventTemplate\n\
    E1,User <*> logged in from <*>\n\
    E2,Connection closed after <*> seconds\n\
    E3,Block <*> allocated on datanode <*>\n\
    E4,Heartbeat received from node <*>\n";

/// A synthetic corpus mixing all four templates, one untemplated line every
/// 20 rows, and a single planted rare token for the query benchmarks.
fn synthetic_corpus(n: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(n);
    for i in 0..n {
        let line = match i % 5 {
            0 => format!("User user{i} logged in from 10.0.{}.{}", (i / 256) % 256, i % 256),
            1 => format!("Connection closed after {} seconds", i % 600),
            2 => format!("Block blk_{i} allocated on datanode dn{}", i % 40),
            3 => format!("Heartbeat received from node dn{}", i % 40),
            _ => format!("unstructured diagnostic message number {i}"),
        };
        lines.push(line);
    }
    if n > 100 {
        lines[n / 2] = "Connection closed after 999999 seconds on node RARE_TOKEN_XYZ".to_string();
    }
    lines
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for &n in &[1_000usize, 10_000, 100_000] {
        let lines = synthetic_corpus(n);
        for mode in [EncodeMode::Archival, EncodeMode::Query] {
            group.bench_with_input(BenchmarkId::new(format!("{mode:?}"), n), &lines, |b, lines| {
                let opts = EncodeOptions::for_mode(mode);
                b.iter(|| templog::encode(lines, TPL_TEXT, &opts).unwrap());
            });
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_all");
    for &n in &[1_000usize, 10_000, 100_000] {
        let lines = synthetic_corpus(n);
        let opts = EncodeOptions::for_mode(EncodeMode::Query);
        let blob = templog::encode(&lines, TPL_TEXT, &opts).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &blob, |b, blob| {
            let index = Index::build(blob).unwrap();
            b.iter(|| templog::decode_all(&index, blob).unwrap());
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let n = 100_000;
    let lines = synthetic_corpus(n);
    let opts = EncodeOptions::for_mode(EncodeMode::Query);
    let blob = templog::encode(&lines, TPL_TEXT, &opts).unwrap();
    let index = Index::build(&blob).unwrap();

    group.bench_function("rare_token", |b| {
        b.iter(|| templog::query(&index, &blob, "RARE_TOKEN_XYZ", &QueryOptions::default()).unwrap());
    });
    group.bench_function("common_token", |b| {
        b.iter(|| templog::query(&index, &blob, "logged", &QueryOptions::default()).unwrap());
    });

    group.finish();
}

fn bench_template_bank_load(c: &mut Criterion) {
    c.bench_function("bank_load_from_text", |b| {
        b.iter(|| Bank::load_from_text(TPL_TEXT).unwrap());
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_query, bench_template_bank_load);
criterion_main!(benches);

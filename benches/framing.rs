//! Throughput benchmark for the line framer's chunk -> lines -> NFC path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use slirc_client::framer::Framer;

const SIMPLE: &str = "PING :irc.example.com\r\n";
const PREFIXED: &str = ":nick!user@host PRIVMSG #channel :Hello, world!\r\n";
const COMBINING_MARKS: &str = "PRIVMSG #chan :caf\u{0065}\u{0301} au lait\r\n";

fn bench_single_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("Framer::push (single chunk)");

    for (name, line) in [
        ("simple", SIMPLE),
        ("prefixed", PREFIXED),
        ("combining_marks", COMBINING_MARKS),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| {
                let mut framer = Framer::new();
                black_box(framer.push(black_box(line)))
            })
        });
    }
    group.finish();
}

fn bench_many_lines_one_chunk(c: &mut Criterion) {
    let batch: String = std::iter::repeat(PREFIXED).take(256).collect();

    c.bench_function("Framer::push (256 lines, one chunk)", |b| {
        b.iter(|| {
            let mut framer = Framer::new();
            black_box(framer.push(black_box(&batch)))
        })
    });
}

fn bench_split_across_chunks(c: &mut Criterion) {
    let (first, second) = PREFIXED.split_at(PREFIXED.len() / 2);

    c.bench_function("Framer::push (line split across two chunks)", |b| {
        b.iter(|| {
            let mut framer = Framer::new();
            black_box(framer.push(black_box(first)));
            black_box(framer.push(black_box(second)))
        })
    });
}

criterion_group!(
    benches,
    bench_single_chunk,
    bench_many_lines_one_chunk,
    bench_split_across_chunks
);
criterion_main!(benches);

//! Benchmarks for stream framing and offline reconstruction

use bcilog::protocol::schema::{FrameLayout, CHANNELS};
use bcilog::reconstruct::{reconstruct, ReconstructParams};
use bcilog::{LogRecord, PacketPair, StreamFramer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Consecutive 250 Hz records with a few ms of jitter on the capture clock
fn synthetic_records(n: usize) -> Vec<LogRecord> {
    (0..n)
        .map(|i| {
            let hw = 50_000 + (i as u32) * 4;
            let mut channels = [0i32; CHANNELS];
            for (c, v) in channels.iter_mut().enumerate() {
                *v = ((i * 17 + c * 101) % 4_096) as i32 - 2_048;
            }
            LogRecord {
                capture_timestamp_ms: 100 + (i as u32) * 4 + (i as u32 * 7) % 9,
                pair: PacketPair::new((i % 256) as u8, hw, channels),
            }
        })
        .collect()
}

fn bench_framer(c: &mut Criterion) {
    let mut group = c.benchmark_group("framer");

    for pairs in [1_000usize, 10_000] {
        let bytes: Vec<u8> = synthetic_records(pairs)
            .iter()
            .flat_map(|r| r.pair.to_bytes())
            .collect();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(pairs), &bytes, |b, bytes| {
            b.iter(|| {
                let mut framer = StreamFramer::new(FrameLayout::Wire);
                let mut count = 0usize;
                // Datagram-sized pushes
                for chunk in bytes.chunks(1_320) {
                    framer.push(chunk);
                    count += framer.frames().count();
                }
                black_box(count)
            });
        });
    }

    group.finish();
}

fn bench_reconstruct(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconstruct");
    let params = ReconstructParams::default();

    for n in [5_000usize, 50_000] {
        let records = synthetic_records(n);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::from_parameter(n), &records, |b, records| {
            b.iter(|| black_box(reconstruct(black_box(records), &params)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_framer, bench_reconstruct);
criterion_main!(benches);

//! Hot-path benchmarks for scanline-fountain.
//!
//! - Packet encode (sampling + XOR) per payload size
//! - JSON / compact serialization
//! - Full decode of a shuffled planned set
//! - Sampled-only decode with and without elimination
//!
//! Run with: cargo bench --package scanline-fountain

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

use scanline_fountain::config::FountainConfig;
use scanline_fountain::decoder::FountainDecoder;
use scanline_fountain::encoder::FountainEncoder;
use scanline_fountain::planner::plan_count;
use scanline_fountain::sampler::Xoshiro256;
use scanline_fountain::wire::{Packet, PacketCodec};

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(2_654_435_761) >> 7) as u8).collect()
}

fn encoder(len: usize, systematic: bool) -> FountainEncoder {
    let cfg = FountainConfig {
        systematic,
        ..FountainConfig::default()
    };
    // Bench payloads are well inside the configured bounds.
    FountainEncoder::with_session_id(&payload(len), &cfg, "ses_bench").unwrap()
}

fn shuffled(mut packets: Vec<Packet>, seed: u64) -> Vec<Packet> {
    let mut rng = Xoshiro256::from_seed(seed);
    for i in (1..packets.len()).rev() {
        let j = rng.below(i as u64 + 1) as usize;
        packets.swap(i, j);
    }
    packets
}

// ─── Encode ──────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_packet");
    for size in [4_000usize, 64_000, 1_000_000] {
        let enc = encoder(size, false);
        group.throughput(Throughput::Bytes(200));
        group.bench_function(format!("{size}B"), |b| {
            let mut id = 0u32;
            b.iter(|| {
                id = id.wrapping_add(1);
                black_box(enc.encode(black_box(id)));
            });
        });
    }
    group.finish();
}

// ─── Serialize ───────────────────────────────────────────────────────────

fn bench_serialize(c: &mut Criterion) {
    let enc = encoder(64_000, false);
    let packet = enc.encode(1234);
    let json = packet.to_json();
    let compact = packet.to_compact().unwrap();

    c.bench_function("to_json", |b| b.iter(|| black_box(packet.to_json())));
    c.bench_function("to_compact", |b| b.iter(|| black_box(packet.to_compact().unwrap())));
    c.bench_function("deserialize_json", |b| {
        let mut codec = PacketCodec::new(scanline_fountain::wire::Framing::Json, 2000);
        b.iter(|| black_box(codec.deserialize(black_box(&json))))
    });
    c.bench_function("deserialize_compact", |b| {
        let mut codec = PacketCodec::new(scanline_fountain::wire::Framing::Compact, 2000);
        b.iter(|| black_box(codec.deserialize(black_box(&compact))))
    });
}

// ─── Decode ──────────────────────────────────────────────────────────────

fn bench_decode_planned(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_planned_set");
    for size in [4_000usize, 64_000] {
        let enc = encoder(size, true);
        let packets = shuffled(enc.packets(plan_count(enc.k() as u32)).collect(), 7);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("{size}B"), |b| {
            b.iter_batched(
                || FountainDecoder::new(enc.session().clone()),
                |mut dec| {
                    for p in &packets {
                        dec.add_packet(p);
                    }
                    black_box(dec.is_complete())
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_decode_sampled(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_sampled_stream");
    let enc = encoder(20_000, false);
    let packets: Vec<Packet> = enc.packets(enc.k() as u32 * 3).collect();
    for elimination in [false, true] {
        let name = if elimination { "peel+elim" } else { "peel" };
        group.bench_function(name, |b| {
            b.iter_batched(
                || FountainDecoder::with_elimination(enc.session().clone(), elimination),
                |mut dec| {
                    for p in &packets {
                        if dec.add_packet(p).completed {
                            break;
                        }
                    }
                    black_box(dec.resolved_count())
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_serialize,
    bench_decode_planned,
    bench_decode_sampled,
);
criterion_main!(benches);

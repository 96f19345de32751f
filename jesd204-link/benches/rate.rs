use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use jesd204_link::{Encoder, Link, Version, rate};

fn link(version: Version, encoder: Encoder) -> Link {
    Link {
        num_lanes: 4,
        num_converters: 4,
        bits_per_sample: 16,
        sample_rate: 245_760_000,
        jesd_version: version,
        jesd_encoder: encoder,
        octets_per_frame: 2,
        frames_per_multiframe: 32,
        ..Link::new(0)
    }
}

fn bench_lane_rate(c: &mut Criterion) {
    let b = link(Version::B, Encoder::Unknown);
    let c66 = link(Version::C, Encoder::Enc64b66b);

    c.bench_function("lane_rate_hz 204B", |bench| {
        bench.iter(|| rate::lane_rate_hz(black_box(&b)))
    });
    c.bench_function("lane_rate_hz 204C 64B/66B", |bench| {
        bench.iter(|| rate::lane_rate_hz(black_box(&c66)))
    });
    c.bench_function("lmfc_lemc_rate_hz 204C 64B/66B", |bench| {
        bench.iter(|| rate::lmfc_lemc_rate_hz(black_box(&c66)))
    });
}

fn bench_sysref_rate(c: &mut Criterion) {
    let links: Vec<Link> = (0..8u8)
        .map(|i| Link {
            num_lanes: 1 + i % 4,
            ..link(Version::C, Encoder::Enc64b66b)
        })
        .collect();

    c.bench_function("sysref_rate_hz 8 links", |bench| {
        bench.iter(|| rate::sysref_rate_hz(black_box(&links)))
    });
}

criterion_group!(benches, bench_lane_rate, bench_sysref_rate);
criterion_main!(benches);

use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use eegprep::{
    augment, augment_seeded, segment, stack, ActionKind, AugmentParams, ChannelFilter, Recording,
    Wavelet, WaveletTransformer,
};
use ndarray::{Array2, Array3};
use rand::SeedableRng;

/// 62-channel, 30 s recording at 1 kHz with a few overlaid sines per channel.
fn recording() -> Recording {
    let (n_ch, n_t) = (62, 30_000);
    let names = (0..n_ch).map(|c| format!("E{c}")).collect();
    let data = Array2::from_shape_fn((n_ch, n_t), |(c, t)| {
        let t = t as f32 / 1000.0;
        (2.0 * std::f32::consts::PI * (4.0 + c as f32 * 0.5) * t).sin()
            + 0.3 * (2.0 * std::f32::consts::PI * 40.0 * t).cos()
    });
    Recording::new("BENCH", names, 1000.0, data, 1).unwrap()
}

fn batch() -> (Array3<f32>, Vec<i64>) {
    let segs = segment(&recording(), ActionKind::Thinking, &ChannelFilter::all(), 4500.0).unwrap();
    stack(&segs).unwrap()
}

fn bench_segment(c: &mut Criterion) {
    let rec = recording();
    let filter = ChannelFilter::ignore(["E0", "E1"]);
    c.bench_function("segment [62×30000] → 6 × 4500", |b| {
        b.iter(|| {
            let segs = segment(black_box(&rec), ActionKind::Thinking, &filter, 4500.0).unwrap();
            black_box(segs.len())
        })
    });
}

fn bench_augment(c: &mut Criterion) {
    let (x, y) = batch();
    let params = AugmentParams::jitter(3, 0.01, 0.05);
    c.bench_function("jitter ×3 sequential [6×62×4500]", |b| {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
        b.iter(|| {
            let out = augment(black_box(x.view()), &y, &params, &mut rng).unwrap();
            black_box(out.len())
        })
    });
    c.bench_function("jitter ×3 seeded parallel [6×62×4500]", |b| {
        b.iter(|| {
            let out = augment_seeded(black_box(x.view()), &y, &params, 42).unwrap();
            black_box(out.len())
        })
    });
}

fn bench_wavelet(c: &mut Criterion) {
    let (x, _) = batch();
    let t = WaveletTransformer::new(Wavelet::Db4);
    c.bench_function("db4 wavedec L=6 [6×62×4500], zscore", |b| {
        b.iter(|| {
            let out = t.apply(black_box(x.view()), 6, true).unwrap();
            black_box(out.len())
        })
    });
}

criterion_group!(benches, bench_segment, bench_augment, bench_wavelet);
criterion_main!(benches);

mod common;
use common::{array_std, synthetic_recording};
use eegprep::{
    augment, augment_seeded, jitter, scaling, segment, stack, ActionKind, AugmentParams,
    ChannelFilter, ErrorKind, Provenance, RowKind,
};
use ndarray::{s, Array3, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn segments() -> (Array3<f32>, Vec<i64>) {
    let rec = synthetic_recording("MM08", 4000, 1000.0, 4);
    let segs = segment(&rec, ActionKind::Thinking, &ChannelFilter::keep(["C3", "C4"]), 500.0).unwrap();
    stack(&segs).unwrap()
}

#[test]
fn jitter_keeps_originals_first_and_untouched() {
    let (x, y) = segments();
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let out = jitter(x.view(), &y, 2, 0.01, 0.05, &mut rng).unwrap();

    assert_eq!(out.len(), 8 * 3);
    assert_eq!(out.data.slice(s![..8, .., ..]), x);
    assert_eq!(out.labels, [y.clone(), y.clone(), y.clone()].concat());

    for (row, id) in out.identifiers.iter().enumerate().skip(8) {
        assert_eq!(id.kind, RowKind::Jitter);
        let sigma = id.param.unwrap();
        assert!((0.01..=0.05).contains(&sigma), "sigma {sigma}");
        let diff = (&out.data.index_axis(Axis(0), row) - &x.index_axis(Axis(0), id.source))
            .into_dyn();
        let std = array_std(&diff);
        assert!((std - sigma).abs() < 0.2 * sigma, "row {row}: std {std} vs sigma {sigma}");
    }
}

#[test]
fn scaling_preserves_shape_and_zero_crossings() {
    let (x, y) = segments();
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let out = scaling(x.view(), &y, 3, 0.9, 1.1, &mut rng).unwrap();
    assert_eq!(out.data.dim(), (32, 2, 500));
    for (row, id) in out.identifiers.iter().enumerate().skip(8) {
        let src = x.index_axis(Axis(0), id.source);
        let got = out.data.index_axis(Axis(0), row);
        for (&a, &b) in src.iter().zip(got.iter()) {
            assert_eq!(a.signum(), b.signum());
        }
    }
}

#[test]
fn same_seed_same_batch() {
    let (x, y) = segments();
    let params = AugmentParams::jitter(3, 0.01, 0.05);

    let a = augment(x.view(), &y, &params, &mut ChaCha8Rng::seed_from_u64(77)).unwrap();
    let b = augment(x.view(), &y, &params, &mut ChaCha8Rng::seed_from_u64(77)).unwrap();
    assert_eq!(a, b);

    let p = augment_seeded(x.view(), &y, &params, 77).unwrap();
    let q = augment_seeded(x.view(), &y, &params, 77).unwrap();
    assert_eq!(p, q);
    assert_eq!(p.data.dim(), a.data.dim());
}

#[test]
fn identifiers_survive_text_round_trip() {
    let (x, y) = segments();
    let out = augment_seeded(x.view(), &y, &AugmentParams::scaling(2, 0.5, 1.5), 3).unwrap();
    let parsed: Vec<Provenance> = out
        .identifier_strings()
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    assert_eq!(parsed, out.identifiers);
}

#[test]
fn input_is_never_mutated() {
    let (x, y) = segments();
    let before = x.clone();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let _ = jitter(x.view(), &y, 4, 1.0, 2.0, &mut rng).unwrap();
    assert_eq!(x, before);
}

#[test]
fn inverted_bounds_fail_before_drawing() {
    let (x, y) = segments();
    let err = augment_seeded(x.view(), &y, &AugmentParams::scaling(2, 1.2, 0.8), 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
    assert!(err.to_string().contains("high_factor"));
}

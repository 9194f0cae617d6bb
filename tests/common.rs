/// Shared helpers for synthetic recordings.
use eegprep::Recording;
use ndarray::{Array, Array2, IxDyn};

/// Channel layout used by the synthetic recordings: 4 scalp channels plus the
/// Neuroscan auxiliaries dropped by the default config.
pub const CHANNELS: [&str; 9] = ["FP1", "C3", "CZ", "C4", "VEO", "HEO", "EKG", "EMG", "Trigger"];

#[allow(unused)]
/// Sum of sines, one frequency per channel, at `sfreq` Hz.
pub fn synthetic_recording(subject: &str, n_samples: usize, sfreq: f32, label: i64) -> Recording {
    let names: Vec<String> = CHANNELS.iter().map(|s| s.to_string()).collect();
    let data = Array2::from_shape_fn((names.len(), n_samples), |(c, t)| {
        let t = t as f32 / sfreq;
        let f = 3.0 + 2.0 * c as f32;
        (2.0 * std::f32::consts::PI * f * t).sin() + 0.25 * (2.0 * std::f32::consts::PI * 31.0 * t).sin()
    });
    Recording::new(subject, names, sfreq, data, label).unwrap()
}

#[allow(unused)]
/// Recording with arbitrary channel names and a ramp signal.
pub fn ramp_recording(names: &[&str], n_samples: usize, sfreq: f32) -> Recording {
    let data = Array2::from_shape_fn((names.len(), n_samples), |(c, t)| (c * 1_000_000 + t) as f32);
    Recording::new("RAMP", names.iter().map(|s| s.to_string()).collect(), sfreq, data, 0).unwrap()
}

#[allow(unused)]
/// Maximum absolute difference between two arrays.
pub fn max_abs_diff(a: &Array<f32, IxDyn>, b: &Array<f32, IxDyn>) -> f32 {
    assert_eq!(a.shape(), b.shape(), "shape mismatch");
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0_f32, f32::max)
}

#[allow(unused)]
/// Standard deviation of an array.
pub fn array_std(a: &Array<f32, IxDyn>) -> f32 {
    let n = a.len() as f32;
    let mean: f32 = a.iter().sum::<f32>() / n;
    let var: f32 = a.iter().map(|&v| (v - mean).powi(2)).sum::<f32>() / n;
    var.sqrt()
}

//! Per-channel scaling applied before wavelet decomposition.
//!
//! `ZScore`  — (x − μ) / σ, σ with ddof = 0
//! `MinMax`  — (x − min) / (max − min), into [0, 1]
//! `Robust`  — (x − median) / IQR, IQR = q75 − q25 (linear interpolation)
//!
//! A channel whose spread is zero is rejected instead of being divided by
//! zero; so is an empty channel or one containing NaN/∞.
use serde::Deserialize;
use thiserror::Error;

/// How a channel is rescaled before decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMode {
    #[default]
    ZScore,
    MinMax,
    Robust,
}

impl std::str::FromStr for ScaleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zscore" | "z-score" | "standard" => Ok(Self::ZScore),
            "minmax" | "min-max" => Ok(Self::MinMax),
            "robust" => Ok(Self::Robust),
            other => Err(format!("unknown scale mode {other:?} (zscore|minmax|robust)")),
        }
    }
}

/// Why a channel cannot be rescaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DegenerateSignal {
    #[error("channel has no samples")]
    Empty,
    #[error("channel contains non-finite samples")]
    NonFinite,
    #[error("channel spread is zero (constant signal)")]
    ZeroSpread,
}

/// Rescale `x` in place. Returns the `(center, spread)` that was applied.
pub fn scale_inplace(x: &mut [f64], mode: ScaleMode) -> Result<(f64, f64), DegenerateSignal> {
    if x.is_empty() {
        return Err(DegenerateSignal::Empty);
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(DegenerateSignal::NonFinite);
    }

    let (center, spread) = match mode {
        ScaleMode::ZScore => mean_std(x),
        ScaleMode::MinMax => {
            let lo = x.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (lo, hi - lo)
        }
        ScaleMode::Robust => {
            let mut sorted = x.to_vec();
            sorted.sort_by(f64::total_cmp);
            let median = quantile_sorted(&sorted, 0.5);
            let iqr = quantile_sorted(&sorted, 0.75) - quantile_sorted(&sorted, 0.25);
            (median, iqr)
        }
    };

    if spread <= 0.0 {
        return Err(DegenerateSignal::ZeroSpread);
    }
    x.iter_mut().for_each(|v| *v = (*v - center) / spread);
    Ok((center, spread))
}

/// Mean and population standard deviation (ddof = 0).
pub fn mean_std(x: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    let var = x.iter().map(|&v| {
        let d = v - mean; d * d
    }).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Quantile of an ascending slice, numpy's default "linear" method.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zscore_mean_zero_std_one() {
        let mut x: Vec<f64> = (0..512).map(|t| (t as f64 * 0.1).sin() * 50.0 + 3.0).collect();
        scale_inplace(&mut x, ScaleMode::ZScore).unwrap();
        let (m, s) = mean_std(&x);
        approx::assert_abs_diff_eq!(m, 0.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(s, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn minmax_maps_to_unit_interval() {
        let mut x = vec![2.0, 4.0, 6.0, 10.0];
        let (c, s) = scale_inplace(&mut x, ScaleMode::MinMax).unwrap();
        assert_eq!((c, s), (2.0, 8.0));
        assert_eq!(x, vec![0.0, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn robust_uses_median_and_iqr() {
        // q25 = 2, median = 3, q75 = 4 for 1..=5.
        let mut x = vec![5.0, 1.0, 3.0, 2.0, 4.0];
        let (c, s) = scale_inplace(&mut x, ScaleMode::Robust).unwrap();
        assert_eq!((c, s), (3.0, 2.0));
        assert_eq!(x, vec![1.0, -1.0, 0.0, -0.5, 0.5]);
    }

    #[test]
    fn constant_signal_is_rejected() {
        for mode in [ScaleMode::ZScore, ScaleMode::MinMax, ScaleMode::Robust] {
            let mut x = vec![7.0; 64];
            assert_eq!(scale_inplace(&mut x, mode), Err(DegenerateSignal::ZeroSpread));
            // untouched on failure
            assert!(x.iter().all(|&v| v == 7.0));
        }
    }

    #[test]
    fn empty_and_nan_are_rejected() {
        assert_eq!(scale_inplace(&mut [], ScaleMode::ZScore), Err(DegenerateSignal::Empty));
        let mut x = vec![1.0, f64::NAN, 2.0];
        assert_eq!(scale_inplace(&mut x, ScaleMode::MinMax), Err(DegenerateSignal::NonFinite));
    }

    #[test]
    fn parse_modes() {
        assert_eq!("Robust".parse::<ScaleMode>(), Ok(ScaleMode::Robust));
        assert_eq!("min-max".parse::<ScaleMode>(), Ok(ScaleMode::MinMax));
        assert!("l2".parse::<ScaleMode>().is_err());
    }
}

//! Discrete wavelet transform with half-sample symmetric extension.
//!
//! Matches `pywt.dwt(x, w, mode='symmetric')`: the signal is mirrored at both
//! ends (`… x1 x0 | x0 x1 … xn-1 | xn-1 xn-2 …`), convolved with the analysis
//! filters and every odd output of the full convolution is kept, giving
//! `floor((n + L - 1) / 2)` coefficients per band.
use super::family::Wavelet;

/// Number of coefficients one DWT level produces from `n` samples.
pub fn coeff_len(n: usize, filter_len: usize) -> usize {
    (n + filter_len - 1) / 2
}

/// Map an out-of-range index onto `0..n` by half-sample symmetric reflection.
fn reflect(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period) as usize;
    if m < n { m } else { 2 * n - 1 - m }
}

/// Convolve with `filter` and keep odd outputs.
fn downsample_convolve(x: &[f64], filter: &[f64]) -> Vec<f64> {
    let n = x.len();
    let out_len = coeff_len(n, filter.len());
    (0..out_len)
        .map(|k| {
            let t = (2 * k + 1) as isize;
            filter
                .iter()
                .enumerate()
                .map(|(j, &f)| {
                    let i = t - j as isize;
                    let idx = if (0..n as isize).contains(&i) { i as usize } else { reflect(i, n) };
                    f * x[idx]
                })
                .sum()
        })
        .collect()
}

/// One decomposition level: `(approximation, detail)`.
///
/// `x` must be non-empty.
pub fn dwt(x: &[f64], wavelet: Wavelet) -> (Vec<f64>, Vec<f64>) {
    let approx = downsample_convolve(x, &wavelet.dec_lo());
    let detail = downsample_convolve(x, &wavelet.dec_hi());
    (approx, detail)
}

/// `level` successive decompositions of the approximation band.
///
/// Returns the deepest approximation and the details ordered shallow → deep
/// (`details[0]` is level 1). The caller bounds `level`.
pub fn wavedec(x: &[f64], wavelet: Wavelet, level: usize) -> (Vec<f64>, Vec<Vec<f64>>) {
    let mut approx = x.to_vec();
    let mut details = Vec::with_capacity(level);
    for _ in 0..level {
        let (a, d) = dwt(&approx, wavelet);
        details.push(d);
        approx = a;
    }
    (approx, details)
}

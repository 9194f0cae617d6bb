//! Multi-level wavelet decomposition of segment batches.
//!
//! - [`family`]: filter banks (Haar, Daubechies 2–4) and the level bound.
//! - [`dwt`]: single-level DWT and `wavedec`, matching PyWavelets'
//!   `mode='symmetric'`.
//!
//! Every (segment, channel) pair is decomposed independently: optional
//! per-channel scaling, then `level` DWT steps on the approximation band.
//! Coefficients are stored flat as `[A_L, D_1, D_2, …, D_L]`.

pub mod dwt;
pub mod family;

pub use dwt::{coeff_len, wavedec};
pub use family::Wavelet;

use log::info;
use ndarray::{Array1, Array3, ArrayView1, ArrayView3, Axis};
use rayon::prelude::*;

use crate::error::{PrepError, Result};
use crate::normalize::{scale_inplace, DegenerateSignal, ScaleMode};

/// Band of a coefficient array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoeffKind {
    Approximation,
    Detail,
}

/// One coefficient array and where it sits in the decomposition.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    /// 1 = shallowest.
    pub level: usize,
    pub kind: CoeffKind,
    pub data: Array1<f32>,
}

/// Decomposition of one channel of one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveletResult {
    pub wavelet: Wavelet,
    /// `[A_L, D_1, …, D_L]`.
    coeffs: Vec<Coefficients>,
}

impl WaveletResult {
    /// Assemble from coefficients in `[A_L, D_1, …, D_L]` order.
    pub fn from_coeffs(wavelet: Wavelet, coeffs: Vec<Coefficients>) -> Result<Self> {
        let levels = coeffs.len().saturating_sub(1);
        let ordered = coeffs.first().is_some_and(|a| {
            a.kind == CoeffKind::Approximation && a.level == levels
        }) && coeffs[1..]
            .iter()
            .enumerate()
            .all(|(i, d)| d.kind == CoeffKind::Detail && d.level == i + 1);
        if levels == 0 || !ordered {
            return Err(PrepError::validation(
                "coefficients must be ordered [A_L, D_1, ..., D_L] with L >= 1",
            ));
        }
        Ok(Self { wavelet, coeffs })
    }

    pub fn levels(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn approximation(&self) -> &Array1<f32> {
        &self.coeffs[0].data
    }

    /// Detail band at `level` (1-based).
    pub fn detail(&self, level: usize) -> Option<&Array1<f32>> {
        if level == 0 {
            return None;
        }
        self.coeffs.get(level).map(|c| &c.data)
    }

    /// Detail bands, shallow → deep.
    pub fn details(&self) -> &[Coefficients] {
        &self.coeffs[1..]
    }

    /// All arrays in storage order.
    pub fn coeffs(&self) -> &[Coefficients] {
        &self.coeffs
    }
}

/// Decompositions for a whole batch, stored flat in segment-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveletBatch {
    pub n_segments: usize,
    pub n_channels: usize,
    pub levels: usize,
    results: Vec<WaveletResult>,
}

impl WaveletBatch {
    /// `results[seg * n_channels + ch]`.
    pub fn from_results(
        n_segments: usize,
        n_channels: usize,
        levels: usize,
        results: Vec<WaveletResult>,
    ) -> Result<Self> {
        if results.len() != n_segments * n_channels {
            return Err(PrepError::validation(format!(
                "{} results for {n_segments} segments × {n_channels} channels",
                results.len()
            )));
        }
        if let Some(r) = results.iter().find(|r| r.levels() != levels) {
            return Err(PrepError::validation(format!(
                "result with {} levels in a {levels}-level batch",
                r.levels()
            )));
        }
        Ok(Self { n_segments, n_channels, levels, results })
    }

    pub fn get(&self, segment: usize, channel: usize) -> Option<&WaveletResult> {
        if segment >= self.n_segments || channel >= self.n_channels {
            return None;
        }
        self.results.get(segment * self.n_channels + channel)
    }

    /// Per-channel results of one segment.
    pub fn segment(&self, segment: usize) -> Option<&[WaveletResult]> {
        let start = segment.checked_mul(self.n_channels)?;
        self.results.get(start..start + self.n_channels)
    }

    /// `((segment, channel), result)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &WaveletResult)> + '_ {
        let k = self.n_channels;
        self.results.iter().enumerate().map(move |(i, r)| ((i / k, i % k), r))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// `|D_level|` stacked into `[N, C, len]`, a fixed-shape feature tensor.
    pub fn detail_magnitudes(&self, level: usize) -> Result<Array3<f32>> {
        if level == 0 || level > self.levels {
            return Err(PrepError::value(
                "level",
                level,
                format!("must be in 1..={}", self.levels),
            ));
        }
        let len = self
            .results
            .first()
            .and_then(|r| r.detail(level))
            .map_or(0, |d| d.len());
        let mut out = Array3::<f32>::zeros((self.n_segments, self.n_channels, len));
        for ((e, c), r) in self.iter() {
            if let Some(d) = r.detail(level) {
                out.slice_mut(ndarray::s![e, c, ..]).assign(&d.mapv(f32::abs));
            }
        }
        Ok(out)
    }
}

/// Wavelet choice plus the scaling applied when `scale` is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaveletTransformer {
    pub wavelet: Wavelet,
    pub scale_mode: ScaleMode,
}

impl WaveletTransformer {
    pub fn new(wavelet: Wavelet) -> Self {
        Self { wavelet, scale_mode: ScaleMode::default() }
    }

    pub fn with_scale_mode(mut self, scale_mode: ScaleMode) -> Self {
        self.scale_mode = scale_mode;
        self
    }

    /// Fail unless `1 <= level <= max_level(len)`.
    pub fn check_level(&self, len: usize, level: usize) -> Result<()> {
        if level == 0 {
            return Err(PrepError::configuration(
                "decomposition_level",
                level,
                "must be at least 1",
            ));
        }
        let max = self.wavelet.max_level(len);
        if level > max {
            return Err(PrepError::LevelTooHigh {
                requested: level,
                max,
                len,
                wavelet: self.wavelet.name(),
                filter_len: self.wavelet.filter_len(),
            });
        }
        Ok(())
    }

    /// Decompose one channel. `scale` rescales a copy first.
    pub fn decompose_channel(
        &self,
        x: ArrayView1<f32>,
        level: usize,
        scale: bool,
    ) -> Result<WaveletResult, ChannelFailure> {
        let mut buf: Vec<f64> = x.iter().map(|&v| v as f64).collect();
        if scale {
            scale_inplace(&mut buf, self.scale_mode).map_err(ChannelFailure::Degenerate)?;
        }
        self.check_level(buf.len(), level).map_err(ChannelFailure::Level)?;

        let (approx, details) = wavedec(&buf, self.wavelet, level);
        let to_f32 = |v: Vec<f64>| v.into_iter().map(|c| c as f32).collect::<Array1<f32>>();

        let mut coeffs = Vec::with_capacity(level + 1);
        coeffs.push(Coefficients { level, kind: CoeffKind::Approximation, data: to_f32(approx) });
        coeffs.extend(details.into_iter().enumerate().map(|(i, d)| Coefficients {
            level: i + 1,
            kind: CoeffKind::Detail,
            data: to_f32(d),
        }));
        Ok(WaveletResult { wavelet: self.wavelet, coeffs })
    }

    /// Decompose every channel of every segment in `segments` (`[N, K, T]`).
    ///
    /// The level is checked against `T` before any data is touched. Segments
    /// are processed in parallel.
    pub fn apply(&self, segments: ArrayView3<f32>, level: usize, scale: bool) -> Result<WaveletBatch> {
        let (n, k, t) = segments.dim();
        if scale && t == 0 && n > 0 && k > 0 {
            return Err(PrepError::Numerical { segment: 0, channel: 0, cause: DegenerateSignal::Empty });
        }
        self.check_level(t, level)?;

        let per_segment = (0..n)
            .into_par_iter()
            .map(|e| {
                let seg = segments.index_axis(Axis(0), e);
                (0..k)
                    .map(|c| {
                        self.decompose_channel(seg.row(c), level, scale)
                            .map_err(|f| f.at(e, c))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "{}: {n} segments × {k} channels decomposed to level {level} (scale={scale})",
            self.wavelet
        );
        WaveletBatch::from_results(n, k, level, per_segment.into_iter().flatten().collect())
    }
}

/// Why a single channel could not be decomposed, before its position is known.
#[derive(Debug)]
pub enum ChannelFailure {
    Degenerate(DegenerateSignal),
    Level(PrepError),
}

impl ChannelFailure {
    /// Attach the (segment, channel) position.
    pub fn at(self, segment: usize, channel: usize) -> PrepError {
        match self {
            Self::Degenerate(cause) => PrepError::Numerical { segment, channel, cause },
            Self::Level(e) => e,
        }
    }
}

/// Decompose `segments` with the default wavelet (db4) and z-score scaling.
pub fn apply(segments: ArrayView3<f32>, decomposition_level: usize, scale: bool) -> Result<WaveletBatch> {
    WaveletTransformer::default().apply(segments, decomposition_level, scale)
}

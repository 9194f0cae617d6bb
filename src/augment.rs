//! Synthetic augmentation of segment batches.
//!
//! Two perturbations, both from Um et al. 2017 (arXiv:1706.00527):
//!
//! ```text
//! jitter   x' = x + ε,   ε ~ N(0, σ²) per element, σ drawn from [low, high]
//! scaling  x' = a · x,   a drawn from [low, high]
//! ```
//!
//! Output layout for `N` inputs and factor `f` (`N · (f + 1)` rows):
//!
//! ```text
//! rows 0 .. N          originals, input order
//! rows k·N .. (k+1)·N  copy k (1 ≤ k ≤ f) of every original, input order
//! ```
//!
//! One parameter (σ or a) is drawn per (copy, source row). The input batch is
//! never modified.
use log::{debug, info};
use ndarray::{concatenate, Array3, ArrayView3, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::{PrepError, Result};
use crate::recording::Label;

/// Perturbation applied to synthetic copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AugmentationKind {
    #[default]
    Jitter,
    Scaling,
}

impl FromStr for AugmentationKind {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "jitter" => Ok(Self::Jitter),
            "scaling" => Ok(Self::Scaling),
            other => Err(PrepError::configuration(
                "augmentation",
                other,
                "supported kinds are jitter, scaling",
            )),
        }
    }
}

/// How the per-copy parameter is chosen inside `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSchedule {
    /// Independent uniform draw per (copy, source row).
    #[default]
    Random,
    /// Copy `k` of `f` uses `linspace(low, high, f)[k - 1]` for every row.
    Linear,
}

/// Parameters of one augmentation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugmentParams {
    pub kind: AugmentationKind,
    /// Synthetic copies per original.
    pub factor: usize,
    pub low: f32,
    pub high: f32,
    pub schedule: ParamSchedule,
}

impl AugmentParams {
    pub fn jitter(factor: usize, low_sigma: f32, high_sigma: f32) -> Self {
        Self {
            kind: AugmentationKind::Jitter,
            factor,
            low: low_sigma,
            high: high_sigma,
            schedule: ParamSchedule::Random,
        }
    }

    pub fn scaling(factor: usize, low_factor: f32, high_factor: f32) -> Self {
        Self {
            kind: AugmentationKind::Scaling,
            factor,
            low: low_factor,
            high: high_factor,
            schedule: ParamSchedule::Random,
        }
    }

    pub fn with_schedule(mut self, schedule: ParamSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    fn bound_names(&self) -> (&'static str, &'static str) {
        match self.kind {
            AugmentationKind::Jitter => ("low_sigma", "high_sigma"),
            AugmentationKind::Scaling => ("low_factor", "high_factor"),
        }
    }

    /// Check bound ordering and finiteness; σ must also be non-negative.
    pub fn validate(&self) -> Result<()> {
        let (low_name, high_name) = self.bound_names();
        if !self.low.is_finite() {
            return Err(PrepError::value(low_name, self.low, "must be finite"));
        }
        if !self.high.is_finite() {
            return Err(PrepError::value(high_name, self.high, "must be finite"));
        }
        if self.low > self.high {
            return Err(PrepError::value(
                low_name,
                self.low,
                format!("must not exceed {high_name} = {}", self.high),
            ));
        }
        if !(self.high - self.low).is_finite() {
            return Err(PrepError::value(
                high_name,
                self.high,
                format!("range from {low_name} = {} is not representable as f32", self.low),
            ));
        }
        if self.kind == AugmentationKind::Jitter && self.low < 0.0 {
            return Err(PrepError::value(low_name, self.low, "noise sigma must be >= 0"));
        }
        Ok(())
    }

    fn draw<R: Rng + ?Sized>(&self, copy: usize, rng: &mut R) -> f32 {
        match self.schedule {
            ParamSchedule::Random if self.low == self.high => self.low,
            ParamSchedule::Random => rng.gen_range(self.low..=self.high),
            ParamSchedule::Linear if self.factor <= 1 => self.low,
            ParamSchedule::Linear => {
                let t = (copy - 1) as f32 / (self.factor - 1) as f32;
                self.low + (self.high - self.low) * t
            }
        }
    }
}

/// Origin of one row of an augmented batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    Original,
    Jitter,
    Scaling,
}

impl From<AugmentationKind> for RowKind {
    fn from(kind: AugmentationKind) -> Self {
        match kind {
            AugmentationKind::Jitter => Self::Jitter,
            AugmentationKind::Scaling => Self::Scaling,
        }
    }
}

/// Lineage of one row: which input row it came from and how.
///
/// Rendered as
/// `original__src_{i}__target_{label}` or
/// `{jitter|scaling}__copy_{k}__src_{i}__{sigma|factor}_{param}__target_{label}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Provenance {
    /// Row index in the input batch.
    pub source: usize,
    pub kind: RowKind,
    /// 0 for originals, 1..=factor for synthetic copies.
    pub copy: usize,
    /// σ for jitter, a for scaling, `None` for originals.
    pub param: Option<f32>,
    pub label: Label,
}

impl Provenance {
    pub fn original(source: usize, label: Label) -> Self {
        Self { source, kind: RowKind::Original, copy: 0, param: None, label }
    }

    pub fn is_original(&self) -> bool {
        self.kind == RowKind::Original
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, param_name) = match self.kind {
            RowKind::Original => {
                return write!(f, "original__src_{}__target_{}", self.source, self.label);
            }
            RowKind::Jitter => ("jitter", "sigma"),
            RowKind::Scaling => ("scaling", "factor"),
        };
        write!(
            f,
            "{kind}__copy_{}__src_{}__{param_name}_{}__target_{}",
            self.copy,
            self.source,
            self.param.unwrap_or(f32::NAN),
            self.label
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed provenance identifier {0:?}")]
pub struct ParseProvenanceError(pub String);

impl FromStr for Provenance {
    type Err = ParseProvenanceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split("__").collect();
        parse_parts(&parts).ok_or_else(|| ParseProvenanceError(s.to_string()))
    }
}

fn parse_field<T: FromStr>(parts: &[&str], i: usize, prefix: &str) -> Option<T> {
    parts.get(i)?.strip_prefix(prefix)?.parse().ok()
}

fn parse_parts(parts: &[&str]) -> Option<Provenance> {
    let (kind, param_prefix) = match (parts.first().copied()?, parts.len()) {
        ("original", 3) => {
            return Some(Provenance::original(
                parse_field(parts, 1, "src_")?,
                parse_field(parts, 2, "target_")?,
            ));
        }
        ("jitter", 5) => (RowKind::Jitter, "sigma_"),
        ("scaling", 5) => (RowKind::Scaling, "factor_"),
        _ => return None,
    };
    Some(Provenance {
        source: parse_field(parts, 2, "src_")?,
        kind,
        copy: parse_field(parts, 1, "copy_")?,
        param: Some(parse_field(parts, 3, param_prefix)?),
        label: parse_field(parts, 4, "target_")?,
    })
}

/// Originals plus synthetic copies, with index-aligned labels and lineage.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedBatch {
    /// `[N · (f + 1), K, T]`.
    pub data: Array3<f32>,
    pub labels: Vec<Label>,
    pub identifiers: Vec<Provenance>,
}

impl AugmentedBatch {
    /// Pass-through batch: every row marked original.
    pub fn originals(segments: ArrayView3<f32>, labels: &[Label]) -> Result<Self> {
        check_labels(segments, labels)?;
        Ok(Self {
            data: segments.to_owned(),
            labels: labels.to_vec(),
            identifiers: labels
                .iter()
                .enumerate()
                .map(|(i, &l)| Provenance::original(i, l))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn identifier_strings(&self) -> Vec<String> {
        self.identifiers.iter().map(ToString::to_string).collect()
    }

    pub fn into_parts(self) -> (Array3<f32>, Vec<Label>, Vec<Provenance>) {
        (self.data, self.labels, self.identifiers)
    }
}

fn check_labels(segments: ArrayView3<f32>, labels: &[Label]) -> Result<()> {
    let n = segments.len_of(Axis(0));
    if labels.len() != n {
        return Err(PrepError::value(
            "labels",
            labels.len(),
            format!("expected one label per segment ({n})"),
        ));
    }
    Ok(())
}

/// Jitter augmentation with σ drawn uniformly from `[low_sigma, high_sigma]`.
pub fn jitter<R: Rng + ?Sized>(
    segments: ArrayView3<f32>,
    labels: &[Label],
    factor: usize,
    low_sigma: f32,
    high_sigma: f32,
    rng: &mut R,
) -> Result<AugmentedBatch> {
    augment(segments, labels, &AugmentParams::jitter(factor, low_sigma, high_sigma), rng)
}

/// Scaling augmentation with the factor drawn uniformly from `[low_factor, high_factor]`.
pub fn scaling<R: Rng + ?Sized>(
    segments: ArrayView3<f32>,
    labels: &[Label],
    factor: usize,
    low_factor: f32,
    high_factor: f32,
    rng: &mut R,
) -> Result<AugmentedBatch> {
    augment(segments, labels, &AugmentParams::scaling(factor, low_factor, high_factor), rng)
}

/// Augment `segments` (`[N, K, T]`) sequentially, drawing from `rng`.
///
/// Copies are generated in order 1..=factor, rows in input order, so a
/// seeded `rng` makes the result reproducible.
pub fn augment<R: Rng + ?Sized>(
    segments: ArrayView3<f32>,
    labels: &[Label],
    params: &AugmentParams,
    rng: &mut R,
) -> Result<AugmentedBatch> {
    params.validate()?;
    check_labels(segments, labels)?;

    let copies = (1..=params.factor)
        .map(|copy| synthesize_copy(segments, labels, params, copy, rng))
        .collect::<Result<Vec<_>>>()?;
    assemble(segments, labels, params, copies)
}

/// Augment in parallel, one rayon task per copy.
///
/// Copy `k` draws from its own stream: `ChaCha8Rng::seed_from_u64(seed)` with
/// `set_stream(k)`, so the result depends only on `seed`, never on thread
/// scheduling.
pub fn augment_seeded(
    segments: ArrayView3<f32>,
    labels: &[Label],
    params: &AugmentParams,
    seed: u64,
) -> Result<AugmentedBatch> {
    params.validate()?;
    check_labels(segments, labels)?;

    let copies = (1..=params.factor)
        .into_par_iter()
        .map(|copy| {
            let mut rng = copy_rng(seed, copy);
            synthesize_copy(segments, labels, params, copy, &mut rng)
        })
        .collect::<Result<Vec<_>>>()?;
    assemble(segments, labels, params, copies)
}

/// Random stream used for copy `copy` by [`augment_seeded`].
pub fn copy_rng(seed: u64, copy: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(copy as u64);
    rng
}

fn synthesize_copy<R: Rng + ?Sized>(
    segments: ArrayView3<f32>,
    labels: &[Label],
    params: &AugmentParams,
    copy: usize,
    rng: &mut R,
) -> Result<(Array3<f32>, Vec<Provenance>)> {
    let mut out = segments.to_owned();
    let mut ids = Vec::with_capacity(labels.len());

    for (source, (mut row, &label)) in out.outer_iter_mut().zip(labels).enumerate() {
        let p = params.draw(copy, rng);
        match params.kind {
            // σ = 0 leaves the copy bit-identical to its source.
            AugmentationKind::Jitter if p > 0.0 => {
                let noise = Normal::new(0.0_f32, p)
                    .map_err(|e| PrepError::value("sigma", p, e.to_string()))?;
                row.mapv_inplace(|v| v + noise.sample(rng));
            }
            AugmentationKind::Jitter => {}
            AugmentationKind::Scaling => row.mapv_inplace(|v| v * p),
        }
        ids.push(Provenance {
            source,
            kind: params.kind.into(),
            copy,
            param: Some(p),
            label,
        });
    }
    debug!("{:?} copy {copy}: {} rows", params.kind, ids.len());
    Ok((out, ids))
}

fn assemble(
    segments: ArrayView3<f32>,
    labels: &[Label],
    params: &AugmentParams,
    copies: Vec<(Array3<f32>, Vec<Provenance>)>,
) -> Result<AugmentedBatch> {
    let mut batch = AugmentedBatch::originals(segments, labels)?;
    if copies.is_empty() {
        return Ok(batch);
    }

    {
        let mut views = vec![segments.view()];
        views.extend(copies.iter().map(|(data, _)| data.view()));
        batch.data = concatenate(Axis(0), &views)
            .map_err(|e| PrepError::validation(format!("cannot assemble augmented batch: {e}")))?;
    }
    for (_, ids) in copies {
        batch.labels.extend(ids.iter().map(|p| p.label));
        batch.identifiers.extend(ids);
    }

    info!(
        "{:?}: {} originals + {} × {} synthetic rows",
        params.kind,
        labels.len(),
        params.factor,
        labels.len()
    );
    Ok(batch)
}

//! # eegprep — EEG segment preparation in pure Rust
//!
//! `eegprep` turns continuous multi-channel EEG recordings into model-ready
//! batches: fixed-length segments, augmented with synthetic copies, then
//! decomposed into multi-level wavelet coefficients.
//!
//! ## Pipeline overview
//!
//! ```text
//! MM05.safetensors
//!   │
//!   ├─ io::load_recording()     [C, T] f32 + channel names + rate
//!   ├─ channels                 keep / ignore lists → K channels
//!   ├─ segment                  non-overlapping 4.5 s windows, tail dropped
//!   ├─ augment                  originals + f jittered / scaled copies
//!   └─ wavelet                  per-channel scaling + db4 wavedec
//!        │
//!        └─→ [A_L, D_1 … D_L] per (segment, channel)
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use eegprep::{prepare, PipelineConfig};
//! use eegprep::io::{DirectorySource, RecordingSource};
//!
//! let source = DirectorySource::new("data/karaone");
//! let rec = source.fetch("MM05").unwrap();
//!
//! let cfg = PipelineConfig { seed: Some(7), ..PipelineConfig::default() };
//! let out = prepare(&rec, &cfg).unwrap();
//!
//! println!("{} segments → {} rows → {} coefficient sets",
//!     out.segments.len(), out.batch.len(), out.wavelets.len());
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use eegprep::{segment, stack, jitter, ActionKind, ChannelFilter, Recording};
//! use eegprep::wavelet::{Wavelet, WaveletTransformer};
//! use ndarray::Array2;
//! use rand::SeedableRng;
//!
//! let names = (0..4).map(|c| format!("E{c}")).collect();
//! let rec = Recording::new("S01", names, 1000.0, Array2::zeros((4, 9000)), 1).unwrap();
//!
//! let segs = segment(&rec, ActionKind::Thinking, &ChannelFilter::all(), 1000.0).unwrap();
//! let (x, y) = stack(&segs).unwrap();                  // [9, 4, 1000]
//!
//! let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
//! let batch = jitter(x.view(), &y, 2, 0.01, 0.05, &mut rng).unwrap(); // 27 rows
//!
//! let coeffs = WaveletTransformer::new(Wavelet::Db4)
//!     .apply(batch.data.view(), 4, false)
//!     .unwrap();
//! ```

pub mod augment;
pub mod channels;
pub mod config;
pub mod error;
pub mod io;
pub mod normalize;
pub mod recording;
pub mod segment;
pub mod wavelet;

use log::info;
use rand::Rng;

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use augment::{
    augment, augment_seeded, jitter, scaling, AugmentParams, AugmentationKind, AugmentedBatch,
    ParamSchedule, Provenance, RowKind,
};
pub use channels::ChannelFilter;
pub use config::PipelineConfig;
pub use error::{ErrorKind, PrepError, Result};
pub use normalize::ScaleMode;
pub use recording::{ActionKind, Label, Recording};
pub use segment::{segment, segment_events, stack, window_samples, Event, Segment, Segmentation};
pub use wavelet::{Wavelet, WaveletBatch, WaveletResult, WaveletTransformer};

/// Everything one pipeline run produces for a recording.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub segments: Vec<Segment>,
    /// Originals followed by synthetic copies.
    pub batch: AugmentedBatch,
    /// One decomposition per (row of `batch`, channel).
    pub wavelets: WaveletBatch,
}

/// Run the full pipeline on one recording.
///
/// Augmentation is reproducible when `cfg.seed` is set (parallel, one
/// stream per copy); otherwise it draws from OS entropy.
pub fn prepare(recording: &Recording, cfg: &PipelineConfig) -> Result<Prepared> {
    match cfg.seed {
        Some(seed) => run(recording, cfg, |x, y, params| augment_seeded(x, y, params, seed)),
        None => prepare_with_rng(recording, cfg, &mut rand::thread_rng()),
    }
}

/// [`prepare`] with an explicit random source for augmentation.
///
/// # Steps
///
/// 1. [`PipelineConfig::validate`].
/// 2. [`segment`] with the configured action, channel filter and window, or
///    [`segment_events`] over `recording.events` when `cfg.segmentation` is
///    `events`.
/// 3. [`stack`] into `[N, K, T]`.
/// 4. [`augment`]; a factor of `0` passes the batch through.
/// 5. [`WaveletTransformer::apply`] at `decomposition_level`.
pub fn prepare_with_rng<R: Rng + ?Sized>(
    recording: &Recording,
    cfg: &PipelineConfig,
    rng: &mut R,
) -> Result<Prepared> {
    run(recording, cfg, |x, y, params| augment(x, y, params, rng))
}

fn run<F>(recording: &Recording, cfg: &PipelineConfig, augment_with: F) -> Result<Prepared>
where
    F: FnOnce(ndarray::ArrayView3<f32>, &[Label], &AugmentParams) -> Result<AugmentedBatch>,
{
    cfg.validate()?;

    let filter = cfg.channel_filter();
    let segments = match cfg.segmentation {
        Segmentation::Fixed => segment(recording, cfg.action, &filter, cfg.window_duration_ms)?,
        Segmentation::Events if recording.events.is_empty() => {
            return Err(PrepError::validation(format!(
                "recording {:?} has no event markers for event segmentation",
                recording.subject
            )));
        }
        Segmentation::Events => segment_events(
            recording,
            cfg.action,
            &filter,
            &recording.events,
            cfg.window_duration_ms,
            cfg.onset_offset_ms,
        )?,
    };
    let (x, y) = stack(&segments)?;

    let params = cfg.augment_params();
    let batch = if params.factor == 0 {
        AugmentedBatch::originals(x.view(), &y)?
    } else {
        augment_with(x.view(), &y, &params)?
    };

    let wavelets = cfg
        .transformer()
        .apply(batch.data.view(), cfg.decomposition_level, cfg.scale)?;

    info!(
        "{}: {} segments → {} rows → {} coefficient sets ({} levels)",
        recording.subject,
        segments.len(),
        batch.len(),
        wavelets.len(),
        wavelets.levels
    );
    Ok(Prepared { segments, batch, wavelets })
}

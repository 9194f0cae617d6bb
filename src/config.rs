//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter of the
//! segment → augment → decompose pipeline. Defaults match the KaraOne
//! imagined-speech setup (1 kHz Neuroscan recordings, 4.5 s thinking
//! periods); any subset of fields can be overridden from a TOML file.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

use crate::augment::{AugmentParams, AugmentationKind, ParamSchedule};
use crate::channels::ChannelFilter;
use crate::error::{PrepError, Result};
use crate::normalize::ScaleMode;
use crate::recording::ActionKind;
use crate::segment::Segmentation;
use crate::wavelet::{Wavelet, WaveletTransformer};

/// Auxiliary channels dropped when neither channel list is configured.
pub const DEFAULT_IGNORE: [&str; 5] = ["VEO", "HEO", "EKG", "EMG", "Trigger"];

/// Configuration for the full preparation pipeline.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use eegprep::PipelineConfig;
///
/// let cfg = PipelineConfig {
///     window_duration_ms: 2000.0,
///     augmentation_factor: 5,
///     ..PipelineConfig::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
///
/// Or load one from TOML; missing keys keep their defaults:
///
/// ```
/// use eegprep::PipelineConfig;
///
/// let cfg = PipelineConfig::from_toml_str(r#"
///     keep_channels = ["C3", "C4"]
///     augmentation = "scaling"
///     low_factor = 0.9
///     high_factor = 1.1
/// "#).unwrap();
/// assert_eq!(cfg.keep_channels, ["C3", "C4"]);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Trial period the segments are labelled with.
    ///
    /// Default: `thinking`.
    pub action: ActionKind,

    /// Back-to-back windows or one window per event marker of the recording.
    ///
    /// Default: `fixed`.
    pub segmentation: Segmentation,

    /// Delay between an event marker and the start of its window, used by
    /// `events` segmentation. Must convert to a whole number of samples.
    ///
    /// Default: `500.0` ms.
    pub onset_offset_ms: f64,

    /// Window length in milliseconds. Must convert to a whole number of
    /// samples at the recording's rate.
    ///
    /// Default: `4500.0` ms (4 500 samples at 1 kHz).
    pub window_duration_ms: f64,

    /// Channels to keep. When non-empty, `ignore_channels` is not applied.
    ///
    /// Default: `[]`.
    pub keep_channels: Vec<String>,

    /// Channels to drop when `keep_channels` is empty.
    ///
    /// `None` means [`DEFAULT_IGNORE`] (the non-EEG channels of the Neuroscan
    /// montage) when no keep list is given, and nothing otherwise. Setting
    /// both lists explicitly is allowed but logs a warning.
    ///
    /// Default: `None`.
    pub ignore_channels: Option<Vec<String>>,

    /// Perturbation used for synthetic copies.
    ///
    /// Default: `jitter`.
    pub augmentation: AugmentationKind,

    /// Synthetic copies per original. `0` passes the batch through unchanged.
    ///
    /// Default: `3`.
    pub augmentation_factor: usize,

    /// Noise σ bounds for jitter.
    ///
    /// Default: `0.01 ..= 0.05`.
    pub low_sigma: f32,
    pub high_sigma: f32,

    /// Amplitude factor bounds for scaling.
    ///
    /// Default: `0.9 ..= 1.1`.
    pub low_factor: f32,
    pub high_factor: f32,

    /// How σ / factor are picked inside their bounds.
    ///
    /// Default: `random`.
    pub schedule: ParamSchedule,

    /// Default: `db4`.
    pub wavelet: Wavelet,

    /// Number of DWT levels. Bounded by the window length, see
    /// [`Wavelet::max_level`].
    ///
    /// Default: `6`.
    pub decomposition_level: usize,

    /// Rescale each channel before decomposition.
    ///
    /// Default: `true`.
    pub scale: bool,

    /// Default: `zscore`.
    pub scale_mode: ScaleMode,

    /// Seed for augmentation. `None` draws from OS entropy, so two runs differ.
    ///
    /// Default: `None`.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            action: ActionKind::Thinking,
            segmentation: Segmentation::Fixed,
            onset_offset_ms: 500.0,
            window_duration_ms: 4500.0,
            keep_channels: vec![],
            ignore_channels: None,
            augmentation: AugmentationKind::Jitter,
            augmentation_factor: 3,
            low_sigma: 0.01,
            high_sigma: 0.05,
            low_factor: 0.9,
            high_factor: 1.1,
            schedule: ParamSchedule::Random,
            wavelet: Wavelet::Db4,
            decomposition_level: 6,
            scale: true,
            scale_mode: ScaleMode::ZScore,
            seed: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| PrepError::configuration("config", "<toml>", e.message().to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| {
            PrepError::configuration("config", path.display(), e.message().to_string())
        })
    }

    pub fn channel_filter(&self) -> ChannelFilter {
        let ignore = match &self.ignore_channels {
            Some(names) => names.iter().cloned().collect(),
            None if self.keep_channels.is_empty() => {
                DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect()
            }
            None => BTreeSet::new(),
        };
        ChannelFilter { keep: self.keep_channels.iter().cloned().collect(), ignore }
    }

    /// Augmentation parameters for the configured kind.
    pub fn augment_params(&self) -> AugmentParams {
        let params = match self.augmentation {
            AugmentationKind::Jitter => {
                AugmentParams::jitter(self.augmentation_factor, self.low_sigma, self.high_sigma)
            }
            AugmentationKind::Scaling => {
                AugmentParams::scaling(self.augmentation_factor, self.low_factor, self.high_factor)
            }
        };
        params.with_schedule(self.schedule)
    }

    pub fn transformer(&self) -> WaveletTransformer {
        WaveletTransformer::new(self.wavelet).with_scale_mode(self.scale_mode)
    }

    /// Check everything that can be checked without data.
    ///
    /// Level bounds that depend on the window length are checked again once
    /// the sample count is known.
    pub fn validate(&self) -> Result<()> {
        if !(self.window_duration_ms.is_finite() && self.window_duration_ms > 0.0) {
            return Err(PrepError::configuration(
                "window_duration_ms",
                self.window_duration_ms,
                "must be a positive, finite duration",
            ));
        }
        if !(self.onset_offset_ms.is_finite() && self.onset_offset_ms >= 0.0) {
            return Err(PrepError::configuration(
                "onset_offset_ms",
                self.onset_offset_ms,
                "must be a non-negative, finite duration",
            ));
        }
        if self.decomposition_level == 0 {
            return Err(PrepError::configuration(
                "decomposition_level",
                self.decomposition_level,
                "must be at least 1",
            ));
        }
        AugmentParams::jitter(0, self.low_sigma, self.high_sigma).validate()?;
        AugmentParams::scaling(0, self.low_factor, self.high_factor).validate()?;
        Ok(())
    }
}

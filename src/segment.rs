//! Fixed-length segmentation.
//!
//! Splits a continuous [C, T] recording into non-overlapping windows of
//! `window_samples` samples after channel filtering, dropping any trailing
//! incomplete window. Windows are never zero-padded.
//!
//! [`segment_events`] instead cuts one window per trial marker, starting a
//! fixed offset after the marker.
use log::{debug, info};
use ndarray::{s, Array2, Array3, Axis};
use serde::Deserialize;
use std::str::FromStr;

use crate::channels::ChannelFilter;
use crate::error::{PrepError, Result};
pub use crate::recording::Event;
use crate::recording::{ActionKind, Label, Recording};

/// How a recording is cut into windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segmentation {
    /// Back-to-back windows over the whole recording, see [`segment`].
    #[default]
    Fixed,
    /// One window per trial marker, see [`segment_events`].
    Events,
}

impl FromStr for Segmentation {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "events" => Ok(Self::Events),
            other => Err(PrepError::configuration(
                "segmentation",
                other,
                "supported modes are fixed, events",
            )),
        }
    }
}

/// One fixed-duration, channel-filtered window of a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub subject: String,
    pub action: ActionKind,
    /// Names of the `K` selected channels, in row order of `data`.
    pub ch_names: Vec<String>,
    /// `[K, window_samples]`.
    pub data: Array2<f32>,
    pub label: Label,
    /// Position of this window within its recording.
    pub window: usize,
    /// First sample of the window in the recording.
    pub start: usize,
}


/// Convert a duration in milliseconds to a sample count at `sfreq` Hz.
///
/// The product must land on an integer (within 1e-6 samples) and be at
/// least one sample.
pub fn window_samples(duration_ms: f64, sfreq: f32) -> Result<usize> {
    if !(duration_ms.is_finite() && duration_ms > 0.0) {
        return Err(PrepError::configuration(
            "window_duration_ms",
            duration_ms,
            "must be a positive, finite duration",
        ));
    }
    let n = exact_samples("window_duration_ms", duration_ms, sfreq)?;
    if n < 1 {
        return Err(PrepError::configuration(
            "window_duration_ms",
            duration_ms,
            format!("shorter than one sample at {sfreq} Hz"),
        ));
    }
    Ok(n)
}

/// `ms * sfreq / 1000`, rejected unless within 1e-6 of a whole sample count.
fn exact_samples(param: &'static str, ms: f64, sfreq: f32) -> Result<usize> {
    let exact = ms * sfreq as f64 / 1000.0;
    let rounded = exact.round();
    if (exact - rounded).abs() > 1e-6 {
        return Err(PrepError::configuration(
            param,
            ms,
            format!("{exact} samples at {sfreq} Hz is not an integer sample count"),
        ));
    }
    Ok(rounded as usize)
}

/// Cut `recording` into non-overlapping windows of `window_duration_ms`.
///
/// Yields `floor(T / window_samples)` segments, each `[K, window_samples]`,
/// with increasing `window` indices. Subject, action and label are copied
/// into every segment.
pub fn segment(
    recording: &Recording,
    action: ActionKind,
    filter: &ChannelFilter,
    window_duration_ms: f64,
) -> Result<Vec<Segment>> {
    let n = window_samples(window_duration_ms, recording.sfreq)?;
    let rows = filter.resolve(&recording.ch_names)?;

    let total = recording.n_samples();
    if total < n {
        return Err(PrepError::validation(format!(
            "recording {:?} has {total} samples, shorter than one window of {n}",
            recording.subject
        )));
    }

    let selected = recording.data.select(Axis(0), &rows);
    let ch_names: Vec<String> = rows.iter().map(|&r| recording.ch_names[r].clone()).collect();

    let n_windows = total / n;
    let segments: Vec<Segment> = (0..n_windows)
        .map(|w| {
            let start = w * n;
            Segment {
                subject: recording.subject.clone(),
                action,
                ch_names: ch_names.clone(),
                data: selected.slice(s![.., start..start + n]).to_owned(),
                label: recording.label,
                window: w,
                start,
            }
        })
        .collect();

    info!(
        "{}: {} windows of {n} samples × {} channels ({} trailing samples dropped)",
        recording.subject,
        segments.len(),
        ch_names.len(),
        total - n_windows * n
    );
    Ok(segments)
}

/// Cut one window per event, starting `onset_offset_ms` after each marker.
///
/// The window index of each segment is its event's position in `events`.
/// Fails if any window would run past the end of the recording.
pub fn segment_events(
    recording: &Recording,
    action: ActionKind,
    filter: &ChannelFilter,
    events: &[Event],
    window_duration_ms: f64,
    onset_offset_ms: f64,
) -> Result<Vec<Segment>> {
    let n = window_samples(window_duration_ms, recording.sfreq)?;
    if !(onset_offset_ms.is_finite() && onset_offset_ms >= 0.0) {
        return Err(PrepError::configuration(
            "onset_offset_ms",
            onset_offset_ms,
            "must be a non-negative, finite duration",
        ));
    }
    let offset = exact_samples("onset_offset_ms", onset_offset_ms, recording.sfreq)?;
    let rows = filter.resolve(&recording.ch_names)?;
    let ch_names: Vec<String> = rows.iter().map(|&r| recording.ch_names[r].clone()).collect();
    let total = recording.n_samples();

    let mut segments = Vec::with_capacity(events.len());
    for (i, ev) in events.iter().enumerate() {
        let start = ev.onset.saturating_add(offset);
        let end = start.saturating_add(n);
        if end > total {
            return Err(PrepError::validation(format!(
                "event {i} (onset {}) needs samples {start}..{end} but recording {:?} has {total}",
                ev.onset,
                recording.subject
            )));
        }
        let data = recording
            .data
            .slice(s![.., start..end])
            .select(Axis(0), &rows);
        debug!("event {i}: samples {start}..{end} label {}", ev.label);
        segments.push(Segment {
            subject: recording.subject.clone(),
            action,
            ch_names: ch_names.clone(),
            data,
            label: ev.label,
            window: i,
            start,
        });
    }

    info!(
        "{}: {} event windows of {n} samples × {} channels",
        recording.subject,
        segments.len(),
        ch_names.len()
    );
    Ok(segments)
}

/// Stack segments into a `[N, K, T]` batch plus parallel labels.
///
/// All segments must share the same shape.
pub fn stack(segments: &[Segment]) -> Result<(Array3<f32>, Vec<Label>)> {
    let Some(first) = segments.first() else {
        return Err(PrepError::validation("cannot stack an empty segment list"));
    };
    let (k, t) = first.data.dim();

    let mut out = Array3::<f32>::zeros((segments.len(), k, t));
    for (i, seg) in segments.iter().enumerate() {
        if seg.data.dim() != (k, t) {
            return Err(PrepError::validation(format!(
                "segment {i} has shape {:?}, expected ({k}, {t})",
                seg.data.dim()
            )));
        }
        out.slice_mut(s![i, .., ..]).assign(&seg.data);
    }
    let labels = segments.iter().map(|seg| seg.label).collect();
    Ok((out, labels))
}

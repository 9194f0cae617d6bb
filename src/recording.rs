//! One subject's continuous multi-channel recording.
use ndarray::Array2;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{PrepError, Result};

/// Integer class index attached to every segment and augmented row.
pub type Label = i64;

/// Which part of each trial a segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Imagined speech period.
    #[default]
    #[serde(alias = "thinking_inds")]
    Thinking,
    /// Rest period between prompts.
    #[serde(alias = "clearing_inds")]
    Clearing,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::Clearing => "clearing",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "thinking" | "thinking_inds" => Ok(Self::Thinking),
            "clearing" | "clearing_inds" => Ok(Self::Clearing),
            other => Err(PrepError::configuration(
                "action",
                other,
                "supported actions are thinking, clearing",
            )),
        }
    }
}

/// Trial marker: a sample position in the recording and the class it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Sample index of the marker.
    pub onset: usize,
    pub label: Label,
}

/// Raw multi-channel signal for one subject.
///
/// `data` is `[C, T]` in original units; row `c` belongs to `ch_names[c]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub subject: String,
    pub ch_names: Vec<String>,
    /// Sampling rate in Hz.
    pub sfreq: f32,
    pub data: Array2<f32>,
    /// Class index propagated into every segment cut from this recording.
    pub label: Label,
    /// Trial markers, in recording order. Empty when the recording has none.
    pub events: Vec<Event>,
}

impl Recording {
    /// Build a recording, checking that names, rows and rate agree.
    pub fn new(
        subject: impl Into<String>,
        ch_names: Vec<String>,
        sfreq: f32,
        data: Array2<f32>,
        label: Label,
    ) -> Result<Self> {
        let subject = subject.into();
        if ch_names.len() != data.nrows() {
            return Err(PrepError::validation(format!(
                "recording {subject:?}: {} channel names for {} data rows",
                ch_names.len(),
                data.nrows()
            )));
        }
        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(PrepError::validation(format!(
                "recording {subject:?}: sampling rate must be positive, got {sfreq}"
            )));
        }
        Ok(Self { subject, ch_names, sfreq, data, label, events: Vec::new() })
    }

    /// Attach trial markers. Every onset must fall inside the recording.
    pub fn with_events(mut self, events: Vec<Event>) -> Result<Self> {
        if let Some((i, ev)) = events.iter().enumerate().find(|(_, ev)| ev.onset >= self.n_samples()) {
            return Err(PrepError::validation(format!(
                "recording {:?}: event {i} onset {} is past the last sample ({})",
                self.subject,
                ev.onset,
                self.n_samples()
            )));
        }
        self.events = events;
        Ok(self)
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Row index of `name`, exact match.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("E{i}")).collect()
    }

    #[test]
    fn rejects_name_row_mismatch() {
        let err = Recording::new("MM05", names(3), 1000.0, Array2::zeros((2, 10)), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn rejects_non_positive_rate() {
        let err = Recording::new("MM05", names(2), 0.0, Array2::zeros((2, 10)), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn events_must_fall_inside_recording() {
        let rec = Recording::new("MM05", names(1), 1000.0, Array2::zeros((1, 100)), 0).unwrap();
        let rec = rec.with_events(vec![Event { onset: 99, label: 2 }]).unwrap();
        assert_eq!(rec.events.len(), 1);

        let err = rec.with_events(vec![Event { onset: 100, label: 2 }]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("event 0"), "{err}");
    }

    #[test]
    fn action_aliases() {
        assert_eq!("thinking_inds".parse::<ActionKind>().unwrap(), ActionKind::Thinking);
        assert_eq!("clearing".parse::<ActionKind>().unwrap(), ActionKind::Clearing);
        let err = "speaking".parse::<ActionKind>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}

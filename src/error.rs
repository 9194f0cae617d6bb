//! Error taxonomy shared by every stage.
//!
//! Each stage fails synchronously with a [`PrepError`]; nothing is clamped,
//! defaulted or retried internally. [`PrepError::kind`] folds the variants
//! onto the coarse categories callers usually branch on.
use std::path::PathBuf;
use thiserror::Error;

use crate::normalize::DegenerateSignal;

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied conflicting, missing or out-of-range configuration.
    Configuration,
    /// The data cannot satisfy a valid configuration (too short, no channels).
    Validation,
    /// A numeric parameter is inconsistent (inverted bounds, level too deep).
    Value,
    /// A degenerate signal would divide by zero.
    Numerical,
    /// Acquisition could not supply the subject's recording.
    DataNotFound,
    /// Reading or writing a persisted artifact failed.
    Io,
}

/// Errors raised by segmentation, augmentation, decomposition and persistence.
#[derive(Debug, Error)]
pub enum PrepError {
    /// Invalid or conflicting configuration, detected before touching data.
    #[error("configuration error: {param} = {value}: {reason}")]
    Configuration {
        param: &'static str,
        value: String,
        reason: String,
    },

    /// Input data cannot be processed with the given configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Inconsistent numeric parameter.
    #[error("invalid value: {param} = {value}: {reason}")]
    Value {
        param: &'static str,
        value: String,
        reason: String,
    },

    /// Requested decomposition depth exceeds what the input length supports.
    #[error(
        "decomposition_level = {requested} exceeds the maximum level {max} \
         for {len} samples with {wavelet} ({filter_len} taps)"
    )]
    LevelTooHigh {
        requested: usize,
        max: usize,
        len: usize,
        wavelet: &'static str,
        filter_len: usize,
    },

    /// Normalisation hit a degenerate channel.
    #[error("numerical error on segment {segment}, channel {channel}: {cause}")]
    Numerical {
        segment: usize,
        channel: usize,
        #[source]
        cause: DegenerateSignal,
    },

    #[error("no recording for subject {subject:?} at {}", path.display())]
    DataNotFound { subject: String, path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted file exists but does not have the expected layout.
    #[error("malformed file {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },
}

pub type Result<T, E = PrepError> = std::result::Result<T, E>;

impl PrepError {
    pub fn configuration(
        param: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            param,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn value(param: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::Value {
            param,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Value { .. } | Self::LevelTooHigh { .. } => ErrorKind::Value,
            Self::Numerical { .. } => ErrorKind::Numerical,
            Self::DataNotFound { .. } => ErrorKind::DataNotFound,
            Self::Io(_) | Self::Format { .. } => ErrorKind::Io,
        }
    }
}

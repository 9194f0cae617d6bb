//! Channel selection.
//!
//! Resolution rules:
//!   • `keep` non-empty  → exactly the kept channels, in recording order.
//!     `ignore` is not consulted (keep wins) and a warning is logged when
//!     both lists are given.
//!   • `keep` empty      → every channel not listed in `ignore`.
//!
//! Kept names missing from the recording are a configuration error; ignored
//! names missing from the recording are skipped.
use log::{debug, warn};
use std::collections::BTreeSet;

use crate::error::{PrepError, Result};

/// Inclusion whitelist plus exclusion blacklist, matched by exact name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelFilter {
    pub keep: BTreeSet<String>,
    pub ignore: BTreeSet<String>,
}

impl ChannelFilter {
    /// Filter that keeps every channel.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn keep<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keep: names.into_iter().map(Into::into).collect(),
            ignore: BTreeSet::new(),
        }
    }

    pub fn ignore<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keep: BTreeSet::new(),
            ignore: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(names.into_iter().map(Into::into));
        self
    }

    /// Row indices of the effective channel subset, in recording order.
    ///
    /// Fails with a validation error if nothing survives the filter.
    pub fn resolve(&self, ch_names: &[String]) -> Result<Vec<usize>> {
        let selected: Vec<usize> = if !self.keep.is_empty() {
            if !self.ignore.is_empty() {
                warn!(
                    "both keep ({}) and ignore ({}) channel lists given; keep wins, ignore is not applied",
                    self.keep.len(),
                    self.ignore.len()
                );
            }
            if let Some(missing) = self.keep.iter().find(|k| !ch_names.contains(*k)) {
                return Err(PrepError::configuration(
                    "keep_channels",
                    missing,
                    "channel not present in recording",
                ));
            }
            (0..ch_names.len())
                .filter(|&i| self.keep.contains(&ch_names[i]))
                .collect()
        } else {
            for name in self.ignore.iter().filter(|n| !ch_names.contains(*n)) {
                debug!("ignore channel {name:?} not present in recording, skipped");
            }
            (0..ch_names.len())
                .filter(|&i| !self.ignore.contains(&ch_names[i]))
                .collect()
        };

        if selected.is_empty() {
            return Err(PrepError::validation(format!(
                "channel filter leaves no channels out of {}",
                ch_names.len()
            )));
        }
        Ok(selected)
    }
}

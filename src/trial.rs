//! Trials and trial sets.
//!
//! A [`Trial`] is one `[C, T]` block of samples with a stable id. A
//! [`TrialSet`] is the ordered collection a source hands to the extractor;
//! construction checks that every trial shares the set's sample rate and
//! channel count.
use ndarray::Array2;

use crate::error::{Error, Result};

/// One multi-channel trial, shape `[channels, samples]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// Identifier carried through every derived array (e.g. `"rec01#3"`).
    pub id: String,
    pub data: Array2<f64>,
    /// Sampling rate in Hz.
    pub sfreq: f64,
}

impl Trial {
    pub fn new(id: impl Into<String>, data: Array2<f64>, sfreq: f64) -> Self {
        Self { id: id.into(), data, sfreq }
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }
}

/// Ordered, homogeneous collection of trials.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSet {
    sfreq: f64,
    n_channels: usize,
    trials: Vec<Trial>,
}

impl TrialSet {
    /// Build a set, checking that every trial matches the first one's
    /// sample rate and channel count.
    pub fn new(trials: Vec<Trial>) -> Result<Self> {
        let (sfreq, n_channels) = match trials.first() {
            Some(t) => (t.sfreq, t.n_channels()),
            None => return Err(Error::InsufficientTrials(0)),
        };
        for t in &trials {
            if (t.sfreq - sfreq).abs() > 1e-9 {
                return Err(Error::InconsistentTrials {
                    id: t.id.clone(),
                    reason: format!("sfreq {} Hz, set has {} Hz", t.sfreq, sfreq),
                });
            }
            if t.n_channels() != n_channels {
                return Err(Error::InconsistentTrials {
                    id: t.id.clone(),
                    reason: format!("{} channels, set has {}", t.n_channels(), n_channels),
                });
            }
        }
        Ok(Self { sfreq, n_channels, trials })
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn ids(&self) -> Vec<String> {
        self.trials.iter().map(|t| t.id.clone()).collect()
    }

    pub fn into_trials(self) -> Vec<Trial> {
        self.trials
    }
}

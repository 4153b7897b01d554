//! Error taxonomy for the numeric core.
//!
//! Feature extraction, reduction and the per-recording cleaning steps return
//! [`Error`].  File I/O and the directory-level runs use `anyhow` on top of
//! it so every failure carries the path it came from.
use thiserror::Error;

/// Errors raised by the pure computations of this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// The signal is shorter than the requested spectral window.
    #[error("insufficient samples: need at least {needed}, got {got}")]
    InsufficientSamples {
        /// Window length (`nperseg`).
        needed: usize,
        /// Samples available.
        got: usize,
    },

    /// Feature vectors of unequal length reached the reducer.
    #[error("dimension mismatch in row {row}: expected {expected} features, got {got}")]
    DimensionMismatch {
        /// Row index of the first offending vector.
        row: usize,
        /// Length of the first row.
        expected: usize,
        /// Length of the offending row.
        got: usize,
    },

    /// Fewer than two trials: no embedding is possible.
    #[error("insufficient trials: need at least 2, got {0}")]
    InsufficientTrials(usize),

    /// Band edges are not finite or not strictly increasing.
    #[error("invalid band '{name}': {low_hz} Hz .. {high_hz} Hz")]
    InvalidBand {
        name: String,
        low_hz: f64,
        high_hz: f64,
    },

    /// A numeric parameter is out of its valid range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },

    /// Trials of one set disagree on sample rate or channel count.
    #[error("trial '{id}' is inconsistent with the set: {reason}")]
    InconsistentTrials {
        id: String,
        reason: String,
    },

    /// The stim channel contains no event with the requested id.
    #[error("no events with id {event_id} on stim channel '{channel}'")]
    NoEvents {
        channel: String,
        event_id: i32,
    },

    /// Every epoch was dropped (out of bounds or rejected).
    #[error("no epochs left after epoching/rejection ({n_events} events)")]
    NoEpochs {
        n_events: usize,
    },

    /// FastICA did not produce a usable decomposition.
    #[error("ICA failed: {0}")]
    Ica(String),

    /// A per-trial failure, tagged with the trial that caused it.
    #[error("trial '{id}': {source}")]
    Trial {
        id: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap `self` with the id of the trial being processed.
    pub fn in_trial(self, id: &str) -> Self {
        Error::Trial { id: id.to_string(), source: Box::new(self) }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter { name, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

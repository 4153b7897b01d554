//! Peak-to-peak epoch rejection.
//!
//! A channel is bad in an epoch when its peak-to-peak amplitude exceeds the
//! threshold; an epoch with any bad channel is dropped. The per-(channel,
//! epoch) verdicts are kept as a [`QualityMatrix`] for reporting.
use ndarray::{Array2, Array3, Axis};

/// Verdict for one (channel, epoch).
///
/// Only two states exist: bad channels are never repaired (there is no
/// electrode geometry to interpolate from), so a bad channel drops its epoch.
/// The `u8` codes written to `{id}/quality` are therefore `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Quality {
    Good = 0,
    Bad = 1,
}

/// `[channels, epochs]` verdicts.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityMatrix(pub Array2<Quality>);

impl QualityMatrix {
    /// Epoch indices with no bad channel.
    pub fn good_epochs(&self) -> Vec<usize> {
        self.0
            .axis_iter(Axis(1))
            .enumerate()
            .filter(|(_, col)| col.iter().all(|&q| q == Quality::Good))
            .map(|(e, _)| e)
            .collect()
    }

    /// Verdicts as `u8` codes (0 = good, 1 = bad), row-major.
    pub fn codes(&self) -> Vec<u8> {
        self.0.iter().map(|&q| q as u8).collect()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.0.dim()
    }
}

/// Peak-to-peak amplitude per channel and epoch, `[C, E]`.
pub fn peak_to_peak(epochs: &Array3<f64>) -> Array2<f64> {
    let (n_e, n_c, _) = epochs.dim();
    let mut out = Array2::zeros((n_c, n_e));
    for (e, epoch) in epochs.outer_iter().enumerate() {
        for (c, ch) in epoch.outer_iter().enumerate() {
            let (lo, hi) = ch
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            out[[c, e]] = if ch.is_empty() { 0.0 } else { hi - lo };
        }
    }
    out
}

/// Classify every (channel, epoch). `None` marks everything good.
pub fn assess(epochs: &Array3<f64>, threshold: Option<f64>) -> QualityMatrix {
    let ptp = peak_to_peak(epochs);
    QualityMatrix(ptp.mapv(|p| match threshold {
        Some(limit) if p > limit => Quality::Bad,
        _ => Quality::Good,
    }))
}

/// Drop epochs with a bad channel; returns the kept epochs, their indices
/// in the input, and the full quality matrix.
pub fn reject_epochs(
    epochs: &Array3<f64>,
    threshold: Option<f64>,
) -> (Array3<f64>, Vec<usize>, QualityMatrix) {
    let quality = assess(epochs, threshold);
    let keep = quality.good_epochs();
    let kept = epochs.select(Axis(0), &keep);
    if keep.len() < epochs.shape()[0] {
        log::debug!("rejected {} of {} epochs", epochs.shape()[0] - keep.len(), epochs.shape()[0]);
    }
    (kept, keep, quality)
}

//! Epoch baseline correction.
//!
//! For every epoch and channel, the mean over the baseline samples is
//! subtracted from the whole epoch:
//!
//! ```text
//! epoch[e, c, :] -= mean(epoch[e, c, range])
//! ```
use std::ops::Range;

use ndarray::{s, Array2, Array3, Axis};

/// Subtract the per-epoch, per-channel mean over `range` (sample indices
/// inside the epoch). An empty or out-of-range window leaves the data
/// unchanged.
pub fn baseline_correct_inplace(epochs: &mut Array3<f64>, range: Range<usize>) {
    let n_t = epochs.shape()[2];
    let range = range.start.min(n_t)..range.end.min(n_t);
    if range.is_empty() {
        return;
    }
    for mut epoch in epochs.outer_iter_mut() {
        for mut ch in epoch.outer_iter_mut() {
            let m = ch.slice(s![range.clone()]).mean().unwrap_or(0.0);
            ch.mapv_inplace(|v| v - m);
        }
    }
}

/// Mean over epochs, `[E, C, T]` → `[C, T]` (the evoked response).
pub fn evoked(epochs: &Array3<f64>) -> Option<Array2<f64>> {
    epochs.mean_axis(Axis(0))
}

//! Epoching: fixed-length windows and event-locked windows.
//!
//! Fixed-length epochs split continuous `[C, T]` data into non-overlapping
//! windows, dropping any trailing incomplete window. Event-locked epochs
//! are cut around the onsets found on a trigger (stim) channel.
use ndarray::{s, Array2, Array3, ArrayView1, ArrayView2};

/// A trigger onset on the stim channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Sample index of the onset.
    pub sample: usize,
    /// Trigger code (stim value after the step).
    pub id: i32,
}

/// Split `data` (`[C, T]`) into `[E, C, epoch_samples]`.
/// Trailing samples that don't fill a complete epoch are discarded.
pub fn epoch_fixed(data: ArrayView2<f64>, epoch_samples: usize) -> Array3<f64> {
    let (n_ch, n_t) = data.dim();
    let n_epochs = if epoch_samples == 0 { 0 } else { n_t / epoch_samples };

    let mut out = Array3::<f64>::zeros((n_epochs, n_ch, epoch_samples));
    for e in 0..n_epochs {
        let start = e * epoch_samples;
        out.slice_mut(s![e, .., ..])
            .assign(&data.slice(s![.., start..start + epoch_samples]));
    }
    out
}

/// Same as [`epoch_fixed`], one `[C, epoch_samples]` array per epoch.
pub fn epoch_fixed_vec(data: ArrayView2<f64>, epoch_samples: usize) -> Vec<Array2<f64>> {
    let arr3 = epoch_fixed(data, epoch_samples);
    arr3.outer_iter().map(|e| e.to_owned()).collect()
}

/// Onsets on a stim channel: every sample where the value steps up to a
/// new non-zero value. The first sample never counts as an onset.
pub fn find_events(stim: ArrayView1<f64>) -> Vec<Event> {
    let mut events = Vec::new();
    for t in 1..stim.len() {
        let prev = stim[t - 1].round() as i32;
        let cur = stim[t].round() as i32;
        if cur != 0 && cur > prev {
            events.push(Event { sample: t, id: cur });
        }
    }
    events
}

/// Event-locked epochs of the selected event code.
#[derive(Debug, Clone)]
pub struct EventEpochs {
    /// `[E, C, n_times]`.
    pub data: Array3<f64>,
    /// Onset sample of each kept epoch.
    pub onsets: Vec<usize>,
    /// Index of the onset inside each epoch (`−round(tmin · sfreq)`).
    pub onset_index: usize,
}

/// Cut `[onset + round(tmin·sfreq), onset + round(tmax·sfreq)]` (inclusive)
/// around every event with `id == event_id`. Windows that leave the data
/// are dropped. With `tmin > 0` the onset lies before the window and
/// `onset_index` is `0`.
pub fn epoch_events(
    data: ArrayView2<f64>,
    events: &[Event],
    event_id: i32,
    tmin: f64,
    tmax: f64,
    sfreq: f64,
) -> EventEpochs {
    let (n_ch, n_t) = data.dim();
    let start_off = (tmin * sfreq).round() as i64;
    let stop_off = (tmax * sfreq).round() as i64;
    let n_times = (stop_off - start_off + 1).max(0) as usize;

    let mut onsets = Vec::new();
    for ev in events.iter().filter(|e| e.id == event_id) {
        let start = ev.sample as i64 + start_off;
        let stop = ev.sample as i64 + stop_off;
        if n_times > 0 && start >= 0 && stop < n_t as i64 {
            onsets.push(ev.sample);
        }
    }

    let mut out = Array3::<f64>::zeros((onsets.len(), n_ch, n_times));
    for (e, &onset) in onsets.iter().enumerate() {
        let start = (onset as i64 + start_off) as usize;
        out.slice_mut(s![e, .., ..])
            .assign(&data.slice(s![.., start..start + n_times]));
    }
    EventEpochs { data: out, onsets, onset_index: (-start_off).max(0) as usize }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    #[test]
    fn epoch_count_and_shape() {
        let data = Array2::from_elem((12, 3840), 1.0);
        let epochs = epoch_fixed(data.view(), 1280);
        assert_eq!(epochs.shape(), &[3, 12, 1280]);
    }

    #[test]
    fn trailing_samples_dropped() {
        let data = Array2::from_elem((4, 1300), 0.5);
        assert_eq!(epoch_fixed(data.view(), 1280).shape()[0], 1);
        assert_eq!(epoch_fixed_vec(data.view(), 1280).len(), 1);
    }

    #[test]
    fn epochs_are_contiguous_slices() {
        let data = Array2::from_shape_fn((2, 10), |(c, t)| (c * 100 + t) as f64);
        let epochs = epoch_fixed_vec(data.view(), 4);
        assert_eq!(epochs.len(), 2);
        assert_eq!(epochs[1][[0, 0]], 4.0);
        assert_eq!(epochs[1][[1, 3]], 107.0);
    }

    #[test]
    fn events_at_rising_steps() {
        let stim = Array1::from(vec![0.0, 0.0, 1.0, 1.0, 0.0, 2.0, 2.0, 0.0, 1.0]);
        let events = find_events(stim.view());
        assert_eq!(
            events,
            vec![
                Event { sample: 2, id: 1 },
                Event { sample: 5, id: 2 },
                Event { sample: 8, id: 1 },
            ]
        );
    }

    #[test]
    fn event_windows_out_of_bounds_are_dropped() {
        let data = Array2::from_shape_fn((1, 100), |(_, t)| t as f64);
        let events = [
            Event { sample: 1, id: 1 },  // starts before 0
            Event { sample: 50, id: 1 },
            Event { sample: 60, id: 2 }, // other code
            Event { sample: 95, id: 1 }, // runs past the end
        ];
        let ep = epoch_events(data.view(), &events, 1, -0.02, 0.08, 100.0);
        assert_eq!(ep.onsets, vec![50]);
        assert_eq!(ep.data.shape(), &[1, 1, 11]);
        assert_eq!(ep.onset_index, 2);
        assert_eq!(ep.data[[0, 0, 0]], 48.0);
        assert_eq!(ep.data[[0, 0, 10]], 58.0);
    }
}

/// Shared helpers for trial and recording fixtures.
use exg_embed::{io::RawData, Component, SyntheticSource, Trial, TrialSet, TrialSource};
use ndarray::Array2;
use std::f64::consts::PI;
use std::path::Path;

#[allow(unused)]
/// `n_trials × n_channels × n_samples` trials of one sinusoid plus noise.
pub fn sine_trials(
    n_trials: usize,
    n_channels: usize,
    n_samples: usize,
    freq_hz: f64,
    noise_std: f64,
    seed: u64,
) -> TrialSet {
    SyntheticSource {
        n_trials,
        n_channels,
        n_samples,
        sfreq: 250.0,
        components: vec![Component::new(freq_hz, 1.0)],
        noise_std,
        seed,
        ..Default::default()
    }
    .load()
    .expect("synthetic trials")
}

#[allow(unused)]
/// One noiseless trial; channel `c` carries a sine at `freqs[c]`.
pub fn multi_sine_trial(id: &str, freqs: &[f64], n_samples: usize, sfreq: f64) -> Trial {
    let data = Array2::from_shape_fn((freqs.len(), n_samples), |(c, t)| {
        (2.0 * PI * freqs[c] * t as f64 / sfreq).sin()
    });
    Trial::new(id, data, sfreq)
}

#[allow(unused)]
/// Continuous recording: `n_eeg` sine channels plus a `STI 014` channel
/// with a one-sample-wide rising step of `event_id` at each onset.
pub fn event_recording(n_eeg: usize, n_samples: usize, sfreq: f64, onsets: &[usize], event_id: i32) -> RawData {
    let mut data = Array2::zeros((n_eeg + 1, n_samples));
    for c in 0..n_eeg {
        let f = 10.0 + 5.0 * c as f64;
        for t in 0..n_samples {
            data[[c, t]] = (2.0 * PI * f * t as f64 / sfreq).sin();
        }
    }
    for &onset in onsets {
        for t in onset..(onset + 5).min(n_samples) {
            data[[n_eeg, t]] = event_id as f64;
        }
    }
    let mut ch_names: Vec<String> = (0..n_eeg).map(|c| format!("EEG {c:03}")).collect();
    ch_names.push("STI 014".to_string());
    RawData { data, sfreq, ch_names }
}

#[allow(unused)]
/// Write a file that is not a valid safetensors container.
pub fn write_corrupt(path: &Path) {
    std::fs::write(path, b"not a safetensors file").expect("write corrupt file");
}

#[allow(unused)]
/// Write a container whose `data` entry claims offsets up to `u64::MAX`.
pub fn write_overflowing_offsets(path: &Path) {
    let header = format!(
        r#"{{"data":{{"dtype":"F64","shape":[1],"data_offsets":[0,{}]}},"sfreq":{{"dtype":"F64","shape":[1],"data_offsets":[0,8]}}}}"#,
        u64::MAX
    );
    let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(&250.0f64.to_le_bytes());
    std::fs::write(path, bytes).expect("write malformed file");
}

#[allow(unused)]
/// Write a file whose header length field is `u64::MAX`.
pub fn write_huge_header_length(path: &Path) {
    let mut bytes = u64::MAX.to_le_bytes().to_vec();
    bytes.extend_from_slice(b"{}");
    std::fs::write(path, bytes).expect("write malformed file");
}

#[allow(unused)]
/// 16 EEG channels mixing 15 in-band sines with a blink train, the blink
/// itself on `VEOG`, and a `STI 014` channel as in `event_recording`.
pub fn blink_recording(n_samples: usize, sfreq: f64, onsets: &[usize], event_id: i32) -> RawData {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let n_eeg = 16;
    let mut rng = StdRng::seed_from_u64(5);
    let mut blink = vec![0.0; n_samples];
    let mut centre = 100;
    while centre < n_samples {
        for (i, v) in blink.iter_mut().enumerate() {
            let d = (i as f64 - centre as f64) / (0.08 * sfreq);
            *v += (-0.5 * d * d).exp();
        }
        centre += rng.gen_range(300..600);
    }
    let weights = Array2::from_shape_fn((n_eeg, n_eeg - 1), |_| rng.gen_range(-0.5..0.5));

    let mut data = Array2::zeros((n_eeg + 2, n_samples));
    for c in 0..n_eeg {
        let w_blink = 3.0 + 0.1 * c as f64;
        for t in 0..n_samples {
            let time = t as f64 / sfreq;
            let neural: f64 = (0..n_eeg - 1)
                .map(|j| weights[[c, j]] * (2.0 * PI * (3.3 + 2.1 * j as f64) * time).sin())
                .sum();
            data[[c, t]] = neural + w_blink * blink[t];
        }
    }
    for t in 0..n_samples {
        data[[n_eeg, t]] = blink[t];
    }
    for &onset in onsets {
        for t in onset..(onset + 5).min(n_samples) {
            data[[n_eeg + 1, t]] = event_id as f64;
        }
    }
    let mut ch_names: Vec<String> = (0..n_eeg).map(|c| format!("EEG {c:03}")).collect();
    ch_names.push("VEOG".to_string());
    ch_names.push("STI 014".to_string());
    RawData { data, sfreq, ch_names }
}

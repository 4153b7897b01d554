//! Band-power feature extraction.
//!
//! Each trial becomes one feature vector, channel major:
//!
//! ```text
//! [ ch0_mean, ch0_std, ch0_<band0>, ch0_<band1>, …,
//!   ch1_mean, ch1_std, ch1_<band0>, … ]
//! ```
//!
//! `std` is the population standard deviation (ddof = 0). Band powers are
//! trapezoidal integrals of the channel's Welch PSD (see [`crate::spectral`]).
use ndarray::{Array2, ArrayView1};

use crate::config::{AnalysisConfig, Band};
use crate::error::{Error, Result};
use crate::spectral::{band_power, Welch, WelchParams};
use crate::trial::{Trial, TrialSet};

/// Features of one trial, in the order described in the module docs.
pub type FeatureVector = Vec<f64>;

/// Feature vectors of a trial set, one row per trial.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    /// Trial ids, row-aligned with `data`.
    pub ids: Vec<String>,
    /// Column names, e.g. `ch0_mean`, `ch0_std`, `ch0_alpha`.
    pub columns: Vec<String>,
    /// `[n_trials, n_features]`.
    pub data: Array2<f64>,
}

impl FeatureMatrix {
    /// Stack possibly ragged rows, failing on the first row whose length
    /// differs from the first row's.
    ///
    /// Columns are named `f0, f1, …`.
    pub fn from_rows(ids: Vec<String>, rows: &[FeatureVector]) -> Result<Self> {
        if ids.len() != rows.len() {
            return Err(Error::invalid(
                "ids",
                format!("{} ids for {} rows", ids.len(), rows.len()),
            ));
        }
        let expected = rows.first().map_or(0, Vec::len);
        for (row, r) in rows.iter().enumerate() {
            if r.len() != expected {
                return Err(Error::DimensionMismatch { row, expected, got: r.len() });
            }
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let data = Array2::from_shape_vec((rows.len(), expected), flat)
            .map_err(|e| Error::invalid("rows", e.to_string()))?;
        let columns = (0..expected).map(|i| format!("f{i}")).collect();
        Ok(Self { ids, columns, data })
    }

    pub fn n_trials(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }
}

/// Column names for `n_channels` channels and `bands`.
pub fn feature_names(n_channels: usize, bands: &[Band]) -> Vec<String> {
    let mut names = Vec::with_capacity(n_channels * (2 + bands.len()));
    for ch in 0..n_channels {
        names.push(format!("ch{ch}_mean"));
        names.push(format!("ch{ch}_std"));
        for band in bands {
            names.push(format!("ch{ch}_{}", band.name));
        }
    }
    names
}

/// Mean and population standard deviation of one channel.
pub fn mean_std(x: ArrayView1<f64>) -> (f64, f64) {
    let n = x.len() as f64;
    if x.is_empty() {
        return (0.0, 0.0);
    }
    let mean = x.sum() / n;
    let var = x.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Extract the feature vector of one trial.
///
/// Fails with [`Error::InsufficientSamples`] when the trial is shorter than
/// `params.nperseg`.
pub fn extract_features(trial: &Trial, bands: &[Band], params: WelchParams) -> Result<FeatureVector> {
    let welch = Welch::new(trial.sfreq, params)?;
    extract_with(&welch, trial, bands)
}

fn extract_with(welch: &Welch, trial: &Trial, bands: &[Band]) -> Result<FeatureVector> {
    let freqs = welch.freqs();
    let mut out = Vec::with_capacity(trial.n_channels() * (2 + bands.len()));
    for row in trial.data.rows() {
        let (mean, std) = mean_std(row);
        out.push(mean);
        out.push(std);
        let density = welch.density(row)?;
        for band in bands {
            out.push(band_power(&freqs, density.view(), band));
        }
    }
    Ok(out)
}

/// Feature matrix of a whole trial set.
///
/// Stops at the first failing trial; the error names the trial.
pub fn feature_matrix(set: &TrialSet, cfg: &AnalysisConfig) -> Result<FeatureMatrix> {
    for band in &cfg.bands {
        band.validate()?;
    }
    let welch = Welch::new(set.sfreq(), cfg.welch())?;
    let n_features = cfg.n_features(set.n_channels());
    let mut data = Array2::zeros((set.len(), n_features));
    for (i, trial) in set.trials().iter().enumerate() {
        let fv = extract_with(&welch, trial, &cfg.bands).map_err(|e| e.in_trial(&trial.id))?;
        data.row_mut(i).assign(&ArrayView1::from(&fv));
    }
    log::debug!(
        "extracted {} features for {} trials ({} ch, {} bands)",
        n_features,
        set.len(),
        set.n_channels(),
        cfg.bands.len()
    );
    Ok(FeatureMatrix {
        ids: set.ids(),
        columns: feature_names(set.n_channels(), &cfg.bands),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn bands() -> Vec<Band> {
        vec![Band::new("alpha", 8.0, 13.0), Band::new("beta", 13.0, 30.0)]
    }

    #[test]
    fn std_is_population() {
        let x = ndarray::arr1(&[1.0, 2.0, 3.0, 4.0]);
        let (m, s) = mean_std(x.view());
        approx::assert_abs_diff_eq!(m, 2.5, epsilon = 1e-12);
        // ddof = 0: sqrt(1.25), not sqrt(5/3).
        approx::assert_abs_diff_eq!(s, 1.25_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn vector_length_and_names() {
        let trial = Trial::new("t", Array2::zeros((3, 300)), 250.0);
        let fv = extract_features(&trial, &bands(), WelchParams::hann(256)).unwrap();
        assert_eq!(fv.len(), 3 * (2 + 2));
        let names = feature_names(3, &bands());
        assert_eq!(names.len(), fv.len());
        assert_eq!(&names[..4], ["ch0_mean", "ch0_std", "ch0_alpha", "ch0_beta"]);
    }

    #[test]
    fn zero_trial_gives_zero_vector() {
        let trial = Trial::new("z", Array2::zeros((2, 512)), 250.0);
        let fv = extract_features(&trial, &bands(), WelchParams::hann(256)).unwrap();
        assert!(fv.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn short_trial_fails_with_trial_id() {
        let good = Trial::new("good", Array2::zeros((1, 256)), 250.0);
        let short = Trial::new("short", Array2::zeros((1, 100)), 250.0);
        let set = TrialSet::new(vec![good, short]).unwrap();
        let err = feature_matrix(&set, &AnalysisConfig::default()).unwrap_err();
        match err {
            Error::Trial { id, source } => {
                assert_eq!(id, "short");
                assert!(matches!(*source, Error::InsufficientSamples { needed: 256, got: 100 }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn channel_blocks_follow_channel_order() {
        let sfreq = 250.0;
        let data = Array2::from_shape_fn((2, 500), |(c, t)| {
            let f = if c == 0 { 10.0 } else { 20.0 };
            (2.0 * PI * f * t as f64 / sfreq).sin() + c as f64
        });
        let mut swapped = data.clone();
        swapped.row_mut(0).assign(&data.row(1));
        swapped.row_mut(1).assign(&data.row(0));

        let a = extract_features(&Trial::new("a", data, sfreq), &bands(), WelchParams::hann(256)).unwrap();
        let b = extract_features(&Trial::new("b", swapped, sfreq), &bands(), WelchParams::hann(256)).unwrap();
        assert_eq!(&a[..4], &b[4..]);
        assert_eq!(&a[4..], &b[..4]);
    }

    #[test]
    fn ragged_rows_are_a_dimension_mismatch() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0]];
        let ids = vec!["a".into(), "b".into(), "c".into()];
        let err = FeatureMatrix::from_rows(ids, &rows).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { row: 2, expected: 2, got: 1 }));
    }
}

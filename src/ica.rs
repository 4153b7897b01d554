//! Ocular and cardiac artefact removal with FastICA.
//!
//! ```text
//! EEG channels [C, T] ──center──► FastICA ──► sources S [T, K]
//!                                               │
//! EOG / ECG channels ──|corr(S_k, ref)|──► z-score ──► excluded k
//!                                               │
//! X ← X − S_excl · A_exclᵀ   (A: least-squares mixing, [C, K])
//! ```
//!
//! Reference channels are recognised by name (`EOG` or `ECG`, any case).
//! They steer the selection but are neither decomposed nor modified.
use linfa::prelude::*;
use linfa_ica::fast_ica::FastIca;
use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView1, Axis};

use crate::config::CleanConfig;
use crate::error::{Error, Result};

/// Outlier rounds of the adaptive z-score.
const OUTLIER_ROUNDS: usize = 2;

/// Whether `name` is an EOG or ECG reference channel.
pub fn is_artifact_channel(name: &str) -> bool {
    let upper = name.to_uppercase();
    upper.contains("EOG") || upper.contains("ECG")
}

/// Pearson correlation of two equally long signals; `0` when either is flat.
pub fn correlation(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let ma = a.iter().take(n).sum::<f64>() / n as f64;
    let mb = b.iter().take(n).sum::<f64>() / n as f64;
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b.iter()) {
        let (dx, dy) = (x - ma, y - mb);
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    let denom = (saa * sbb).sqrt();
    if denom > 0.0 { sab / denom } else { 0.0 }
}

/// Indices whose |z-score| exceeds `threshold`, re-estimating mean and std
/// without the outliers found so far for up to [`OUTLIER_ROUNDS`] rounds.
pub fn find_outliers(scores: &[f64], threshold: f64) -> Vec<usize> {
    let mut active = vec![true; scores.len()];
    let mut outliers = Vec::new();
    for _ in 0..OUTLIER_ROUNDS {
        let vals: Vec<f64> = scores.iter().zip(&active).filter(|(_, &a)| a).map(|(&s, _)| s).collect();
        if vals.len() < 2 {
            break;
        }
        let mean = vals.iter().sum::<f64>() / vals.len() as f64;
        let std = (vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / vals.len() as f64).sqrt();
        if !(std > 0.0) {
            break;
        }
        let found: Vec<usize> = (0..scores.len())
            .filter(|&i| active[i] && ((scores[i] - mean) / std).abs() > threshold)
            .collect();
        if found.is_empty() {
            break;
        }
        for i in found {
            active[i] = false;
            outliers.push(i);
        }
    }
    outliers.sort_unstable();
    outliers
}

/// Remove EOG/ECG-correlated independent components from the EEG rows of
/// `data` in place and return the excluded component indices.
///
/// Nothing is fitted (and `[]` returned) when ICA is disabled, when no
/// reference channel exists, or when fewer than two EEG channels remain.
/// `ch_names` must name every row of `data`; an empty list disables ICA.
pub fn remove_artifacts(data: &mut Array2<f64>, ch_names: &[String], cfg: &CleanConfig) -> Result<Vec<usize>> {
    let Some(wanted) = cfg.ica_components else {
        return Ok(Vec::new());
    };
    if ch_names.len() != data.nrows() {
        return Ok(Vec::new());
    }
    let (refs, eeg): (Vec<usize>, Vec<usize>) =
        (0..data.nrows()).partition(|&c| is_artifact_channel(&ch_names[c]));
    if refs.is_empty() || eeg.len() < 2 {
        log::debug!("ICA skipped: {} reference and {} EEG channels", refs.len(), eeg.len());
        return Ok(Vec::new());
    }
    let k = wanted.min(eeg.len());
    if k < wanted {
        log::debug!("ICA components capped at {k} EEG channels");
    }

    // [T, C], column-centred.
    let mut x = data.select(Axis(0), &eeg).t().as_standard_layout().into_owned();
    let means = x.mean_axis(Axis(0)).ok_or_else(|| Error::Ica("empty recording".into()))?;
    x -= &means.insert_axis(Axis(0));

    let dataset = DatasetBase::from(x.clone());
    let model = FastIca::params()
        .ncomponents(k)
        .max_iter(cfg.ica_max_iter)
        .tol(cfg.ica_tol)
        .random_state(cfg.ica_seed as usize)
        .fit(&dataset)
        .map_err(|e| Error::Ica(e.to_string()))?;
    let sources = model.predict(&x);

    let mut excluded: Vec<usize> = Vec::new();
    for &r in &refs {
        let reference = data.row(r);
        let scores: Vec<f64> =
            sources.columns().into_iter().map(|s| correlation(s, reference).abs()).collect();
        let found = find_outliers(&scores, cfg.ica_threshold);
        log::debug!("ICA: {} flags components {found:?}", ch_names[r]);
        excluded.extend(found);
    }
    excluded.sort_unstable();
    excluded.dedup();
    if excluded.is_empty() {
        return Ok(excluded);
    }

    let mixing = least_squares_mixing(&x, &sources)?;
    for &comp in &excluded {
        let s = sources.column(comp);
        for (row, &c) in eeg.iter().enumerate() {
            let a = mixing[[row, comp]];
            data.row_mut(c).scaled_add(-a, &s);
        }
    }
    log::info!("ICA removed {} of {k} components: {excluded:?}", excluded.len());
    Ok(excluded)
}

/// `A = Xᵀ S (Sᵀ S)⁻¹`, the `[C, K]` mixing that best rebuilds `X` from `S`.
fn least_squares_mixing(x: &Array2<f64>, sources: &Array2<f64>) -> Result<Array2<f64>> {
    let sts = sources.t().dot(sources);
    let k = sts.nrows();
    let inv = DMatrix::from_fn(k, k, |i, j| sts[[i, j]])
        .try_inverse()
        .ok_or_else(|| Error::Ica("source covariance is singular".into()))?;
    let inv = Array2::from_shape_fn((k, k), |(i, j)| inv[(i, j)]);
    Ok(x.t().dot(sources).dot(&inv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    const SFREQ: f64 = 250.0;
    const N: usize = 5000;

    /// Blink-like train: 80 ms Gaussian bumps at irregular intervals.
    fn blinks(rng: &mut StdRng) -> Vec<f64> {
        let mut x = vec![0.0; N];
        let mut t = 100;
        while t < N {
            for (i, v) in x.iter_mut().enumerate() {
                let d = (i as f64 - t as f64) / (0.08 * SFREQ);
                *v += (-0.5 * d * d).exp();
            }
            t += rng.gen_range(250..600);
        }
        x
    }

    /// 16 EEG channels mixing 15 sines and a blink train, plus the blink
    /// itself on `VEOG`.
    fn contaminated() -> (Array2<f64>, Vec<String>) {
        let mut rng = StdRng::seed_from_u64(11);
        let blink = blinks(&mut rng);
        let n_eeg = 16;
        let mut data = Array2::zeros((n_eeg + 1, N));
        let weights = Array2::from_shape_fn((n_eeg, n_eeg - 1), |_| rng.gen_range(-1.0..1.0));
        for c in 0..n_eeg {
            let w_blink = 2.0 + rng.gen_range(0.0..2.0);
            for t in 0..N {
                let time = t as f64 / SFREQ;
                let neural: f64 = (0..n_eeg - 1)
                    .map(|j| weights[[c, j]] * (2.0 * PI * (3.1 + 1.7 * j as f64) * time).sin())
                    .sum();
                data[[c, t]] = neural + w_blink * blink[t];
            }
        }
        for t in 0..N {
            data[[n_eeg, t]] = blink[t];
        }
        let mut names: Vec<String> = (0..n_eeg).map(|c| format!("EEG {c:03}")).collect();
        names.push("VEOG".into());
        (data, names)
    }

    fn mean_abs_corr_with_last(data: &Array2<f64>) -> f64 {
        let r = data.nrows() - 1;
        (0..r).map(|c| correlation(data.row(c), data.row(r)).abs()).sum::<f64>() / r as f64
    }

    #[test]
    fn reference_channels_are_recognised_by_name() {
        assert!(is_artifact_channel("EOG 061"));
        assert!(is_artifact_channel("veog"));
        assert!(is_artifact_channel("ECG"));
        assert!(!is_artifact_channel("EEG 001"));
        assert!(!is_artifact_channel("STI 014"));
    }

    #[test]
    fn single_outlier_is_found() {
        let mut scores = vec![0.02, 0.05, 0.03, 0.01, 0.04, 0.02, 0.03, 0.05, 0.01, 0.02, 0.04, 0.03];
        scores.push(0.95);
        assert_eq!(find_outliers(&scores, 3.0), vec![12]);
        assert!(find_outliers(&[0.1, 0.1, 0.1], 3.0).is_empty());
    }

    #[test]
    fn correlation_of_scaled_copy_is_one() {
        let a = ndarray::Array1::from_iter((0..50).map(|i| (i as f64 * 0.3).sin()));
        let b = a.mapv(|v| -2.0 * v + 1.0);
        approx::assert_abs_diff_eq!(correlation(a.view(), b.view()), -1.0, epsilon = 1e-12);
        let flat = ndarray::Array1::<f64>::ones(50);
        assert_eq!(correlation(a.view(), flat.view()), 0.0);
    }

    #[test]
    fn blink_component_is_removed() {
        let (mut data, names) = contaminated();
        let eog_before = data.row(16).to_owned();
        let before = mean_abs_corr_with_last(&data);

        let excluded = remove_artifacts(&mut data, &names, &CleanConfig::default()).unwrap();
        assert!(!excluded.is_empty() && excluded.len() <= 2, "excluded {excluded:?}");
        assert_eq!(data.row(16), eog_before.view());
        let after = mean_abs_corr_with_last(&data);
        assert!(after < 0.5 * before, "corr {before} -> {after}");
    }

    #[test]
    fn no_reference_channel_leaves_data_untouched() {
        let (data, mut names) = contaminated();
        names[16] = "EEG 016".into();
        let mut cleaned = data.clone();
        let excluded = remove_artifacts(&mut cleaned, &names, &CleanConfig::default()).unwrap();
        assert!(excluded.is_empty());
        assert_eq!(cleaned, data);
    }

    #[test]
    fn disabled_ica_is_a_no_op() {
        let (data, names) = contaminated();
        let cfg = CleanConfig { ica_components: None, ..CleanConfig::default() };
        let mut cleaned = data.clone();
        assert!(remove_artifacts(&mut cleaned, &names, &cfg).unwrap().is_empty());
        assert_eq!(cleaned, data);
    }
}

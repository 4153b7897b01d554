//! Run configuration.
//!
//! [`AnalysisConfig`] holds every tunable parameter of the feature and
//! embedding pipeline, [`CleanConfig`] those of the recording-cleaning run.
//! Both are plain structs with `pub` fields and documented defaults, so they
//! can be built with struct-update syntax or read from a JSON file where
//! missing keys fall back to the defaults.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::clean::{NOTCH_TRANS_BW, NOTCH_WIDTH};
use crate::error::Error;
use crate::spectral::{WelchParams, Window};

/// A named frequency band, `[low_hz, high_hz]` inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub name: String,
    pub low_hz: f64,
    pub high_hz: f64,
}

impl Band {
    pub fn new(name: &str, low_hz: f64, high_hz: f64) -> Self {
        Self { name: name.to_string(), low_hz, high_hz }
    }

    /// Check `0 <= low_hz < high_hz`, both finite.
    pub fn validate(&self) -> std::result::Result<(), Error> {
        let ok = self.low_hz.is_finite()
            && self.high_hz.is_finite()
            && self.low_hz >= 0.0
            && self.low_hz < self.high_hz;
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidBand {
                name: self.name.clone(),
                low_hz: self.low_hz,
                high_hz: self.high_hz,
            })
        }
    }
}

/// alpha 8–13 Hz, beta 13–30 Hz, gamma 30–45 Hz.
pub fn default_bands() -> Vec<Band> {
    vec![
        Band::new("alpha", 8.0, 13.0),
        Band::new("beta", 13.0, 30.0),
        Band::new("gamma", 30.0, 45.0),
    ]
}

/// Distance used to build the t-SNE input affinities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Squared Euclidean distance.
    Euclidean,
    /// `1 − cos(x, y)`; zero vectors are at distance 1 from everything.
    Cosine,
}

/// t-SNE step size policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningRate {
    /// `max(n_trials / early_exaggeration / 4, 50)`.
    Auto,
    Fixed(f64),
}

/// t-SNE starting layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TsneInit {
    /// First two principal components, rescaled to a tiny spread.
    Pca,
    /// Gaussian draws from the seeded generator.
    Random,
}

/// Configuration of the feature-extraction and embedding pipeline.
///
/// ```
/// use exg_embed::AnalysisConfig;
///
/// let cfg = AnalysisConfig {
///     sfreq: 500.0,
///     tsne_perplexity: 10.0,
///     ..AnalysisConfig::default()
/// };
/// assert_eq!(cfg.nperseg, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sampling rate of the trials in Hz.
    ///
    /// Used by the synthetic source; file-backed trials carry their own rate
    /// and the extractor always uses the rate of the trial set.
    ///
    /// Default: `250.0` Hz.
    pub sfreq: f64,

    /// Bands whose power is appended per channel, in this order.
    ///
    /// Default: alpha (8–13), beta (13–30), gamma (30–45).
    pub bands: Vec<Band>,

    /// Welch segment length in samples. Trials shorter than this are
    /// rejected with [`Error::InsufficientSamples`].
    ///
    /// Default: `256`.
    pub nperseg: usize,

    /// Upper bound on the number of PCA components fed to t-SNE. The
    /// effective count is `min(pca_components, n_trials, n_features)`.
    ///
    /// Default: `50`.
    pub pca_components: usize,

    /// Target perplexity (effective number of neighbours).
    ///
    /// Clamped to `n_trials − 1` for small sets.
    ///
    /// Default: `40.0`.
    pub tsne_perplexity: f64,

    /// Total optimisation iterations, exploration phase included.
    ///
    /// Default: `1200`.
    pub tsne_iterations: usize,

    /// Default: [`Metric::Cosine`].
    pub tsne_metric: Metric,

    /// Factor applied to the input affinities during the first 250
    /// iterations.
    ///
    /// Default: `24.0`.
    pub tsne_early_exaggeration: f64,

    /// Default: [`LearningRate::Auto`].
    pub tsne_learning_rate: LearningRate,

    /// Default: [`TsneInit::Pca`].
    pub tsne_init: TsneInit,

    /// Seed for every random draw of a run (synthetic trials, random t-SNE
    /// initialisation).
    ///
    /// Default: `42`.
    pub random_seed: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sfreq: 250.0,
            bands: default_bands(),
            nperseg: 256,
            pca_components: 50,
            tsne_perplexity: 40.0,
            tsne_iterations: 1200,
            tsne_metric: Metric::Cosine,
            tsne_early_exaggeration: 24.0,
            tsne_learning_rate: LearningRate::Auto,
            tsne_init: TsneInit::Pca,
            random_seed: 42,
        }
    }
}

impl AnalysisConfig {
    /// Welch parameters used for the feature vector: Hann window, 50 %
    /// overlap.
    pub fn welch(&self) -> WelchParams {
        WelchParams::hann(self.nperseg)
    }

    /// Number of features per trial for `n_channels` channels.
    pub fn n_features(&self, n_channels: usize) -> usize {
        n_channels * (2 + self.bands.len())
    }

    /// Check bands and numeric ranges.
    pub fn validate(&self) -> std::result::Result<(), Error> {
        for band in &self.bands {
            band.validate()?;
        }
        if !(self.sfreq > 0.0) {
            return Err(Error::invalid("sfreq", format!("{} must be > 0", self.sfreq)));
        }
        if self.nperseg == 0 {
            return Err(Error::invalid("nperseg", "must be > 0"));
        }
        if self.pca_components == 0 {
            return Err(Error::invalid("pca_components", "must be > 0"));
        }
        if !(self.tsne_perplexity > 0.0) {
            return Err(Error::invalid(
                "tsne_perplexity",
                format!("{} must be > 0", self.tsne_perplexity),
            ));
        }
        if let LearningRate::Fixed(lr) = self.tsne_learning_rate {
            if !(lr > 0.0) {
                return Err(Error::invalid("tsne_learning_rate", format!("{lr} must be > 0")));
            }
        }
        Ok(())
    }

    /// Read a JSON config; absent keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Configuration of the recording-cleaning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Band-pass lower edge in Hz; `None` leaves a lowpass. Default: `Some(1.0)`.
    pub l_freq: Option<f64>,

    /// Band-pass upper edge in Hz; `None` leaves a highpass. Default: `Some(40.0)`.
    pub h_freq: Option<f64>,

    /// Line-noise frequency removed by a notch filter; `None` disables it.
    ///
    /// Must exceed half the notch width plus half its transition band
    /// (0.625 Hz). Skipped automatically when it lies at or above Nyquist.
    ///
    /// Default: `Some(50.0)`.
    pub notch_freq: Option<f64>,

    /// Independent components fitted for artefact removal, capped at the
    /// number of EEG channels. `None` disables ICA.
    ///
    /// Components are only fitted when the recording has a channel whose
    /// name contains `EOG` or `ECG`.
    ///
    /// Default: `Some(16)`.
    pub ica_components: Option<usize>,

    /// FastICA iteration cap. Default: `1000`.
    pub ica_max_iter: usize,

    /// FastICA convergence tolerance. Default: `1e-4`.
    pub ica_tol: f64,

    /// z-score above which a component's correlation with an EOG/ECG
    /// channel marks it as an artefact. Default: `3.0`.
    pub ica_threshold: f64,

    /// Seed of the FastICA initial unmixing matrix. Default: `42`.
    pub ica_seed: u64,

    /// Name of the trigger channel used to find events.
    ///
    /// Default: `"STI 014"`.
    pub stim_channel: String,

    /// Event code to epoch around. Default: `1`.
    pub event_id: i32,

    /// Epoch start relative to the event, in seconds. Default: `-0.2`.
    pub tmin: f64,

    /// Epoch end relative to the event (inclusive), in seconds.
    /// Default: `0.8`.
    pub tmax: f64,

    /// Peak-to-peak threshold; any channel above it drops the epoch.
    /// `None` keeps every epoch.
    ///
    /// Default: `None`.
    pub reject_ptp: Option<f64>,

    /// Welch segment length for the per-epoch PSD.
    ///
    /// Must not exceed the epoch length (`(tmax − tmin)·sfreq + 1`); at
    /// 250 Hz the default epoch has 251 samples.
    ///
    /// Default: `128`.
    pub psd_nperseg: usize,

    /// PSD crop range in Hz. Defaults: `1.0`, `40.0`.
    pub psd_fmin: f64,
    pub psd_fmax: f64,

    /// Bands summarised per channel, in this order.
    ///
    /// Default: alpha (8–13), beta (13–30), gamma (30–40).
    pub bands: Vec<Band>,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            l_freq: Some(1.0),
            h_freq: Some(40.0),
            notch_freq: Some(50.0),
            ica_components: Some(16),
            ica_max_iter: 1000,
            ica_tol: 1e-4,
            ica_threshold: 3.0,
            ica_seed: 42,
            stim_channel: "STI 014".to_string(),
            event_id: 1,
            tmin: -0.2,
            tmax: 0.8,
            reject_ptp: None,
            psd_nperseg: 128,
            psd_fmin: 1.0,
            psd_fmax: 40.0,
            bands: vec![
                Band::new("alpha", 8.0, 13.0),
                Band::new("beta", 13.0, 30.0),
                Band::new("gamma", 30.0, 40.0),
            ],
        }
    }
}

impl CleanConfig {
    /// Welch parameters for the per-epoch PSD: Hamming window, no overlap.
    pub fn welch(&self) -> WelchParams {
        WelchParams { nperseg: self.psd_nperseg, noverlap: 0, window: Window::Hamming }
    }

    pub fn validate(&self) -> std::result::Result<(), Error> {
        for band in &self.bands {
            band.validate()?;
        }
        match (self.l_freq, self.h_freq) {
            (Some(l), Some(h)) if !(l > 0.0 && l < h) => {
                return Err(Error::invalid(
                    "l_freq/h_freq",
                    format!("need 0 < l_freq < h_freq, got {l} / {h}"),
                ));
            }
            (Some(f), None) | (None, Some(f)) if !(f > 0.0) => {
                return Err(Error::invalid("l_freq/h_freq", format!("{f} Hz must be > 0")));
            }
            _ => {}
        }
        if let Some(f) = self.notch_freq {
            let min = NOTCH_WIDTH / 2.0 + NOTCH_TRANS_BW / 2.0;
            if !(f > min) {
                return Err(Error::invalid("notch_freq", format!("{f} Hz must be > {min} Hz")));
            }
        }
        if self.ica_components == Some(0) {
            return Err(Error::invalid("ica_components", "must be > 0"));
        }
        if self.ica_max_iter == 0 {
            return Err(Error::invalid("ica_max_iter", "must be > 0"));
        }
        if !(self.ica_tol > 0.0) {
            return Err(Error::invalid("ica_tol", format!("{} must be > 0", self.ica_tol)));
        }
        if !(self.ica_threshold > 0.0) {
            return Err(Error::invalid("ica_threshold", format!("{} must be > 0", self.ica_threshold)));
        }
        if !(self.tmin < self.tmax) {
            return Err(Error::invalid("tmin/tmax", format!("{} >= {}", self.tmin, self.tmax)));
        }
        if self.psd_fmin >= self.psd_fmax {
            return Err(Error::invalid(
                "psd_fmin/psd_fmax",
                format!("{} >= {}", self.psd_fmin, self.psd_fmax),
            ));
        }
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

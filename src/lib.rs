//! # exg-embed: EEG band-power features and 2-D embeddings
//!
//! `exg-embed` turns multi-channel EEG trials into per-trial band-power
//! feature vectors and projects them onto a 2-D map (PCA, then t-SNE) in
//! which trials with similar spectral content land close together. A
//! second pipeline cleans continuous recordings into event-locked epochs,
//! evoked responses and averaged spectra.
//!
//! ## Pipeline overview
//!
//! ```text
//! TrialSource (synthetic | directory of .safetensors)
//!   │
//!   ├─ features::feature_matrix   per channel: mean, std, Welch band powers
//!   │                             → FeatureMatrix [N, C·(2+B)] + trial ids
//!   ├─ reduce::pca                min(pca_components, N, F) axes
//!   └─ reduce::tsne               exact t-SNE → Embedding [N, 2] + trial ids
//!
//! recording.safetensors
//!   │
//!   └─ clean::clean_recording     band-pass → notch → ICA → events → epochs →
//!                                 baseline → reject → evoked / PSD / band power
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use exg_embed::{extract_and_embed, AnalysisConfig, SyntheticSource, TrialSource};
//!
//! let mut source = SyntheticSource::default();
//! let trials = source.load().unwrap();
//!
//! let cfg = AnalysisConfig::default();
//! let (features, embedding) = extract_and_embed(&trials, &cfg).unwrap();
//!
//! for (id, p) in embedding.ids.iter().zip(embedding.points.rows()) {
//!     println!("{id}: ({:.2}, {:.2})", p[0], p[1]);
//! }
//! # let _ = features;
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use exg_embed::spectral::{welch, band_power, WelchParams};
//! use exg_embed::config::Band;
//!
//! let x: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.25).sin()).collect();
//! let psd = welch(&x, 250.0, WelchParams::hann(256)).unwrap();
//! let alpha = band_power(&psd.freqs, psd.density.view(), &Band::new("alpha", 8.0, 13.0));
//! ```

pub mod baseline;
pub mod clean;
pub mod config;
pub mod epoch;
pub mod error;
pub mod features;
pub mod filter;
pub mod ica;
pub mod io;
pub mod reduce;
pub mod reject;
pub mod source;
pub mod spectral;
pub mod trial;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::{default_bands, AnalysisConfig, Band, CleanConfig, LearningRate, Metric, TsneInit};

// errors
pub use error::{Error, Result};

// data model
pub use features::{extract_features, feature_matrix, feature_names, FeatureMatrix, FeatureVector};
pub use trial::{Trial, TrialSet};

// sources
pub use source::{Component, Condition, FileBackedSource, SyntheticSource, TrialSource};

// spectral
pub use spectral::{band_power, welch, Psd, Welch, WelchParams, Window};

// reduction
pub use reduce::{embed, embed_rows, Embedding, Pca, Tsne};

// cleaning run
pub use clean::{clean_directory, clean_recording, CleanReport, CleanedRecording, FailedRecording};

// io: safetensors helpers
pub use io::{write_embedding, write_features, RawData, StWriter};

/// Extract band-power features from every trial and embed them in 2-D.
///
/// # Steps
///
/// 1. Validate `cfg` (bands, Welch window, t-SNE parameters).
/// 2. Per trial and channel: mean, population std, and the Welch band
///    power of every configured band ([`feature_matrix`]).
/// 3. PCA to `min(pca_components, n_trials, n_features)` dimensions.
/// 4. Exact t-SNE to 2-D, seeded by `cfg.random_seed`.
///
/// Both outputs carry the trial ids of `set`, in the same order.
///
/// # Errors
///
/// * [`Error::InsufficientTrials`] for fewer than two trials.
/// * [`Error::Trial`] wrapping [`Error::InsufficientSamples`] when a trial
///   is shorter than `cfg.nperseg`.
/// * [`Error::InvalidBand`] / [`Error::InvalidParameter`] for a bad config.
///
/// # Examples
///
/// ```no_run
/// use exg_embed::{extract_and_embed, AnalysisConfig, SyntheticSource, TrialSource};
///
/// let set = SyntheticSource { n_trials: 20, ..Default::default() }.load().unwrap();
/// let cfg = AnalysisConfig { tsne_perplexity: 5.0, ..Default::default() };
/// let (features, embedding) = extract_and_embed(&set, &cfg).unwrap();
/// assert_eq!(features.n_trials(), 20);
/// assert_eq!(embedding.points.dim(), (20, 2));
/// ```
pub fn extract_and_embed(set: &TrialSet, cfg: &AnalysisConfig) -> Result<(FeatureMatrix, Embedding)> {
    cfg.validate()?;
    if set.len() < 2 {
        return Err(Error::InsufficientTrials(set.len()));
    }
    let features = feature_matrix(set, cfg)?;
    let embedding = embed(&features, cfg)?;
    Ok((features, embedding))
}

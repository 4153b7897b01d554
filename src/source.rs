//! Trial sources.
//!
//! A [`TrialSource`] hands the extractor an ordered [`TrialSet`]. Two
//! implementations are provided:
//!
//! - [`SyntheticSource`]: seeded sinusoids plus Gaussian noise, optionally
//!   split into named conditions.
//! - [`FileBackedSource`]: continuous recordings stored as safetensors
//!   files, cut into fixed-length trials.
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

use crate::epoch::epoch_fixed_vec;
use crate::io::RawData;
use crate::trial::{Trial, TrialSet};

/// Anything that can produce an ordered set of trials.
pub trait TrialSource {
    fn load(&mut self) -> Result<TrialSet>;
}

// ── Synthetic ─────────────────────────────────────────────────────────────────

/// One sinusoid added to every channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Component {
    pub freq_hz: f64,
    pub amplitude: f64,
}

impl Component {
    pub fn new(freq_hz: f64, amplitude: f64) -> Self {
        Self { freq_hz, amplitude }
    }
}

/// A named group of trials with its own components.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub name: String,
    pub components: Vec<Component>,
}

/// Seeded synthetic trials.
///
/// Without conditions, `n_trials` trials named `trial-{k}` are generated
/// from `components`. With conditions, each condition contributes
/// `n_trials` trials named `{condition}-{k}`, in condition order.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub n_trials: usize,
    pub n_channels: usize,
    pub n_samples: usize,
    pub sfreq: f64,
    pub components: Vec<Component>,
    pub noise_std: f64,
    pub conditions: Vec<Condition>,
    pub seed: u64,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self {
            n_trials: 100,
            n_channels: 4,
            n_samples: 1000,
            sfreq: 250.0,
            components: vec![Component::new(10.0, 1.0), Component::new(20.0, 0.5)],
            noise_std: 0.5,
            conditions: Vec::new(),
            seed: 42,
        }
    }
}

impl SyntheticSource {
    fn trial(&self, id: String, components: &[Component], noise: Normal<f64>, rng: &mut StdRng) -> Trial {
        let dt = 1.0 / self.sfreq;
        let data = Array2::from_shape_fn((self.n_channels, self.n_samples), |(_, i)| {
            let t = i as f64 * dt;
            let signal: f64 = components
                .iter()
                .map(|c| c.amplitude * (2.0 * std::f64::consts::PI * c.freq_hz * t).sin())
                .sum();
            signal + rng.sample(noise)
        });
        Trial::new(id, data, self.sfreq)
    }
}

impl TrialSource for SyntheticSource {
    fn load(&mut self) -> Result<TrialSet> {
        if !(self.sfreq > 0.0) {
            bail!("synthetic sfreq must be > 0, got {}", self.sfreq);
        }
        let noise = Normal::new(0.0, self.noise_std)
            .with_context(|| format!("synthetic noise_std must be finite and >= 0, got {}", self.noise_std))?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trials = Vec::new();
        if self.conditions.is_empty() {
            for k in 0..self.n_trials {
                trials.push(self.trial(format!("trial-{k}"), &self.components, noise, &mut rng));
            }
        } else {
            for cond in &self.conditions {
                for k in 0..self.n_trials {
                    let id = format!("{}-{k}", cond.name);
                    trials.push(self.trial(id, &cond.components, noise, &mut rng));
                }
            }
        }
        log::info!(
            "synthetic source: {} trials × {} ch × {} samples @ {} Hz",
            trials.len(),
            self.n_channels,
            self.n_samples,
            self.sfreq
        );
        Ok(TrialSet::new(trials)?)
    }
}

// ── File-backed ───────────────────────────────────────────────────────────────

/// Recordings from a directory of `.safetensors` files, each cut into
/// non-overlapping trials of `trial_samples` (trailing samples dropped).
///
/// Trial ids are `{file_stem}#{k}`. Files that cannot be read, that yield
/// no complete trial, or whose sample rate or channel count differ from
/// the first accepted file are skipped and listed in [`skipped`].
///
/// [`skipped`]: FileBackedSource::skipped
#[derive(Debug, Clone)]
pub struct FileBackedSource {
    dir: PathBuf,
    trial_samples: usize,
    skipped: Vec<(PathBuf, String)>,
}

impl FileBackedSource {
    pub fn new(dir: impl Into<PathBuf>, trial_samples: usize) -> Self {
        Self { dir: dir.into(), trial_samples, skipped: Vec::new() }
    }

    /// Files skipped by the last [`load`](TrialSource::load), with the reason.
    pub fn skipped(&self) -> &[(PathBuf, String)] {
        &self.skipped
    }

    fn skip(&mut self, path: &Path, reason: String) {
        log::warn!("skipping {}: {reason}", path.display());
        self.skipped.push((path.to_path_buf(), reason));
    }
}

/// Sorted `.safetensors` files of `dir`.
pub fn safetensors_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "safetensors"))
        .collect();
    files.sort();
    Ok(files)
}

/// File stem used as recording id.
pub fn recording_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl TrialSource for FileBackedSource {
    fn load(&mut self) -> Result<TrialSet> {
        if self.trial_samples == 0 {
            bail!("trial_samples must be > 0");
        }
        self.skipped.clear();
        let files = safetensors_files(&self.dir)?;

        let mut trials = Vec::new();
        let mut shape: Option<(f64, usize)> = None;
        for path in files {
            let raw = match RawData::load(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    self.skip(&path, format!("{e:#}"));
                    continue;
                }
            };
            if let Some((sfreq, n_ch)) = shape {
                if (raw.sfreq - sfreq).abs() > 1e-9 || raw.data.nrows() != n_ch {
                    self.skip(
                        &path,
                        format!(
                            "{} ch @ {} Hz, expected {n_ch} ch @ {sfreq} Hz",
                            raw.data.nrows(),
                            raw.sfreq
                        ),
                    );
                    continue;
                }
            }
            let blocks = epoch_fixed_vec(raw.data.view(), self.trial_samples);
            if blocks.is_empty() {
                self.skip(
                    &path,
                    format!("{} samples, need {}", raw.data.ncols(), self.trial_samples),
                );
                continue;
            }
            shape.get_or_insert((raw.sfreq, raw.data.nrows()));
            let stem = recording_id(&path);
            log::debug!("{}: {} trials", path.display(), blocks.len());
            for (k, block) in blocks.into_iter().enumerate() {
                trials.push(Trial::new(format!("{stem}#{k}"), block, raw.sfreq));
            }
        }

        log::info!(
            "file source {}: {} trials, {} files skipped",
            self.dir.display(),
            trials.len(),
            self.skipped.len()
        );
        TrialSet::new(trials).with_context(|| format!("no usable trials in {}", self.dir.display()))
    }
}

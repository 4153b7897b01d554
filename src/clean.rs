//! Recording-cleaning run.
//!
//! ```text
//! recording.safetensors  [C+stim, T]
//!   │
//!   ├─ drop stim channel      (kept aside for event detection)
//!   ├─ band-pass FIR          l_freq .. h_freq (highpass / lowpass with one edge)
//!   ├─ notch FIR              notch_freq (skipped at/above Nyquist)
//!   ├─ ICA                    drop components tracking EOG / ECG channels
//!   ├─ find_events            rising steps on the stim channel
//!   ├─ epoch_events           [tmin, tmax] around event_id onsets
//!   ├─ baseline               pre-stimulus mean removed
//!   ├─ reject                 peak-to-peak threshold
//!   ├─ evoked                 mean over kept epochs
//!   ├─ Welch PSD              per epoch, averaged, cropped to [psd_fmin, psd_fmax]
//!   └─ band power             mean density per band and channel
//! ```
//!
//! [`clean_directory`] runs every recording of a directory and keeps going
//! when one fails; the failure is recorded in the [`CleanReport`].
use std::path::Path;

use anyhow::{bail, Context};
use ndarray::{Array1, Array2, Array3, Axis};
use serde::Serialize;

use crate::baseline::{baseline_correct_inplace, evoked};
use crate::config::CleanConfig;
use crate::epoch::{epoch_events, find_events};
use crate::error::{Error, Result};
use crate::filter::{apply_fir_zero_phase, design_bandstop, design_filter};
use crate::ica::remove_artifacts;
use crate::io::{RawData, StWriter};
use crate::reject::{reject_epochs, QualityMatrix};
use crate::source::{recording_id, safetensors_files};
use crate::spectral::{band_mean_density, Psd, Welch};

/// Stop-band width of the line-noise notch, in Hz.
pub const NOTCH_WIDTH: f64 = 0.25;
/// Transition bandwidth on each side of the notch, in Hz.
pub const NOTCH_TRANS_BW: f64 = 1.0;

/// Everything derived from one recording.
#[derive(Debug, Clone)]
pub struct CleanedRecording {
    pub id: String,
    /// Names of the data channels (stim channel removed); may be empty.
    pub ch_names: Vec<String>,
    /// Independent components removed as EOG/ECG artefacts.
    pub ica_excluded: Vec<usize>,
    /// Kept epochs, `[E, C, T]`.
    pub epochs: Array3<f64>,
    /// Onset sample of every kept epoch.
    pub onsets: Vec<usize>,
    /// Verdicts for every epoch before rejection, `[C, E_all]`.
    pub quality: QualityMatrix,
    /// Evoked response, `[C, T]`.
    pub evoked: Array2<f64>,
    /// PSD frequency axis after cropping.
    pub freqs: Array1<f64>,
    /// Epoch-averaged PSD, `[C, F]`.
    pub psd: Array2<f64>,
    /// Mean density per band (rows, in config order) and channel, `[B, C]`.
    pub band_power: Array2<f64>,
}

impl CleanedRecording {
    pub fn n_channels(&self) -> usize {
        self.evoked.nrows()
    }

    /// Epoch-averaged PSD in decibels, `[C, F]`.
    pub fn psd_db(&self) -> Array2<f64> {
        let mut db = Array2::zeros(self.psd.dim());
        for (c, row) in self.psd.outer_iter().enumerate() {
            let psd = Psd { freqs: self.freqs.clone(), density: row.to_owned() };
            db.row_mut(c).assign(&psd.to_db());
        }
        db
    }
}

/// A recording that could not be cleaned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRecording {
    pub id: String,
    pub reason: String,
}

/// Outcome of a directory run.
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    /// Band names, matching the rows of every `band_power`.
    pub bands: Vec<String>,
    pub recordings: Vec<CleanedRecording>,
    pub failures: Vec<FailedRecording>,
}

#[derive(Serialize)]
struct Summary<'a> {
    recordings: Vec<RecordingSummary<'a>>,
    failures: &'a [FailedRecording],
}

#[derive(Serialize)]
struct RecordingSummary<'a> {
    id: &'a str,
    n_epochs: usize,
    ica_excluded: &'a [usize],
}

impl CleanReport {
    pub fn ids(&self) -> Vec<String> {
        self.recordings.iter().map(|r| r.id.clone()).collect()
    }

    /// Write the run's containers to `out_dir`:
    ///
    /// ```text
    /// cleaned_eeg_data.safetensors      {id}/epochs [E,C,T], {id}/onsets, {id}/quality,
    ///                                   {id}/ica_excluded
    /// erp_data.safetensors              {id} [C,T]
    /// psd_data.safetensors              {id} [C,F]
    /// psd_db_data.safetensors           {id} [C,F] in dB
    /// freqs_data.safetensors            freqs [F]
    /// frequency_band_power.safetensors  {band} [N,C], recording_ids
    /// clean_report.json                 kept ids, epochs and ICA exclusions + failures
    /// ```
    ///
    /// The array containers are skipped when no recording survived.
    pub fn write(&self, out_dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("creating {}", out_dir.display()))?;

        let summary = Summary {
            recordings: self
                .recordings
                .iter()
                .map(|r| RecordingSummary {
                    id: &r.id,
                    n_epochs: r.onsets.len(),
                    ica_excluded: &r.ica_excluded,
                })
                .collect(),
            failures: &self.failures,
        };
        let json = serde_json::to_vec_pretty(&summary)?;
        let report_path = out_dir.join("clean_report.json");
        std::fs::write(&report_path, json)
            .with_context(|| format!("writing {}", report_path.display()))?;

        let Some(first) = self.recordings.first() else {
            log::warn!("no recording survived cleaning; only {} written", report_path.display());
            return Ok(());
        };
        for r in &self.recordings {
            if r.n_channels() != first.n_channels() || r.freqs != first.freqs {
                bail!("recording '{}' is not aligned with '{}'", r.id, first.id);
            }
        }

        let mut cleaned = StWriter::new();
        let mut erp = StWriter::new();
        let mut psd = StWriter::new();
        let mut psd_db = StWriter::new();
        for r in &self.recordings {
            cleaned.add_f64_arrd(&format!("{}/epochs", r.id), &r.epochs);
            let onsets: Vec<i32> = r.onsets.iter().map(|&s| s as i32).collect();
            cleaned.add_i32(&format!("{}/onsets", r.id), &onsets, &[onsets.len()]);
            let (n_c, n_e) = r.quality.dim();
            cleaned.add_u8(&format!("{}/quality", r.id), &r.quality.codes(), &[n_c, n_e]);
            let excluded: Vec<i32> = r.ica_excluded.iter().map(|&k| k as i32).collect();
            cleaned.add_i32(&format!("{}/ica_excluded", r.id), &excluded, &[excluded.len()]);
            erp.add_f64_arr2(&r.id, &r.evoked);
            psd.add_f64_arr2(&r.id, &r.psd);
            psd_db.add_f64_arr2(&r.id, &r.psd_db());
        }
        cleaned.write(&out_dir.join("cleaned_eeg_data.safetensors"))?;
        erp.write(&out_dir.join("erp_data.safetensors"))?;
        psd.write(&out_dir.join("psd_data.safetensors"))?;
        psd_db.write(&out_dir.join("psd_db_data.safetensors"))?;

        let mut freqs = StWriter::new();
        let f = first.freqs.to_vec();
        freqs.add_f64("freqs", &f, &[f.len()]);
        freqs.write(&out_dir.join("freqs_data.safetensors"))?;

        let n_ch = first.n_channels();
        let mut bp = StWriter::new();
        for (b, name) in self.bands.iter().enumerate() {
            let rows = Array2::from_shape_fn((self.recordings.len(), n_ch), |(r, c)| {
                self.recordings[r].band_power[[b, c]]
            });
            bp.add_f64_arr2(name, &rows);
        }
        bp.add_str_list("recording_ids", &self.ids());
        bp.write(&out_dir.join("frequency_band_power.safetensors"))?;

        log::info!("wrote {} recordings to {}", self.recordings.len(), out_dir.display());
        Ok(())
    }
}

/// Clean one recording.
pub fn clean_recording(raw: &RawData, id: &str, cfg: &CleanConfig) -> Result<CleanedRecording> {
    cfg.validate()?;
    let sfreq = raw.sfreq;

    let stim_idx = raw.channel_index(&cfg.stim_channel).ok_or_else(|| {
        Error::invalid("stim_channel", format!("'{}' not found", cfg.stim_channel))
    })?;
    let keep: Vec<usize> = (0..raw.data.nrows()).filter(|&c| c != stim_idx).collect();
    let stim = raw.data.row(stim_idx).to_owned();
    let mut data = raw.data.select(Axis(0), &keep);
    let ch_names: Vec<String> = if raw.ch_names.is_empty() {
        Vec::new()
    } else {
        keep.iter().map(|&c| raw.ch_names[c].clone()).collect()
    };

    // 1. Band-pass, then line-noise notch, then ICA.
    if let Some(h) = design_filter(cfg.l_freq, cfg.h_freq, sfreq)? {
        apply_fir_zero_phase(&mut data, &h)?;
    }
    match cfg.notch_freq {
        Some(f) if f + NOTCH_WIDTH / 2.0 + NOTCH_TRANS_BW / 2.0 < sfreq / 2.0 => {
            let h = design_bandstop(f, NOTCH_WIDTH, NOTCH_TRANS_BW, sfreq)?;
            apply_fir_zero_phase(&mut data, &h)?;
        }
        Some(f) => log::debug!("{id}: notch at {f} Hz skipped (Nyquist {} Hz)", sfreq / 2.0),
        None => {}
    }
    let ica_excluded = remove_artifacts(&mut data, &ch_names, cfg)?;

    // 2. Events and epochs.
    let events = find_events(stim.view());
    let n_events = events.iter().filter(|e| e.id == cfg.event_id).count();
    if n_events == 0 {
        return Err(Error::NoEvents { channel: cfg.stim_channel.clone(), event_id: cfg.event_id });
    }
    let mut ep = epoch_events(data.view(), &events, cfg.event_id, cfg.tmin, cfg.tmax, sfreq);
    if ep.onsets.is_empty() {
        return Err(Error::NoEpochs { n_events });
    }
    baseline_correct_inplace(&mut ep.data, 0..ep.onset_index + 1);

    // 3. Rejection and evoked average.
    let (epochs, kept, quality) = reject_epochs(&ep.data, cfg.reject_ptp);
    let evoked = evoked(&epochs).ok_or(Error::NoEpochs { n_events })?;
    let onsets: Vec<usize> = kept.iter().map(|&i| ep.onsets[i]).collect();

    // 4. Epoch-averaged PSD and band summaries.
    let welch = Welch::new(sfreq, cfg.welch())?;
    let all_freqs = welch.freqs();
    let mut mean_psd = Array2::<f64>::zeros((epochs.shape()[1], all_freqs.len()));
    for epoch in epochs.outer_iter() {
        mean_psd += &welch.density_rows(epoch)?;
    }
    mean_psd /= epochs.shape()[0] as f64;

    let bins: Vec<usize> = all_freqs
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f >= cfg.psd_fmin && f <= cfg.psd_fmax)
        .map(|(i, _)| i)
        .collect();
    let freqs = all_freqs.select(Axis(0), &bins);
    let psd = mean_psd.select(Axis(1), &bins);

    let band_power = Array2::from_shape_fn((cfg.bands.len(), psd.nrows()), |(b, c)| {
        band_mean_density(&freqs, psd.row(c), &cfg.bands[b])
    });

    log::debug!(
        "{id}: {} events, {} epochs kept of {}, {} PSD bins",
        n_events,
        epochs.shape()[0],
        ep.onsets.len(),
        freqs.len()
    );
    Ok(CleanedRecording {
        id: id.to_string(),
        ch_names,
        ica_excluded,
        epochs,
        onsets,
        quality,
        evoked,
        freqs,
        psd,
        band_power,
    })
}

/// Clean every `.safetensors` recording of `dir`, in sorted order.
///
/// A recording that fails to load or clean, or whose channel count or PSD
/// axis differs from the first cleaned one, is logged and recorded as a
/// [`FailedRecording`]; the run continues.
pub fn clean_directory(dir: &Path, cfg: &CleanConfig) -> anyhow::Result<CleanReport> {
    cfg.validate()?;
    let files = safetensors_files(dir)?;
    let mut report = CleanReport {
        bands: cfg.bands.iter().map(|b| b.name.clone()).collect(),
        ..Default::default()
    };

    for path in &files {
        let id = recording_id(path);
        let outcome = RawData::load(path)
            .map_err(|e| format!("{e:#}"))
            .and_then(|raw| clean_recording(&raw, &id, cfg).map_err(|e| e.to_string()));
        let outcome = outcome.and_then(|rec| match report.recordings.first() {
            Some(first) if rec.n_channels() != first.n_channels() || rec.freqs != first.freqs => {
                Err(format!(
                    "{} channels / {} PSD bins, '{}' has {} / {}",
                    rec.n_channels(),
                    rec.freqs.len(),
                    first.id,
                    first.n_channels(),
                    first.freqs.len()
                ))
            }
            _ => Ok(rec),
        });
        match outcome {
            Ok(rec) => report.recordings.push(rec),
            Err(reason) => {
                log::warn!("{}: {reason}", path.display());
                report.failures.push(FailedRecording { id, reason });
            }
        }
    }

    log::info!(
        "cleaned {} of {} recordings in {}",
        report.recordings.len(),
        files.len(),
        dir.display()
    );
    Ok(report)
}

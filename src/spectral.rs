//! Welch power-spectral-density estimate and band integration.
//!
//! Algorithm (matches `scipy.signal.welch` with `detrend='constant'`,
//! `scaling='density'`, `average='mean'`):
//!   1. Cut the signal into segments of `nperseg` samples advancing by
//!      `nperseg − noverlap`; trailing samples that do not fill a segment
//!      are dropped.
//!   2. Remove each segment's mean, multiply by the window.
//!   3. `|FFT|² / (sfreq · Σw²)`, one-sided: every bin except DC (and the
//!      Nyquist bin for even `nperseg`) is doubled.
//!   4. Average the segment spectra.
//!
//! Signals shorter than `nperseg` are an error; the window is never shrunk
//! to fit.
use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::Band;
use crate::error::{Error, Result};

/// Taper applied to each Welch segment (periodic form).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Hann,
    Hamming,
}

impl Window {
    /// Periodic window of length `n` (DFT-even, as used for spectral
    /// estimation).
    pub fn coefficients(self, n: usize) -> Vec<f64> {
        let (a0, a1) = match self {
            Window::Hann => (0.5, 0.5),
            Window::Hamming => (0.54, 0.46),
        };
        (0..n)
            .map(|i| a0 - a1 * (2.0 * PI * i as f64 / n as f64).cos())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WelchParams {
    /// Segment length (also the FFT length).
    pub nperseg: usize,
    /// Samples shared by consecutive segments; must be `< nperseg`.
    pub noverlap: usize,
    pub window: Window,
}

impl WelchParams {
    /// Hann window with 50 % overlap (the scipy defaults).
    pub fn hann(nperseg: usize) -> Self {
        Self { nperseg, noverlap: nperseg / 2, window: Window::Hann }
    }
}

/// One-sided power spectral density.
#[derive(Debug, Clone, PartialEq)]
pub struct Psd {
    /// Bin frequencies in Hz, `k · sfreq / nperseg`.
    pub freqs: Array1<f64>,
    /// Density in `unit² / Hz`, same length as `freqs`.
    pub density: Array1<f64>,
}

impl Psd {
    /// Keep only the bins with `fmin <= f <= fmax`.
    pub fn crop(&self, fmin: f64, fmax: f64) -> Psd {
        let keep: Vec<usize> = band_bins(&self.freqs, fmin, fmax);
        Psd {
            freqs: keep.iter().map(|&i| self.freqs[i]).collect(),
            density: keep.iter().map(|&i| self.density[i]).collect(),
        }
    }

    /// Density in decibels, `10 · log10(p)`.
    pub fn to_db(&self) -> Array1<f64> {
        self.density.mapv(|p| 10.0 * p.log10())
    }
}

/// Reusable Welch estimator: the FFT plan and window are built once and
/// shared by every channel and trial of a run.
pub struct Welch {
    sfreq: f64,
    params: WelchParams,
    window: Vec<f64>,
    scale: f64,
    fft: Arc<dyn Fft<f64>>,
}

impl Welch {
    pub fn new(sfreq: f64, params: WelchParams) -> Result<Self> {
        if params.nperseg == 0 {
            return Err(Error::invalid("nperseg", "must be > 0"));
        }
        if params.noverlap >= params.nperseg {
            return Err(Error::invalid(
                "noverlap",
                format!("{} must be < nperseg ({})", params.noverlap, params.nperseg),
            ));
        }
        if !(sfreq > 0.0) {
            return Err(Error::invalid("sfreq", format!("{sfreq} must be > 0")));
        }
        let window = params.window.coefficients(params.nperseg);
        let win_power: f64 = window.iter().map(|w| w * w).sum();
        let mut planner: FftPlanner<f64> = FftPlanner::new();
        let fft = planner.plan_fft_forward(params.nperseg);
        Ok(Self { sfreq, params, window, scale: 1.0 / (sfreq * win_power), fft })
    }

    pub fn params(&self) -> WelchParams {
        self.params
    }

    /// Frequency axis shared by every estimate of this estimator.
    pub fn freqs(&self) -> Array1<f64> {
        let n = self.params.nperseg;
        Array1::from_shape_fn(n / 2 + 1, |k| k as f64 * self.sfreq / n as f64)
    }

    /// PSD of one channel.
    pub fn psd(&self, x: ArrayView1<f64>) -> Result<Psd> {
        Ok(Psd { freqs: self.freqs(), density: self.density(x)? })
    }

    /// Density of one channel (no frequency axis).
    pub fn density(&self, x: ArrayView1<f64>) -> Result<Array1<f64>> {
        let n = x.len();
        let nperseg = self.params.nperseg;
        if n < nperseg {
            return Err(Error::InsufficientSamples { needed: nperseg, got: n });
        }
        let step = nperseg - self.params.noverlap;
        let n_seg = (n - self.params.noverlap) / step;
        let n_freqs = nperseg / 2 + 1;

        let mut acc = vec![0.0_f64; n_freqs];
        let mut buf = vec![Complex::<f64>::default(); nperseg];
        for seg in 0..n_seg {
            let start = seg * step;
            let segment = x.slice(ndarray::s![start..start + nperseg]);
            let mean = segment.sum() / nperseg as f64;
            for ((b, &v), &w) in buf.iter_mut().zip(segment.iter()).zip(&self.window) {
                *b = Complex { re: (v - mean) * w, im: 0.0 };
            }
            self.fft.process(&mut buf);
            for (a, c) in acc.iter_mut().zip(&buf[..n_freqs]) {
                *a += c.norm_sqr();
            }
        }

        let inv_seg = 1.0 / n_seg as f64;
        let mut density = Array1::from_shape_fn(n_freqs, |k| acc[k] * self.scale * inv_seg);
        // One-sided: fold negative frequencies, except DC and even Nyquist.
        let last = if nperseg % 2 == 0 { n_freqs - 1 } else { n_freqs };
        for k in 1..last {
            density[k] *= 2.0;
        }
        Ok(density)
    }

    /// PSD of every row of `data` (`[C, T]`) → `[C, F]`.
    pub fn density_rows(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        let n_freqs = self.params.nperseg / 2 + 1;
        let mut out = Array2::zeros((data.nrows(), n_freqs));
        for (ch, row) in data.rows().into_iter().enumerate() {
            out.row_mut(ch).assign(&self.density(row)?);
        }
        Ok(out)
    }
}

/// One-shot Welch estimate.
pub fn welch(x: &[f64], sfreq: f64, params: WelchParams) -> Result<Psd> {
    Welch::new(sfreq, params)?.psd(ArrayView1::from(x))
}

/// Band power: trapezoidal integral of the PSD over the bins with
/// `low_hz <= f <= high_hz`.
///
/// With fewer than two bins in the band (band narrower than the frequency
/// resolution) the integral is defined as `0.0`.
pub fn band_power(freqs: &Array1<f64>, density: ArrayView1<f64>, band: &Band) -> f64 {
    let idx = band_bins(freqs, band.low_hz, band.high_hz);
    idx.windows(2)
        .map(|w| {
            let (a, b) = (w[0], w[1]);
            0.5 * (density[a] + density[b]) * (freqs[b] - freqs[a])
        })
        .sum()
}

/// Mean density over the bins of `band`; `0.0` when no bin falls inside.
pub fn band_mean_density(freqs: &Array1<f64>, density: ArrayView1<f64>, band: &Band) -> f64 {
    let idx = band_bins(freqs, band.low_hz, band.high_hz);
    if idx.is_empty() {
        return 0.0;
    }
    idx.iter().map(|&i| density[i]).sum::<f64>() / idx.len() as f64
}

fn band_bins(freqs: &Array1<f64>, fmin: f64, fmax: f64) -> Vec<usize> {
    freqs
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f >= fmin && f <= fmax)
        .map(|(i, _)| i)
        .collect()
}

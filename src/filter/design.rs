//! Windowed-sinc FIR design (Hamming window, `firwin` style).
//!
//! Transition bandwidths follow the MNE "auto" rules:
//!   • lower edge  `l_tb = min(max(0.25 · l, 2), l)`
//!   • upper edge  `h_tb = min(max(0.25 · h, 2), sfreq / 2 − h)`
//!   • length      `ceil(3.3 / min_tb · sfreq)`, rounded up to odd
//!
//! Each cutoff is placed at the midpoint of its transition band. Band-pass
//! is the difference of two lowpasses, band-stop its spectral inversion.
use std::f64::consts::PI;

use crate::error::{Error, Result};

/// Transition bandwidth for a lower (highpass) edge at `l_freq`.
pub fn auto_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// Transition bandwidth for an upper (lowpass) edge at `h_freq`.
pub fn auto_trans_bandwidth_high(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Number of FIR taps for a given transition bandwidth, always odd.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

fn check_edge(name: &'static str, freq: f64, sfreq: f64) -> Result<()> {
    if freq > 0.0 && freq < sfreq / 2.0 {
        Ok(())
    } else {
        Err(Error::invalid(name, format!("{freq} Hz must lie in (0, {}) Hz", sfreq / 2.0)))
    }
}

/// Zero-phase highpass at `l_freq`.
pub fn design_highpass(l_freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    check_edge("l_freq", l_freq, sfreq)?;
    let tb = auto_trans_bandwidth(l_freq);
    let n = auto_filter_length(tb, sfreq);
    Ok(firwin(n, l_freq - tb / 2.0, sfreq, false))
}

/// Zero-phase lowpass at `h_freq`.
pub fn design_lowpass(h_freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    check_edge("h_freq", h_freq, sfreq)?;
    let tb = auto_trans_bandwidth_high(h_freq, sfreq);
    let n = auto_filter_length(tb, sfreq);
    Ok(firwin(n, h_freq + tb / 2.0, sfreq, true))
}

/// Zero-phase band-pass keeping `[l_freq, h_freq]`.
pub fn design_bandpass(l_freq: f64, h_freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    check_edge("l_freq", l_freq, sfreq)?;
    check_edge("h_freq", h_freq, sfreq)?;
    if l_freq >= h_freq {
        return Err(Error::invalid("l_freq", format!("{l_freq} Hz >= h_freq {h_freq} Hz")));
    }
    let l_tb = auto_trans_bandwidth(l_freq);
    let h_tb = auto_trans_bandwidth_high(h_freq, sfreq);
    let n = auto_filter_length(l_tb.min(h_tb), sfreq);
    let upper = firwin(n, h_freq + h_tb / 2.0, sfreq, true);
    let lower = firwin(n, l_freq - l_tb / 2.0, sfreq, true);
    Ok(upper.iter().zip(&lower).map(|(u, l)| u - l).collect())
}

/// Filter for optional edges: band-pass with both, highpass with only
/// `l_freq`, lowpass with only `h_freq`, `None` with neither.
pub fn design_filter(l_freq: Option<f64>, h_freq: Option<f64>, sfreq: f64) -> Result<Option<Vec<f64>>> {
    match (l_freq, h_freq) {
        (Some(l), Some(h)) => design_bandpass(l, h, sfreq).map(Some),
        (Some(l), None) => design_highpass(l, sfreq).map(Some),
        (None, Some(h)) => design_lowpass(h, sfreq).map(Some),
        (None, None) => Ok(None),
    }
}

/// Zero-phase band-stop removing `[freq − width/2, freq + width/2]`, with
/// `trans_bw` of transition on each side (notch filter).
pub fn design_bandstop(freq: f64, width: f64, trans_bw: f64, sfreq: f64) -> Result<Vec<f64>> {
    let lo = freq - width / 2.0 - trans_bw / 2.0;
    let hi = freq + width / 2.0 + trans_bw / 2.0;
    check_edge("notch", lo, sfreq)?;
    check_edge("notch", hi, sfreq)?;
    if !(trans_bw > 0.0) {
        return Err(Error::invalid("trans_bw", format!("{trans_bw} must be > 0")));
    }
    let n = auto_filter_length(trans_bw, sfreq);
    let below = firwin(n, lo, sfreq, true);
    let above = firwin(n, hi, sfreq, true);
    // delta − (above − below)
    let mut h: Vec<f64> = above.iter().zip(&below).map(|(a, b)| b - a).collect();
    h[n / 2] += 1.0;
    Ok(h)
}

/// Design a lowpass (`pass_zero = true`) or highpass FIR with cutoff
/// `cutoff_hz` (the −6 dB point). `n` must be odd.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64, pass_zero: bool) -> Vec<f64> {
    assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let fc = cutoff_hz / (sfreq / 2.0);

    let win = hamming(n);
    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    // Unit DC gain.
    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);

    if !pass_zero {
        h.iter_mut().for_each(|v| *v = -*v);
        h[n / 2] += 1.0;
    }
    h
}

/// Symmetric Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Gain of `h` at `freq` Hz (magnitude of the DTFT).
pub fn gain_at(h: &[f64], freq: f64, sfreq: f64) -> f64 {
    let w = 2.0 * PI * freq / sfreq;
    let (re, im) = h.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, &c)| {
        (re + c * (w * k as f64).cos(), im - c * (w * k as f64).sin())
    });
    (re * re + im * im).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_length_is_odd() {
        for l_freq in [0.5, 1.0, 2.0, 5.0] {
            let n = auto_filter_length(auto_trans_bandwidth(l_freq), 250.0);
            assert!(n % 2 == 1, "N={n} is even for l_freq={l_freq}");
        }
    }

    #[test]
    fn highpass_known_length_256hz() {
        // 0.5 Hz at 256 Hz → 1691 taps.
        let h = design_highpass(0.5, 256.0).unwrap();
        assert_eq!(h.len(), 1691);
        let s: f64 = h.iter().sum();
        assert!(s.abs() < 1e-9, "highpass sum = {s}");
    }

    #[test]
    fn bandpass_gains() {
        let sfreq = 250.0;
        let h = design_bandpass(1.0, 40.0, sfreq).unwrap();
        // 1 Hz lower edge → 1 Hz transition → 825 taps.
        assert_eq!(h.len(), 825);
        assert!(gain_at(&h, 0.0, sfreq) < 1e-3);
        approx::assert_abs_diff_eq!(gain_at(&h, 10.0, sfreq), 1.0, epsilon = 1e-2);
        assert!(gain_at(&h, 60.0, sfreq) < 1e-2);
    }

    #[test]
    fn bandpass_is_symmetric() {
        let h = design_bandpass(8.0, 13.0, 250.0).unwrap();
        let n = h.len();
        for i in 0..n / 2 {
            approx::assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn notch_removes_line_frequency() {
        let sfreq = 250.0;
        let h = design_bandstop(50.0, 0.25, 1.0, sfreq).unwrap();
        assert!(gain_at(&h, 50.0, sfreq) < 1e-2);
        approx::assert_abs_diff_eq!(gain_at(&h, 10.0, sfreq), 1.0, epsilon = 1e-2);
        approx::assert_abs_diff_eq!(gain_at(&h, 0.0, sfreq), 1.0, epsilon = 1e-2);
    }

    #[test]
    fn edges_outside_nyquist_are_rejected() {
        assert!(design_lowpass(130.0, 250.0).is_err());
        assert!(design_bandpass(30.0, 10.0, 250.0).is_err());
        assert!(design_highpass(0.0, 250.0).is_err());
    }

    #[test]
    fn single_edge_selects_highpass_or_lowpass() {
        let sfreq = 250.0;
        let lp = design_filter(None, Some(40.0), sfreq).unwrap().unwrap();
        approx::assert_abs_diff_eq!(gain_at(&lp, 0.0, sfreq), 1.0, epsilon = 1e-2);
        assert!(gain_at(&lp, 80.0, sfreq) < 1e-2);

        let hp = design_filter(Some(1.0), None, sfreq).unwrap().unwrap();
        assert!(gain_at(&hp, 0.0, sfreq) < 1e-3);
        approx::assert_abs_diff_eq!(gain_at(&hp, 100.0, sfreq), 1.0, epsilon = 1e-2);

        assert!(design_filter(None, None, sfreq).unwrap().is_none());
    }

    #[test]
    fn lowpass_dc_gain_unity() {
        let h = firwin(101, 10.0, 256.0, true);
        let dc: f64 = h.iter().sum();
        approx::assert_abs_diff_eq!(dc, 1.0, epsilon = 1e-12);
    }
}

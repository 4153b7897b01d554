//! Overlap-add zero-phase FIR convolution.
//!
//! Zero phase is obtained by shifting the output left by `(N-1)/2` samples
//! (the kernels of [`super::design`] are symmetric), not by filtfilt. Edge
//! transients are suppressed with reflect-limited padding of `N-1` samples
//! on each side.
use ndarray::{Array2, ArrayView1};
use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::{Error, Result};

/// Filter every channel of `data` (`[C, T]`) in place.
pub fn apply_fir_zero_phase(data: &mut Array2<f64>, h: &[f64]) -> Result<()> {
    for mut row in data.rows_mut() {
        let filtered = filter_1d(row.view(), h)?;
        row.assign(&ArrayView1::from(&filtered));
    }
    Ok(())
}

/// Filter one signal; the output has the input's length.
pub fn filter_1d(x: ArrayView1<f64>, h: &[f64]) -> Result<Vec<f64>> {
    let n_x = x.len();
    let n_h = h.len();
    if n_h % 2 == 0 {
        return Err(Error::invalid("h", format!("kernel length {n_h} must be odd")));
    }
    if n_x == 0 {
        return Ok(vec![]);
    }

    let shift = (n_h - 1) / 2;
    let n_edge = n_h - 1;
    let x_ext = reflect_limited_pad(x, n_edge, n_edge);
    let n_ext = x_ext.len();

    let n_fft = choose_fft_len(n_h, n_ext);
    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft_fwd = planner.plan_fft_forward(n_fft);
    let fft_inv = planner.plan_fft_inverse(n_fft);

    let mut h_fft = zero_padded(h, n_fft);
    fft_fwd.process(&mut h_fft);

    let n_seg = n_fft - n_h + 1;
    let n_segments = n_ext.div_ceil(n_seg);
    let inv_scale = 1.0 / n_fft as f64;
    let mut x_filtered = vec![0.0_f64; n_ext];

    for seg_idx in 0..n_segments {
        let start = seg_idx * n_seg;
        let stop = (start + n_seg).min(n_ext);

        let mut buf = zero_padded(&x_ext[start..stop], n_fft);
        fft_fwd.process(&mut buf);
        for (b, &hf) in buf.iter_mut().zip(h_fft.iter()) {
            *b *= hf;
        }
        fft_inv.process(&mut buf);

        // Overlap-add, shifted left by the group delay.
        let out_start = start.saturating_sub(shift);
        let out_end = (out_start + n_fft).min(n_ext);
        let prod_start = shift.saturating_sub(start);
        for (o, p) in (out_start..out_end).zip(prod_start..n_fft) {
            x_filtered[o] += buf[p].re * inv_scale;
        }
    }

    Ok(x_filtered[n_edge..n_edge + n_x].to_vec())
}

/// Reflect-limited padding: odd reflection about the end samples,
/// zero-filled where the signal is too short to reflect.
fn reflect_limited_pad(x: ArrayView1<f64>, n_l: usize, n_r: usize) -> Vec<f64> {
    let n = x.len();
    let actual_l = n_l.min(n - 1);
    let actual_r = n_r.min(n - 1);

    let mut out = Vec::with_capacity(n_l + n + n_r);
    out.extend(std::iter::repeat(0.0).take(n_l - actual_l));
    for i in (1..=actual_l).rev() {
        out.push(2.0 * x[0] - x[i]);
    }
    out.extend(x.iter().copied());
    let last = x[n - 1];
    for i in 1..=actual_r {
        out.push(2.0 * last - x[n - 1 - i]);
    }
    out.extend(std::iter::repeat(0.0).take(n_r - actual_r));
    out
}

/// Power-of-two FFT length minimising
/// `ceil(n_x / (N − n_h + 1)) · N · (log2 N + 1) + 4e-5 · N · n_x`.
fn choose_fft_len(n_h: usize, n_x: usize) -> usize {
    let min_fft = 2 * n_h - 1;
    let max_pow = (n_x as f64).log2().ceil() as u32 + 1;
    let min_pow = (min_fft as f64).log2().ceil() as u32;

    let mut best_n = 1_usize << max_pow.max(min_pow);
    let mut best_cost = f64::INFINITY;
    for pow in min_pow..=max_pow {
        let n = 1_usize << pow;
        if n < min_fft {
            continue;
        }
        let n_seg = (n - n_h + 1) as f64;
        let cost = (n_x as f64 / n_seg).ceil() * n as f64 * (pow as f64 + 1.0)
            + 4e-5 * n as f64 * n_x as f64;
        if cost < best_cost {
            best_cost = cost;
            best_n = n;
        }
    }
    best_n
}

fn zero_padded(x: &[f64], n: usize) -> Vec<Complex<f64>> {
    x.iter()
        .map(|&v| Complex { re: v, im: 0.0 })
        .chain(std::iter::repeat(Complex::default()))
        .take(n)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::design::{design_bandpass, design_highpass};
    use std::f64::consts::PI;

    #[test]
    fn filter_preserves_length() {
        let x = ndarray::Array1::from_shape_fn(1000, |i| (i as f64 / 100.0).sin());
        let h = design_highpass(1.0, 250.0).unwrap();
        assert_eq!(filter_1d(x.view(), &h).unwrap().len(), 1000);
    }

    #[test]
    fn highpass_removes_dc() {
        let x = ndarray::Array1::from_elem(4096, 1.0);
        let h = design_highpass(0.5, 256.0).unwrap();
        let y = filter_1d(x.view(), &h).unwrap();
        let n_h = h.len();
        let max_val = y[n_h..y.len() - n_h].iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(max_val < 1e-3, "DC not removed: max={max_val}");
    }

    #[test]
    fn bandpass_keeps_alpha_drops_drift() {
        let sfreq = 250.0;
        let n = 30 * 250;
        let x = ndarray::Array1::from_shape_fn(n, |i| {
            let t = i as f64 / sfreq;
            (2.0 * PI * 10.0 * t).sin() + 3.0 + 2.0 * (2.0 * PI * 0.1 * t).sin()
        });
        let h = design_bandpass(1.0, 40.0, sfreq).unwrap();
        let y = filter_1d(x.view(), &h).unwrap();
        let guard = h.len();
        let interior = &y[guard..n - guard];
        let rms = (interior.iter().map(|v| v * v).sum::<f64>() / interior.len() as f64).sqrt();
        approx::assert_abs_diff_eq!(rms, 0.5_f64.sqrt(), epsilon = 0.02);
    }

    #[test]
    fn even_kernel_is_rejected() {
        let x = ndarray::Array1::zeros(10);
        assert!(filter_1d(x.view(), &[0.5, 0.5]).is_err());
    }

    #[test]
    fn reflect_limited_left_pad() {
        let x = ndarray::arr1(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let padded = reflect_limited_pad(x.view(), 3, 0);
        assert_eq!(&padded[..3], &[-2.0, -1.0, 0.0]);
        assert_eq!(&padded[3..], &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn short_signal_pads_with_zeros() {
        let x = ndarray::arr1(&[1.0, 2.0]);
        let padded = reflect_limited_pad(x.view(), 3, 3);
        assert_eq!(padded, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 0.0, 0.0]);
    }
}

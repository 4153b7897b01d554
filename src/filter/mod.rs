//! FIR filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc highpass / lowpass / band-pass /
//!   band-stop design with MNE-style automatic transition bandwidths.
//! - [`apply`]: overlap-add zero-phase convolution.

pub mod apply;
pub mod design;

pub use apply::{apply_fir_zero_phase, filter_1d};
pub use design::{
    auto_filter_length, auto_trans_bandwidth, auto_trans_bandwidth_high, design_bandpass,
    design_bandstop, design_filter, design_highpass, design_lowpass, firwin, gain_at, hamming,
};

//! # Signal
//!
//! PPG signal processing primitives.
//!
//! Responsibilities:
//! - Butterworth band-pass design (second-order sections) and zero-phase filtering
//! - Sampling-rate estimation from timestamps
//! - Elgendi systolic peak detection and template-match beat quality
//! - Peak-to-peak intervals, outlier cleaning
//! - Time-domain HRV metrics, windowing and overall averages
//!
//! All routines are synchronous and allocation-bounded by their input.

mod error;
mod filter;
mod hrv;
mod peaks;
mod ppi;
mod quality;
mod rate;

pub use error::{Result, SignalError};
pub use filter::{bandpass_filter, Biquad, ButterworthBandpass};
pub use hrv::{hrv_metrics, hrv_windows, overall_metrics};
pub use peaks::{boxcar_smooth, clean_ppg, find_peaks_elgendi, local_maxima, prominence, ElgendiConfig};
pub use ppi::{clean_ppi, compute_ppi, Peak};
pub use quality::{beat_quality, pearson};
pub use rate::{estimate_sampling_rate, millis_between, seconds_between, MAX_SAMPLE_GAP_SECS};

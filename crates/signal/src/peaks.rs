//! Systolic peak detection (Elgendi et al., 2013).
//!
//! Two moving averages of the clipped, squared signal mark "blocks of
//! interest" where the short (peak-scale) average exceeds the long
//! (beat-scale) average plus an offset. The most prominent local maximum of
//! each wide-enough block is a peak, subject to a minimum spacing.

use crate::error::Result;
use crate::filter::ButterworthBandpass;

/// Elgendi detector parameters (seconds, except `beat_offset`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElgendiConfig {
    pub peak_window: f64,
    pub beat_window: f64,
    pub beat_offset: f64,
    pub min_delay: f64,
}

impl Default for ElgendiConfig {
    fn default() -> Self {
        Self {
            peak_window: 0.111,
            beat_window: 0.667,
            beat_offset: 0.02,
            min_delay: 0.3,
        }
    }
}

/// Band-pass the channel before peak detection.
pub fn clean_ppg(
    signal: &[f64],
    sample_rate_hz: f64,
    lowcut_hz: f64,
    highcut_hz: f64,
    order: usize,
) -> Result<Vec<f64>> {
    ButterworthBandpass::design(lowcut_hz, highcut_hz, sample_rate_hz, order)?.filtfilt(signal)
}

/// Peak sample indices in ascending order.
pub fn find_peaks_elgendi(signal: &[f64], sample_rate_hz: f64, config: &ElgendiConfig) -> Vec<usize> {
    if signal.len() < 3 {
        return Vec::new();
    }

    let squared: Vec<f64> = signal.iter().map(|v| v.max(0.0).powi(2)).collect();
    let peak_kernel = samples(config.peak_window, sample_rate_hz);
    let beat_kernel = samples(config.beat_window, sample_rate_hz);

    let ma_peak = boxcar_smooth(&squared, peak_kernel);
    let ma_beat = boxcar_smooth(&squared, beat_kernel);
    let offset = config.beat_offset * squared.iter().sum::<f64>() / squared.len() as f64;

    let waves: Vec<bool> = ma_peak
        .iter()
        .zip(&ma_beat)
        .map(|(p, b)| *p > b + offset)
        .collect();

    let begins: Vec<usize> = (0..waves.len() - 1)
        .filter(|&i| !waves[i] && waves[i + 1])
        .collect();
    let Some(&first_begin) = begins.first() else {
        return Vec::new();
    };
    let ends: Vec<usize> = (0..waves.len() - 1)
        .filter(|&i| waves[i] && !waves[i + 1])
        .filter(|&i| i > first_begin)
        .collect();

    let min_len = samples(config.peak_window, sample_rate_hz);
    let min_delay = samples(config.min_delay, sample_rate_hz);

    let mut peaks: Vec<usize> = Vec::new();
    let mut last = 0usize;
    for (&begin, &end) in begins.iter().zip(&ends) {
        if end < begin || end - begin < min_len {
            continue;
        }
        let block = &signal[begin..end];
        let Some(local) = most_prominent_peak(block) else {
            continue;
        };
        let peak = begin + local;
        if peak > last && peak - last > min_delay {
            peaks.push(peak);
            last = peak;
        }
    }
    peaks
}

fn samples(seconds: f64, sample_rate_hz: f64) -> usize {
    (seconds * sample_rate_hz).round().max(0.0) as usize
}

/// Centered moving average; edges are padded with the first/last value.
///
/// Even sizes lean one sample to the past.
pub fn boxcar_smooth(signal: &[f64], size: usize) -> Vec<f64> {
    let n = signal.len();
    if size <= 1 || n == 0 {
        return signal.to_vec();
    }

    let left = size / 2;
    let right = (size - 1) / 2;
    let at = |i: isize| signal[i.clamp(0, n as isize - 1) as usize];

    let mut window: f64 = (-(left as isize)..=right as isize).map(at).sum();
    let mut out = Vec::with_capacity(n);
    out.push(window / size as f64);
    for i in 1..n as isize {
        window += at(i + right as isize) - at(i - 1 - left as isize);
        out.push(window / size as f64);
    }
    out
}

/// Local maxima (plateaus resolve to their middle sample), excluding edges.
pub fn local_maxima(data: &[f64]) -> Vec<usize> {
    let mut maxima = Vec::new();
    let n = data.len();
    let mut i = 1;
    while i + 1 < n {
        if data[i - 1] < data[i] {
            let mut ahead = i + 1;
            while ahead + 1 < n && data[ahead] == data[i] {
                ahead += 1;
            }
            if data[ahead] < data[i] {
                maxima.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    maxima
}

/// Topographic prominence of a local maximum within `data`.
pub fn prominence(data: &[f64], peak: usize) -> f64 {
    let height = data[peak];

    let mut left_min = height;
    for &v in data[..peak].iter().rev() {
        if v > height {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = height;
    for &v in &data[peak + 1..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}

fn most_prominent_peak(block: &[f64]) -> Option<usize> {
    local_maxima(block)
        .into_iter()
        .map(|i| (i, prominence(block, i)))
        .fold(None, |best: Option<(usize, f64)>, (i, p)| match best {
            Some((_, bp)) if bp >= p => best,
            _ => Some((i, p)),
        })
        .map(|(i, _)| i)
}

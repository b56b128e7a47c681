//! Sampling-rate estimation from sample timestamps.

use chrono::{DateTime, Utc};

use crate::error::{Result, SignalError};

/// Successive differences at or above this (seconds) are recording gaps
pub const MAX_SAMPLE_GAP_SECS: f64 = 10.0;

/// Average sampling rate in Hz: `1 / mean(diff)` over differences below 10 s.
///
/// # Errors
/// `SamplingRate` when fewer than two timestamps remain usable or the mean
/// difference is not positive.
pub fn estimate_sampling_rate(times: &[DateTime<Utc>]) -> Result<f64> {
    let diffs: Vec<f64> = times
        .windows(2)
        .map(|w| seconds_between(w[0], w[1]))
        .filter(|d| *d < MAX_SAMPLE_GAP_SECS)
        .collect();

    if diffs.is_empty() {
        return Err(SignalError::SamplingRate(format!(
            "no usable timestamp differences among {} samples",
            times.len()
        )));
    }

    let mean = diffs.iter().sum::<f64>() / diffs.len() as f64;
    if mean <= 0.0 || !mean.is_finite() {
        return Err(SignalError::SamplingRate(format!(
            "mean sample interval is {mean} s"
        )));
    }
    Ok(1.0 / mean)
}

/// Signed seconds from `a` to `b` with nanosecond resolution
pub fn seconds_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    millis_between(a, b) / 1e3
}

/// Signed milliseconds from `a` to `b` with nanosecond resolution
pub fn millis_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    let delta = b - a;
    delta
        .num_nanoseconds()
        .map(|ns| ns as f64 / 1e6)
        .unwrap_or_else(|| delta.num_milliseconds() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn series(step_ms: i64, n: usize) -> Vec<DateTime<Utc>> {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        (0..n)
            .map(|i| start + TimeDelta::milliseconds(step_ms * i as i64))
            .collect()
    }

    #[test]
    fn test_uniform_series() {
        let rate = estimate_sampling_rate(&series(40, 100)).unwrap();
        assert!((rate - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_ignores_long_gaps() {
        let mut times = series(40, 50);
        let resume = *times.last().unwrap() + TimeDelta::minutes(30);
        times.extend((0..50).map(|i| resume + TimeDelta::milliseconds(40 * i)));
        let rate = estimate_sampling_rate(&times).unwrap();
        assert!((rate - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_sample_is_an_error() {
        assert!(estimate_sampling_rate(&series(40, 1)).is_err());
        assert!(estimate_sampling_rate(&[]).is_err());
    }

    #[test]
    fn test_identical_timestamps_are_an_error() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(matches!(
            estimate_sampling_rate(&[start, start, start]),
            Err(SignalError::SamplingRate(_))
        ));
    }
}

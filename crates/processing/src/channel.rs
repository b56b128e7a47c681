//! Signal chain for one recording: time-of-day restriction, sampling rate,
//! then per channel ambient removal, band-pass and peak detection.

use chrono::{DateTime, Utc};
use contracts::{Channel, DetectionConfig, ProcessingConfig};
use ingestion::Recording;
use metrics::counter;
use signal::{
    beat_quality, clean_ppg, estimate_sampling_rate, find_peaks_elgendi, ButterworthBandpass,
    ElgendiConfig, Peak, SignalError,
};

use crate::error::Result;

/// Apply the configured time-of-day range; without one the recording is
/// returned unchanged.
pub fn restrict_to_time_range(recording: Recording, config: &ProcessingConfig) -> Result<Recording> {
    match &config.time_range {
        Some(range) => {
            let (start, end) = range.bounds()?;
            Ok(recording.filter_time_of_day(start, end))
        }
        None => Ok(recording),
    }
}

/// Average sampling rate of the recording's timestamps
pub fn sampling_rate(recording: &Recording) -> Result<f64> {
    Ok(estimate_sampling_rate(&recording.times())?)
}

/// Ambient-corrected, band-passed channel values of `recording`.
pub fn preprocess(
    recording: &Recording,
    channel: Channel,
    config: &ProcessingConfig,
    sample_rate_hz: f64,
) -> Result<Vec<f64>> {
    let raw = recording.channel_values(channel, config.analysis.subtract_ambient);
    let filter = &config.filter;
    let filtered = ButterworthBandpass::design(
        filter.lowcut_hz,
        filter.highcut_hz,
        sample_rate_hz,
        filter.order,
    )?
    .filtfilt(&raw)?;
    Ok(filtered)
}

/// Detect systolic peaks in a preprocessed segment.
///
/// The detector runs at the whole-Hz sampling rate. `times` and `signal` are
/// parallel; each peak carries the preprocessed value as its amplitude.
pub fn detect_peaks(
    times: &[DateTime<Utc>],
    signal: &[f64],
    sample_rate_hz: f64,
    detection: &DetectionConfig,
    channel: Channel,
) -> Result<Vec<Peak>> {
    if times.len() != signal.len() {
        return Err(SignalError::LengthMismatch {
            left: times.len(),
            right: signal.len(),
        }
        .into());
    }
    let detector_rate = sample_rate_hz.floor();
    let cleaned = clean_ppg(
        signal,
        detector_rate,
        detection.clean_lowcut_hz,
        detection.clean_highcut_hz,
        detection.clean_order,
    )?;
    let indices = find_peaks_elgendi(&cleaned, detector_rate, &ElgendiConfig::default());
    let quality = beat_quality(&cleaned, &indices);

    counter!("ppg_processor_peaks_detected_total", "channel" => channel.to_string())
        .increment(indices.len() as u64);

    Ok(indices
        .iter()
        .zip(quality)
        .map(|(&i, quality)| Peak {
            time: times[i],
            amplitude: signal[i],
            quality,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use ingestion::{SyntheticConfig, SyntheticRecording};

    fn synthetic(duration_secs: f64) -> Recording {
        let synthetic = SyntheticRecording::generate(SyntheticConfig {
            duration_secs,
            ..Default::default()
        });
        let dir = tempfile::tempdir().unwrap();
        let path = synthetic.write_to_dir(dir.path()).unwrap();
        Recording::load(&path, None, Default::default()).unwrap()
    }

    #[test]
    fn test_preprocess_removes_baseline() {
        let recording = synthetic(60.0);
        let config = ProcessingConfig::default();
        let filtered = preprocess(&recording, Channel::P0, &config, 25.0).unwrap();
        assert_eq!(filtered.len(), recording.len());
        let mean = filtered.iter().sum::<f64>() / filtered.len() as f64;
        assert!(mean.abs() < 50.0, "mean {mean}");
    }

    #[test]
    fn test_detects_one_peak_per_second() {
        let recording = synthetic(60.0);
        let config = ProcessingConfig::default();
        let filtered = preprocess(&recording, Channel::P1, &config, 25.0).unwrap();
        let peaks = detect_peaks(
            &recording.times(),
            &filtered,
            25.0,
            &config.detection,
            Channel::P1,
        )
        .unwrap();

        assert!((57..=60).contains(&peaks.len()), "found {}", peaks.len());
        for pair in peaks.windows(2) {
            let gap = pair[1].time - pair[0].time;
            assert!(gap > TimeDelta::milliseconds(900) && gap < TimeDelta::milliseconds(1100));
        }
        assert!(peaks.iter().all(|p| (0.0..=1.0).contains(&p.quality)));
    }

    #[test]
    fn test_time_range_keeps_inclusive_window() {
        // 1_700_000_000 is 22:13:20 UTC
        let recording = synthetic(120.0);
        let mut config = ProcessingConfig::default();
        config.time_range = Some(contracts::TimeRange::new("22:14", "22:15"));
        let restricted = restrict_to_time_range(recording, &config).unwrap();
        assert!(restricted.len() < 120 * 25);
        let (first, last) = restricted.span().unwrap();
        assert_eq!(first.format("%H:%M").to_string(), "22:14");
        assert!(last.format("%H:%M:%S").to_string().as_str() <= "22:15:00");
        assert!((59..=60).contains(&(last - first).num_seconds()));

        config.time_range = Some(contracts::TimeRange::new("25:00", "26:00"));
        assert!(restrict_to_time_range(restricted, &config).is_err());
    }

    #[test]
    fn test_sampling_rate_of_synthetic_recording() {
        let recording = synthetic(30.0);
        let rate = sampling_rate(&recording).unwrap();
        assert!((rate - 25.0).abs() < 0.5, "rate {rate}");
    }

    #[test]
    fn test_short_segment_is_an_error() {
        let recording = synthetic(0.5);
        let values = recording.channel_values(Channel::P0, true);
        let config = ProcessingConfig::default();
        let result = detect_peaks(
            &recording.times(),
            &values,
            25.0,
            &config.detection,
            Channel::P0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_mismatched_lengths_are_rejected() {
        let recording = synthetic(10.0);
        let values = recording.channel_values(Channel::P0, true);
        let config = ProcessingConfig::default();
        let err = detect_peaks(
            &recording.times()[1..],
            &values,
            25.0,
            &config.detection,
            Channel::P0,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::ProcessingError::Signal(SignalError::LengthMismatch { .. })
        ));
    }
}

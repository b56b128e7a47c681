//! 录制文件加载
//!
//! 读取全部样本并展开时间轴，产出带绝对时间的 `TimedSample` 序列。

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveTime, Utc};
use contracts::{Channel, PpgSample, TimedSample, TimelineFormat};
use metrics::counter;
use tracing::{info, instrument};

use crate::config::MalformedPolicy;
use crate::error::Result;
use crate::reader::read_samples;
use crate::timeline;

/// 默认的录制文件名
pub const RECORDING_FILE: &str = "ppg.csv";

/// A fully loaded recording with absolute timestamps
#[derive(Debug, Clone)]
pub struct Recording {
    /// Source file
    pub path: PathBuf,

    /// Detected first-column format
    pub format: TimelineFormat,

    /// Samples in file order
    pub samples: Vec<TimedSample>,
}

impl Recording {
    /// Load a recording
    ///
    /// `info_dir` defaults to the file's parent directory and is only read for
    /// the delta format.
    #[instrument(name = "recording_load", skip(info_dir), fields(path = %path.display()))]
    pub fn load(path: &Path, info_dir: Option<&Path>, policy: MalformedPolicy) -> Result<Self> {
        let source_name = path.display().to_string();
        let samples = read_samples(path, policy)?;

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let info_dir = info_dir.unwrap_or(parent);
        let recording = Self::from_samples(path, samples, info_dir, &source_name)?;

        counter!("ppg_processor_recordings_loaded_total").increment(1);
        info!(
            samples = recording.len(),
            format = ?recording.format,
            "recording loaded"
        );
        Ok(recording)
    }

    /// Build a recording from already-parsed samples
    pub fn from_samples(
        path: impl Into<PathBuf>,
        samples: Vec<PpgSample>,
        info_dir: &Path,
        source_name: &str,
    ) -> Result<Self> {
        let (format, times) = timeline::expand(&samples, info_dir, source_name)?;
        let samples = times
            .into_iter()
            .zip(samples)
            .map(|(time, sample)| TimedSample { time, sample })
            .collect();

        Ok(Self {
            path: path.into(),
            format,
            samples,
        })
    }

    /// Sample count
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// No samples left (e.g. after time-of-day filtering)
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample timestamps
    pub fn times(&self) -> Vec<DateTime<Utc>> {
        self.samples.iter().map(|s| s.time).collect()
    }

    /// First and last timestamp
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.samples.first()?.time, self.samples.last()?.time))
    }

    /// Raw channel values, optionally minus the ambient channel
    pub fn channel_values(&self, channel: Channel, subtract_ambient: bool) -> Vec<f64> {
        self.samples
            .iter()
            .map(|s| {
                let value = s.sample.channel(channel);
                if subtract_ambient && channel.is_photodetector() {
                    (value - s.sample.ambient) as f64
                } else {
                    value as f64
                }
            })
            .collect()
    }

    /// Keep samples whose time of day lies in `start..=end`
    pub fn filter_time_of_day(&self, start: NaiveTime, end: NaiveTime) -> Self {
        let samples = self
            .samples
            .iter()
            .filter(|s| {
                let t = s.time.time();
                t >= start && t <= end
            })
            .copied()
            .collect();

        Self {
            path: self.path.clone(),
            format: self.format,
            samples,
        }
    }
}

/// Load `path`, resolving `info.txt` from `info_dir` or the file's directory.
pub fn load_recording(path: &Path, info_dir: Option<&Path>) -> Result<Recording> {
    Recording::load(path, info_dir, MalformedPolicy::default())
}

/// Load `<dir>/ppg.csv`; `Ok(None)` when the folder has no recording.
pub fn load_folder(dir: &Path, policy: MalformedPolicy) -> Result<Option<Recording>> {
    let path = dir.join(RECORDING_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    Recording::load(&path, Some(dir), policy).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestionError;

    fn write_delta_recording(dir: &Path) -> PathBuf {
        let path = dir.join(RECORDING_FILE);
        std::fs::write(
            &path,
            "499,270445,314778,266630,1042\n\
             0,270102,314364,266328,1023\n\
             0,269850,313994,266047,1057\n\
             501,269394,313184,265681,1079\n",
        )
        .unwrap();
        std::fs::write(dir.join("info.txt"), "start_time: 1700000000\n").unwrap();
        path
    }

    #[test]
    fn test_loads_delta_recording_with_info_from_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_delta_recording(dir.path());

        let recording = load_recording(&path, None).unwrap();
        assert_eq!(recording.len(), 4);
        assert_eq!(
            recording.format,
            TimelineFormat::Delta {
                start_time_s: 1_700_000_000
            }
        );
        let (first, last) = recording.span().unwrap();
        assert_eq!((last - first).num_milliseconds(), 1000);
    }

    #[test]
    fn test_channel_values_subtract_ambient() {
        let dir = tempfile::tempdir().unwrap();
        let recording = load_recording(&write_delta_recording(dir.path()), None).unwrap();

        let raw = recording.channel_values(Channel::P0, false);
        let corrected = recording.channel_values(Channel::P0, true);
        assert_eq!(raw[0], 270445.0);
        assert_eq!(corrected[0], 270445.0 - 1042.0);
        assert_eq!(recording.channel_values(Channel::Ambient, true)[1], 1023.0);
    }

    #[test]
    fn test_filters_by_time_of_day_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let recording = load_recording(&write_delta_recording(dir.path()), None).unwrap();
        // 1700000000 = 2023-11-14 22:13:20 UTC
        let start = NaiveTime::from_hms_opt(22, 13, 20).unwrap();
        let end = NaiveTime::from_hms_milli_opt(22, 13, 20, 500).unwrap();

        let filtered = recording.filter_time_of_day(start, end);
        assert_eq!(filtered.len(), 2);

        let none = recording.filter_time_of_day(
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        );
        assert!(none.is_empty());
    }

    #[test]
    fn test_empty_file_is_empty_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RECORDING_FILE);
        std::fs::write(&path, "\n\n").unwrap();
        assert!(matches!(
            load_recording(&path, None),
            Err(IngestionError::EmptyRecording { .. })
        ));
    }

    #[test]
    fn test_folder_without_recording_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_folder(dir.path(), MalformedPolicy::Abort)
            .unwrap()
            .is_none());

        write_delta_recording(dir.path());
        let recording = load_folder(dir.path(), MalformedPolicy::Abort)
            .unwrap()
            .unwrap();
        assert_eq!(recording.len(), 4);
    }
}

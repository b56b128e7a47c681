//! 时间轴展开
//!
//! 第一列有两种格式：
//! - 绝对格式：批量首行为 unix 毫秒时间戳，其余行为 0；
//! - 增量格式：每批首行为距上批的毫秒增量，起始时间写在同目录 `info.txt` 的 `start_time: <秒>`。
//!
//! 两种格式都按行数在起止时间之间线性插值。

use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, TimeDelta, Utc};
use contracts::{PpgSample, TimelineFormat};
use regex::Regex;
use tracing::debug;

use crate::error::{IngestionError, Result};

/// 首个非零值超过该值即视为 unix 毫秒时间戳
pub const ABSOLUTE_THRESHOLD: u64 = 1_000_000_000;

/// 第一列最大值不超过该值时视为增量格式
pub const DELTA_MAX: u64 = 10_000;

/// 增量格式的元数据文件名
pub const INFO_FILE: &str = "info.txt";

fn start_time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"start_time:\s*(\d+)").expect("static regex"))
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Unix milliseconds (fractional) to a UTC instant, rounded to the nanosecond.
///
/// `None` when the instant is not finite or falls outside chrono's range.
pub fn millis_to_utc(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    let whole = ms.floor();
    let frac_nanos = ((ms - whole) * 1e6).round() as i64;
    DateTime::from_timestamp_millis(whole as i64)?.checked_add_signed(TimeDelta::nanoseconds(frac_nanos))
}

fn to_utc_all(
    millis: impl IntoIterator<Item = f64>,
    source_name: &str,
) -> Result<Vec<DateTime<Utc>>> {
    millis
        .into_iter()
        .map(|ms| {
            millis_to_utc(ms).ok_or_else(|| IngestionError::TimestampOutOfRange {
                source_name: source_name.to_string(),
                millis: ms,
            })
        })
        .collect()
}

/// Extract `start_time` (unix seconds) from info.txt content.
pub fn parse_start_time(content: &str) -> Option<i64> {
    start_time_pattern()
        .captures(content)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Read `start_time` from `<dir>/info.txt`.
///
/// # Errors
/// `MissingStartTime` if the file is absent, unreadable or has no `start_time` key.
pub fn read_start_time(dir: &Path, source_name: &str) -> Result<i64> {
    let info_path = dir.join(INFO_FILE);
    let missing = || IngestionError::MissingStartTime {
        source_name: source_name.to_string(),
        info_path: info_path.display().to_string(),
    };

    let content = std::fs::read_to_string(&info_path).map_err(|_| missing())?;
    parse_start_time(&content).ok_or_else(missing)
}

/// Detect the timeline format and assign an absolute time to every sample.
///
/// `info_dir` is only consulted for the delta format.
pub fn expand(
    samples: &[PpgSample],
    info_dir: &Path,
    source_name: &str,
) -> Result<(TimelineFormat, Vec<DateTime<Utc>>)> {
    if samples.is_empty() {
        return Err(IngestionError::EmptyRecording {
            source_name: source_name.to_string(),
        });
    }

    let max_value = samples
        .iter()
        .map(|s| s.delta_or_timestamp)
        .max()
        .unwrap_or(0);

    if max_value > ABSOLUTE_THRESHOLD {
        let mut non_zero = samples
            .iter()
            .map(|s| s.delta_or_timestamp)
            .filter(|&v| v != 0);
        let first = non_zero.next().unwrap_or(0);
        if first > ABSOLUTE_THRESHOLD {
            let last = non_zero.last().unwrap_or(first);
            let out_of_range = |value: u64| IngestionError::TimestampOutOfRange {
                source_name: source_name.to_string(),
                millis: value as f64,
            };
            let start_ms = i64::try_from(first).map_err(|_| out_of_range(first))?;
            let end_ms = i64::try_from(last).map_err(|_| out_of_range(last))?;
            return expand_absolute(samples.len(), start_ms, end_ms, source_name);
        }
    } else if max_value <= DELTA_MAX {
        let start_time_s = read_start_time(info_dir, source_name)?;
        return expand_delta(samples, start_time_s, source_name);
    }

    Err(IngestionError::UnrecognizedTimeline {
        source_name: source_name.to_string(),
        max_value,
    })
}

/// Space `n` rows evenly between two unix-millisecond timestamps.
///
/// # Errors
/// `TimestampOutOfRange` if either end lies outside the representable range.
pub fn expand_absolute(
    n: usize,
    start_ms: i64,
    end_ms: i64,
    source_name: &str,
) -> Result<(TimelineFormat, Vec<DateTime<Utc>>)> {
    debug!(start_ms, end_ms, rows = n, "absolute timeline");
    let times = to_utc_all(linspace(start_ms as f64, end_ms as f64, n), source_name)?;
    Ok((TimelineFormat::Absolute { start_ms, end_ms }, times))
}

/// Spread the summed deltas evenly over all rows, starting at `start_time_s`.
///
/// # Errors
/// `TimestampOutOfRange` if the start time or the last row lies outside the representable range.
pub fn expand_delta(
    samples: &[PpgSample],
    start_time_s: i64,
    source_name: &str,
) -> Result<(TimelineFormat, Vec<DateTime<Utc>>)> {
    let total_ms = samples
        .iter()
        .fold(0u64, |acc, s| acc.saturating_add(s.delta_or_timestamp));
    debug!(start_time_s, total_ms, rows = samples.len(), "delta timeline");

    let origin = start_time_s as f64 * 1000.0;
    let times = to_utc_all(
        linspace(0.0, total_ms as f64, samples.len())
            .into_iter()
            .map(|offset| origin + offset),
        source_name,
    )?;
    Ok((TimelineFormat::Delta { start_time_s }, times))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(first: u64) -> PpgSample {
        PpgSample::new(first, 270000, 314000, 266000, 1000)
    }

    #[test]
    fn test_linspace_edges() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(3.0, 9.0, 1), vec![3.0]);
        assert_eq!(linspace(0.0, 10.0, 5), vec![0.0, 2.5, 5.0, 7.5, 10.0]);
    }

    #[test]
    fn test_parses_start_time_with_other_keys() {
        let content = "device: wristband\nstart_time: 1700000000\nfw: 1.2\n";
        assert_eq!(parse_start_time(content), Some(1_700_000_000));
        assert_eq!(parse_start_time("start_time:42"), Some(42));
        assert_eq!(parse_start_time("begin: 5"), None);
    }

    #[test]
    fn test_delta_format_uses_info_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INFO_FILE), "start_time: 1700000000\n").unwrap();

        let samples = vec![sample(499), sample(0), sample(0), sample(501), sample(0)];
        let (format, times) = expand(&samples, dir.path(), "ppg.csv").unwrap();

        assert_eq!(format, TimelineFormat::Delta { start_time_s: 1_700_000_000 });
        assert_eq!(times.len(), 5);
        assert_eq!(times[0].timestamp_millis(), 1_700_000_000_000);
        assert_eq!(times[4].timestamp_millis(), 1_700_000_001_000);
        assert_eq!(times[2].timestamp_millis(), 1_700_000_000_500);
    }

    #[test]
    fn test_delta_format_without_info_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = expand(&[sample(499), sample(0)], dir.path(), "ppg.csv").unwrap_err();
        assert!(matches!(err, IngestionError::MissingStartTime { .. }));

        std::fs::write(dir.path().join(INFO_FILE), "device: x\n").unwrap();
        let err = expand(&[sample(499)], dir.path(), "ppg.csv").unwrap_err();
        assert!(matches!(err, IngestionError::MissingStartTime { .. }));
    }

    #[test]
    fn test_absolute_format_spans_first_to_last_non_zero() {
        let dir = tempfile::tempdir().unwrap();
        let samples = vec![
            sample(1_700_000_000_000),
            sample(0),
            sample(0),
            sample(1_700_000_000_600),
            sample(0),
            sample(0),
            sample(1_700_000_001_500),
        ];
        let (format, times) = expand(&samples, dir.path(), "ppg.csv").unwrap();
        assert_eq!(
            format,
            TimelineFormat::Absolute {
                start_ms: 1_700_000_000_000,
                end_ms: 1_700_000_001_500
            }
        );
        assert_eq!(times[0].timestamp_millis(), 1_700_000_000_000);
        assert_eq!(times[6].timestamp_millis(), 1_700_000_001_500);
        assert_eq!(times[3].timestamp_millis(), 1_700_000_000_750);
    }

    #[test]
    fn test_leading_zero_rows_before_absolute_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let samples = vec![sample(0), sample(1_700_000_000_000), sample(1_700_000_002_000)];
        let (format, _) = expand(&samples, dir.path(), "ppg.csv").unwrap();
        assert!(matches!(format, TimelineFormat::Absolute { .. }));
    }

    #[test]
    fn test_mid_range_values_are_unrecognized() {
        let dir = tempfile::tempdir().unwrap();
        let err = expand(&[sample(50_000), sample(0)], dir.path(), "ppg.csv").unwrap_err();
        match err {
            IngestionError::UnrecognizedTimeline { max_value, .. } => assert_eq!(max_value, 50_000),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_small_first_value_with_large_later_value_is_unrecognized() {
        let dir = tempfile::tempdir().unwrap();
        let samples = vec![sample(5), sample(1_700_000_000_000)];
        assert!(matches!(
            expand(&samples, dir.path(), "ppg.csv"),
            Err(IngestionError::UnrecognizedTimeline { .. })
        ));
    }

    #[test]
    fn test_huge_absolute_timestamps_are_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let beyond_chrono = 1u64 << 62;
        for first in [beyond_chrono, u64::MAX] {
            let samples = vec![sample(first), sample(0)];
            assert!(matches!(
                expand(&samples, dir.path(), "ppg.csv"),
                Err(IngestionError::TimestampOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_far_future_timestamp_parses_without_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let first = crate::parse_record("10000000000000,270445,314778,266630,1042", 1).unwrap();
        let next = crate::parse_record("0,270102,314364,266328,1023", 2).unwrap();
        let (_, times) = expand(&[first, next], dir.path(), "ppg.csv").unwrap();
        assert_eq!(times[0].timestamp_millis(), 10_000_000_000_000);
    }

    #[test]
    fn test_delta_start_time_out_of_range() {
        let samples = vec![sample(499), sample(0)];
        assert!(matches!(
            expand_delta(&samples, i64::MAX, "ppg.csv"),
            Err(IngestionError::TimestampOutOfRange { .. })
        ));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            expand(&[], dir.path(), "ppg.csv"),
            Err(IngestionError::EmptyRecording { .. })
        ));
    }
}

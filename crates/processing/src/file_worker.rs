//! 单文件处理
//!
//! 读取一个录制文件，按挂钟时间窗口分段检测峰值，再计算 PPI 与 HRV 窗口。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use contracts::{Channel, ChannelResult, ProcessingConfig, ProcessingResults, ProgressCallback};
use ingestion::Recording;
use metrics::counter;
use signal::{clean_ppi, compute_ppi, hrv_windows, Peak};
use tracing::{info, instrument};

use crate::channel::{detect_peaks, preprocess, restrict_to_time_range, sampling_rate};
use crate::error::Result;
use crate::reporter::Reporter;

/// Processes a single `ppg.csv`
#[derive(Debug, Clone)]
pub struct FileWorker {
    path: PathBuf,
    info_dir: Option<PathBuf>,
    config: ProcessingConfig,
    reporter: Reporter,
}

impl FileWorker {
    /// 创建 worker；`info.txt` 默认从文件所在目录读取
    pub fn new(path: impl Into<PathBuf>, config: ProcessingConfig) -> Self {
        Self {
            path: path.into(),
            info_dir: None,
            config,
            reporter: Reporter::silent(),
        }
    }

    /// 指定 `info.txt` 所在目录
    pub fn with_info_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.info_dir = Some(dir.into());
        self
    }

    /// 设置进度回调
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.reporter = Reporter::new(callback);
        self
    }

    /// 输入文件
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file and process it.
    ///
    /// # Errors
    /// Loading failures and an unusable sampling rate are fatal; they are
    /// also reported as error events.
    #[instrument(name = "file_worker", skip(self), fields(path = %self.path.display()))]
    pub fn run(&self) -> Result<ProcessingResults> {
        self.reporter
            .status(format!("Reading PPG file: {}", self.path.display()));
        let loaded = Recording::load(
            &self.path,
            self.info_dir.as_deref(),
            self.config.reader.malformed,
        )
        .inspect_err(|e| self.reporter.error(e.to_string()))?;

        let results = self.process(loaded)?;
        self.reporter.progress(100);
        Ok(results)
    }

    /// Process an already loaded recording
    pub fn process(&self, recording: Recording) -> Result<ProcessingResults> {
        let recording = restrict_to_time_range(recording, &self.config)?;
        if recording.is_empty() {
            self.reporter.error("No data found in the file.");
            return Ok(ProcessingResults::new(source_label(&self.path)));
        }

        self.reporter.status("Calculating sampling rate...");
        let sample_rate_hz = sampling_rate(&recording).inspect_err(|_| {
            self.reporter
                .error("Unable to calculate sampling rate from timestamps.")
        })?;
        self.reporter
            .status(format!("Average sampling rate: {sample_rate_hz:.2} Hz"));

        let channels: Vec<Channel> = self
            .config
            .analysis
            .channels
            .iter()
            .copied()
            .filter(|c| {
                if !c.is_photodetector() {
                    self.reporter
                        .error(format!("Channel {c} is not a photodetector channel, skipping"));
                }
                c.is_photodetector()
            })
            .collect();

        self.reporter.status("Preprocessing PPG signals...");
        let mut filtered = BTreeMap::new();
        for &channel in &channels {
            let values = preprocess(&recording, channel, &self.config, sample_rate_hz)
                .inspect_err(|e| self.reporter.error(format!("Error preprocessing PPG: {e}")))?;
            filtered.insert(channel, values);
        }

        self.reporter.status("Calculating PPI values...");
        let mut results = ProcessingResults::new(source_label(&self.path));
        for (i, (&channel, values)) in filtered.iter().enumerate() {
            let peaks = self.windowed_peaks(
                &recording,
                values,
                sample_rate_hz,
                channel,
                i,
                filtered.len(),
            );
            let result = self.channel_result(channel, peaks);
            info!(
                channel = %channel,
                ppi = result.ppi.len(),
                outliers = result.outliers_removed,
                "channel processed"
            );
            results.channels.insert(channel, result);
        }
        Ok(results)
    }

    /// Detect peaks window by window; failed windows are reported and skipped.
    fn windowed_peaks(
        &self,
        recording: &Recording,
        values: &[f64],
        sample_rate_hz: f64,
        channel: Channel,
        channel_index: usize,
        channel_count: usize,
    ) -> Vec<Peak> {
        let windows = group_by_window(recording, self.config.analysis.window_minutes);
        let total = windows.total_span().max(1);

        let mut peaks = Vec::new();
        for (key, range) in &windows.ranges {
            let j = (key - windows.first_key()) as usize;
            self.reporter.progress(
                j * 100 / total / channel_count + channel_index * 100 / channel_count,
            );

            let times: Vec<_> = recording.samples[range.clone()].iter().map(|s| s.time).collect();
            match detect_peaks(
                &times,
                &values[range.clone()],
                sample_rate_hz,
                &self.config.detection,
                channel,
            ) {
                Ok(found) => peaks.extend(found),
                Err(e) => {
                    counter!("ppg_processor_window_failures_total").increment(1);
                    self.reporter.status(format!(
                        "Error processing window at {}: {e}",
                        times[0].format("%Y-%m-%d %H:%M:%S")
                    ));
                }
            }
        }
        peaks
    }

    fn channel_result(&self, channel: Channel, peaks: Vec<Peak>) -> ChannelResult {
        let ppi = compute_ppi(peaks);

        self.reporter
            .status(format!("Cleaning PPI data for channel {channel}..."));
        let thresholds = self.config.ppi;
        let (ppi, outliers_removed) = clean_ppi(ppi, thresholds.low_ms, thresholds.high_ms);
        counter!("ppg_processor_ppi_outliers_total", "channel" => channel.to_string())
            .increment(outliers_removed as u64);
        self.reporter.status(format!(
            "Removed {outliers_removed} outlier PPI values from channel {channel}"
        ));

        let hrv = (self.config.analysis.calculate_hrv && !ppi.is_empty()).then(|| {
            self.reporter
                .status(format!("Calculating HRV metrics for channel {channel}..."));
            let windows = hrv_windows(
                &ppi,
                self.config.analysis.window_minutes,
                self.config.analysis.gap_minutes,
            );
            self.reporter
                .status(format!("Calculated HRV metrics for {} windows", windows.len()));
            windows
        });

        ChannelResult {
            ppi,
            hrv,
            overall: None,
            outliers_removed,
        }
    }
}

/// Sample index ranges keyed by `floor(t / window)`
struct WindowRanges {
    ranges: BTreeMap<i64, std::ops::Range<usize>>,
}

impl WindowRanges {
    fn first_key(&self) -> i64 {
        self.ranges.keys().next().copied().unwrap_or_default()
    }

    /// Number of wall-clock windows between the first and last key,
    /// including empty ones
    fn total_span(&self) -> usize {
        match (self.ranges.keys().next(), self.ranges.keys().next_back()) {
            (Some(first), Some(last)) => (last - first + 1) as usize,
            _ => 0,
        }
    }
}

/// Group consecutive samples into wall-clock windows aligned to the epoch.
///
/// Samples are in time order, so every window is one contiguous range.
fn group_by_window(recording: &Recording, window_minutes: u32) -> WindowRanges {
    let window_ms = i64::from(window_minutes.max(1)) * 60_000;
    let mut ranges: BTreeMap<i64, std::ops::Range<usize>> = BTreeMap::new();
    for (i, sample) in recording.samples.iter().enumerate() {
        let key = sample.time.timestamp_millis().div_euclid(window_ms);
        ranges
            .entry(key)
            .and_modify(|r| r.end = i + 1)
            .or_insert(i..i + 1);
    }
    WindowRanges { ranges }
}

/// Label used to name exported files: the file stem, prefixed by its folder
/// when the stem is the default recording name.
fn source_label(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    let folder = path
        .parent()
        .and_then(Path::file_name)
        .map(|s| s.to_string_lossy().into_owned());
    match folder {
        Some(folder) if format!("{stem}.csv") == ingestion::RECORDING_FILE => {
            format!("{folder}_{stem}")
        }
        _ => stem,
    }
}

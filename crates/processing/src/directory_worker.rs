//! 目录处理
//!
//! 目录下每个子目录是一次会话 (`<session>/ppg.csv` + 可选 `info.txt`)。
//! 各会话独立检测峰值并计算 PPI，合并后统一计算 HRV 窗口与总体指标。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use contracts::{
    Channel, ChannelResult, HrvWindow, PpiRecord, ProcessingConfig, ProcessingResults,
    ProgressCallback, StopHandle,
};
use ingestion::load_folder;
use metrics::counter;
use signal::{clean_ppi, compute_ppi, hrv_windows, overall_metrics};
use tracing::{info, instrument, warn};

use crate::channel::{detect_peaks, preprocess, restrict_to_time_range, sampling_rate};
use crate::error::{ProcessingError, Result};
use crate::reporter::Reporter;

/// Processes every session folder of a directory
#[derive(Debug, Clone)]
pub struct DirectoryWorker {
    dir: PathBuf,
    config: ProcessingConfig,
    reporter: Reporter,
    stop: StopHandle,
}

impl DirectoryWorker {
    pub fn new(dir: impl Into<PathBuf>, config: ProcessingConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
            reporter: Reporter::silent(),
            stop: StopHandle::new(),
        }
    }

    /// 设置进度回调
    pub fn with_progress(self, callback: ProgressCallback) -> Self {
        self.with_reporter(Reporter::new(callback))
    }

    pub(crate) fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// 共享停止标志；在会话之间检查
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Process all session folders and combine their results.
    ///
    /// # Errors
    /// `NoSubfolders` when the directory has no subdirectories, `Io` when it
    /// cannot be listed. Failures inside a session are status events.
    #[instrument(name = "directory_worker", skip(self), fields(dir = %self.dir.display()))]
    pub fn run(&self) -> Result<ProcessingResults> {
        let folders = subfolders(&self.dir)
            .inspect_err(|e| self.reporter.error(e.to_string()))?;
        self.reporter
            .status(format!("Found {} folders to process", folders.len()));

        let channels: Vec<Channel> = self
            .config
            .analysis
            .channels
            .iter()
            .copied()
            .filter(Channel::is_photodetector)
            .collect();
        let mut combined: BTreeMap<Channel, (Vec<PpiRecord>, usize)> = channels
            .iter()
            .map(|&c| (c, (Vec::new(), 0)))
            .collect();

        for (i, folder) in folders.iter().enumerate() {
            if self.stop.is_stopped() {
                self.reporter.status("Processing stopped by user");
                break;
            }
            self.reporter.progress(i * 100 / folders.len());

            match self.process_folder(folder, &channels) {
                Ok(per_channel) => {
                    for (channel, (records, removed)) in per_channel {
                        let entry = combined.entry(channel).or_default();
                        entry.0.extend(records);
                        entry.1 += removed;
                    }
                }
                Err(e) => {
                    counter!("ppg_processor_folder_failures_total").increment(1);
                    warn!(folder = %folder.display(), error = %e, "session failed");
                    self.reporter
                        .status(format!("Error processing {}: {e}", folder.display()));
                }
            }
        }

        let mut results = ProcessingResults::new(folder_name(&self.dir));
        for (channel, (mut ppi, outliers_removed)) in combined {
            ppi.sort_by_key(|r| r.time);
            let result = self.combine(channel, ppi, outliers_removed);
            results.channels.insert(channel, result);
        }
        self.reporter.progress(100);
        info!(
            folders = folders.len(),
            ppi = results.total_ppi(),
            windows = results.total_windows(),
            "directory processed"
        );
        Ok(results)
    }

    /// Cleaned, folder-tagged PPI per channel for one session.
    ///
    /// A folder without a recording, or with no samples in the time range,
    /// yields no records.
    fn process_folder(
        &self,
        folder: &Path,
        channels: &[Channel],
    ) -> Result<BTreeMap<Channel, (Vec<PpiRecord>, usize)>> {
        let Some(recording) = load_folder(folder, self.config.reader.malformed)? else {
            self.reporter.status(format!(
                "No {} found in {}, skipping",
                ingestion::RECORDING_FILE,
                folder.display()
            ));
            return Ok(BTreeMap::new());
        };
        self.reporter
            .status(format!("Processing {}", recording.path.display()));

        let recording = restrict_to_time_range(recording, &self.config)?;
        if recording.is_empty() {
            if let Some(range) = &self.config.time_range {
                self.reporter.status(format!(
                    "No data points in selected time range: {}",
                    range.label()
                ));
            }
            return Ok(BTreeMap::new());
        }

        let sample_rate_hz = sampling_rate(&recording)?;
        let times = recording.times();
        let name = folder_name(folder);

        let out = collect_channels(channels, folder, &self.reporter, |channel| {
            let values = preprocess(&recording, channel, &self.config, sample_rate_hz)?;
            let peaks = detect_peaks(
                &times,
                &values,
                sample_rate_hz,
                &self.config.detection,
                channel,
            )?;
            let thresholds = self.config.ppi;
            let (mut ppi, removed) =
                clean_ppi(compute_ppi(peaks), thresholds.low_ms, thresholds.high_ms);
            counter!("ppg_processor_ppi_outliers_total", "channel" => channel.to_string())
                .increment(removed as u64);
            self.reporter.status(format!(
                "Removed {removed} outlier PPI values from {}",
                folder.display()
            ));

            for record in &mut ppi {
                record.folder = Some(name.clone());
            }
            Ok((ppi, removed))
        });
        Ok(out)
    }

    fn combine(&self, channel: Channel, ppi: Vec<PpiRecord>, outliers_removed: usize) -> ChannelResult {
        if !self.config.analysis.calculate_hrv {
            return ChannelResult {
                ppi,
                hrv: None,
                overall: None,
                outliers_removed,
            };
        }

        let mut windows = Vec::new();
        let mut overall = None;
        if !ppi.is_empty() {
            self.reporter.status(format!(
                "Calculating HRV metrics for {channel} on combined data..."
            ));
            windows = hrv_windows(
                &ppi,
                self.config.analysis.window_minutes,
                self.config.analysis.gap_minutes,
            );
            overall = overall_metrics(&windows);
            tag_windows_with_folder(&mut windows, &ppi);
            self.reporter
                .status(format!("Calculated HRV metrics for {} windows", windows.len()));
        }

        ChannelResult {
            ppi,
            hrv: Some(windows),
            overall,
            outliers_removed,
        }
    }
}

/// Run `process` for every channel, keeping the channels that succeed.
///
/// A failed channel is reported as a status event and left out.
fn collect_channels<F>(
    channels: &[Channel],
    folder: &Path,
    reporter: &Reporter,
    mut process: F,
) -> BTreeMap<Channel, (Vec<PpiRecord>, usize)>
where
    F: FnMut(Channel) -> Result<(Vec<PpiRecord>, usize)>,
{
    let mut out = BTreeMap::new();
    for &channel in channels {
        match process(channel) {
            Ok(result) => {
                out.insert(channel, result);
            }
            Err(e) => {
                counter!("ppg_processor_channel_failures_total", "channel" => channel.to_string())
                    .increment(1);
                warn!(folder = %folder.display(), %channel, error = %e, "channel failed");
                reporter.status(format!(
                    "Error processing {channel} in {}: {e}",
                    folder.display()
                ));
            }
        }
    }
    out
}

/// Immediate subdirectories of `dir`, sorted by name.
pub(crate) fn subfolders(dir: &Path) -> Result<Vec<PathBuf>> {
    let display = dir.display().to_string();
    let entries = fs::read_dir(dir).map_err(|e| ProcessingError::io(&display, e))?;

    let mut folders = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ProcessingError::io(&display, e))?;
        let path = entry.path();
        if path.is_dir() {
            folders.push(path);
        }
    }
    if folders.is_empty() {
        return Err(ProcessingError::NoSubfolders { path: display });
    }
    folders.sort();
    Ok(folders)
}

pub(crate) fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Tag each window with the folder of the record nearest its start.
///
/// `ppi` must be sorted by time.
fn tag_windows_with_folder(windows: &mut [HrvWindow], ppi: &[PpiRecord]) {
    for window in windows {
        window.folder = closest_record(ppi, window.start_time).and_then(|r| r.folder.clone());
    }
}

fn closest_record(ppi: &[PpiRecord], time: DateTime<Utc>) -> Option<&PpiRecord> {
    let idx = ppi.partition_point(|r| r.time < time);
    let after = ppi.get(idx);
    let before = idx.checked_sub(1).and_then(|i| ppi.get(i));
    match (before, after) {
        (Some(b), Some(a)) if time - b.time <= a.time - time => Some(b),
        (_, Some(a)) => Some(a),
        (b, None) => b,
    }
}

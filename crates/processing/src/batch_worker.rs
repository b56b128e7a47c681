//! 批量处理
//!
//! 根目录下每个子目录是一名参与者，其下每个子目录是一次会话。
//! 参与者逐个交给 [`DirectoryWorker`] 处理，结果标注参与者 ID 后合并。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use contracts::{
    Channel, ChannelResult, ProcessingConfig, ProcessingResults, ProgressCallback, StopHandle,
};
use signal::overall_metrics;
use tracing::{info, instrument};

use crate::directory_worker::{folder_name, subfolders, DirectoryWorker};
use crate::error::{ProcessingError, Result};
use crate::reporter::Reporter;

/// Processes a directory of participant folders
#[derive(Debug, Clone)]
pub struct BatchWorker {
    dir: PathBuf,
    config: ProcessingConfig,
    reporter: Reporter,
    stop: StopHandle,
}

impl BatchWorker {
    pub fn new(dir: impl Into<PathBuf>, config: ProcessingConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
            reporter: Reporter::silent(),
            stop: StopHandle::new(),
        }
    }

    /// 设置进度回调
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.reporter = Reporter::new(callback);
        self
    }

    /// 共享停止标志；在参与者之间检查
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Handle that stops this worker when triggered from another thread
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Process every participant and merge the results.
    ///
    /// A stop request ends the run after the current participant and returns
    /// what was merged so far.
    #[instrument(name = "batch_worker", skip(self), fields(dir = %self.dir.display()))]
    pub fn run(&self) -> Result<ProcessingResults> {
        let participants = subfolders(&self.dir)
            .map_err(|e| match e {
                ProcessingError::NoSubfolders { path } => ProcessingError::NoSubfolders {
                    path: format!("{path} (no participant folders)"),
                },
                other => other,
            })
            .inspect_err(|e| self.reporter.error(e.to_string()))?;
        self.reporter.status(format!(
            "Found {} participant folders to process",
            participants.len()
        ));

        let mut merged: BTreeMap<Channel, ChannelResult> = BTreeMap::new();
        for (i, folder) in participants.iter().enumerate() {
            if self.stop.is_stopped() {
                self.reporter.status("Processing stopped by user");
                break;
            }
            let participant = folder_name(folder);
            self.reporter.status(format!(
                "Processing participant: {participant} ({}/{})",
                i + 1,
                participants.len()
            ));
            self.reporter.progress(i * 100 / participants.len());

            let Some(results) = self.process_participant(folder, &participant) else {
                continue;
            };
            for (channel, result) in results.channels {
                merge_into(merged.entry(channel).or_default(), result);
            }
        }

        let mut results = ProcessingResults::new(folder_name(&self.dir));
        for (channel, mut result) in merged {
            result.ppi.sort_by_key(|r| r.time);
            if !self.config.analysis.calculate_hrv {
                result.hrv = None;
            }
            result.overall = result
                .hrv
                .as_deref()
                .filter(|_| !result.ppi.is_empty())
                .and_then(|windows| {
                    self.reporter
                        .status(format!("Calculating overall HRV metrics for {channel}..."));
                    overall_metrics(windows)
                })
                .map(|mut overall| {
                    overall.time_range = self.config.time_range.as_ref().map(|r| r.label());
                    overall
                });
            results.channels.insert(channel, result);
        }

        self.reporter.progress(100);
        info!(
            participants = participants.len(),
            ppi = results.total_ppi(),
            windows = results.total_windows(),
            "batch processed"
        );
        Ok(results)
    }

    /// Run one participant through a directory worker; failures become status
    /// lines and yield `None`.
    fn process_participant(&self, folder: &Path, participant: &str) -> Option<ProcessingResults> {
        let worker = DirectoryWorker::new(folder, self.config.clone())
            .with_reporter(self.reporter.nested())
            .with_stop_handle(self.stop.clone());

        match worker.run() {
            Ok(mut results) => {
                for result in results.channels.values_mut() {
                    for record in &mut result.ppi {
                        record.participant = Some(participant.to_string());
                    }
                    for window in result.hrv.iter_mut().flatten() {
                        window.participant = Some(participant.to_string());
                    }
                }
                Some(results)
            }
            Err(ProcessingError::NoSubfolders { .. }) => {
                self.reporter.status(format!(
                    "No session folders found for participant {participant}"
                ));
                None
            }
            Err(e) => {
                self.reporter
                    .status(format!("Error processing participant {participant}: {e}"));
                None
            }
        }
    }
}

fn merge_into(target: &mut ChannelResult, result: ChannelResult) {
    target.ppi.extend(result.ppi);
    target.outliers_removed += result.outliers_removed;
    if let Some(windows) = result.hrv {
        target.hrv.get_or_insert_with(Vec::new).extend(windows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ProgressEvent, TimeRange};
    use ingestion::{SyntheticConfig, SyntheticRecording};
    use std::fs;

    use crate::reporter::collecting_callback;

    fn session(root: &Path, participant: &str, name: &str, start_time_s: i64, bpm: f64) {
        SyntheticRecording::generate(SyntheticConfig {
            start_time_s,
            heart_rate_bpm: bpm,
            duration_secs: 90.0,
            ..Default::default()
        })
        .write_to_dir(&root.join(participant).join(name))
        .unwrap();
    }

    fn single_channel() -> ProcessingConfig {
        let mut config = ProcessingConfig::default();
        config.analysis.channels = vec![Channel::P0];
        config
    }

    #[test]
    fn test_merges_participants_with_ids() {
        let root = tempfile::tempdir().unwrap();
        session(root.path(), "P001", "Epoch1", 1_700_000_000, 60.0);
        session(root.path(), "P001", "Epoch2", 1_700_003_600, 60.0);
        session(root.path(), "P002", "Epoch1", 1_700_007_200, 75.0);

        let (callback, events) = collecting_callback();
        let results = BatchWorker::new(root.path(), single_channel())
            .with_progress(callback)
            .run()
            .unwrap();

        let result = &results.channels[&Channel::P0];
        let ids: std::collections::BTreeSet<_> = result
            .ppi
            .iter()
            .map(|r| r.participant.clone().unwrap())
            .collect();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["P001", "P002"]);
        assert!(result.ppi.windows(2).all(|w| w[0].time <= w[1].time));

        let windows = result.hrv.as_ref().unwrap();
        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|w| w.participant.is_some()));

        // window means are ~1000, ~1000 and ~800 ms
        let overall = result.overall.as_ref().unwrap();
        assert_eq!(overall.window_count, 3);
        let mean_nn = overall.metrics.mean_nn.unwrap();
        assert!((mean_nn - 933.0).abs() < 25.0, "mean {mean_nn}");
        assert!(overall.time_range.is_none());

        let events = events.lock().unwrap();
        assert!(events.contains(&ProgressEvent::Status(
            "Processing participant: P002 (2/2)".into()
        )));
        // nested progress is not forwarded
        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![0, 50, 100]);
    }

    #[test]
    fn test_participant_without_sessions_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        session(root.path(), "P001", "Epoch1", 1_700_000_000, 60.0);
        fs::create_dir(root.path().join("P002")).unwrap();

        let (callback, events) = collecting_callback();
        let results = BatchWorker::new(root.path(), single_channel())
            .with_progress(callback)
            .run()
            .unwrap();
        assert!(results.total_ppi() > 0);
        assert!(events.lock().unwrap().contains(&ProgressEvent::Status(
            "No session folders found for participant P002".into()
        )));
    }

    #[test]
    fn test_time_range_labels_overall_metrics() {
        let root = tempfile::tempdir().unwrap();
        session(root.path(), "P001", "Epoch1", 1_700_000_000, 60.0);

        let mut config = single_channel();
        config.time_range = Some(TimeRange::new("22:00", "23:00"));
        let results = BatchWorker::new(root.path(), config).run().unwrap();
        let overall = results.channels[&Channel::P0].overall.as_ref().unwrap();
        assert_eq!(overall.time_range.as_deref(), Some("22:00-23:00"));
    }

    #[test]
    fn test_stop_handle_ends_run_early() {
        let root = tempfile::tempdir().unwrap();
        session(root.path(), "P001", "Epoch1", 1_700_000_000, 60.0);

        let worker = BatchWorker::new(root.path(), single_channel());
        worker.stop_handle().stop();
        let results = worker.run().unwrap();
        assert_eq!(results.total_ppi(), 0);
    }

    #[test]
    fn test_missing_participants_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let err = BatchWorker::new(root.path(), single_channel())
            .run()
            .unwrap_err();
        assert!(matches!(err, ProcessingError::NoSubfolders { .. }));
    }
}

//! 处理结果指标收集模块
//!
//! 基于 ProcessingResults 收集和统计一次处理任务的运行指标。

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::{Channel, ProcessingResults};
use metrics::{counter, gauge, histogram};

/// 从 ProcessingResults 记录指标
///
/// 每次 worker 完成后调用一次。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_processing_results;
///
/// let results = worker.run()?;
/// record_processing_results("file", &results, started.elapsed());
/// ```
pub fn record_processing_results(mode: &str, results: &ProcessingResults, elapsed: Duration) {
    // 运行计数与耗时
    counter!("ppg_processor_runs_total", "mode" => mode.to_string()).increment(1);
    histogram!("ppg_processor_run_duration_seconds", "mode" => mode.to_string())
        .record(elapsed.as_secs_f64());

    for (channel, result) in &results.channels {
        let channel = channel.to_string();

        // PPI 数量
        counter!("ppg_processor_ppi_total", "channel" => channel.clone())
            .increment(result.ppi.len() as u64);
        gauge!("ppg_processor_ppi_last_run", "channel" => channel.clone())
            .set(result.ppi.len() as f64);

        // 每个 PPI 的分布
        for record in &result.ppi {
            histogram!("ppg_processor_ppi_ms", "channel" => channel.clone()).record(record.ppi_ms);
            histogram!("ppg_processor_beat_quality", "channel" => channel.clone())
                .record(record.quality);
        }

        // HRV 窗口
        if let Some(windows) = &result.hrv {
            counter!("ppg_processor_hrv_windows_total", "channel" => channel.clone())
                .increment(windows.len() as u64);
            for sdnn in windows.iter().filter_map(|w| w.metrics.sdnn) {
                histogram!("ppg_processor_sdnn_ms", "channel" => channel.clone()).record(sdnn);
            }
        }
    }
}

/// 记录 sink 写入
pub fn record_sink_write(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "ppg_processor_sink_writes_total",
        "sink" => sink_name.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 处理指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct ProcessingMetricsAggregator {
    /// 处理次数
    pub runs: u64,

    /// PPI 总数
    pub total_ppi: u64,

    /// 被阈值过滤掉的 PPI 数
    pub total_outliers: u64,

    /// HRV 窗口总数
    pub total_windows: u64,

    /// PPI (ms) 统计
    pub ppi_stats: RunningStats,

    /// 节拍质量统计
    pub quality_stats: RunningStats,

    /// 窗口 SDNN 统计
    pub sdnn_stats: RunningStats,

    /// 各通道 PPI 数
    pub channel_counts: BTreeMap<Channel, u64>,
}

impl ProcessingMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, results: &ProcessingResults) {
        self.runs += 1;

        for (channel, result) in &results.channels {
            self.total_ppi += result.ppi.len() as u64;
            self.total_outliers += result.outliers_removed as u64;
            *self.channel_counts.entry(*channel).or_insert(0) += result.ppi.len() as u64;

            for record in &result.ppi {
                self.ppi_stats.push(record.ppi_ms);
                self.quality_stats.push(record.quality);
            }

            if let Some(windows) = &result.hrv {
                self.total_windows += windows.len() as u64;
                for sdnn in windows.iter().filter_map(|w| w.metrics.sdnn) {
                    self.sdnn_stats.push(sdnn);
                }
            }
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let candidates = self.total_ppi + self.total_outliers;
        MetricsSummary {
            runs: self.runs,
            total_ppi: self.total_ppi,
            total_outliers: self.total_outliers,
            total_windows: self.total_windows,
            outlier_rate: if candidates > 0 {
                self.total_outliers as f64 / candidates as f64 * 100.0
            } else {
                0.0
            },
            ppi_ms: StatsSummary::from(&self.ppi_stats),
            quality: StatsSummary::from(&self.quality_stats),
            sdnn_ms: StatsSummary::from(&self.sdnn_stats),
            heart_rate_bpm: (self.ppi_stats.count() > 0 && self.ppi_stats.mean() > 0.0)
                .then(|| 60_000.0 / self.ppi_stats.mean()),
            channel_counts: self.channel_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub runs: u64,
    pub total_ppi: u64,
    pub total_outliers: u64,
    pub total_windows: u64,
    pub outlier_rate: f64,
    pub ppi_ms: StatsSummary,
    pub quality: StatsSummary,
    pub sdnn_ms: StatsSummary,
    pub heart_rate_bpm: Option<f64>,
    pub channel_counts: BTreeMap<Channel, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Processing Metrics Summary ===")?;
        writeln!(f, "Runs: {}", self.runs)?;
        writeln!(f, "PPI values: {}", self.total_ppi)?;
        writeln!(
            f,
            "Outliers removed: {} ({:.2}%)",
            self.total_outliers, self.outlier_rate
        )?;
        writeln!(f, "HRV windows: {}", self.total_windows)?;
        writeln!(f, "PPI (ms): {}", self.ppi_ms)?;
        writeln!(f, "Beat quality: {}", self.quality)?;
        writeln!(f, "SDNN (ms): {}", self.sdnn_ms)?;
        if let Some(hr) = self.heart_rate_bpm {
            writeln!(f, "Heart rate: {hr:.1} bpm")?;
        }

        if !self.channel_counts.is_empty() {
            writeln!(f, "PPI per channel:")?;
            for (channel, count) in &self.channel_counts {
                writeln!(f, "  {channel}: {count}")?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.2}, max={:.2}, mean={:.2}, std={:.2} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差 (n - 1)
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use contracts::{ChannelResult, HrvMetrics, HrvWindow, PpiRecord};

    fn results(ppi: &[f64], outliers: usize) -> ProcessingResults {
        let time = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let records = ppi
            .iter()
            .map(|&ppi_ms| PpiRecord {
                time,
                ppi_ms,
                amplitude: 0.0,
                quality: 0.8,
                folder: None,
                participant: None,
            })
            .collect();
        let window = HrvWindow {
            start_time: time,
            end_time: time,
            metrics: HrvMetrics {
                sdnn: Some(40.0),
                num_data_points: ppi.len(),
                ..Default::default()
            },
            folder: None,
            participant: None,
        };

        let mut results = ProcessingResults::new("test");
        results.channels.insert(
            Channel::P0,
            ChannelResult {
                ppi: records,
                hrv: Some(vec![window]),
                overall: None,
                outliers_removed: outliers,
            },
        );
        results
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = ProcessingMetricsAggregator::new();
        aggregator.update(&results(&[900.0, 1000.0, 1100.0], 1));
        aggregator.update(&results(&[1000.0], 0));

        let summary = aggregator.summary();
        assert_eq!(summary.runs, 2);
        assert_eq!(summary.total_ppi, 4);
        assert_eq!(summary.total_outliers, 1);
        assert_eq!(summary.total_windows, 2);
        assert!((summary.outlier_rate - 20.0).abs() < 1e-10);
        assert!((summary.ppi_ms.mean - 1000.0).abs() < 1e-10);
        assert!((summary.heart_rate_bpm.unwrap() - 60.0).abs() < 1e-10);
        assert_eq!(summary.channel_counts[&Channel::P0], 4);
        assert_eq!(summary.sdnn_ms.count, 2);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = ProcessingMetricsAggregator::new();
        assert!(aggregator.summary().to_string().contains("PPI (ms): N/A"));

        aggregator.update(&results(&[1000.0, 1000.0], 0));
        let text = aggregator.summary().to_string();
        assert!(text.contains("Heart rate: 60.0 bpm"));
        assert!(text.contains("  P0: 2"));

        aggregator.reset();
        assert_eq!(aggregator.runs, 0);
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_processing_results("file", &results(&[1000.0], 0), Duration::from_millis(5));
        record_sink_write("csv", true);
    }
}

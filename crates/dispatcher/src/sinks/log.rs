//! LogSink - logs a per-channel summary via tracing

use contracts::{ContractError, ProcessingResults, ResultSink};
use tracing::{info, instrument};

use crate::summary::ChannelSummary;

/// Sink that logs result summaries
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_summary(&self, results: &ProcessingResults) {
        for (channel, result) in &results.channels {
            if result.is_empty() {
                info!(sink = %self.name, channel = %channel, "no peaks detected");
                continue;
            }
            let summary = ChannelSummary::from_result(result);
            info!(
                sink = %self.name,
                channel = %channel,
                peaks = summary.peaks,
                mean_ppi_ms = summary.mean_ppi_ms,
                min_ppi_ms = summary.min_ppi_ms,
                max_ppi_ms = summary.max_ppi_ms,
                mean_quality = summary.mean_quality,
                outliers_removed = summary.outliers_removed,
                "PPI summary"
            );
            if summary.windows > 0 {
                info!(
                    sink = %self.name,
                    channel = %channel,
                    windows = summary.windows,
                    mean_sdnn_ms = summary.mean_sdnn_ms,
                    mean_rmssd_ms = summary.mean_rmssd_ms,
                    heart_rate_bpm = summary.heart_rate_bpm,
                    "HRV summary"
                );
            }
        }
    }
}

impl ResultSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, results),
        fields(sink = %self.name, source = %results.source)
    )]
    fn write(&mut self, results: &ProcessingResults) -> Result<(), ContractError> {
        self.log_summary(results);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }
}

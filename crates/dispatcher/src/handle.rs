//! SinkHandle - owns a sink together with its metrics

use std::sync::Arc;
use tracing::{debug, error, instrument};

use contracts::{ContractError, ProcessingResults, ResultSink};

use crate::metrics::SinkMetrics;

/// Handle to a configured sink
///
/// Failures are counted and returned; they never affect other handles.
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// The sink itself
    sink: Box<dyn ResultSink>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
}

impl SinkHandle {
    /// Wrap a sink
    pub fn new<S: ResultSink + 'static>(sink: S) -> Self {
        Self::from_boxed(Box::new(sink))
    }

    /// Wrap an already boxed sink
    pub fn from_boxed(sink: Box<dyn ResultSink>) -> Self {
        Self {
            name: sink.name().to_string(),
            sink,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Write results to the sink, recording the outcome
    #[instrument(name = "sink_handle_write", skip(self, results), fields(sink = %self.name))]
    pub fn write(&mut self, results: &ProcessingResults) -> Result<(), ContractError> {
        match self.sink.write(results) {
            Ok(()) => {
                self.metrics.inc_write_count();
                self.metrics.add_channels_written(
                    results.channels.values().filter(|c| !c.is_empty()).count(),
                );
                debug!(sink = %self.name, "write complete");
                Ok(())
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                error!(sink = %self.name, error = %e, "Write failed");
                Err(e)
            }
        }
    }

    /// Flush the sink
    #[instrument(name = "sink_handle_flush", skip(self), fields(sink = %self.name))]
    pub fn flush(&mut self) -> Result<(), ContractError> {
        self.sink.flush().inspect_err(|e| {
            error!(sink = %self.name, error = %e, "Flush failed");
        })
    }
}

//! Dispatcher - fan-out of processing results to sinks

use std::collections::HashSet;

use tracing::{info, instrument, warn};

use contracts::{ProcessingResults, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{CsvSink, JsonSink, LogSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    /// Create every configured sink
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(sink_count = self.config.sinks.len())
    )]
    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut names = HashSet::new();
        let mut handles = Vec::with_capacity(self.config.sinks.len());
        for sink_config in &self.config.sinks {
            if !names.insert(sink_config.name.as_str()) {
                return Err(DispatcherError::DuplicateSink(sink_config.name.clone()));
            }
            handles.push(create_sink_handle(sink_config)?);
        }
        Ok(Dispatcher { handles })
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => Ok(SinkHandle::new(LogSink::new(&config.name))),
        SinkType::Csv => {
            let sink = CsvSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::new(sink))
        }
        SinkType::Json => {
            let sink = JsonSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::new(sink))
        }
    }
}

/// Fans processing results out to every sink
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>) -> Self {
        Self { handles }
    }

    /// Number of sinks
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no sinks are configured
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Write results to every sink, then flush them.
    ///
    /// A failing sink does not stop the others.
    ///
    /// # Errors
    /// `SinksFailed` naming every sink whose write or flush failed.
    #[instrument(
        name = "dispatcher_dispatch",
        skip(self, results),
        fields(source = %results.source, sinks = self.handles.len())
    )]
    pub fn dispatch(&mut self, results: &ProcessingResults) -> Result<(), DispatcherError> {
        let mut failed = Vec::new();
        for handle in &mut self.handles {
            if handle.write(results).and_then(|()| handle.flush()).is_err() {
                failed.push(handle.name().to_string());
            }
        }

        if failed.is_empty() {
            info!(sinks = self.handles.len(), "results dispatched");
            Ok(())
        } else {
            warn!(failed = ?failed, "some sinks failed");
            Err(DispatcherError::SinksFailed(failed))
        }
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs))]
pub fn create_dispatcher(sink_configs: Vec<SinkConfig>) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config).build()
}

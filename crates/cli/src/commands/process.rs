//! `process`, `directory` and `batch` command implementations.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{
    ProcessingConfig, ProcessingResults, ProgressCallback, ProgressEvent, SinkConfig, SinkType,
    StopHandle, TimeRange,
};
use dispatcher::{create_dispatcher, DispatcherError};
use observability::ProcessingMetricsAggregator;
use processing::{BatchWorker, DirectoryWorker, FileWorker};
use tracing::{debug, error, info, warn};

use crate::cli::{AnalysisArgs, BatchArgs, DirectoryArgs, ProcessArgs};
use crate::error::CliError;

/// Execute the `process` command
pub async fn run_process(args: &ProcessArgs) -> Result<()> {
    let config = build_config(&args.analysis)?;
    info!(file = %args.file.display(), "Processing recording");

    let mut worker =
        FileWorker::new(&args.file, config.clone()).with_progress(progress_callback());
    if let Some(ref info_dir) = args.info_dir {
        worker = worker.with_info_dir(info_dir);
    }

    let results = execute("file", None, move || worker.run()).await?;
    deliver(&results, &config, &args.analysis.output)
}

/// Execute the `directory` command
pub async fn run_directory(args: &DirectoryArgs) -> Result<()> {
    let config = build_config(&args.analysis)?;
    info!(dir = %args.dir.display(), "Processing session folders");

    let stop = StopHandle::new();
    let worker = DirectoryWorker::new(&args.dir, config.clone())
        .with_progress(progress_callback())
        .with_stop_handle(stop.clone());

    let results = execute("directory", Some(stop), move || worker.run()).await?;
    deliver(&results, &config, &args.analysis.output)
}

/// Execute the `batch` command
pub async fn run_batch(args: &BatchArgs) -> Result<()> {
    let config = build_config(&args.analysis)?;
    info!(dir = %args.dir.display(), "Processing participant folders");

    let worker = BatchWorker::new(&args.dir, config.clone()).with_progress(progress_callback());
    let stop = worker.stop_handle();

    let results = execute("batch", Some(stop), move || worker.run()).await?;
    deliver(&results, &config, &args.analysis.output)
}

/// Load the configuration file (if any) and apply CLI overrides
pub(crate) fn build_config(args: &AnalysisArgs) -> Result<ProcessingConfig> {
    let mut config = match args.config {
        Some(ref path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => ProcessingConfig::default(),
    };

    if let Some(window_minutes) = args.window_minutes {
        config.analysis.window_minutes = window_minutes;
    }
    if let Some(ref channels) = args.channels {
        config.analysis.channels = channels.clone();
    }
    if args.no_hrv {
        config.analysis.calculate_hrv = false;
    }
    if let Some(low) = args.ppi_low {
        config.ppi.low_ms = low;
    }
    if let Some(high) = args.ppi_high {
        config.ppi.high_ms = high;
    }
    if let (Some(start), Some(end)) = (&args.time_start, &args.time_end) {
        config.time_range = Some(TimeRange::new(start, end));
    }

    ConfigLoader::validate(&config).context("Invalid processing options")?;
    debug!(?config, "Effective configuration");
    Ok(config)
}

/// Sinks from the configuration, or log + csv + json into `output`
pub(crate) fn sink_configs(config: &ProcessingConfig, output: &Path) -> Vec<SinkConfig> {
    if !config.sinks.is_empty() {
        return config.sinks.clone();
    }

    let dir = output.display().to_string();
    vec![
        SinkConfig::new("console", SinkType::Log),
        SinkConfig::new("csv", SinkType::Csv).with_param("dir", &dir),
        SinkConfig::new("json", SinkType::Json).with_param("dir", &dir),
    ]
}

/// Forward worker events to the log
fn progress_callback() -> ProgressCallback {
    Arc::new(|event: ProgressEvent| match event {
        ProgressEvent::Progress(percent) => debug!(percent, "Progress"),
        ProgressEvent::Status(message) => info!("{message}"),
        ProgressEvent::Error(message) => error!("{message}"),
    })
}

/// Run a worker on the blocking pool until it finishes or a shutdown signal arrives.
///
/// With a stop handle the signal asks the worker to stop and its partial
/// results are kept; without one the run is abandoned.
async fn execute<F>(mode: &str, stop: Option<StopHandle>, job: F) -> Result<ProcessingResults>
where
    F: FnOnce() -> processing::Result<ProcessingResults> + Send + 'static,
{
    let started = Instant::now();
    let mut task = tokio::task::spawn_blocking(job);

    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = shutdown_signal() => {
            let Some(stop) = stop else {
                warn!(mode, "Received shutdown signal, abandoning run");
                return Err(CliError::interrupted(mode).into());
            };
            warn!(mode, "Received shutdown signal, stopping after the current folder...");
            stop.stop();
            task.await
        }
    };

    let results = joined
        .context("Worker task failed")?
        .with_context(|| format!("{mode} processing failed"))?;

    let elapsed = started.elapsed();
    observability::record_processing_results(mode, &results, elapsed);
    info!(
        mode,
        source = %results.source,
        ppi = results.total_ppi(),
        windows = results.total_windows(),
        duration_secs = elapsed.as_secs_f64(),
        "Processing completed"
    );
    Ok(results)
}

/// Dispatch results to the sinks and print the run summary
fn deliver(results: &ProcessingResults, config: &ProcessingConfig, output: &Path) -> Result<()> {
    let mut dispatcher =
        create_dispatcher(sink_configs(config, output)).context("Failed to create sinks")?;
    let outcome = dispatcher.dispatch(results);

    for (name, snapshot) in dispatcher.metrics() {
        observability::record_sink_write(&name, snapshot.failure_count == 0);
    }

    let mut aggregator = ProcessingMetricsAggregator::new();
    aggregator.update(results);
    println!("\n{}", aggregator.summary());

    match outcome {
        Ok(()) => Ok(()),
        Err(DispatcherError::SinksFailed(names)) => Err(CliError::SinksFailed { names }.into()),
        Err(e) => Err(e).context("Failed to dispatch results"),
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! `simulate` command implementation.

use anyhow::{Context, Result};
use ingestion::{SyntheticConfig, SyntheticFormat, SyntheticRecording};
use tracing::info;

use crate::cli::{SimulateArgs, SimulateFormat};

/// Execute the `simulate` command
pub fn run_simulate(args: &SimulateArgs) -> Result<()> {
    let config = synthetic_config(args)?;
    info!(
        dir = %args.dir.display(),
        heart_rate = config.heart_rate_bpm,
        duration_secs = config.duration_secs,
        "Generating synthetic recording"
    );

    let recording = SyntheticRecording::generate(config);
    let path = recording
        .write_to_dir(&args.dir)
        .with_context(|| format!("Failed to write recording into {}", args.dir.display()))?;

    println!(
        "Wrote {} samples to {}",
        recording.samples.len(),
        path.display()
    );
    Ok(())
}

fn synthetic_config(args: &SimulateArgs) -> Result<SyntheticConfig> {
    if !(args.sample_rate > 0.0 && args.heart_rate > 0.0 && args.duration_secs > 0.0) {
        anyhow::bail!("--sample-rate, --heart-rate and --duration-secs must be positive");
    }
    if let Some(start) = args.start_time {
        if start < 0 || chrono::DateTime::from_timestamp(start, 0).is_none() {
            anyhow::bail!("--start-time {start} is not a valid unix timestamp");
        }
    }

    let defaults = SyntheticConfig::default();
    Ok(SyntheticConfig {
        sample_rate_hz: args.sample_rate,
        heart_rate_bpm: args.heart_rate,
        duration_secs: args.duration_secs,
        seed: args.seed,
        format: match args.format {
            SimulateFormat::Delta => SyntheticFormat::Delta,
            SimulateFormat::Absolute => SyntheticFormat::Absolute,
        },
        start_time_s: args.start_time.unwrap_or(defaults.start_time_s),
        batch_size: (args.sample_rate.round() as usize).max(1),
        ..defaults
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestion::Recording;
    use std::path::PathBuf;

    fn args(dir: PathBuf) -> SimulateArgs {
        SimulateArgs {
            dir,
            duration_secs: 30.0,
            heart_rate: 72.0,
            sample_rate: 50.0,
            format: SimulateFormat::Absolute,
            seed: 7,
            start_time: None,
        }
    }

    #[test]
    fn test_writes_loadable_recording() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join("Epoch1");
        run_simulate(&args(session.clone())).unwrap();

        let recording = Recording::load(
            &session.join("ppg.csv"),
            None,
            contracts::MalformedPolicy::Abort,
        )
        .unwrap();
        assert!(recording.len() >= 1400);
        assert!(!session.join("info.txt").exists());
    }

    #[test]
    fn test_rejects_non_positive_rates() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = args(dir.path().to_path_buf());
        bad.sample_rate = 0.0;
        assert!(run_simulate(&bad).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = args(dir.path().to_path_buf());
        bad.start_time = Some(i64::MAX);
        assert!(run_simulate(&bad).is_err());
        assert!(!dir.path().join("ppg.csv").exists());
    }
}

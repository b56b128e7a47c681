//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use contracts::Channel;
use std::path::PathBuf;

/// PPG Processor - pulse interval and HRV analysis for PPG recordings
#[derive(Parser, Debug)]
#[command(
    name = "ppg-processor",
    author,
    version,
    about = "PPG pulse interval and HRV processing pipeline",
    long_about = "Reads 5-column PPG recordings (delta/timestamp, P0, P1, P2, AMBIENT),\n\
                  detects systolic peaks, derives pulse-to-pulse intervals and windowed \n\
                  HRV metrics, and writes the results to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "PPG_PROCESSOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "PPG_PROCESSOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a recording and print its samples
    Read(ReadArgs),

    /// Process a single recording file
    Process(ProcessArgs),

    /// Process a directory of session folders as one dataset
    Directory(DirectoryArgs),

    /// Process a directory of participant folders
    Batch(BatchArgs),

    /// Validate configuration file without processing
    Validate(ValidateArgs),

    /// Write a synthetic recording
    Simulate(SimulateArgs),
}

impl Commands {
    /// Prometheus port requested by a processing command
    pub fn metrics_port(&self) -> Option<u16> {
        let analysis = match self {
            Commands::Process(args) => &args.analysis,
            Commands::Directory(args) => &args.analysis,
            Commands::Batch(args) => &args.analysis,
            _ => return None,
        };
        analysis.metrics_port.filter(|port| *port != 0)
    }
}

/// Arguments for the `read` command
#[derive(Parser, Debug)]
pub struct ReadArgs {
    /// Recording to read
    pub file: PathBuf,

    /// Print samples as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Stop after N samples
    #[arg(long)]
    pub limit: Option<usize>,

    /// Skip malformed lines instead of aborting
    #[arg(long, env = "PPG_PROCESSOR_SKIP_MALFORMED")]
    pub skip_malformed: bool,
}

/// Options shared by the processing commands
#[derive(Args, Debug, Clone)]
pub struct AnalysisArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "PPG_PROCESSOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// HRV window length in minutes
    #[arg(long, env = "PPG_PROCESSOR_WINDOW_MINUTES")]
    pub window_minutes: Option<u32>,

    /// Channels to process (comma separated, e.g. p0,p1)
    #[arg(long, value_delimiter = ',', env = "PPG_PROCESSOR_CHANNELS")]
    pub channels: Option<Vec<Channel>>,

    /// Skip HRV calculation and export PPI only
    #[arg(long)]
    pub no_hrv: bool,

    /// Lower PPI threshold in milliseconds
    #[arg(long, env = "PPG_PROCESSOR_PPI_LOW")]
    pub ppi_low: Option<f64>,

    /// Upper PPI threshold in milliseconds
    #[arg(long, env = "PPG_PROCESSOR_PPI_HIGH")]
    pub ppi_high: Option<f64>,

    /// Start of the time-of-day range (HH:MM)
    #[arg(long, requires = "time_end")]
    pub time_start: Option<String>,

    /// End of the time-of-day range (HH:MM)
    #[arg(long, requires = "time_start")]
    pub time_end: Option<String>,

    /// Output directory for the default csv/json sinks
    #[arg(short, long, default_value = "output", env = "PPG_PROCESSOR_OUTPUT")]
    pub output: PathBuf,

    /// Metrics server port (0 = disabled)
    #[arg(long, env = "PPG_PROCESSOR_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `process` command
#[derive(Parser, Debug)]
pub struct ProcessArgs {
    /// Recording to process
    pub file: PathBuf,

    /// Directory holding info.txt (defaults to the file's directory)
    #[arg(long)]
    pub info_dir: Option<PathBuf>,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

/// Arguments for the `directory` command
#[derive(Parser, Debug)]
pub struct DirectoryArgs {
    /// Directory whose subfolders each hold a ppg.csv
    pub dir: PathBuf,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

/// Arguments for the `batch` command
#[derive(Parser, Debug)]
pub struct BatchArgs {
    /// Directory whose subfolders are participants
    pub dir: PathBuf,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "ppg.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `simulate` command
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Directory to write ppg.csv (and info.txt) into
    pub dir: PathBuf,

    /// Recording length in seconds
    #[arg(long, default_value = "120")]
    pub duration_secs: f64,

    /// Heart rate in beats per minute
    #[arg(long, default_value = "60")]
    pub heart_rate: f64,

    /// Sampling rate in Hz
    #[arg(long, default_value = "25")]
    pub sample_rate: f64,

    /// First-column format
    #[arg(long, value_enum, default_value = "delta")]
    pub format: SimulateFormat,

    /// Random seed for the noise
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Recording start as unix seconds
    #[arg(long)]
    pub start_time: Option<i64>,
}

/// First-column format of a synthetic recording
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum SimulateFormat {
    /// Millisecond deltas with info.txt start time
    #[default]
    Delta,
    /// Unix millisecond timestamps
    Absolute,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_process_arguments() {
        let cli = Cli::try_parse_from([
            "ppg-processor",
            "-v",
            "process",
            "session/ppg.csv",
            "--channels",
            "p0,p2",
            "--no-hrv",
            "--time-start",
            "22:00",
            "--time-end",
            "23:00",
            "--metrics-port",
            "9100",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        assert_eq!(cli.command.metrics_port(), Some(9100));
        let Commands::Process(args) = cli.command else {
            panic!("expected process command");
        };
        assert_eq!(args.analysis.channels, Some(vec![Channel::P0, Channel::P2]));
        assert!(args.analysis.no_hrv);
        assert_eq!(args.analysis.output, PathBuf::from("output"));
    }

    #[test]
    fn test_time_range_requires_both_ends() {
        let result = Cli::try_parse_from([
            "ppg-processor",
            "directory",
            "data",
            "--time-start",
            "22:00",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_metrics_port_zero_disables_exporter() {
        let cli =
            Cli::try_parse_from(["ppg-processor", "batch", "data", "--metrics-port", "0"]).unwrap();
        assert_eq!(cli.command.metrics_port(), None);
    }
}

//! `read` command implementation.

use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use ingestion::{MalformedPolicy, RecordReader, RecordWriter};
use tracing::info;

use crate::cli::ReadArgs;

/// Execute the `read` command
pub fn run_read(args: &ReadArgs) -> Result<()> {
    let policy = if args.skip_malformed {
        MalformedPolicy::Skip
    } else {
        MalformedPolicy::Abort
    };
    info!(file = %args.file.display(), ?policy, "Reading recording");

    let reader = RecordReader::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?
        .with_policy(policy);
    let metrics = reader.metrics().clone();
    let limit = args.limit.unwrap_or(usize::MAX);

    let stdout = io::stdout().lock();
    if args.json {
        let mut out = BufWriter::new(stdout);
        for sample in reader.take(limit) {
            let sample = sample.context("Failed to read recording")?;
            serde_json::to_writer(&mut out, &sample).context("Failed to serialize sample")?;
            writeln!(out)?;
        }
        out.flush()?;
    } else {
        let mut out = RecordWriter::new(BufWriter::new(stdout));
        for sample in reader.take(limit) {
            out.write(&sample.context("Failed to read recording")?)?;
        }
        out.flush()?;
    }

    let snapshot = metrics.snapshot();
    info!(
        records = snapshot.records_parsed,
        malformed = snapshot.malformed_records,
        blank = snapshot.blank_lines,
        "Recording read"
    );
    Ok(())
}

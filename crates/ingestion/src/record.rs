//! Single-record codec
//!
//! Parses one line of `delta/timestamp,P0,P1,P2,AMBIENT` into a `PpgSample`
//! and writes samples back in the same layout.

use std::io::Write;
use std::str::FromStr;

use contracts::{PpgSample, FIELD_COUNT};

use crate::error::{IngestionError, Result};

const COLUMN_NAMES: [&str; FIELD_COUNT] = ["delta/timestamp", "P0", "P1", "P2", "AMBIENT"];

/// Parse one text line into a sample.
///
/// Trailing line terminators are ignored; whitespace around each field is
/// trimmed. `line_number` is only used for error context.
///
/// # Errors
/// `MalformedRecord` when the line does not have exactly five fields or a
/// field is not an integer.
pub fn parse_record(line: &str, line_number: u64) -> Result<PpgSample> {
    let line = line.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = line.split(',').collect();
    parse_fields(&fields, line_number, line)
}

/// `raw` is the original line, kept for error context.
fn parse_fields(fields: &[&str], line_number: u64, raw: &str) -> Result<PpgSample> {
    if fields.len() != FIELD_COUNT {
        return Err(malformed(
            line_number,
            raw,
            format!("expected {FIELD_COUNT} fields, found {}", fields.len()),
        ));
    }

    let delta_or_timestamp = parse_field::<u64>(fields, 0, line_number, raw)?;
    let p0 = parse_field::<i64>(fields, 1, line_number, raw)?;
    let p1 = parse_field::<i64>(fields, 2, line_number, raw)?;
    let p2 = parse_field::<i64>(fields, 3, line_number, raw)?;
    let ambient = parse_field::<i64>(fields, 4, line_number, raw)?;

    Ok(PpgSample::new(delta_or_timestamp, p0, p1, p2, ambient))
}

fn parse_field<T>(fields: &[&str], index: usize, line_number: u64, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let field = fields[index].trim();
    field.parse::<T>().map_err(|e| {
        malformed(
            line_number,
            raw,
            format!("{} field {:?} is not an integer: {e}", COLUMN_NAMES[index], field),
        )
    })
}

fn malformed(line_number: u64, raw: &str, reason: String) -> IngestionError {
    IngestionError::MalformedRecord {
        line_number,
        line: raw.to_string(),
        reason,
    }
}

/// Writes samples in the input layout, one per line, no header.
pub struct RecordWriter<W: Write> {
    inner: csv::Writer<W>,
    written: u64,
}

impl<W: Write> RecordWriter<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        let inner = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        Self { inner, written: 0 }
    }

    /// Write one sample
    pub fn write(&mut self, sample: &PpgSample) -> Result<()> {
        self.inner
            .write_record([
                sample.delta_or_timestamp.to_string(),
                sample.p0.to_string(),
                sample.p1.to_string(),
                sample.p2.to_string(),
                sample.ambient.to_string(),
            ])
            .map_err(|e| IngestionError::io("<writer>", e.into()))?;
        self.written += 1;
        Ok(())
    }

    /// Write every sample from an iterator
    pub fn write_all<'a>(&mut self, samples: impl IntoIterator<Item = &'a PpgSample>) -> Result<()> {
        for sample in samples {
            self.write(sample)?;
        }
        Ok(())
    }

    /// Samples written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush buffered output
    pub fn flush(&mut self) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| IngestionError::io("<writer>", e))
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|e| IngestionError::io("<writer>", e.into_error()))
    }
}

//! CSV Record Reader
//!
//! 惰性读取 PPG CSV 流，每个非空行产出一个 `PpgSample`，保持文件顺序。
//! 读取器拥有底层句柄，消费完毕、出错或提前丢弃时随之释放；不可重启。

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use contracts::PpgSample;
use metrics::counter;
use tracing::{debug, warn};

use crate::config::{IngestionMetrics, MalformedPolicy};
use crate::error::{IngestionError, Result};
use crate::record::parse_record;

/// Lazy sample reader over any byte source
pub struct RecordReader<R: Read> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    line_number: u64,
    policy: MalformedPolicy,
    metrics: Arc<IngestionMetrics>,
    source_name: String,
    finished: bool,
}

impl RecordReader<File> {
    /// Open a file for reading
    ///
    /// # Errors
    /// `Io` if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| IngestionError::io(path.display().to_string(), e))?;
        debug!(path = %path.display(), "opened PPG recording");
        let reader = Self::new(file).with_source_name(path.display().to_string());
        reader.metrics.record_file_opened();
        Ok(reader)
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap an open byte stream
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::with_capacity(64),
            line_number: 0,
            policy: MalformedPolicy::default(),
            metrics: Arc::new(IngestionMetrics::new()),
            source_name: "<stream>".to_string(),
            finished: false,
        }
    }

    /// Set the malformed-record policy
    pub fn with_policy(mut self, policy: MalformedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Share a metrics instance; an already opened file carries over.
    pub fn with_metrics(mut self, metrics: Arc<IngestionMetrics>) -> Self {
        if self.metrics.snapshot().files_opened > 0 {
            metrics.record_file_opened();
        }
        self.metrics = metrics;
        self
    }

    /// Name used in errors and log events
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    /// Current malformed-record policy
    pub fn policy(&self) -> MalformedPolicy {
        self.policy
    }

    /// Metrics collected by this reader
    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }

    /// Physical lines consumed so far
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Read the next non-blank line, returning `None` at end of input.
    fn read_next(&mut self) -> Option<Result<PpgSample>> {
        loop {
            self.buf.clear();
            match self.inner.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line_number += 1,
                Err(e) => return Some(Err(IngestionError::io(self.source_name.clone(), e))),
            }

            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line.trim_end_matches(['\r', '\n']),
                Err(e) => {
                    return Some(Err(IngestionError::MalformedRecord {
                        line_number: self.line_number,
                        line: String::from_utf8_lossy(&self.buf).trim_end().to_string(),
                        reason: format!("invalid UTF-8: {e}"),
                    }))
                }
            };

            if line.trim().is_empty() {
                self.metrics.record_blank();
                continue;
            }

            return Some(parse_record(line, self.line_number));
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<PpgSample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.read_next() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Ok(sample)) => {
                    self.metrics.record_parsed();
                    return Some(Ok(sample));
                }
                Some(Err(err)) if err.is_malformed() => {
                    self.metrics.record_malformed();
                    counter!("ppg_processor_malformed_records_total").increment(1);
                    match self.policy {
                        MalformedPolicy::Abort => {
                            self.finished = true;
                            return Some(Err(err));
                        }
                        MalformedPolicy::Skip => {
                            warn!(source = %self.source_name, error = %err, "skipping malformed record");
                        }
                    }
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for RecordReader<R> {}

/// Read every sample of a file into memory
///
/// # Errors
/// The first `Io` error, or the first `MalformedRecord` under `Abort`.
pub fn read_samples(path: impl AsRef<Path>, policy: MalformedPolicy) -> Result<Vec<PpgSample>> {
    let reader = RecordReader::open(path)?.with_policy(policy);
    let samples = reader.collect::<Result<Vec<_>>>()?;
    counter!("ppg_processor_records_read_total").increment(samples.len() as u64);
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};

    const DOC_EXAMPLE: &str = "499,270445,314778,266630,1042\n\
                               0,270102,314364,266328,1023\n\
                               0,269850,313994,266047,1057\n";

    #[test]
    fn test_reads_documented_example_in_order() {
        let samples: Vec<_> = RecordReader::new(DOC_EXAMPLE.as_bytes())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            samples,
            vec![
                PpgSample::new(499, 270445, 314778, 266630, 1042),
                PpgSample::new(0, 270102, 314364, 266328, 1023),
                PpgSample::new(0, 269850, 313994, 266047, 1057),
            ]
        );
    }

    #[test]
    fn test_first_line_is_data_not_header() {
        let mut reader = RecordReader::new("1,2,3,4,5\n".as_bytes());
        assert_eq!(reader.next().unwrap().unwrap(), PpgSample::new(1, 2, 3, 4, 5));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_skips_blank_lines_but_counts_physical_lines() {
        let data = "1,2,3,4,5\n\n   \n0,2,3,4,5\n1,2,3\n";
        let mut reader = RecordReader::new(data.as_bytes());
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_ok());
        match reader.next().unwrap().unwrap_err() {
            IngestionError::MalformedRecord {
                line_number, line, ..
            } => {
                assert_eq!(line_number, 5);
                assert_eq!(line, "1,2,3");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(reader.next().is_none());
        assert_eq!(reader.metrics().snapshot().blank_lines, 2);
    }

    #[test]
    fn test_abort_policy_stops_at_first_bad_line() {
        let data = "1,2,3,4,5\na,2,3,4,5\n0,2,3,4,5\n";
        let results: Vec<_> = RecordReader::new(data.as_bytes()).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_skip_policy_continues_past_bad_lines() {
        let data = "1,2,3,4,5\na,2,3,4,5\n1,2,3\n0,9,9,9,9\n";
        let reader = RecordReader::new(data.as_bytes()).with_policy(MalformedPolicy::Skip);
        let metrics = Arc::clone(reader.metrics());
        let samples: Vec<_> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1], PpgSample::new(0, 9, 9, 9, 9));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_parsed, 2);
        assert_eq!(snapshot.malformed_records, 2);
    }

    #[test]
    fn test_handles_crlf_and_missing_trailing_newline() {
        let data = "1,2,3,4,5\r\n0,6,7,8,9";
        let samples: Vec<_> = RecordReader::new(data.as_bytes())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1], PpgSample::new(0, 6, 7, 8, 9));
    }

    #[test]
    fn test_quotes_are_not_special() {
        let err = RecordReader::new("\"1\",2,3,4,5\n".as_bytes())
            .next()
            .unwrap()
            .unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = match RecordReader::open("/nonexistent/dir/ppg.csv") {
            Ok(_) => panic!("expected io failure"),
            Err(e) => e,
        };
        assert!(matches!(err, IngestionError::Io { .. }));
        assert!(!err.is_malformed());
    }

    #[test]
    fn test_open_counts_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1,2,3,4,5").unwrap();

        let reader = RecordReader::open(file.path()).unwrap();
        assert_eq!(reader.metrics().snapshot().files_opened, 1);

        let shared = Arc::new(IngestionMetrics::new());
        let _reader = RecordReader::open(file.path())
            .unwrap()
            .with_metrics(Arc::clone(&shared));
        assert_eq!(shared.snapshot().files_opened, 1);

        let _stream = RecordReader::new("1,2,3,4,5\n".as_bytes()).with_metrics(Arc::clone(&shared));
        assert_eq!(shared.snapshot().files_opened, 1);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device unplugged"))
        }
    }

    #[test]
    fn test_read_failure_is_io_error_and_ends_iteration() {
        let mut reader = RecordReader::new(FailingReader).with_source_name("sensor");
        let err = reader.next().unwrap().unwrap_err();
        match &err {
            IngestionError::Io { source_name, .. } => assert_eq!(source_name, "sensor"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_read_samples_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOC_EXAMPLE.as_bytes()).unwrap();
        let samples = read_samples(file.path(), MalformedPolicy::Abort).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2].ambient, 1057);
    }

    #[test]
    fn test_n_lines_yield_n_samples() {
        let lines: String = (0..500)
            .map(|i| format!("{},{},{},{},{}\n", i % 3, i, i + 1, i + 2, 1000 + i))
            .collect();
        let samples: Vec<_> = RecordReader::new(lines.as_bytes())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(samples.len(), 500);
        assert!(samples.iter().enumerate().all(|(i, s)| s.p0 == i as i64));
    }
}

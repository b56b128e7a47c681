//! Reader configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};

pub use contracts::MalformedPolicy;

/// Ingestion metrics
///
/// Shared between readers through `Arc` so a batch run can report totals.
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total records parsed into samples
    pub records_parsed: AtomicU64,

    /// Malformed records encountered (aborting or skipped)
    pub malformed_records: AtomicU64,

    /// Blank lines ignored
    pub blank_lines: AtomicU64,

    /// Files opened
    pub files_opened: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a parsed sample
    pub fn record_parsed(&self) {
        self.records_parsed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a malformed line
    pub fn record_malformed(&self) {
        self.malformed_records.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a blank line
    pub fn record_blank(&self) {
        self.blank_lines.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a file open
    pub fn record_file_opened(&self) {
        self.files_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_parsed: self.records_parsed.load(Ordering::Relaxed),
            malformed_records: self.malformed_records.load(Ordering::Relaxed),
            blank_lines: self.blank_lines.load(Ordering::Relaxed),
            files_opened: self.files_opened.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total records parsed into samples
    pub records_parsed: u64,

    /// Malformed records encountered
    pub malformed_records: u64,

    /// Blank lines ignored
    pub blank_lines: u64,

    /// Files opened
    pub files_opened: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = IngestionMetrics::new();
        metrics.record_parsed();
        metrics.record_parsed();
        metrics.record_malformed();
        metrics.record_blank();
        metrics.record_file_opened();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                records_parsed: 2,
                malformed_records: 1,
                blank_lines: 1,
                files_opened: 1,
            }
        );
    }
}

//! Peak-to-peak intervals.

use chrono::{DateTime, Utc};
use contracts::PpiRecord;
use tracing::debug;

use crate::rate::millis_between;

/// Detected peak before interval computation
#[derive(Debug, Clone, PartialEq)]
pub struct Peak {
    pub time: DateTime<Utc>,
    pub amplitude: f64,
    pub quality: f64,
}

/// Sort peaks by time and emit one record per peak after the first.
///
/// `ppi_ms` is the distance to the preceding peak; the first peak has none
/// and is dropped.
pub fn compute_ppi(mut peaks: Vec<Peak>) -> Vec<PpiRecord> {
    peaks.sort_by_key(|p| p.time);
    peaks
        .windows(2)
        .map(|pair| PpiRecord {
            time: pair[1].time,
            ppi_ms: millis_between(pair[0].time, pair[1].time),
            amplitude: pair[1].amplitude,
            quality: pair[1].quality,
            folder: None,
            participant: None,
        })
        .collect()
}

/// Keep records with `low_ms <= ppi_ms <= high_ms`; returns the removed count.
pub fn clean_ppi(records: Vec<PpiRecord>, low_ms: f64, high_ms: f64) -> (Vec<PpiRecord>, usize) {
    let before = records.len();
    let kept: Vec<PpiRecord> = records
        .into_iter()
        .filter(|r| r.ppi_ms >= low_ms && r.ppi_ms <= high_ms)
        .collect();
    let removed = before - kept.len();
    debug!(removed, kept = kept.len(), low_ms, high_ms, "cleaned PPI");
    (kept, removed)
}

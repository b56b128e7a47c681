//! Processing results - Signal / Processing output
//!
//! Peak-to-peak intervals (PPI) and heart-rate-variability (HRV) windows per channel.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Channel;

/// One detected pulse peak with the interval to the previous peak
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpiRecord {
    /// Peak time
    pub time: DateTime<Utc>,

    /// Interval to the previous peak (ms)
    pub ppi_ms: f64,

    /// Filtered channel value at the peak
    pub amplitude: f64,

    /// Template-match quality (0..1)
    pub quality: f64,

    /// Session folder the peak came from (directory / batch mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,

    /// Participant id (batch mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

/// Time-domain HRV statistics over a set of PPI values
///
/// `None` marks a metric that is undefined for the input (fewer than two
/// intervals, or a zero mean for the coefficient-of-variation metrics).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HrvMetrics {
    pub mean_nn: Option<f64>,
    pub sdnn: Option<f64>,
    pub rmssd: Option<f64>,
    pub sdsd: Option<f64>,
    pub cvnn: Option<f64>,
    pub cvsd: Option<f64>,
    pub median_nn: Option<f64>,
    pub num_data_points: usize,
    pub mean_quality: Option<f64>,
}

/// HRV metrics for one time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(flatten)]
    pub metrics: HrvMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

/// Mean of each metric across all windows of a channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallMetrics {
    pub window_count: usize,
    #[serde(flatten)]
    pub metrics: HrvMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
}

/// Result for a single channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelResult {
    /// Cleaned PPI records, sorted by time
    pub ppi: Vec<PpiRecord>,

    /// HRV windows (None when HRV is disabled)
    pub hrv: Option<Vec<HrvWindow>>,

    /// Overall metrics (directory / batch mode)
    pub overall: Option<OverallMetrics>,

    /// Number of PPI values removed by the threshold filter
    pub outliers_removed: usize,
}

impl ChannelResult {
    /// Whether any PPI survived cleaning
    pub fn is_empty(&self) -> bool {
        self.ppi.is_empty()
    }
}

/// Results of one processing run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResults {
    /// Label of the processed input, used to name exported files
    pub source: String,

    /// Per-channel results
    pub channels: BTreeMap<Channel, ChannelResult>,
}

impl ProcessingResults {
    /// Create empty results for a source label
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            channels: BTreeMap::new(),
        }
    }

    /// Total PPI records across channels
    pub fn total_ppi(&self) -> usize {
        self.channels.values().map(|c| c.ppi.len()).sum()
    }

    /// Total HRV windows across channels
    pub fn total_windows(&self) -> usize {
        self.channels
            .values()
            .filter_map(|c| c.hrv.as_ref())
            .map(Vec::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(ppi_ms: f64) -> PpiRecord {
        PpiRecord {
            time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            ppi_ms,
            amplitude: 0.0,
            quality: 1.0,
            folder: None,
            participant: None,
        }
    }

    #[test]
    fn test_totals_across_channels() {
        let mut results = ProcessingResults::new("session");
        results.channels.insert(
            Channel::P0,
            ChannelResult {
                ppi: vec![record(900.0), record(950.0)],
                hrv: Some(vec![]),
                ..Default::default()
            },
        );
        results.channels.insert(
            Channel::P1,
            ChannelResult {
                ppi: vec![record(1000.0)],
                hrv: None,
                ..Default::default()
            },
        );
        assert_eq!(results.total_ppi(), 3);
        assert_eq!(results.total_windows(), 0);
    }

    #[test]
    fn test_hrv_window_flattens_metrics() {
        let window = HrvWindow {
            start_time: Utc.timestamp_opt(0, 0).unwrap(),
            end_time: Utc.timestamp_opt(60, 0).unwrap(),
            metrics: HrvMetrics {
                mean_nn: Some(800.0),
                num_data_points: 4,
                ..Default::default()
            },
            folder: Some("Epoch1".into()),
            participant: None,
        };
        let json = serde_json::to_value(&window).unwrap();
        assert_eq!(json["mean_nn"], 800.0);
        assert_eq!(json["folder"], "Epoch1");
        assert!(json.get("participant").is_none());
    }
}

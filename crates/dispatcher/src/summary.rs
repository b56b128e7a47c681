//! Per-channel summary shared by the log and JSON sinks

use contracts::{ChannelResult, OverallMetrics};
use serde::Serialize;

/// Headline numbers for one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSummary {
    pub peaks: usize,
    pub outliers_removed: usize,
    pub mean_ppi_ms: Option<f64>,
    pub min_ppi_ms: Option<f64>,
    pub max_ppi_ms: Option<f64>,
    pub mean_quality: Option<f64>,
    pub windows: usize,
    pub mean_sdnn_ms: Option<f64>,
    pub mean_rmssd_ms: Option<f64>,
    /// `60000 / mean(MeanNN)` over the HRV windows
    pub heart_rate_bpm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<OverallMetrics>,
}

impl ChannelSummary {
    pub fn from_result(result: &ChannelResult) -> Self {
        let ppi: Vec<f64> = result.ppi.iter().map(|r| r.ppi_ms).collect();
        let quality: Vec<f64> = result.ppi.iter().map(|r| r.quality).collect();
        let windows = result.hrv.as_deref().unwrap_or_default();

        let column = |get: fn(&contracts::HrvMetrics) -> Option<f64>| {
            let values: Vec<f64> = windows.iter().filter_map(|w| get(&w.metrics)).collect();
            mean(&values)
        };
        let mean_nn = column(|m| m.mean_nn);

        Self {
            peaks: result.ppi.len(),
            outliers_removed: result.outliers_removed,
            mean_ppi_ms: mean(&ppi),
            min_ppi_ms: ppi.iter().copied().reduce(f64::min),
            max_ppi_ms: ppi.iter().copied().reduce(f64::max),
            mean_quality: mean(&quality),
            windows: windows.len(),
            mean_sdnn_ms: column(|m| m.sdnn),
            mean_rmssd_ms: column(|m| m.rmssd),
            heart_rate_bpm: mean_nn.filter(|m| *m > 0.0).map(|m| 60_000.0 / m),
            overall: result.overall.clone(),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

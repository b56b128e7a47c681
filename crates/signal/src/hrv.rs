//! Time-domain HRV metrics and windowing.

use chrono::{DateTime, TimeDelta, Utc};
use contracts::{HrvMetrics, HrvWindow, OverallMetrics, PpiRecord};

/// Time-domain metrics over a series of intervals (ms) and quality scores.
///
/// Fewer than two intervals leave every metric undefined; only the count is
/// reported.
pub fn hrv_metrics(ppi_ms: &[f64], quality: &[f64]) -> HrvMetrics {
    let n = ppi_ms.len();
    if n < 2 {
        return HrvMetrics {
            num_data_points: n,
            ..Default::default()
        };
    }

    let mean_nn = mean(ppi_ms);
    let sdnn = sample_std(ppi_ms);
    let diffs: Vec<f64> = ppi_ms.windows(2).map(|w| w[1] - w[0]).collect();
    let rmssd = (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt();
    let sdsd = sample_std(&diffs);
    let ratio = |value: Option<f64>| value.filter(|_| mean_nn != 0.0).map(|v| v / mean_nn);

    HrvMetrics {
        mean_nn: Some(mean_nn),
        sdnn,
        rmssd: Some(rmssd),
        sdsd,
        cvnn: ratio(sdnn),
        cvsd: ratio(Some(rmssd)),
        median_nn: Some(median(ppi_ms)),
        num_data_points: n,
        mean_quality: (!quality.is_empty()).then(|| mean(quality)),
    }
}

/// Split time-ordered records into HRV windows.
///
/// A window starts at its first record and accepts records until one is more
/// than `window_minutes` after the start, or more than `gap_minutes` after
/// the previous record. Windows with a single record are dropped.
pub fn hrv_windows(records: &[PpiRecord], window_minutes: u32, gap_minutes: f64) -> Vec<HrvWindow> {
    let window = TimeDelta::minutes(i64::from(window_minutes));
    let gap = TimeDelta::milliseconds((gap_minutes * 60_000.0).round() as i64);

    let mut windows = Vec::new();
    let mut bin: Vec<&PpiRecord> = Vec::new();
    let mut bin_start: Option<DateTime<Utc>> = None;

    for record in records {
        let start = *bin_start.get_or_insert(record.time);
        let within_window = record.time - start <= window;
        let after_gap = bin
            .last()
            .is_some_and(|prev| record.time - prev.time > gap);

        if within_window && !after_gap {
            bin.push(record);
            continue;
        }

        close_bin(&bin, start, &mut windows);
        bin.clear();
        bin.push(record);
        bin_start = Some(record.time);
    }

    if let Some(start) = bin_start {
        close_bin(&bin, start, &mut windows);
    }
    windows
}

fn close_bin(bin: &[&PpiRecord], start: DateTime<Utc>, windows: &mut Vec<HrvWindow>) {
    let Some(last) = bin.last() else {
        return;
    };
    if bin.len() < 2 {
        return;
    }
    let ppi: Vec<f64> = bin.iter().map(|r| r.ppi_ms).collect();
    let quality: Vec<f64> = bin.iter().map(|r| r.quality).collect();
    windows.push(HrvWindow {
        start_time: start,
        end_time: last.time,
        metrics: hrv_metrics(&ppi, &quality),
        folder: None,
        participant: None,
    });
}

/// Mean of every metric across windows, skipping undefined values.
pub fn overall_metrics(windows: &[HrvWindow]) -> Option<OverallMetrics> {
    if windows.is_empty() {
        return None;
    }
    let column = |get: fn(&HrvMetrics) -> Option<f64>| {
        let values: Vec<f64> = windows.iter().filter_map(|w| get(&w.metrics)).collect();
        (!values.is_empty()).then(|| mean(&values))
    };
    let points: Vec<f64> = windows
        .iter()
        .map(|w| w.metrics.num_data_points as f64)
        .collect();

    Some(OverallMetrics {
        window_count: windows.len(),
        metrics: HrvMetrics {
            mean_nn: column(|m| m.mean_nn),
            sdnn: column(|m| m.sdnn),
            rmssd: column(|m| m.rmssd),
            sdsd: column(|m| m.sdsd),
            cvnn: column(|m| m.cvnn),
            cvsd: column(|m| m.cvsd),
            median_nn: column(|m| m.median_nn),
            num_data_points: mean(&points).round() as usize,
            mean_quality: column(|m| m.mean_quality),
        },
        time_range: None,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with one delta degree of freedom
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

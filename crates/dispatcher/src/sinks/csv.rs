//! CsvSink - per-channel PPI and HRV tables

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use contracts::{ContractError, HrvWindow, PpiRecord, ProcessingResults, ResultSink};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use super::{base_name, output_dir};

/// Writes `{base}_{channel}_ppi.csv` and `{base}_{channel}_hrv.csv`
pub struct CsvSink {
    name: String,
    dir: PathBuf,
    params: HashMap<String, String>,
    written: Vec<PathBuf>,
}

#[derive(Serialize)]
struct PpiRow<'a> {
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "PPI")]
    ppi_ms: f64,
    #[serde(rename = "Amplitude")]
    amplitude: f64,
    #[serde(rename = "Quality")]
    quality: f64,
    #[serde(rename = "Folder")]
    folder: Option<&'a str>,
    #[serde(rename = "Participant")]
    participant: Option<&'a str>,
}

impl<'a> From<&'a PpiRecord> for PpiRow<'a> {
    fn from(record: &'a PpiRecord) -> Self {
        Self {
            time: timestamp(record.time),
            ppi_ms: record.ppi_ms,
            amplitude: record.amplitude,
            quality: record.quality,
            folder: record.folder.as_deref(),
            participant: record.participant.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct HrvRow<'a> {
    #[serde(rename = "Start_Time")]
    start_time: String,
    #[serde(rename = "End_Time")]
    end_time: String,
    #[serde(rename = "MeanNN")]
    mean_nn: Option<f64>,
    #[serde(rename = "SDNN")]
    sdnn: Option<f64>,
    #[serde(rename = "RMSSD")]
    rmssd: Option<f64>,
    #[serde(rename = "SDSD")]
    sdsd: Option<f64>,
    #[serde(rename = "CVNN")]
    cvnn: Option<f64>,
    #[serde(rename = "CVSD")]
    cvsd: Option<f64>,
    #[serde(rename = "MedianNN")]
    median_nn: Option<f64>,
    #[serde(rename = "Num_Data_Points")]
    num_data_points: usize,
    #[serde(rename = "Mean_Quality")]
    mean_quality: Option<f64>,
    #[serde(rename = "Folder")]
    folder: Option<&'a str>,
    #[serde(rename = "Participant")]
    participant: Option<&'a str>,
}

impl<'a> From<&'a HrvWindow> for HrvRow<'a> {
    fn from(window: &'a HrvWindow) -> Self {
        let m = &window.metrics;
        Self {
            start_time: timestamp(window.start_time),
            end_time: timestamp(window.end_time),
            mean_nn: m.mean_nn,
            sdnn: m.sdnn,
            rmssd: m.rmssd,
            sdsd: m.sdsd,
            cvnn: m.cvnn,
            cvsd: m.cvsd,
            median_nn: m.median_nn,
            num_data_points: m.num_data_points,
            mean_quality: m.mean_quality,
            folder: window.folder.as_deref(),
            participant: window.participant.as_deref(),
        }
    }
}

fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl CsvSink {
    /// Create a CsvSink writing into `dir` (created if missing)
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            name: name.into(),
            dir,
            params: HashMap::new(),
            written: Vec::new(),
        })
    }

    /// Create from params map (`dir`, optional `base`)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let mut sink = Self::new(name, output_dir(params))?;
        sink.params = params.clone();
        Ok(sink)
    }

    /// Files written so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write_table<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), String> {
        let mut writer = ::csv::Writer::from_path(path).map_err(|e| e.to_string())?;
        for row in rows {
            writer.serialize(row).map_err(|e| e.to_string())?;
        }
        writer.flush().map_err(|e| e.to_string())
    }

    fn export(&mut self, results: &ProcessingResults) -> Result<(), String> {
        let base = base_name(&self.params, &results.source).to_string();
        for (channel, result) in &results.channels {
            if result.ppi.is_empty() {
                debug!(sink = %self.name, channel = %channel, "no PPI, skipped");
                continue;
            }

            let ppi_path = self.dir.join(format!("{base}_{channel}_ppi.csv"));
            Self::write_table(&ppi_path, result.ppi.iter().map(PpiRow::from))?;
            self.written.push(ppi_path);

            if let Some(windows) = result.hrv.as_ref().filter(|w| !w.is_empty()) {
                let hrv_path = self.dir.join(format!("{base}_{channel}_hrv.csv"));
                Self::write_table(&hrv_path, windows.iter().map(HrvRow::from))?;
                self.written.push(hrv_path);
            }
        }
        Ok(())
    }
}

impl ResultSink for CsvSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "csv_sink_write",
        skip(self, results),
        fields(sink = %self.name, source = %results.source)
    )]
    fn write(&mut self, results: &ProcessingResults) -> Result<(), ContractError> {
        self.export(results).map_err(|e| {
            error!(sink = %self.name, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e)
        })?;
        info!(sink = %self.name, dir = %self.dir.display(), files = self.written.len(), "results saved");
        Ok(())
    }

    #[instrument(name = "csv_sink_flush", skip(self))]
    fn flush(&mut self) -> Result<(), ContractError> {
        // every table is flushed when written
        Ok(())
    }
}

//! JsonSink - one summary document per run

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use contracts::{Channel, ContractError, ProcessingResults, ResultSink};
use serde::Serialize;
use tracing::{error, info, instrument};

use super::{base_name, output_dir};
use crate::summary::ChannelSummary;

/// Writes `{base}_summary.json`
pub struct JsonSink {
    name: String,
    dir: PathBuf,
    params: HashMap<String, String>,
    last_path: Option<PathBuf>,
}

#[derive(Serialize)]
struct SummaryDocument<'a> {
    source: &'a str,
    total_ppi: usize,
    total_windows: usize,
    channels: BTreeMap<Channel, ChannelSummary>,
}

impl JsonSink {
    /// Create a JsonSink writing into `dir` (created if missing)
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            name: name.into(),
            dir,
            params: HashMap::new(),
            last_path: None,
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

    /// Path of the most recent summary
    pub fn last_path(&self) -> Option<&PathBuf> {
        self.last_path.as_ref()
    }

    fn export(&mut self, results: &ProcessingResults) -> std::io::Result<PathBuf> {
        let document = SummaryDocument {
            source: &results.source,
            total_ppi: results.total_ppi(),
            total_windows: results.total_windows(),
            channels: results
                .channels
                .iter()
                .map(|(channel, result)| (*channel, ChannelSummary::from_result(result)))
                .collect(),
        };

        let base = base_name(&self.params, &results.source);
        let path = self.dir.join(format!("{base}_summary.json"));
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, &document)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(path)
    }
}

impl ResultSink for JsonSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "json_sink_write",
        skip(self, results),
        fields(sink = %self.name, source = %results.source)
    )]
    fn write(&mut self, results: &ProcessingResults) -> Result<(), ContractError> {
        let path = self.export(results).map_err(|e| {
            error!(sink = %self.name, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })?;
        info!(sink = %self.name, path = %path.display(), "summary saved");
        self.last_path = Some(path);
        Ok(())
    }

    #[instrument(name = "json_sink_flush", skip(self))]
    fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::fixtures;
    use tempfile::tempdir;

    #[test]
    fn test_summary_document_shape() {
        let dir = tempdir().unwrap();
        let mut sink = JsonSink::new("json", dir.path()).unwrap();
        sink.write(&fixtures::results()).unwrap();

        let path = sink.last_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "session_summary.json");
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["source"], "session");
        assert_eq!(value["total_ppi"], 3);
        assert_eq!(value["channels"]["p0"]["peaks"], 3);
        assert_eq!(value["channels"]["p0"]["heart_rate_bpm"], 80.0);
        assert_eq!(value["channels"]["p1"]["peaks"], 0);
        assert!(value["channels"]["p1"]["mean_ppi_ms"].is_null());
    }

    #[test]
    fn test_unwritable_dir_is_a_sink_error() {
        let dir = tempdir().unwrap();
        let mut sink = JsonSink::new("json", dir.path().join("out")).unwrap();
        fs::remove_dir(dir.path().join("out")).unwrap();
        let err = sink.write(&fixtures::results()).unwrap_err();
        assert!(matches!(err, ContractError::SinkWrite { .. }));
    }
}

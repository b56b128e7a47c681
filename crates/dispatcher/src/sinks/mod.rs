//! Sink implementations
//!
//! Contains LogSink, CsvSink, and JsonSink.

mod csv;
mod json;
mod log;

use std::collections::HashMap;
use std::path::PathBuf;

pub use self::csv::CsvSink;
pub use self::json::JsonSink;
pub use self::log::LogSink;

/// Output directory from the `dir` param, `./output` by default
fn output_dir(params: &HashMap<String, String>) -> PathBuf {
    params
        .get("dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./output"))
}

/// File name prefix: the `base` param, else the results' source label
fn base_name<'a>(params: &'a HashMap<String, String>, source: &'a str) -> &'a str {
    params
        .get("base")
        .map(String::as_str)
        .filter(|b| !b.is_empty())
        .unwrap_or(if source.is_empty() { "ppg_analysis" } else { source })
}

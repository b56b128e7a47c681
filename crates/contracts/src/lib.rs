//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Raw records carry the sensor's first column (`delta_or_timestamp`) untouched
//! - Absolute time is assigned by ingestion as `chrono::DateTime<Utc>`
//! - All durations exchanged between crates are milliseconds (`f64`)

mod config;
mod error;
mod progress;
mod results;
mod sample;
mod sink;

pub use config::*;
pub use error::*;
pub use progress::{ProgressCallback, ProgressEvent, StopHandle};
pub use results::*;
pub use sample::*;
pub use sink::ResultSink;

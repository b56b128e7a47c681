//! # Processing
//!
//! PPG processing workers.
//!
//! Responsibilities:
//! - `FileWorker`: one recording, peaks detected per wall-clock window
//! - `DirectoryWorker`: session folders, PPI tagged by folder, combined HRV
//! - `BatchWorker`: participant folders, each run as a directory, merged
//!
//! Workers are synchronous. Progress goes through an optional
//! [`contracts::ProgressCallback`]; long runs poll a [`contracts::StopHandle`].
//!
//! ## Usage Example
//!
//! ```no_run
//! use contracts::ProcessingConfig;
//! use processing::FileWorker;
//!
//! let results = FileWorker::new("session/ppg.csv", ProcessingConfig::default()).run()?;
//! for (channel, result) in &results.channels {
//!     println!("{channel}: {} intervals", result.ppi.len());
//! }
//! # Ok::<(), processing::ProcessingError>(())
//! ```

mod batch_worker;
pub mod channel;
mod directory_worker;
mod error;
mod file_worker;
mod reporter;

pub use batch_worker::BatchWorker;
pub use directory_worker::DirectoryWorker;
pub use error::{ProcessingError, Result};
pub use file_worker::FileWorker;
pub use reporter::{collecting_callback, Reporter};

//! # Ingestion
//!
//! PPG recording ingestion module.
//!
//! Responsibilities:
//! - Parse `delta/timestamp,P0,P1,P2,AMBIENT` lines into `PpgSample`
//! - Lazily read files or byte streams with a malformed-record policy
//! - Expand the first column into absolute timestamps (delta + info.txt, or unix ms)
//! - Generate synthetic recordings for tests and demos
//!
//! ## Usage Example
//!
//! ```no_run
//! use ingestion::{MalformedPolicy, RecordReader};
//!
//! let reader = RecordReader::open("session/ppg.csv")?.with_policy(MalformedPolicy::Skip);
//! for sample in reader {
//!     let sample = sample?;
//!     println!("{}", sample.p0);
//! }
//! # Ok::<(), ingestion::IngestionError>(())
//! ```

mod config;
mod error;
mod reader;
mod record;
mod recording;
mod synthetic;
pub mod timeline;

// Re-exports
pub use config::{IngestionMetrics, MalformedPolicy, MetricsSnapshot};
pub use contracts::{PpgSample, TimedSample, TimelineFormat};
pub use error::{IngestionError, Result};
pub use reader::{read_samples, RecordReader};
pub use record::{parse_record, RecordWriter};
pub use recording::{load_folder, load_recording, Recording, RECORDING_FILE};
pub use synthetic::{SyntheticConfig, SyntheticFormat, SyntheticRecording};

//! # Dispatcher
//!
//! 结果分发模块。
//!
//! 负责：
//! - 消费 `ProcessingResults`
//! - Fan-out 到多个 sinks (log / csv / json)
//! - 隔离失败的 sink，不影响其他输出

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;
pub mod summary;

pub use contracts::{ProcessingResults, ResultSink};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{CsvSink, JsonSink, LogSink};
pub use summary::ChannelSummary;

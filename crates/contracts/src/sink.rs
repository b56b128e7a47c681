//! ResultSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for result sinks.

use crate::{ContractError, ProcessingResults};

/// Result output trait
///
/// All sink implementations must implement this trait.
pub trait ResultSink: Send {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write processing results
    ///
    /// # Errors
    /// Returns write error (should include context)
    fn write(&mut self, results: &ProcessingResults) -> Result<(), ContractError>;

    /// Flush buffered output (if any)
    fn flush(&mut self) -> Result<(), ContractError>;
}

//! Progress reporting and cooperative cancellation
//!
//! Workers emit `ProgressEvent`s through a callback instead of a channel so the
//! caller decides how to surface them (log lines, progress bar, collected list).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Event emitted by a worker while it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Overall completion, 0-100
    Progress(u8),

    /// Human-readable status line
    Status(String),

    /// Non-fatal error; the worker keeps going where it can
    Error(String),
}

/// Progress callback type
///
/// Uses `Arc` so the same callback can be handed to nested workers.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Shared stop flag
///
/// Cloning shares the flag. Workers poll `is_stopped` between units of work.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Create a handle that is not stopped
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

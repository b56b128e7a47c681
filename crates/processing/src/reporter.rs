//! Progress reporting shared by the workers.

use std::fmt;
use std::sync::Arc;

use contracts::{ProgressCallback, ProgressEvent};
use tracing::{debug, warn};

/// Forwards worker events to an optional callback and to tracing
#[derive(Clone, Default)]
pub struct Reporter {
    callback: Option<ProgressCallback>,
    forward_progress: bool,
    errors_as_status: bool,
}

impl Reporter {
    /// Reporter that forwards every event to `callback`
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            forward_progress: true,
            errors_as_status: false,
        }
    }

    /// Reporter that only logs
    pub fn silent() -> Self {
        Self::default()
    }

    /// Same callback for a nested worker: progress is dropped and errors are
    /// relayed as status lines.
    pub fn nested(&self) -> Self {
        Self {
            callback: self.callback.clone(),
            forward_progress: false,
            errors_as_status: true,
        }
    }

    /// Completion percentage, clamped to 100
    pub fn progress(&self, percent: usize) {
        if self.forward_progress {
            self.emit(ProgressEvent::Progress(percent.min(100) as u8));
        }
    }

    pub fn status(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(status = %message);
        self.emit(ProgressEvent::Status(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message);
        if self.errors_as_status {
            self.emit(ProgressEvent::Status(message));
        } else {
            self.emit(ProgressEvent::Error(message));
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }
}

impl From<ProgressCallback> for Reporter {
    fn from(callback: ProgressCallback) -> Self {
        Self::new(callback)
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("callback", &self.callback.as_ref().map(|_| "Fn(ProgressEvent)"))
            .field("forward_progress", &self.forward_progress)
            .field("errors_as_status", &self.errors_as_status)
            .finish()
    }
}

/// Callback that appends every event to a shared list
pub fn collecting_callback() -> (ProgressCallback, Arc<std::sync::Mutex<Vec<ProgressEvent>>>) {
    let events = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let callback: ProgressCallback = Arc::new(move |event| {
        if let Ok(mut events) = sink.lock() {
            events.push(event);
        }
    });
    (callback, events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_reporter_relays_errors_as_status() {
        let (callback, events) = collecting_callback();
        let reporter = Reporter::new(callback);
        reporter.progress(150);
        reporter.error("bad folder");

        let nested = reporter.nested();
        nested.progress(10);
        nested.error("bad session");

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                ProgressEvent::Progress(100),
                ProgressEvent::Error("bad folder".into()),
                ProgressEvent::Status("bad session".into()),
            ]
        );
    }

    #[test]
    fn test_silent_reporter_drops_events() {
        let reporter = Reporter::silent();
        reporter.status("nothing listens");
        reporter.progress(50);
    }
}

//! Lifecycle observers
//!
//! Managers report every outcome here instead of logging inline, so the
//! lifecycle logic stays testable without a subscriber installed.

use crate::error::Error;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info};

/// Receives the outcome of each lifecycle operation
pub trait LifecycleObserver: Send + Sync {
    /// A mutation or read completed
    fn succeeded(&self, kind: &str, operation: &str, name: &str);

    /// A mutation or read failed; the error is still returned to the caller
    fn failed(&self, kind: &str, operation: &str, name: &str, err: &Error);
}

pub type LifecycleObserverRef = Arc<dyn LifecycleObserver>;

// =============================================================================
// Tracing Observer
// =============================================================================

/// Default observer: info on success, error on failure
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LifecycleObserver for TracingObserver {
    fn succeeded(&self, kind: &str, operation: &str, name: &str) {
        info!(kind, operation, resource = name, "{} {} succeeded", kind, operation);
    }

    fn failed(&self, kind: &str, operation: &str, name: &str, err: &Error) {
        error!(kind, operation, resource = name, error = %err, "{} {} failed", kind, operation);
    }
}

// =============================================================================
// Recording Observer
// =============================================================================

/// One recorded outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub kind: String,
    pub operation: String,
    pub name: String,
    /// Error message for failures
    pub error: Option<String>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Observer keeping every outcome in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    outcomes: Mutex<Vec<Outcome>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.lock().clone()
    }

    /// Recorded outcomes for one operation
    pub fn for_operation(&self, operation: &str) -> Vec<Outcome> {
        self.outcomes
            .lock()
            .iter()
            .filter(|o| o.operation == operation)
            .cloned()
            .collect()
    }

    fn push(&self, kind: &str, operation: &str, name: &str, error: Option<String>) {
        self.outcomes.lock().push(Outcome {
            kind: kind.to_string(),
            operation: operation.to_string(),
            name: name.to_string(),
            error,
        });
    }
}

impl LifecycleObserver for RecordingObserver {
    fn succeeded(&self, kind: &str, operation: &str, name: &str) {
        self.push(kind, operation, name, None);
    }

    fn failed(&self, kind: &str, operation: &str, name: &str, err: &Error) {
        self.push(kind, operation, name, Some(err.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer() {
        let observer = RecordingObserver::new();
        observer.succeeded("ZFSVolume", "provision", "pvc-1");
        observer.failed(
            "ZFSVolume",
            "claim",
            "pvc-1",
            &Error::Unavailable("timeout".into()),
        );

        let outcomes = observer.outcomes();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_success());
        assert_eq!(
            outcomes[1].error.as_deref(),
            Some("Store unavailable: timeout")
        );
        assert_eq!(observer.for_operation("claim").len(), 1);
    }
}

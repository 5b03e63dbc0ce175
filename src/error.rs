//! Error types for the ZFS lifecycle layer
//!
//! Every store and lifecycle failure is surfaced to the caller unmodified.
//! The reconciliation loop decides what to do with it via [`Error::action`].

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the lifecycle layer
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error("Resource not found: {kind}/{name}")]
    NotFound { kind: String, name: String },

    #[error("Resource already exists: {kind}/{name}")]
    AlreadyExists { kind: String, name: String },

    #[error("Conflict updating {kind}/{name}: object has been modified")]
    Conflict { kind: String, name: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    #[error("Invalid state transition for {kind}/{name}: {from} -> {to}")]
    InvalidTransition {
        kind: String,
        name: String,
        from: String,
        to: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    pub(crate) fn not_found(kind: &str, name: &str) -> Self {
        Error::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub(crate) fn already_exists(kind: &str, name: &str) -> Self {
        Error::AlreadyExists {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub(crate) fn conflict(kind: &str, name: &str) -> Self {
        Error::Conflict {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Someone else owns the object, or it is already gone
            Error::AlreadyExists { .. } | Error::NotFound { .. } => ErrorAction::NoRequeue,

            // Stale read - re-read and retry soon
            Error::Conflict { .. } => ErrorAction::RequeueAfter(Duration::from_secs(1)),

            // Caller bugs and bad input won't fix themselves
            Error::InvalidTransition { .. }
            | Error::Validation(_)
            | Error::Configuration(_)
            | Error::Json(_)
            | Error::Yaml(_) => ErrorAction::NoRequeue,

            Error::Unavailable(_) | Error::Kube(_) => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Unavailable(_) | Error::Kube(_) | Error::Conflict { .. }
        )
    }

    /// True when the failure means "nothing left to do": a racing create
    /// already owns the object, or the object is already absent.
    pub fn is_already_handled(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. } | Error::NotFound { .. })
    }
}

/// Result type alias for the lifecycle layer
pub type Result<T> = std::result::Result<T, Error>;

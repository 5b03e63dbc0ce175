//! Lifecycle Managers
//!
//! One manager per resource kind. Managers read and write through a
//! [`ResourceStore`](crate::store::ResourceStore), consult the finalizer
//! guard before anything that removes state, and hand every outcome to a
//! [`LifecycleObserver`]. They keep no state between calls: every mutation
//! writes the object the caller passed in, so a stale copy fails with
//! `Conflict` instead of overwriting a newer one.

pub mod backup;
pub mod restore;
pub mod snapshot;
pub mod volume;

pub use backup::BackupLifecycle;
pub use restore::RestoreLifecycle;
pub use snapshot::SnapshotLifecycle;
pub use volume::VolumeLifecycle;

use crate::crd::Phase;
use crate::error::{Error, Result};
use crate::observer::LifecycleObserver;

/// Forward `result` to the observer and hand it back unchanged
pub(crate) fn report<T>(
    observer: &dyn LifecycleObserver,
    kind: &str,
    operation: &str,
    name: &str,
    result: Result<T>,
) -> Result<T> {
    match &result {
        Ok(_) => observer.succeeded(kind, operation, name),
        Err(e) => observer.failed(kind, operation, name, e),
    }
    result
}

/// Refuse moves that leave a terminal phase or go backwards
pub(crate) fn check_transition<P: Phase>(kind: &str, name: &str, from: P, to: P) -> Result<()> {
    if from.can_transition_to(&to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            kind: kind.to_string(),
            name: name.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

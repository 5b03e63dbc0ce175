//! Custom Resource Definitions for ZFS local volumes
//!
//! This module contains all CRD types:
//! - ZfsVolume: a ZFS dataset or zvol owned by one node
//! - ZfsSnapshot: a point-in-time snapshot of a volume
//! - ZfsBackup: a send stream of a snapshot to a remote destination
//! - ZfsRestore: a receive of a backup into a volume
//!
//! The string constants below are part of the wire contract with the node
//! agents and must not change.

pub mod backup;
pub mod restore;
pub mod snapshot;
pub mod volume;

pub use backup::*;
pub use restore::*;
pub use snapshot::*;
pub use volume::*;

use crate::error::{Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Wire Constants
// =============================================================================

/// API group of all four kinds
pub const ZFS_GROUP: &str = "zfs.openebs.io";

/// Protection marker placed on claimed resources
pub const ZFS_FINALIZER: &str = "zfs.openebs.io/finalizer";

/// Label carrying the owning volume name (snapshot, backup, restore)
pub const ZFS_VOLUME_KEY: &str = "openebs.io/persistent-volume";

/// Parameter key for the ZFS pool name
pub const POOL_NAME_KEY: &str = "openebs.io/poolname";

/// Label carrying the node that claimed a volume or snapshot
pub const ZFS_NODE_KEY: &str = "kubernetes.io/nodename";

/// Topology key advertised by the node driver
pub const ZFS_TOPOLOGY_KEY: &str = "openebs.io/nodename";

pub const ZFS_STATUS_PENDING: &str = "Pending";
pub const ZFS_STATUS_FAILED: &str = "Failed";
pub const ZFS_STATUS_READY: &str = "Ready";

// =============================================================================
// Status Phases
// =============================================================================

/// Common behaviour of the status payloads.
///
/// Phases only move forward: a terminal phase accepts nothing but itself, and
/// a non-terminal one never moves to a lower rank.
pub trait Phase: Copy + PartialEq + std::fmt::Display {
    /// Whether this phase is a final outcome
    fn is_terminal(&self) -> bool;

    /// Position in the progression; terminal phases share the highest rank
    fn rank(&self) -> u8;

    fn can_transition_to(&self, next: &Self) -> bool {
        if self.is_terminal() {
            self == next
        } else {
            next.rank() >= self.rank()
        }
    }
}

/// State of a volume or snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ZfsState {
    /// Not yet handled by the node agent
    #[default]
    Pending,
    /// The node agent gave up
    Failed,
    /// Processed and usable
    Ready,
}

impl std::fmt::Display for ZfsState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZfsState::Pending => write!(f, "{}", ZFS_STATUS_PENDING),
            ZfsState::Failed => write!(f, "{}", ZFS_STATUS_FAILED),
            ZfsState::Ready => write!(f, "{}", ZFS_STATUS_READY),
        }
    }
}

impl Phase for ZfsState {
    fn is_terminal(&self) -> bool {
        !matches!(self, ZfsState::Pending)
    }

    fn rank(&self) -> u8 {
        match self {
            ZfsState::Pending => 0,
            ZfsState::Failed | ZfsState::Ready => 1,
        }
    }
}

// =============================================================================
// Validation Helpers
// =============================================================================

/// Validate a resource name (DNS-1123 subdomain)
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 253
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric());

    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!("invalid {} name: {:?}", kind, name)))
    }
}

/// A finalizer set is either empty or exactly the protection marker
pub fn validate_finalizers(kind: &str, finalizers: &[String]) -> Result<()> {
    match finalizers {
        [] => Ok(()),
        [only] if only == ZFS_FINALIZER => Ok(()),
        other => Err(Error::Validation(format!(
            "{} finalizers must be empty or [{}], got {:?}",
            kind, ZFS_FINALIZER, other
        ))),
    }
}

/// Parse a capacity stored as a decimal byte count
pub fn parse_capacity(capacity: &str) -> Result<u64> {
    capacity
        .parse::<u64>()
        .map_err(|e| Error::Validation(format!("invalid capacity {:?}: {}", capacity, e)))
}

pub(crate) fn require(kind: &str, field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        Err(Error::Validation(format!("{} {} must not be empty", kind, field)))
    } else {
        Ok(())
    }
}

/// Metadata for a freshly constructed resource
pub(crate) fn new_meta(
    name: &str,
    labels: BTreeMap<String, String>,
    finalizers: Vec<String>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        labels: (!labels.is_empty()).then_some(labels),
        finalizers: (!finalizers.is_empty()).then_some(finalizers),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_state_wire_literals() {
        assert_eq!(serde_json::to_string(&ZfsState::Pending).unwrap(), "\"Pending\"");
        assert_eq!(serde_json::to_string(&ZfsState::Failed).unwrap(), "\"Failed\"");
        assert_eq!(serde_json::to_string(&ZfsState::Ready).unwrap(), "\"Ready\"");
        assert_eq!(format!("{}", ZfsState::Ready), ZFS_STATUS_READY);
    }

    #[test]
    fn test_state_transitions() {
        assert!(ZfsState::Pending.can_transition_to(&ZfsState::Ready));
        assert!(ZfsState::Pending.can_transition_to(&ZfsState::Failed));
        assert!(ZfsState::Ready.can_transition_to(&ZfsState::Ready));
        assert!(!ZfsState::Ready.can_transition_to(&ZfsState::Pending));
        assert!(!ZfsState::Failed.can_transition_to(&ZfsState::Ready));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("ZFSVolume", "pvc-1234.abc").is_ok());
        assert_matches!(validate_name("ZFSVolume", ""), Err(Error::Validation(_)));
        assert_matches!(validate_name("ZFSVolume", "-pvc"), Err(Error::Validation(_)));
        assert_matches!(validate_name("ZFSVolume", "PVC"), Err(Error::Validation(_)));
    }

    #[test]
    fn test_validate_finalizers() {
        assert!(validate_finalizers("ZFSVolume", &[]).is_ok());
        assert!(validate_finalizers("ZFSVolume", &[ZFS_FINALIZER.to_string()]).is_ok());
        assert!(validate_finalizers("ZFSVolume", &["other/finalizer".to_string()]).is_err());
        assert!(validate_finalizers(
            "ZFSVolume",
            &[ZFS_FINALIZER.to_string(), ZFS_FINALIZER.to_string()]
        )
        .is_err());
    }

    #[test]
    fn test_parse_capacity() {
        assert_eq!(parse_capacity("10737418240").unwrap(), 10737418240);
        assert!(parse_capacity("10Gi").is_err());
        assert!(parse_capacity("-1").is_err());
    }
}

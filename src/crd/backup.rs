//! ZfsBackup CRD
//!
//! Tracks a `zfs send` of a volume snapshot to a remote destination.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{new_meta, require, validate_finalizers, validate_name, Phase, ZFS_VOLUME_KEY};
use crate::error::Result;

/// Kind name used in errors and logs
pub const BACKUP_KIND: &str = "ZFSBackup";

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "zfs.openebs.io",
    version = "v1",
    kind = "ZFSBackup",
    root = "ZfsBackup",
    derive = "PartialEq",
    plural = "zfsbackups",
    shortname = "zb",
    status = "BackupStatus",
    printcolumn = r#"{"name": "PrevSnap", "type": "string", "jsonPath": ".spec.prevSnapName"}"#,
    printcolumn = r#"{"name": "Status", "type": "string", "jsonPath": ".status"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    /// Volume being backed up
    pub volume_name: String,

    #[serde(rename = "ownerNodeID")]
    pub owner_node_id: String,

    /// Snapshot to send
    pub snap_name: String,

    /// Base snapshot for an incremental send
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_snap_name: Option<String>,

    /// Remote endpoint receiving the stream (host:port)
    pub backup_dest: String,
}

/// Progress of a backup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BackupStatus {
    /// Created, not yet picked up
    #[default]
    Init,
    /// Picked up, waiting for the transfer to start
    Pending,
    InProgress,
    Done,
    Failed,
    /// Spec could not be acted upon
    Invalid,
}

impl std::fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupStatus::Init => write!(f, "Init"),
            BackupStatus::Pending => write!(f, "Pending"),
            BackupStatus::InProgress => write!(f, "InProgress"),
            BackupStatus::Done => write!(f, "Done"),
            BackupStatus::Failed => write!(f, "Failed"),
            BackupStatus::Invalid => write!(f, "Invalid"),
        }
    }
}

impl Phase for BackupStatus {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            BackupStatus::Done | BackupStatus::Failed | BackupStatus::Invalid
        )
    }

    fn rank(&self) -> u8 {
        match self {
            BackupStatus::Init => 0,
            BackupStatus::Pending => 1,
            BackupStatus::InProgress => 2,
            BackupStatus::Done | BackupStatus::Failed | BackupStatus::Invalid => 3,
        }
    }
}

/// Named inputs for [`ZfsBackup::from_options`]
#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    pub volume_name: String,
    pub owner_node_id: String,
    pub snap_name: String,
    pub prev_snap_name: Option<String>,
    pub backup_dest: String,
    pub labels: BTreeMap<String, String>,
    pub finalizers: Vec<String>,
    /// Initial status, `Init` when unset
    pub status: Option<BackupStatus>,
}

impl ZfsBackup {
    pub fn from_options(name: &str, opts: BackupOptions) -> Result<Self> {
        validate_name(BACKUP_KIND, name)?;
        require(BACKUP_KIND, "volumeName", &opts.volume_name)?;
        require(BACKUP_KIND, "ownerNodeID", &opts.owner_node_id)?;
        require(BACKUP_KIND, "snapName", &opts.snap_name)?;
        require(BACKUP_KIND, "backupDest", &opts.backup_dest)?;
        validate_finalizers(BACKUP_KIND, &opts.finalizers)?;

        let mut labels = opts.labels;
        labels.insert(ZFS_VOLUME_KEY.to_string(), opts.volume_name.clone());

        Ok(Self {
            metadata: new_meta(name, labels, opts.finalizers),
            spec: BackupSpec {
                volume_name: opts.volume_name,
                owner_node_id: opts.owner_node_id,
                snap_name: opts.snap_name,
                prev_snap_name: opts.prev_snap_name,
                backup_dest: opts.backup_dest,
            },
            status: Some(opts.status.unwrap_or_default()),
        })
    }

    pub fn phase(&self) -> BackupStatus {
        self.status.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_progression() {
        assert!(BackupStatus::Init.can_transition_to(&BackupStatus::InProgress));
        assert!(BackupStatus::Pending.can_transition_to(&BackupStatus::Done));
        assert!(!BackupStatus::InProgress.can_transition_to(&BackupStatus::Pending));
        assert!(!BackupStatus::Done.can_transition_to(&BackupStatus::Failed));
        assert!(BackupStatus::Failed.can_transition_to(&BackupStatus::Failed));
    }

    #[test]
    fn test_status_serialized_as_plain_string() {
        let bkp = ZfsBackup::from_options("backup-1", BackupOptions {
            volume_name: "pvc-1".into(),
            owner_node_id: "node-a".into(),
            snap_name: "snap-1".into(),
            backup_dest: "10.0.0.5:9010".into(),
            status: Some(BackupStatus::InProgress),
            ..Default::default()
        })
        .unwrap();

        let json = serde_json::to_value(&bkp).unwrap();
        assert_eq!(json["status"], "InProgress");
        assert_eq!(json["spec"]["backupDest"], "10.0.0.5:9010");
        assert_eq!(bkp.phase(), BackupStatus::InProgress);
    }

    #[test]
    fn test_requires_destination() {
        let err = ZfsBackup::from_options("backup-1", BackupOptions {
            volume_name: "pvc-1".into(),
            owner_node_id: "node-a".into(),
            snap_name: "snap-1".into(),
            ..Default::default()
        });
        assert!(err.is_err());
    }

    #[test]
    fn test_requires_owner_node() {
        let err = ZfsBackup::from_options("backup-1", BackupOptions {
            volume_name: "pvc-1".into(),
            snap_name: "snap-1".into(),
            backup_dest: "10.0.0.5:9010".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("ownerNodeID"));
    }
}

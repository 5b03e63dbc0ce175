//! ZfsRestore CRD
//!
//! Tracks a `zfs receive` of a backup stream into an existing volume.
//! Restores carry no node-affinity label.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{new_meta, require, validate_finalizers, validate_name, Phase, ZFS_VOLUME_KEY};
use crate::error::Result;

/// Kind name used in errors and logs
pub const RESTORE_KIND: &str = "ZFSRestore";

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "zfs.openebs.io",
    version = "v1",
    kind = "ZFSRestore",
    root = "ZfsRestore",
    derive = "PartialEq",
    plural = "zfsrestores",
    shortname = "zr",
    status = "RestoreStatus",
    printcolumn = r#"{"name": "Volume", "type": "string", "jsonPath": ".spec.volumeName"}"#,
    printcolumn = r#"{"name": "Status", "type": "string", "jsonPath": ".status"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSpec {
    /// Volume receiving the data
    pub volume_name: String,

    #[serde(rename = "ownerNodeID")]
    pub owner_node_id: String,

    /// Remote endpoint serving the stream (host:port)
    pub restore_src: String,
}

/// Progress of a restore
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RestoreStatus {
    #[default]
    Init,
    Pending,
    InProgress,
    Done,
    Failed,
    Invalid,
}

impl std::fmt::Display for RestoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestoreStatus::Init => write!(f, "Init"),
            RestoreStatus::Pending => write!(f, "Pending"),
            RestoreStatus::InProgress => write!(f, "InProgress"),
            RestoreStatus::Done => write!(f, "Done"),
            RestoreStatus::Failed => write!(f, "Failed"),
            RestoreStatus::Invalid => write!(f, "Invalid"),
        }
    }
}

impl Phase for RestoreStatus {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            RestoreStatus::Done | RestoreStatus::Failed | RestoreStatus::Invalid
        )
    }

    fn rank(&self) -> u8 {
        match self {
            RestoreStatus::Init => 0,
            RestoreStatus::Pending => 1,
            RestoreStatus::InProgress => 2,
            RestoreStatus::Done | RestoreStatus::Failed | RestoreStatus::Invalid => 3,
        }
    }
}

/// Named inputs for [`ZfsRestore::from_options`]
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    pub volume_name: String,
    pub owner_node_id: String,
    pub restore_src: String,
    pub labels: BTreeMap<String, String>,
    pub finalizers: Vec<String>,
    /// Initial status, `Init` when unset
    pub status: Option<RestoreStatus>,
}

impl ZfsRestore {
    pub fn from_options(name: &str, opts: RestoreOptions) -> Result<Self> {
        validate_name(RESTORE_KIND, name)?;
        require(RESTORE_KIND, "volumeName", &opts.volume_name)?;
        require(RESTORE_KIND, "ownerNodeID", &opts.owner_node_id)?;
        require(RESTORE_KIND, "restoreSrc", &opts.restore_src)?;
        validate_finalizers(RESTORE_KIND, &opts.finalizers)?;

        let mut labels = opts.labels;
        labels.insert(ZFS_VOLUME_KEY.to_string(), opts.volume_name.clone());

        Ok(Self {
            metadata: new_meta(name, labels, opts.finalizers),
            spec: RestoreSpec {
                volume_name: opts.volume_name,
                owner_node_id: opts.owner_node_id,
                restore_src: opts.restore_src,
            },
            status: Some(opts.status.unwrap_or_default()),
        })
    }

    pub fn phase(&self) -> RestoreStatus {
        self.status.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_init() {
        let rstr = ZfsRestore::from_options("restore-1", RestoreOptions {
            volume_name: "pvc-2".into(),
            owner_node_id: "node-b".into(),
            restore_src: "10.0.0.5:9010".into(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(rstr.phase(), RestoreStatus::Init);
        assert!(rstr.metadata.finalizers.is_none());
    }

    #[test]
    fn test_requires_owner_node() {
        let err = ZfsRestore::from_options("restore-1", RestoreOptions {
            volume_name: "pvc-2".into(),
            restore_src: "10.0.0.5:9010".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("ownerNodeID"));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(RestoreStatus::Done.is_terminal());
        assert!(RestoreStatus::Invalid.is_terminal());
        assert!(!RestoreStatus::InProgress.is_terminal());
        assert!(!RestoreStatus::Done.can_transition_to(&RestoreStatus::InProgress));
    }
}

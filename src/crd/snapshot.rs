//! ZfsSnapshot CRD
//!
//! A point-in-time snapshot of a ZfsVolume, created on the volume's node.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{
    new_meta, parse_capacity, require, validate_finalizers, validate_name, ZfsState,
    ZFS_VOLUME_KEY,
};
use crate::error::Result;

/// Kind name used in errors and logs
pub const SNAPSHOT_KIND: &str = "ZFSSnapshot";

/// ZfsSnapshot references exactly one parent volume.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "zfs.openebs.io",
    version = "v1",
    kind = "ZFSSnapshot",
    root = "ZfsSnapshot",
    derive = "PartialEq",
    plural = "zfssnapshots",
    shortname = "zfssnap",
    status = "SnapshotStatus",
    printcolumn = r#"{"name": "Volume", "type": "string", "jsonPath": ".spec.volumeName"}"#,
    printcolumn = r#"{"name": "NodeID", "type": "string", "jsonPath": ".spec.ownerNodeID"}"#,
    printcolumn = r#"{"name": "Status", "type": "string", "jsonPath": ".status.state"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSpec {
    /// Parent volume
    pub volume_name: String,

    /// Node holding the parent volume
    #[serde(rename = "ownerNodeID")]
    pub owner_node_id: String,

    pub pool_name: String,

    /// Parent capacity at snapshot time, decimal bytes
    pub capacity: String,
}

/// Status of the ZfsSnapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStatus {
    #[serde(default)]
    pub state: ZfsState,
}

/// Named inputs for [`ZfsSnapshot::from_options`]
#[derive(Debug, Clone, Default)]
pub struct SnapshotOptions {
    /// Parent volume name; also stored as a label
    pub volume_name: String,
    pub owner_node_id: String,
    pub pool_name: String,
    pub capacity_bytes: u64,
    pub labels: BTreeMap<String, String>,
    pub finalizers: Vec<String>,
    pub state: Option<ZfsState>,
}

impl ZfsSnapshot {
    /// Build a validated snapshot object carrying its back-reference label
    pub fn from_options(name: &str, opts: SnapshotOptions) -> Result<Self> {
        validate_name(SNAPSHOT_KIND, name)?;
        require(SNAPSHOT_KIND, "volumeName", &opts.volume_name)?;
        require(SNAPSHOT_KIND, "ownerNodeID", &opts.owner_node_id)?;
        validate_finalizers(SNAPSHOT_KIND, &opts.finalizers)?;

        let mut labels = opts.labels;
        labels.insert(ZFS_VOLUME_KEY.to_string(), opts.volume_name.clone());

        Ok(Self {
            metadata: new_meta(name, labels, opts.finalizers),
            spec: SnapshotSpec {
                volume_name: opts.volume_name,
                owner_node_id: opts.owner_node_id,
                pool_name: opts.pool_name,
                capacity: opts.capacity_bytes.to_string(),
            },
            status: Some(SnapshotStatus {
                state: opts.state.unwrap_or_default(),
            }),
        })
    }

    pub fn state(&self) -> ZfsState {
        self.status.as_ref().map(|s| s.state).unwrap_or_default()
    }

    pub fn capacity_bytes(&self) -> Result<u64> {
        parse_capacity(&self.spec.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use assert_matches::assert_matches;
    use kube::ResourceExt;

    #[test]
    fn test_back_reference_label() {
        let snap = ZfsSnapshot::from_options("snap-1", SnapshotOptions {
            volume_name: "pvc-1".into(),
            owner_node_id: "node-a".into(),
            pool_name: "zfspv-pool".into(),
            capacity_bytes: 1024,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(snap.labels().get(ZFS_VOLUME_KEY).map(String::as_str), Some("pvc-1"));
        assert_eq!(snap.spec.volume_name, "pvc-1");
        assert_eq!(snap.state(), ZfsState::Pending);
        assert_eq!(snap.capacity_bytes().unwrap(), 1024);
    }

    #[test]
    fn test_requires_parent_volume() {
        let err = ZfsSnapshot::from_options("snap-1", SnapshotOptions {
            owner_node_id: "node-a".into(),
            ..Default::default()
        });
        assert_matches!(err, Err(Error::Validation(msg)) if msg.contains("volumeName"));
    }
}

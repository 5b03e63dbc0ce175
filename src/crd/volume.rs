//! ZfsVolume CRD
//!
//! Represents a ZFS dataset or zvol provisioned on a single node. The node
//! agent watches these objects and creates or destroys the backing storage.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{
    new_meta, parse_capacity, require, validate_finalizers, validate_name, ZfsState,
};
use crate::error::{Error, Result};

/// Kind name used in errors and logs
pub const VOLUME_KIND: &str = "ZFSVolume";

// =============================================================================
// ZfsVolume CRD
// =============================================================================

/// ZfsVolume describes the desired ZFS volume and which node owns it.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "zfs.openebs.io",
    version = "v1",
    kind = "ZFSVolume",
    root = "ZfsVolume",
    derive = "PartialEq",
    plural = "zfsvolumes",
    shortname = "zfsvol",
    shortname = "zv",
    status = "VolumeStatus",
    printcolumn = r#"{"name": "ZPool", "type": "string", "jsonPath": ".spec.poolName"}"#,
    printcolumn = r#"{"name": "NodeID", "type": "string", "jsonPath": ".spec.ownerNodeID"}"#,
    printcolumn = r#"{"name": "Size", "type": "string", "jsonPath": ".spec.capacity"}"#,
    printcolumn = r#"{"name": "Status", "type": "string", "jsonPath": ".status.state"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    /// Node where the volume lives
    #[serde(rename = "ownerNodeID")]
    pub owner_node_id: String,

    /// ZFS pool the volume is carved from
    pub pool_name: String,

    /// Size in bytes, as a decimal string
    pub capacity: String,

    /// Dataset or zvol
    #[serde(default)]
    pub volume_type: VolumeType,

    /// Filesystem for zvols, or "zfs" for datasets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_type: Option<String>,

    #[serde(default, rename = "recordsize", skip_serializing_if = "Option::is_none")]
    pub record_size: Option<String>,

    #[serde(default, rename = "volblocksize", skip_serializing_if = "Option::is_none")]
    pub vol_block_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,

    #[serde(default, rename = "keyformat", skip_serializing_if = "Option::is_none")]
    pub key_format: Option<String>,

    #[serde(default, rename = "keylocation", skip_serializing_if = "Option::is_none")]
    pub key_location: Option<String>,

    /// "yes" when the volume is thin provisioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thin_provision: Option<String>,

    /// "yes" when the volume may be mounted by several pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<String>,

    /// Snapshot this volume was cloned from, if any
    #[serde(default, rename = "snapname", skip_serializing_if = "Option::is_none")]
    pub snap_name: Option<String>,
}

/// Kind of ZFS object backing the volume
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolumeType {
    #[default]
    Dataset,
    Zvol,
}

impl std::fmt::Display for VolumeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeType::Dataset => write!(f, "DATASET"),
            VolumeType::Zvol => write!(f, "ZVOL"),
        }
    }
}

/// Status of the ZfsVolume
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStatus {
    #[serde(default)]
    pub state: ZfsState,
}

// =============================================================================
// Construction
// =============================================================================

/// Named inputs for [`ZfsVolume::from_options`]
#[derive(Debug, Clone, Default)]
pub struct VolumeOptions {
    /// Requested size in bytes; must be non-zero
    pub capacity_bytes: u64,
    /// Node chosen to host the volume
    pub owner_node_id: String,
    /// ZFS pool on that node
    pub pool_name: String,
    pub volume_type: VolumeType,
    pub fs_type: Option<String>,
    pub compression: Option<String>,
    pub dedup: Option<String>,
    pub record_size: Option<String>,
    pub vol_block_size: Option<String>,
    pub thin_provision: bool,
    pub shared: bool,
    /// Source snapshot when cloning
    pub snap_name: Option<String>,
    /// Extra labels
    pub labels: BTreeMap<String, String>,
    /// Empty, or exactly the protection marker
    pub finalizers: Vec<String>,
    /// Initial state, `Pending` when unset
    pub state: Option<ZfsState>,
}

fn yes_no(flag: bool) -> Option<String> {
    Some(if flag { "yes" } else { "no" }.to_string())
}

impl ZfsVolume {
    /// Build a validated volume object ready for provisioning
    pub fn from_options(name: &str, opts: VolumeOptions) -> Result<Self> {
        validate_name(VOLUME_KIND, name)?;
        require(VOLUME_KIND, "ownerNodeID", &opts.owner_node_id)?;
        require(VOLUME_KIND, "poolName", &opts.pool_name)?;
        validate_finalizers(VOLUME_KIND, &opts.finalizers)?;
        if opts.capacity_bytes == 0 {
            return Err(Error::Validation(format!(
                "{} {} capacity must be greater than zero",
                VOLUME_KIND, name
            )));
        }

        let spec = VolumeSpec {
            owner_node_id: opts.owner_node_id,
            pool_name: opts.pool_name,
            capacity: opts.capacity_bytes.to_string(),
            volume_type: opts.volume_type,
            fs_type: opts.fs_type,
            record_size: opts.record_size,
            vol_block_size: opts.vol_block_size,
            compression: opts.compression,
            dedup: opts.dedup,
            encryption: None,
            key_format: None,
            key_location: None,
            thin_provision: yes_no(opts.thin_provision),
            shared: yes_no(opts.shared),
            snap_name: opts.snap_name,
        };

        Ok(Self {
            metadata: new_meta(name, opts.labels, opts.finalizers),
            spec,
            status: Some(VolumeStatus {
                state: opts.state.unwrap_or_default(),
            }),
        })
    }

    /// Current state, `Pending` when no status was written yet
    pub fn state(&self) -> ZfsState {
        self.status.as_ref().map(|s| s.state).unwrap_or_default()
    }

    /// Capacity parsed from its decimal representation
    pub fn capacity_bytes(&self) -> Result<u64> {
        parse_capacity(&self.spec.capacity)
    }
}

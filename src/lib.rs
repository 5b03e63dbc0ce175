//! ZFS Lifecycle - resource lifecycle layer for ZFS local volumes
//!
//! Manages the records behind ZFS-backed storage: volumes, snapshots,
//! backups and restores stored as custom resources. Node agents and
//! controllers call into this layer around the actual ZFS commands.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │              External reconcile loop / node agent                │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┴──────────────────────────────────┐
//! │  VolumeLifecycle  SnapshotLifecycle  BackupLifecycle  Restore…   │
//! │         │                 │                 │             │      │
//! │         └──────── FinalizerGuard ───── LifecycleObserver ─┘      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                 ResourceStore<K>  (optimistic)                   │
//! │        ┌─────────────────────┐   ┌─────────────────────┐         │
//! │        │  KubeStore (API)    │   │  MemoryStore        │         │
//! │        └─────────────────────┘   └─────────────────────┘         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`crd`]: Custom Resource Definitions and wire constants
//! - [`store`]: Versioned resource stores
//! - [`finalizer`]: Deletion protection
//! - [`lifecycle`]: One manager per resource kind
//! - [`observer`]: Outcome reporting
//! - [`config`]: Process configuration
//! - [`error`]: Error types and handling

pub mod config;
pub mod crd;
pub mod error;
pub mod finalizer;
pub mod lifecycle;
pub mod observer;
pub mod store;

// Re-export commonly used types
pub use config::LifecycleConfig;

pub use crd::{
    BackupStatus, Phase, RestoreStatus, ZfsBackup, ZfsRestore, ZfsSnapshot, ZfsState, ZfsVolume,
    ZFS_FINALIZER, ZFS_NODE_KEY, ZFS_TOPOLOGY_KEY, ZFS_VOLUME_KEY,
};

pub use error::{Error, ErrorAction, Result};

pub use lifecycle::{BackupLifecycle, RestoreLifecycle, SnapshotLifecycle, VolumeLifecycle};

pub use observer::{LifecycleObserver, RecordingObserver, TracingObserver};

pub use store::{KubeStore, LabelSelector, MemoryStore, ResourceStore, ZfsResource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

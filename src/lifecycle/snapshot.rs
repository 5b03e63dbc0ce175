//! Snapshot Lifecycle
//!
//! Same shape as the volume lifecycle. Claiming an already protected snapshot
//! is a pure no-op, exactly like volumes: the state is not rewritten.

use std::sync::Arc;

use kube::ResourceExt;
use tracing::debug;

use super::{check_transition, report};
use crate::config::LifecycleConfig;
use crate::crd::{ZfsSnapshot, ZfsState, SNAPSHOT_KIND, ZFS_NODE_KEY, ZFS_VOLUME_KEY};
use crate::error::{Error, Result};
use crate::finalizer;
use crate::observer::{LifecycleObserverRef, TracingObserver};
use crate::store::{LabelSelector, ResourceStoreRef};

/// Manager for ZfsSnapshot records
pub struct SnapshotLifecycle {
    store: ResourceStoreRef<ZfsSnapshot>,
    config: Arc<LifecycleConfig>,
    observer: LifecycleObserverRef,
}

impl SnapshotLifecycle {
    pub fn new(store: ResourceStoreRef<ZfsSnapshot>, config: Arc<LifecycleConfig>) -> Self {
        Self {
            store,
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: LifecycleObserverRef) -> Self {
        self.observer = observer;
        self
    }

    pub async fn provision(&self, snap: &ZfsSnapshot) -> Result<ZfsSnapshot> {
        let result = self.store.create(snap).await;
        report(&*self.observer, SNAPSHOT_KIND, "provision", &snap.name_any(), result)
    }

    /// Protection marker, `Ready` and node label in one write; untouched if
    /// a finalizer is already present.
    pub async fn claim(&self, snap: &ZfsSnapshot) -> Result<ZfsSnapshot> {
        let name = snap.name_any();
        if finalizer::has_finalizers(snap) {
            debug!("{} {} already claimed", SNAPSHOT_KIND, name);
            return Ok(snap.clone());
        }

        let result = match self.claimed(snap) {
            Ok(claimed) => self.store.update(&claimed).await,
            Err(e) => Err(e),
        };
        report(&*self.observer, SNAPSHOT_KIND, "claim", &name, result)
    }

    fn claimed(&self, snap: &ZfsSnapshot) -> Result<ZfsSnapshot> {
        let name = snap.name_any();
        if self.config.node_id.is_empty() {
            return Err(Error::Configuration(format!(
                "cannot claim {} {} without a node id",
                SNAPSHOT_KIND, name
            )));
        }
        check_transition(SNAPSHOT_KIND, &name, snap.state(), ZfsState::Ready)?;

        let mut claimed = finalizer::with_protection(snap);
        claimed.status.get_or_insert_with(Default::default).state = ZfsState::Ready;
        claimed
            .labels_mut()
            .insert(ZFS_NODE_KEY.to_string(), self.config.node_id.clone());
        Ok(claimed)
    }

    /// Clear the finalizers once the ZFS snapshot is destroyed
    pub async fn release(&self, snap: &ZfsSnapshot) -> Result<ZfsSnapshot> {
        let released = finalizer::without_protection(snap);
        let result = self.store.update(&released).await;
        report(&*self.observer, SNAPSHOT_KIND, "release", &snap.name_any(), result)
    }

    pub async fn mark_failed(&self, snap: &ZfsSnapshot) -> Result<ZfsSnapshot> {
        let name = snap.name_any();
        let result = match check_transition(SNAPSHOT_KIND, &name, snap.state(), ZfsState::Failed) {
            Ok(()) => {
                let mut failed = snap.clone();
                failed.status.get_or_insert_with(Default::default).state = ZfsState::Failed;
                self.store.update(&failed).await
            }
            Err(e) => Err(e),
        };
        report(&*self.observer, SNAPSHOT_KIND, "mark_failed", &name, result)
    }

    pub async fn get(&self, snap_id: &str) -> Result<ZfsSnapshot> {
        let result = self.store.get(snap_id).await;
        report(&*self.observer, SNAPSHOT_KIND, "get", snap_id, result)
    }

    /// Current state, for callers polling until `Ready`
    pub async fn state(&self, snap_id: &str) -> Result<ZfsState> {
        Ok(self.get(snap_id).await?.state())
    }

    pub async fn delete(&self, snap_id: &str) -> Result<()> {
        let result = self.store.delete(snap_id).await;
        report(&*self.observer, SNAPSHOT_KIND, "delete", snap_id, result)
    }

    /// Snapshots claimed by `node_id`
    pub async fn list_for_node(&self, node_id: &str) -> Result<Vec<ZfsSnapshot>> {
        let selector = LabelSelector::matching(ZFS_NODE_KEY, node_id);
        let result = self.store.list(&selector).await;
        report(&*self.observer, SNAPSHOT_KIND, "list", &selector.to_string(), result)
    }

    /// Snapshots of one volume
    pub async fn list_for_volume(&self, volume_name: &str) -> Result<Vec<ZfsSnapshot>> {
        let selector = LabelSelector::matching(ZFS_VOLUME_KEY, volume_name);
        let result = self.store.list(&selector).await;
        report(&*self.observer, SNAPSHOT_KIND, "list", &selector.to_string(), result)
    }
}

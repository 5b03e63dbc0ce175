//! Volume Lifecycle
//!
//! Provisioning requests create a `Pending` ZfsVolume; the owning node agent
//! claims it once the dataset exists, and releases it after destroying the
//! dataset so the delete can complete.

use std::sync::Arc;

use kube::ResourceExt;
use tracing::debug;

use super::{check_transition, report};
use crate::config::LifecycleConfig;
use crate::crd::{ZfsState, ZfsVolume, VOLUME_KIND, ZFS_NODE_KEY};
use crate::error::{Error, Result};
use crate::finalizer;
use crate::observer::{LifecycleObserverRef, TracingObserver};
use crate::store::{LabelSelector, ResourceStoreRef};

/// Manager for ZfsVolume records
pub struct VolumeLifecycle {
    store: ResourceStoreRef<ZfsVolume>,
    config: Arc<LifecycleConfig>,
    observer: LifecycleObserverRef,
}

impl VolumeLifecycle {
    /// Create a manager reporting through `tracing`
    pub fn new(store: ResourceStoreRef<ZfsVolume>, config: Arc<LifecycleConfig>) -> Self {
        Self {
            store,
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the observer
    pub fn with_observer(mut self, observer: LifecycleObserverRef) -> Self {
        self.observer = observer;
        self
    }

    /// Create the volume record. `AlreadyExists` means a racing request is
    /// already handling this volume.
    pub async fn provision(&self, vol: &ZfsVolume) -> Result<ZfsVolume> {
        let result = self.store.create(vol).await;
        report(&*self.observer, VOLUME_KIND, "provision", &vol.name_any(), result)
    }

    /// Set the capacity to `new_size_bytes` and write the object back
    pub async fn resize(&self, vol: &ZfsVolume, new_size_bytes: u64) -> Result<ZfsVolume> {
        let mut resized = vol.clone();
        resized.spec.capacity = new_size_bytes.to_string();

        let result = self.store.update(&resized).await;
        report(&*self.observer, VOLUME_KIND, "resize", &vol.name_any(), result)
    }

    /// Take ownership of the volume on this node: protection marker, `Ready`
    /// state and node label in one write.
    ///
    /// A volume that already carries a finalizer is returned untouched.
    pub async fn claim(&self, vol: &ZfsVolume) -> Result<ZfsVolume> {
        let name = vol.name_any();
        if finalizer::has_finalizers(vol) {
            debug!("{} {} already claimed", VOLUME_KIND, name);
            return Ok(vol.clone());
        }

        let result = match self.claimed(vol) {
            Ok(claimed) => self.store.update(&claimed).await,
            Err(e) => Err(e),
        };
        report(&*self.observer, VOLUME_KIND, "claim", &name, result)
    }

    fn claimed(&self, vol: &ZfsVolume) -> Result<ZfsVolume> {
        let name = vol.name_any();
        if self.config.node_id.is_empty() {
            return Err(Error::Configuration(format!(
                "cannot claim {} {} without a node id",
                VOLUME_KIND, name
            )));
        }
        check_transition(VOLUME_KIND, &name, vol.state(), ZfsState::Ready)?;

        let mut claimed = finalizer::with_protection(vol);
        claimed.status.get_or_insert_with(Default::default).state = ZfsState::Ready;
        claimed
            .labels_mut()
            .insert(ZFS_NODE_KEY.to_string(), self.config.node_id.clone());
        Ok(claimed)
    }

    /// Clear the finalizers once the dataset is gone
    pub async fn release(&self, vol: &ZfsVolume) -> Result<ZfsVolume> {
        let released = finalizer::without_protection(vol);
        let result = self.store.update(&released).await;
        report(&*self.observer, VOLUME_KIND, "release", &vol.name_any(), result)
    }

    /// Record that the node agent could not create the volume
    pub async fn mark_failed(&self, vol: &ZfsVolume) -> Result<ZfsVolume> {
        let name = vol.name_any();
        let result = match check_transition(VOLUME_KIND, &name, vol.state(), ZfsState::Failed) {
            Ok(()) => {
                let mut failed = vol.clone();
                failed.status.get_or_insert_with(Default::default).state = ZfsState::Failed;
                self.store.update(&failed).await
            }
            Err(e) => Err(e),
        };
        report(&*self.observer, VOLUME_KIND, "mark_failed", &name, result)
    }

    pub async fn get(&self, volume_id: &str) -> Result<ZfsVolume> {
        let result = self.store.get(volume_id).await;
        report(&*self.observer, VOLUME_KIND, "get", volume_id, result)
    }

    /// Issue the delete; a protected volume stays terminating until released
    pub async fn delete(&self, volume_id: &str) -> Result<()> {
        let result = self.store.delete(volume_id).await;
        report(&*self.observer, VOLUME_KIND, "delete", volume_id, result)
    }

    /// Volumes whose node label equals `node_id`
    pub async fn list_for_node(&self, node_id: &str) -> Result<Vec<ZfsVolume>> {
        let selector = LabelSelector::matching(ZFS_NODE_KEY, node_id);
        let result = self.store.list(&selector).await;
        report(&*self.observer, VOLUME_KIND, "list", &selector.to_string(), result)
    }

    /// Volumes claimed by the configured node
    pub async fn list_for_this_node(&self) -> Result<Vec<ZfsVolume>> {
        self.list_for_node(&self.config.node_id).await
    }

    /// Owner node and current state, for callers polling until `Ready`.
    ///
    /// Each call is one read; backoff between calls is up to the caller.
    pub async fn owner_and_state(&self, volume_id: &str) -> Result<(String, ZfsState)> {
        let vol = self.get(volume_id).await?;
        Ok((vol.spec.owner_node_id.clone(), vol.state()))
    }
}

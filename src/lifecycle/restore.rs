//! Restore Lifecycle
//!
//! Restores only carry a status payload: no node label and no protection
//! marker is added on their behalf.

use std::sync::Arc;

use kube::ResourceExt;

use super::{check_transition, report};
use crate::config::LifecycleConfig;
use crate::crd::{RestoreStatus, ZfsRestore, RESTORE_KIND, ZFS_VOLUME_KEY};
use crate::error::Result;
use crate::finalizer;
use crate::observer::{LifecycleObserverRef, TracingObserver};
use crate::store::{LabelSelector, ResourceStoreRef};

/// Manager for ZfsRestore records
pub struct RestoreLifecycle {
    store: ResourceStoreRef<ZfsRestore>,
    config: Arc<LifecycleConfig>,
    observer: LifecycleObserverRef,
}

impl RestoreLifecycle {
    pub fn new(store: ResourceStoreRef<ZfsRestore>, config: Arc<LifecycleConfig>) -> Self {
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

    pub async fn provision(&self, rstr: &ZfsRestore) -> Result<ZfsRestore> {
        let result = self.store.create(rstr).await;
        report(&*self.observer, RESTORE_KIND, "provision", &rstr.name_any(), result)
    }

    /// Record `status`; the finalizer set and labels are left as they are
    pub async fn update_status(
        &self,
        rstr: &ZfsRestore,
        status: RestoreStatus,
    ) -> Result<ZfsRestore> {
        let name = rstr.name_any();
        let result = match check_transition(RESTORE_KIND, &name, rstr.phase(), status) {
            Ok(()) => {
                let mut updated = rstr.clone();
                updated.status = Some(status);
                self.store.update(&updated).await
            }
            Err(e) => Err(e),
        };
        report(&*self.observer, RESTORE_KIND, "update_status", &name, result)
    }

    /// Clear any finalizers a restore was created with
    pub async fn release(&self, rstr: &ZfsRestore) -> Result<ZfsRestore> {
        let released = finalizer::without_protection(rstr);
        let result = self.store.update(&released).await;
        report(&*self.observer, RESTORE_KIND, "release", &rstr.name_any(), result)
    }

    pub async fn get(&self, name: &str) -> Result<ZfsRestore> {
        let result = self.store.get(name).await;
        report(&*self.observer, RESTORE_KIND, "get", name, result)
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let result = self.store.delete(name).await;
        report(&*self.observer, RESTORE_KIND, "delete", name, result)
    }

    /// Restores this node has to receive
    pub async fn list_for_this_node(&self) -> Result<Vec<ZfsRestore>> {
        let result: Result<Vec<ZfsRestore>> = self
            .store
            .list(&LabelSelector::everything())
            .await
            .map(|all| {
                all.into_iter()
                    .filter(|r| r.spec.owner_node_id == self.config.node_id)
                    .collect()
            });
        report(&*self.observer, RESTORE_KIND, "list", &self.config.node_id, result)
    }

    /// Restores targeting one volume
    pub async fn list_for_volume(&self, volume_name: &str) -> Result<Vec<ZfsRestore>> {
        let selector = LabelSelector::matching(ZFS_VOLUME_KEY, volume_name);
        let result = self.store.list(&selector).await;
        report(&*self.observer, RESTORE_KIND, "list", &selector.to_string(), result)
    }
}

//! Backup Lifecycle
//!
//! The node agent reports backup progress through [`BackupLifecycle::update_status`],
//! which also keeps the protection marker in place until the remote copy is
//! cleaned up.

use std::sync::Arc;

use kube::ResourceExt;

use super::{check_transition, report};
use crate::config::LifecycleConfig;
use crate::crd::{BackupStatus, ZfsBackup, BACKUP_KIND, ZFS_VOLUME_KEY};
use crate::error::Result;
use crate::finalizer;
use crate::observer::{LifecycleObserverRef, TracingObserver};
use crate::store::{LabelSelector, ResourceStoreRef};

/// Manager for ZfsBackup records
pub struct BackupLifecycle {
    store: ResourceStoreRef<ZfsBackup>,
    config: Arc<LifecycleConfig>,
    observer: LifecycleObserverRef,
}

impl BackupLifecycle {
    pub fn new(store: ResourceStoreRef<ZfsBackup>, config: Arc<LifecycleConfig>) -> Self {
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

    pub async fn provision(&self, bkp: &ZfsBackup) -> Result<ZfsBackup> {
        let result = self.store.create(bkp).await;
        report(&*self.observer, BACKUP_KIND, "provision", &bkp.name_any(), result)
    }

    /// Protect the backup and record `status`.
    ///
    /// Terminal statuses are final: `Done` never becomes `Failed` and
    /// progress never moves back to `Init`.
    pub async fn update_status(&self, bkp: &ZfsBackup, status: BackupStatus) -> Result<ZfsBackup> {
        let name = bkp.name_any();
        let result = match check_transition(BACKUP_KIND, &name, bkp.phase(), status) {
            Ok(()) => {
                let mut updated = finalizer::with_protection(bkp);
                updated.status = Some(status);
                self.store.update(&updated).await
            }
            Err(e) => Err(e),
        };
        report(&*self.observer, BACKUP_KIND, "update_status", &name, result)
    }

    /// Clear the finalizers once the remote copy is gone
    pub async fn release(&self, bkp: &ZfsBackup) -> Result<ZfsBackup> {
        let released = finalizer::without_protection(bkp);
        let result = self.store.update(&released).await;
        report(&*self.observer, BACKUP_KIND, "release", &bkp.name_any(), result)
    }

    pub async fn get(&self, name: &str) -> Result<ZfsBackup> {
        let result = self.store.get(name).await;
        report(&*self.observer, BACKUP_KIND, "get", name, result)
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let result = self.store.delete(name).await;
        report(&*self.observer, BACKUP_KIND, "delete", name, result)
    }

    /// Backups this node has to send
    pub async fn list_for_this_node(&self) -> Result<Vec<ZfsBackup>> {
        let result: Result<Vec<ZfsBackup>> = self
            .store
            .list(&LabelSelector::everything())
            .await
            .map(|all| {
                all.into_iter()
                    .filter(|b| b.spec.owner_node_id == self.config.node_id)
                    .collect()
            });
        report(&*self.observer, BACKUP_KIND, "list", &self.config.node_id, result)
    }

    /// Backups of one volume
    pub async fn list_for_volume(&self, volume_name: &str) -> Result<Vec<ZfsBackup>> {
        let selector = LabelSelector::matching(ZFS_VOLUME_KEY, volume_name);
        let result = self.store.list(&selector).await;
        report(&*self.observer, BACKUP_KIND, "list", &selector.to_string(), result)
    }
}

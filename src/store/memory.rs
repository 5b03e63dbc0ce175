//! In-Memory Store
//!
//! Versioned store with API-server semantics: resource versions, optimistic
//! concurrency on update, and finalizer-aware deletion. Used by tests and by
//! anything running without a cluster.

use super::{kind_of, name_of, LabelSelector, ResourceStore, ZfsResource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// In-process store for one kind in one namespace
pub struct MemoryStore<K> {
    namespace: String,
    /// Objects by name, in insertion order
    objects: RwLock<IndexMap<String, K>>,
    /// Last issued resource version
    version: AtomicU64,
    /// Fault injection: every call fails with `Unavailable` while set
    unavailable: AtomicBool,
}

impl<K: ZfsResource> MemoryStore<K> {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            objects: RwLock::new(IndexMap::new()),
            version: AtomicU64::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Number of stored objects, terminating ones included
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(Error::Unavailable(format!(
                "{} store in namespace {} is unavailable",
                kind_of::<K>(),
                self.namespace
            )))
        } else {
            Ok(())
        }
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }
}

#[async_trait]
impl<K: ZfsResource> ResourceStore<K> for MemoryStore<K> {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn create(&self, obj: &K) -> Result<K> {
        self.check_available()?;
        let name = name_of(obj)?;

        let mut objects = self.objects.write();
        if objects.contains_key(&name) {
            return Err(Error::already_exists(&kind_of::<K>(), &name));
        }

        let mut stored = obj.clone();
        let version = self.next_version();
        let meta = stored.meta_mut();
        meta.namespace = Some(self.namespace.clone());
        meta.uid = Some(format!("{}-{}-{}", self.namespace, name, version));
        meta.resource_version = Some(version);
        meta.generation = Some(1);
        meta.creation_timestamp = Some(Time(chrono::Utc::now()));
        meta.deletion_timestamp = None;

        objects.insert(name, stored.clone());
        Ok(stored)
    }

    async fn get(&self, name: &str) -> Result<K> {
        self.check_available()?;
        self.objects
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(&kind_of::<K>(), name))
    }

    async fn list(&self, selector: &LabelSelector) -> Result<Vec<K>> {
        self.check_available()?;
        Ok(self
            .objects
            .read()
            .values()
            .filter(|o| selector.matches(o.labels()))
            .cloned()
            .collect())
    }

    async fn update(&self, obj: &K) -> Result<K> {
        self.check_available()?;
        let name = name_of(obj)?;
        let kind = kind_of::<K>();

        let mut objects = self.objects.write();
        let current = objects
            .get(&name)
            .ok_or_else(|| Error::not_found(&kind, &name))?;

        // Unset resource version means an unconditional write
        if let Some(expected) = obj.resource_version() {
            if current.resource_version().as_deref() != Some(expected.as_str()) {
                return Err(Error::conflict(&kind, &name));
            }
        }

        let terminating = current.meta().deletion_timestamp.clone();
        if terminating.is_some() {
            let added = obj
                .finalizers()
                .iter()
                .any(|f| !current.finalizers().contains(f));
            if added {
                return Err(Error::Validation(format!(
                    "{}/{} is being deleted, no new finalizers can be added",
                    kind, name
                )));
            }
        }

        let mut stored = obj.clone();
        let version = self.next_version();
        let generation = current.meta().generation.unwrap_or(1) + 1;
        let uid = current.meta().uid.clone();
        let created = current.meta().creation_timestamp.clone();

        let meta = stored.meta_mut();
        meta.namespace = Some(self.namespace.clone());
        meta.uid = uid;
        meta.creation_timestamp = created;
        meta.deletion_timestamp = terminating;
        meta.resource_version = Some(version);
        meta.generation = Some(generation);

        // Last finalizer gone on a terminating object: the delete completes
        if stored.meta().deletion_timestamp.is_some() && stored.finalizers().is_empty() {
            objects.shift_remove(&name);
        } else {
            objects.insert(name, stored.clone());
        }
        Ok(stored)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.check_available()?;
        let mut objects = self.objects.write();
        let current = objects
            .get_mut(name)
            .ok_or_else(|| Error::not_found(&kind_of::<K>(), name))?;

        if current.finalizers().is_empty() {
            objects.shift_remove(name);
            return Ok(());
        }

        if current.meta().deletion_timestamp.is_none() {
            let version = self.next_version();
            let meta = current.meta_mut();
            meta.deletion_timestamp = Some(Time(chrono::Utc::now()));
            meta.resource_version = Some(version);
        }
        Ok(())
    }
}

//! Resource Stores
//!
//! A versioned key-value view of one resource kind in one namespace.
//! The lifecycle managers only ever talk to the store through
//! [`ResourceStore`], so the Kubernetes API and the in-memory store used by
//! tests are interchangeable.

mod kubernetes;
mod memory;

pub use kubernetes::KubeStore;
pub use memory::MemoryStore;

use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

// =============================================================================
// Resource Bound
// =============================================================================

/// Anything the stores can hold: a namespaced, statically typed resource
pub trait ZfsResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ZfsResource for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Kind name of `K`, for errors and logs
pub fn kind_of<K: ZfsResource>() -> String {
    K::kind(&()).into_owned()
}

/// Name of an object, or a validation error if it has none
pub(crate) fn name_of<K: ZfsResource>(obj: &K) -> Result<String> {
    obj.meta()
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::Validation(format!("{} is missing metadata.name", kind_of::<K>())))
}

// =============================================================================
// Label Selector
// =============================================================================

/// Equality-based label selector (`key=value,key2=value2`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    terms: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Selector matching everything
    pub fn everything() -> Self {
        Self::default()
    }

    /// Selector with a single `key=value` term
    pub fn matching(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::default().and(key, value)
    }

    /// Add another `key=value` term
    pub fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.terms.insert(key.into(), value.into());
        self
    }

    /// Parse the `key=value` / `key==value` comma-separated form
    pub fn parse(selector: &str) -> Result<Self> {
        let mut terms = BTreeMap::new();
        for term in selector.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (key, value) = term
                .split_once("==")
                .or_else(|| term.split_once('='))
                .ok_or_else(|| Error::Validation(format!("invalid selector term: {}", term)))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::Validation(format!("empty key in selector term: {}", term)));
            }
            terms.insert(key.to_string(), value.trim().to_string());
        }
        Ok(Self { terms })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether every term is present in `labels` with the same value
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.terms
            .iter()
            .all(|(k, v)| labels.get(k).map_or(false, |actual| actual == v))
    }
}

impl std::fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined: Vec<String> = self
            .terms
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}", joined.join(","))
    }
}

// =============================================================================
// ResourceStore Trait
// =============================================================================

/// Versioned CRUD over one kind in one namespace.
///
/// Every call is a single round-trip. Nothing is retried: conflicts and
/// transport failures go straight back to the caller.
#[async_trait]
pub trait ResourceStore<K: ZfsResource>: Send + Sync {
    /// Namespace this store operates in
    fn namespace(&self) -> &str;

    /// Persist a new object. Fails with `AlreadyExists` on a name clash.
    async fn create(&self, obj: &K) -> Result<K>;

    /// Fetch by name. Terminating objects are still returned.
    async fn get(&self, name: &str) -> Result<K>;

    /// Objects matching `selector`, in store order, terminating ones included
    async fn list(&self, selector: &LabelSelector) -> Result<Vec<K>>;

    /// Replace an object. Fails with `Conflict` when `obj` carries a stale
    /// resource version.
    async fn update(&self, obj: &K) -> Result<K>;

    /// Delete by name. Objects with finalizers become terminating instead of
    /// disappearing.
    async fn delete(&self, name: &str) -> Result<()>;
}

pub type ResourceStoreRef<K> = Arc<dyn ResourceStore<K>>;

//! Kubernetes Store
//!
//! [`ResourceStore`] backed by the API server through `kube::Api`. The API
//! server already implements resource versions and finalizer semantics; this
//! adapter translates its status codes into the lifecycle taxonomy and routes
//! status changes through the `/status` subresource.

use super::{kind_of, name_of, LabelSelector, ResourceStore, ZfsResource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, ResourceExt};
use serde_json::Value;
use tracing::debug;

/// Store for one kind in one namespace of a live cluster
pub struct KubeStore<K> {
    api: Api<K>,
    namespace: String,
}

impl<K: ZfsResource> KubeStore<K> {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            api: Api::namespaced(client, &namespace),
            namespace,
        }
    }
}

/// Translate an API failure for `kind/name`
fn map_error(kind: &str, name: &str, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => Error::not_found(kind, name),
        kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
            Error::already_exists(kind, name)
        }
        kube::Error::Api(resp) if resp.code == 409 => Error::conflict(kind, name),
        other => Error::Unavailable(format!("{}/{}: {}", kind, name, other)),
    }
}

/// Body for the `/status` write following a main-resource replace, or `None`
/// when `desired` carries the status the server already holds.
///
/// The API server drops `.status` from a replace of a resource with a status
/// subresource, so the status goes out on top of the replaced object and its
/// new resource version.
fn status_write<K: ZfsResource>(desired: &K, replaced: &K) -> Result<Option<Vec<u8>>> {
    let wanted = serde_json::to_value(desired)?
        .get("status")
        .cloned()
        .unwrap_or(Value::Null);

    let mut body = serde_json::to_value(replaced)?;
    if body.get("status").cloned().unwrap_or(Value::Null) == wanted {
        return Ok(None);
    }
    if let Some(fields) = body.as_object_mut() {
        fields.insert("status".to_string(), wanted);
    }
    Ok(Some(serde_json::to_vec(&body)?))
}

#[async_trait]
impl<K: ZfsResource> ResourceStore<K> for KubeStore<K> {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn create(&self, obj: &K) -> Result<K> {
        let name = name_of(obj)?;
        self.api
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| map_error(&kind_of::<K>(), &name, e))
    }

    async fn get(&self, name: &str) -> Result<K> {
        self.api
            .get(name)
            .await
            .map_err(|e| map_error(&kind_of::<K>(), name, e))
    }

    async fn list(&self, selector: &LabelSelector) -> Result<Vec<K>> {
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector.to_string());
        }
        // Terminating objects stay listed so their owner can release them
        let list = self
            .api
            .list(&params)
            .await
            .map_err(|e| map_error(&kind_of::<K>(), &selector.to_string(), e))?;
        Ok(list.items)
    }

    async fn update(&self, obj: &K) -> Result<K> {
        let name = name_of(obj)?;
        let kind = kind_of::<K>();
        let pp = PostParams::default();

        let replaced = self
            .api
            .replace(&name, &pp, obj)
            .await
            .map_err(|e| map_error(&kind, &name, e))?;

        match status_write(obj, &replaced)? {
            Some(body) => {
                debug!(
                    "{} {} writing status at version {:?}",
                    kind,
                    name,
                    replaced.resource_version()
                );
                self.api
                    .replace_status(&name, &pp, body)
                    .await
                    .map_err(|e| map_error(&kind, &name, e))
            }
            None => Ok(replaced),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let outcome = self
            .api
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_error(&kind_of::<K>(), name, e))?;

        if outcome.is_left() {
            debug!("{} {} marked for deletion", kind_of::<K>(), name);
        }
        Ok(())
    }
}

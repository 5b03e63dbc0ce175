//! Finalizer guard
//!
//! Pure functions deciding whether a resource is protected from removal.
//! A protected object that receives a delete stays in the store as
//! terminating until its owner clears the marker.

use crate::crd::ZFS_FINALIZER;
use kube::Resource;

/// Copy of `obj` carrying the protection marker.
///
/// Returns the input unchanged when the marker is already present.
pub fn with_protection<K: Resource + Clone>(obj: &K) -> K {
    let mut out = obj.clone();
    if is_protected(obj) {
        return out;
    }
    out.meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(ZFS_FINALIZER.to_string());
    out
}

/// Copy of `obj` with its finalizer set cleared
pub fn without_protection<K: Resource + Clone>(obj: &K) -> K {
    let mut out = obj.clone();
    out.meta_mut().finalizers = None;
    out
}

/// Whether `obj` carries the protection marker
pub fn is_protected<K: Resource>(obj: &K) -> bool {
    obj.meta()
        .finalizers
        .as_ref()
        .map_or(false, |f| f.iter().any(|s| s == ZFS_FINALIZER))
}

/// Whether a finalizer of any kind is present
pub fn has_finalizers<K: Resource>(obj: &K) -> bool {
    obj.meta()
        .finalizers
        .as_ref()
        .map_or(false, |f| !f.is_empty())
}

/// Whether a delete was issued while the object was protected
pub fn is_terminating<K: Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{VolumeOptions, ZfsVolume};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::ResourceExt;

    fn volume() -> ZfsVolume {
        ZfsVolume::from_options("pvc-1", VolumeOptions {
            capacity_bytes: 1024,
            owner_node_id: "node-a".into(),
            pool_name: "zfspv-pool".into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_with_protection_is_idempotent() {
        let vol = volume();
        assert!(!is_protected(&vol));

        let once = with_protection(&vol);
        let twice = with_protection(&once);

        assert!(is_protected(&once));
        assert_eq!(once.finalizers(), &[ZFS_FINALIZER.to_string()]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_without_protection_clears_everything() {
        let mut vol = with_protection(&volume());
        vol.finalizers_mut().push("external/finalizer".into());

        let cleared = without_protection(&vol);
        assert!(!is_protected(&cleared));
        assert!(!has_finalizers(&cleared));
        assert!(cleared.metadata.finalizers.is_none());
    }

    #[test]
    fn test_foreign_finalizer_is_not_protection() {
        let mut vol = volume();
        vol.finalizers_mut().push("external/finalizer".into());
        assert!(has_finalizers(&vol));
        assert!(!is_protected(&vol));
    }

    #[test]
    fn test_is_terminating() {
        let mut vol = volume();
        assert!(!is_terminating(&vol));
        vol.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        assert!(is_terminating(&vol));
    }
}

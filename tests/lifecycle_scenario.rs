//! End-to-end lifecycle against the in-memory store

use std::sync::Arc;

use assert_matches::assert_matches;
use kube::ResourceExt;

use zfs_lifecycle::crd::{SnapshotOptions, VolumeOptions};
use zfs_lifecycle::{
    finalizer, Error, LabelSelector, LifecycleConfig, MemoryStore, RecordingObserver,
    ResourceStore, SnapshotLifecycle, VolumeLifecycle, ZfsSnapshot, ZfsState, ZfsVolume,
    ZFS_FINALIZER, ZFS_NODE_KEY,
};

fn config(node: &str) -> Arc<LifecycleConfig> {
    Arc::new(LifecycleConfig::new("openebs", node))
}

fn volume(name: &str, capacity_bytes: u64) -> ZfsVolume {
    ZfsVolume::from_options(name, VolumeOptions {
        capacity_bytes,
        owner_node_id: "nodeA".into(),
        pool_name: "zfspv-pool".into(),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn volume_claim_resize_release_delete() {
    let store = Arc::new(MemoryStore::<ZfsVolume>::new("openebs"));
    let observer = Arc::new(RecordingObserver::new());
    let volumes = VolumeLifecycle::new(store.clone(), config("nodeA")).with_observer(observer.clone());

    let v1 = volumes.provision(&volume("v1", 10737418240)).await.unwrap();
    assert_eq!(v1.spec.capacity, "10737418240");

    volumes.claim(&v1).await.unwrap();
    let claimed = volumes.get("v1").await.unwrap();
    assert_eq!(claimed.state(), ZfsState::Ready);
    assert_eq!(claimed.finalizers(), &[ZFS_FINALIZER.to_string()]);
    assert_eq!(
        claimed.labels().get(ZFS_NODE_KEY).map(String::as_str),
        Some("nodeA")
    );

    volumes.resize(&claimed, 21474836480).await.unwrap();
    let resized = volumes.get("v1").await.unwrap();
    assert_eq!(resized.spec.capacity, "21474836480");
    assert_eq!(resized.capacity_bytes().unwrap(), 21474836480);

    volumes.release(&resized).await.unwrap();
    volumes.delete("v1").await.unwrap();
    assert_matches!(volumes.get("v1").await, Err(Error::NotFound { .. }));

    let failures: Vec<_> = observer
        .outcomes()
        .into_iter()
        .filter(|o| !o.is_success())
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].operation, "get");
}

#[tokio::test]
async fn concurrent_updates_from_same_base() {
    let store = Arc::new(MemoryStore::<ZfsVolume>::new("openebs"));
    let volumes = VolumeLifecycle::new(store.clone(), config("nodeA"));
    let base = volumes.provision(&volume("v1", 1024)).await.unwrap();

    let (a, b) = futures::join!(volumes.resize(&base, 2048), volumes.resize(&base, 4096));

    let outcomes = [a, b];
    let ok = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(Error::Conflict { .. })))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(conflicts, 1);

    let winner = outcomes.iter().find_map(|r| r.as_ref().ok()).unwrap();
    assert_eq!(volumes.get("v1").await.unwrap().spec.capacity, winner.spec.capacity);
}

#[tokio::test]
async fn concurrent_claims_from_two_workers() {
    let store = Arc::new(MemoryStore::<ZfsVolume>::new("openebs"));
    let volumes = Arc::new(VolumeLifecycle::new(store.clone(), config("nodeA")));
    let base = volumes.provision(&volume("v1", 1024)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let volumes = volumes.clone();
        let base = base.clone();
        handles.push(tokio::spawn(async move { volumes.claim(&base).await }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(e) => assert_matches!(e, Error::Conflict { .. }),
        }
    }
    assert_eq!(wins, 1);

    let stored = volumes.get("v1").await.unwrap();
    assert_eq!(stored.finalizers().len(), 1);
    assert_eq!(stored.state(), ZfsState::Ready);
}

#[tokio::test]
async fn protected_delete_never_disappears() {
    let store = Arc::new(MemoryStore::<ZfsVolume>::new("openebs"));
    let volumes = VolumeLifecycle::new(store.clone(), config("nodeA"));
    let v1 = volumes.provision(&volume("v1", 1024)).await.unwrap();
    volumes.claim(&v1).await.unwrap();

    volumes.delete("v1").await.unwrap();

    let listed = store.list(&LabelSelector::everything()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(finalizer::is_terminating(&listed[0]));
    assert_eq!(volumes.list_for_node("nodeA").await.unwrap().len(), 1);
    let terminating = volumes.get("v1").await.unwrap();
    assert!(finalizer::is_terminating(&terminating));
    assert!(finalizer::is_protected(&terminating));

    // Re-claiming a terminating volume is a no-op
    let again = volumes.claim(&terminating).await.unwrap();
    assert_eq!(again, terminating);

    volumes.release(&terminating).await.unwrap();
    assert!(store.is_empty());
}

#[tokio::test]
async fn node_scoped_listing_across_kinds() {
    let volume_store = Arc::new(MemoryStore::<ZfsVolume>::new("openebs"));
    let snapshot_store = Arc::new(MemoryStore::<ZfsSnapshot>::new("openebs"));

    let node_a = VolumeLifecycle::new(volume_store.clone(), config("nodeA"));
    let node_b = VolumeLifecycle::new(volume_store.clone(), config("nodeB"));
    let snaps = SnapshotLifecycle::new(snapshot_store, config("nodeA"));

    for i in 0..50 {
        let vol = node_a.provision(&volume(&format!("v{}", i), 1024)).await.unwrap();
        if i % 2 == 0 {
            node_a.claim(&vol).await.unwrap();
        } else {
            node_b.claim(&vol).await.unwrap();
        }
    }

    let a = node_a.list_for_this_node().await.unwrap();
    let b = node_b.list_for_this_node().await.unwrap();
    assert_eq!(a.len(), 25);
    assert_eq!(b.len(), 25);
    assert!(a.iter().all(|v| v.labels()[ZFS_NODE_KEY] == "nodeA"));
    assert!(b.iter().all(|v| v.labels()[ZFS_NODE_KEY] == "nodeB"));

    let snap = ZfsSnapshot::from_options("v0-snap", SnapshotOptions {
        volume_name: "v0".into(),
        owner_node_id: "nodeA".into(),
        pool_name: "zfspv-pool".into(),
        capacity_bytes: 1024,
        ..Default::default()
    })
    .unwrap();
    let snap = snaps.provision(&snap).await.unwrap();
    snaps.claim(&snap).await.unwrap();

    assert_eq!(snaps.list_for_node("nodeA").await.unwrap().len(), 1);
    assert!(snaps.list_for_node("nodeB").await.unwrap().is_empty());
    assert_eq!(snaps.list_for_volume("v0").await.unwrap().len(), 1);
}

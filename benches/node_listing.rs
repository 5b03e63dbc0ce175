//! Benchmark for node-scoped listing over the in-memory store

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::BTreeMap;
use std::sync::Arc;
use zfs_lifecycle::crd::VolumeOptions;
use zfs_lifecycle::{
    LifecycleConfig, MemoryStore, ResourceStore, VolumeLifecycle, ZfsVolume, ZFS_NODE_KEY,
};

/// Store with `count` volumes spread over 16 nodes
fn seeded_store(count: usize) -> Arc<MemoryStore<ZfsVolume>> {
    let store = Arc::new(MemoryStore::new("openebs"));
    tokio_test::block_on(async {
        for i in 0..count {
            let node = format!("node-{:02}", i % 16);
            let mut labels = BTreeMap::new();
            labels.insert(ZFS_NODE_KEY.to_string(), node.clone());
            let vol = ZfsVolume::from_options(&format!("pvc-{:06}", i), VolumeOptions {
                capacity_bytes: 1 << 30,
                owner_node_id: node,
                pool_name: "zfspv-pool".into(),
                labels,
                ..Default::default()
            })
            .unwrap();
            store.create(&vol).await.unwrap();
        }
    });
    store
}

fn bench_list_for_node(c: &mut Criterion) {
    let mut group = c.benchmark_group("volume_lifecycle");
    let rt = tokio::runtime::Runtime::new().unwrap();

    for count in [1_000usize, 10_000] {
        let store = seeded_store(count);
        let lifecycle = VolumeLifecycle::new(
            store,
            Arc::new(LifecycleConfig::new("openebs", "node-03")),
        );
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("list_for_node", count), &count, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let vols = lifecycle.list_for_node(black_box("node-03")).await.unwrap();
                    black_box(vols.len())
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_list_for_node);
criterion_main!(benches);

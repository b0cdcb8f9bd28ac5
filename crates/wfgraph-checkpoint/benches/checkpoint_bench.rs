use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wfgraph_checkpoint::{Checkpoint, InMemoryStore, StepId, Store};

fn make_checkpoint(step: u64) -> Checkpoint<u64> {
    Checkpoint {
        run_id: "bench-run".to_string(),
        step_id: StepId(step),
        state: step,
        frontier: vec![],
        rng_seed: 0,
        recorded_ios: vec![],
        idempotency_key: format!("key-{step}"),
        timestamp: Utc::now(),
        label: None,
    }
}

fn bench_save_checkpoint(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store: InMemoryStore<u64> = InMemoryStore::new();

    c.bench_function("inmemory_store_save_checkpoint", |b| {
        let mut step = 0u64;
        b.iter(|| {
            rt.block_on(async {
                store.save_checkpoint(black_box(make_checkpoint(step))).await.unwrap();
            });
            step += 1;
        });
    });
}

fn bench_load_latest(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store: InMemoryStore<u64> = InMemoryStore::new();
    rt.block_on(async {
        for step in 0..1000 {
            store.save_checkpoint(make_checkpoint(step)).await.unwrap();
        }
    });

    c.bench_function("inmemory_store_load_latest", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(store.load_latest("bench-run").await.unwrap());
            });
        });
    });
}

criterion_group!(benches, bench_save_checkpoint, bench_load_latest);
criterion_main!(benches);

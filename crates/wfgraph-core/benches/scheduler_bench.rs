use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wfgraph_checkpoint::InMemoryStore;
use wfgraph_core::{EngineConfig, Engine, Graph, NodeResult, SumReducer};

fn chain_graph(len: usize) -> Graph<i64> {
    let mut g: Graph<i64> = Graph::new();
    for i in 0..len {
        g.register_fn(format!("n{i}"), |_ctx, s: i64| async move { Ok(NodeResult::new(s + 1)) }).unwrap();
        if i > 0 {
            g.connect(format!("n{}", i - 1), format!("n{i}"));
        }
    }
    g.set_start("n0");
    g
}

fn fan_out_graph(width: usize) -> Graph<i64> {
    let mut g: Graph<i64> = Graph::new();
    g.register_fn("root", |_ctx, s: i64| async move { Ok(NodeResult::new(s)) }).unwrap();
    for i in 0..width {
        g.register_fn(format!("leaf{i}"), |_ctx, s: i64| async move { Ok(NodeResult::new(1)) }).unwrap();
        g.connect("root", format!("leaf{i}"));
    }
    g.set_start("root");
    g
}

fn bench_linear_chain(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("scheduler_linear_chain_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let engine = Engine::new(chain_graph(100), SumReducer, InMemoryStore::new())
                    .unwrap()
                    .with_config(EngineConfig::default().with_max_concurrent_nodes(1))
                    .unwrap();
                let outcome = engine.run(uuid::Uuid::new_v4().to_string(), black_box(0i64)).await.unwrap();
                black_box(outcome.state);
            });
        });
    });
}

fn bench_concurrent_fan_out(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("scheduler_concurrent_fan_out_64", |b| {
        b.iter(|| {
            rt.block_on(async {
                let engine = Engine::new(fan_out_graph(64), SumReducer, InMemoryStore::new())
                    .unwrap()
                    .with_config(EngineConfig::default().with_max_concurrent_nodes(16))
                    .unwrap();
                let outcome = engine.run(uuid::Uuid::new_v4().to_string(), black_box(0i64)).await.unwrap();
                black_box(outcome.state);
            });
        });
    });
}

criterion_group!(benches, bench_linear_chain, bench_concurrent_fan_out);
criterion_main!(benches);

//! Replay fidelity and replay drift detection, exercised through `Engine`
//! rather than through `ReplayController`'s own unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wfgraph_checkpoint::{InMemoryStore, RecordedIo, Store};
use wfgraph_core::{Engine, EngineConfig, EngineError, Graph, Node, NodeContext, NodeResult, ReplayMode, ReplayOutcome, SumReducer};

/// A node that performs one "external" call per attempt (here: just an
/// increment standing in for an HTTP/tool call) and records the
/// request/response pair. Counts how many times it actually went live
/// (as opposed to being served a replayed response) so tests can assert on
/// call counts without inspecting engine internals.
struct FetchNode {
    live_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Node<i64> for FetchNode {
    async fn run(&self, ctx: &NodeContext, _state: i64) -> wfgraph_core::Result<NodeResult<i64>> {
        let request = b"fetch-request".to_vec();
        let response = match ctx.replay(&request, true)? {
            ReplayOutcome::Replayed(bytes) => bytes,
            ReplayOutcome::Live => {
                self.live_calls.fetch_add(1, Ordering::SeqCst);
                b"fetch-response".to_vec()
            }
        };
        let delta = response.len() as i64;
        Ok(NodeResult::new(delta).with_recording(request, response))
    }
}

fn fetch_graph(live_calls: Arc<AtomicUsize>) -> Graph<i64> {
    let mut g: Graph<i64> = Graph::new();
    g.register("fetch", FetchNode { live_calls }).unwrap();
    g.set_start("fetch");
    g
}

/// Recording a run, then replaying it from scratch with
/// `MaxConcurrentNodes = 0`, yields the same final state and never
/// re-contacts the "outside world" for the recorded attempt.
#[tokio::test]
async fn replay_run_reuses_recorded_response_without_going_live_again() {
    let store: InMemoryStore<i64> = InMemoryStore::new();
    let live_calls = Arc::new(AtomicUsize::new(0));
    let run_id = "replay-fidelity-run";

    let config = EngineConfig::default().with_max_concurrent_nodes(0);
    let engine = Engine::new(fetch_graph(live_calls.clone()), SumReducer, store.clone())
        .unwrap()
        .with_config(config.clone())
        .unwrap();

    let first = engine.run(run_id, 0i64).await.unwrap();
    assert!(first.error.is_none());
    assert_eq!(live_calls.load(Ordering::SeqCst), 1, "original run performs exactly one live fetch");

    let replayed = engine.replay_run(run_id, 0i64, ReplayMode::Strict).await.unwrap();
    assert!(replayed.error.is_none());
    assert_eq!(replayed.state, first.state, "replayed run must reach the same final state as the original");
    assert_eq!(
        live_calls.load(Ordering::SeqCst),
        1,
        "replay must serve the recorded response instead of calling the node's live path again"
    );
}

/// If the recorded response on disk is tampered with so its fingerprint no
/// longer matches, strict replay must fail with a replay mismatch naming the
/// diverging node/attempt rather than silently serving corrupted data.
#[tokio::test]
async fn strict_replay_detects_tampered_recording() {
    let store: InMemoryStore<i64> = InMemoryStore::new();
    let live_calls = Arc::new(AtomicUsize::new(0));
    let run_id = "replay-drift-run";

    let config = EngineConfig::default().with_max_concurrent_nodes(0);
    let engine = Engine::new(fetch_graph(live_calls.clone()), SumReducer, store.clone())
        .unwrap()
        .with_config(config)
        .unwrap();

    let first = engine.run(run_id, 0i64).await.unwrap();
    assert!(first.error.is_none());

    // Tamper with the committed recording's fingerprint directly in the
    // store, simulating bit rot or an out-of-band edit of the recorded blob.
    let mut checkpoints = store.list_checkpoints(run_id).await.unwrap();
    let checkpoint = checkpoints.pop().unwrap();
    let mut tampered = checkpoint.clone();
    tampered.recorded_ios = tampered
        .recorded_ios
        .into_iter()
        .map(|io| RecordedIo {
            fingerprint: "0".repeat(64),
            ..io
        })
        .collect();
    let tampered_store: InMemoryStore<i64> = InMemoryStore::new();
    tampered_store.save_checkpoint(tampered).await.unwrap();

    let engine = Engine::new(fetch_graph(live_calls), SumReducer, tampered_store).unwrap();
    let outcome = engine.replay_run(run_id, 0i64, ReplayMode::Strict).await.unwrap();

    assert!(
        matches!(outcome.error, Some(EngineError::ReplayMismatch { .. })),
        "tampered fingerprint must surface as a replay mismatch, got {:?}",
        outcome.error
    );
}

/// If the recorded request payload no longer matches what the node asks to
/// replay, strict mode must fail with a replay mismatch even though the
/// stored response's own fingerprint is untouched — divergence in the
/// request is just as much a replay failure as a corrupted response.
#[tokio::test]
async fn strict_replay_detects_request_payload_drift() {
    let store: InMemoryStore<i64> = InMemoryStore::new();
    let live_calls = Arc::new(AtomicUsize::new(0));
    let run_id = "replay-request-drift-run";

    let config = EngineConfig::default().with_max_concurrent_nodes(0);
    let engine = Engine::new(fetch_graph(live_calls.clone()), SumReducer, store.clone())
        .unwrap()
        .with_config(config)
        .unwrap();

    let first = engine.run(run_id, 0i64).await.unwrap();
    assert!(first.error.is_none());

    // Tamper with the committed recording's request blob, simulating a node
    // that would ask a different question on the resumed attempt.
    let mut checkpoints = store.list_checkpoints(run_id).await.unwrap();
    let checkpoint = checkpoints.pop().unwrap();
    let mut tampered = checkpoint.clone();
    tampered.recorded_ios = tampered
        .recorded_ios
        .into_iter()
        .map(|io| RecordedIo {
            request_blob: b"a-different-fetch-request".to_vec(),
            ..io
        })
        .collect();
    let tampered_store: InMemoryStore<i64> = InMemoryStore::new();
    tampered_store.save_checkpoint(tampered).await.unwrap();

    let engine = Engine::new(fetch_graph(live_calls), SumReducer, tampered_store).unwrap();
    let outcome = engine.replay_run(run_id, 0i64, ReplayMode::Strict).await.unwrap();

    assert!(
        matches!(outcome.error, Some(EngineError::ReplayMismatch { .. })),
        "diverging request payload must surface as a replay mismatch, got {:?}",
        outcome.error
    );
}

/// Lenient replay mode falls through to live execution when nothing was
/// ever recorded, rather than failing — the mode a fresh run implicitly
/// uses.
#[tokio::test]
async fn lenient_replay_of_unrecorded_run_executes_live() {
    let store: InMemoryStore<i64> = InMemoryStore::new();
    let live_calls = Arc::new(AtomicUsize::new(0));
    let engine = Engine::new(fetch_graph(live_calls.clone()), SumReducer, store).unwrap();

    let outcome = engine.replay_run("never-ran-before", 0i64, ReplayMode::Lenient).await.unwrap();

    assert!(outcome.error.is_none());
    assert_eq!(live_calls.load(Ordering::SeqCst), 1);
}

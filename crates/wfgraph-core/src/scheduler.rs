//! The scheduler: drives one run of the graph from its start node to
//! completion.
//!
//! This is where every other module in the crate comes together: the
//! [`crate::frontier::Frontier`] supplies ready work, a bounded pool of
//! workers executes node bodies under [`crate::policy::NodePolicy`], a
//! single reduction loop folds their deltas through the
//! [`crate::reducer::Reducer`] in `OrderKey` order, expands successors, and
//! commits a [`wfgraph_checkpoint::Checkpoint`] at the end of every step.
//!
//! `MaxConcurrentNodes == 0` takes a separate, single-threaded code path
//! (no worker tasks, no results channel) so that replay under that setting
//! is byte-identical run to run, as the scheduling component's concurrency
//! model requires.

use crate::backoff;
use crate::config::EngineConfig;
use crate::context::NodeContext;
use crate::emitter::{Emitter, Event, TracingEmitter};
use crate::error::{EngineError, Result};
use crate::frontier::Frontier;
use crate::graph::{Graph, Node, NodeId};
use crate::node_result::{NodeResult, Route};
use crate::order;
use crate::policy::RngDerivation;
use crate::reducer::{apply_batch, PendingDelta, Reducer};
use crate::replay::ReplayController;
use crate::rng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wfgraph_checkpoint::{Checkpoint, RecordedIo, RunId, StepId, Store};

/// What a run ultimately produced: the last successfully committed state,
/// the step it stopped at, and — on failure or cancellation — the
/// canonical error. `error` is `None` on a clean completion.
#[derive(Debug, Clone)]
pub struct RunOutcome<S> {
    pub state: S,
    pub last_step: StepId,
    pub error: Option<EngineError>,
}

impl<S> RunOutcome<S> {
    /// Turns a failed/canceled outcome into `Err`, discarding the state.
    /// Callers who want `(state, error)` regardless of outcome should match
    /// on `RunOutcome` directly instead.
    pub fn into_result(self) -> Result<S> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.state),
        }
    }
}

/// One attempt's result, as delivered to the reduction loop over the
/// results channel. Not the same as [`NodeResult`] — this also carries the
/// identity of the attempt that produced it, needed for merge ordering.
enum Outcome<S> {
    Success {
        item: crate::work_item::WorkItem<S>,
        result: NodeResult<S>,
        recorded_io: Option<RecordedIo>,
    },
    Failure {
        item: crate::work_item::WorkItem<S>,
        error: EngineError,
    },
    Canceled,
}

/// State shared by the reduction loop and every worker task for one run.
/// `Arc`-wrapped and cloned into each spawned worker.
struct Shared<S> {
    run_id: RunId,
    graph: Arc<Graph<S>>,
    config: EngineConfig,
    emitter: Arc<dyn Emitter>,
    frontier: Frontier<S>,
    base_seed: u64,
    cancel: CancellationToken,
    inflight: AtomicUsize,
    completed: AtomicBool,
    seq: AtomicU64,
    replay: Arc<ReplayController>,
}

/// Builds and runs graphs. Cheap to clone (everything behind `Arc`) so one
/// `Engine` can drive many runs concurrently against the same graph.
pub struct Engine<S> {
    graph: Arc<Graph<S>>,
    config: EngineConfig,
    reducer: Arc<dyn Reducer<S>>,
    store: Arc<dyn Store<S>>,
    emitter: Arc<dyn Emitter>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Engine {
            graph: self.graph.clone(),
            config: self.config.clone(),
            reducer: self.reducer.clone(),
            store: self.store.clone(),
            emitter: self.emitter.clone(),
        }
    }
}

impl<S> Engine<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Validates `graph` and wraps it with a default [`EngineConfig`] and a
    /// [`TracingEmitter`]. Use `with_config`/`with_emitter` to customize
    /// either before calling `run`.
    pub fn new(graph: Graph<S>, reducer: impl Reducer<S> + 'static, store: impl Store<S> + 'static) -> Result<Self> {
        graph.validate()?;
        Ok(Engine {
            graph: Arc::new(graph),
            config: EngineConfig::default(),
            reducer: Arc::new(reducer),
            store: Arc::new(store),
            emitter: Arc::new(TracingEmitter),
        })
    }

    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_emitter(mut self, emitter: impl Emitter + 'static) -> Self {
        self.emitter = Arc::new(emitter);
        self
    }

    /// Starts a fresh run from the graph's start node with `initial_state`.
    pub async fn run(&self, run_id: impl Into<RunId>, initial_state: S) -> Result<RunOutcome<S>> {
        self.run_cancelable(run_id, initial_state, CancellationToken::new()).await
    }

    /// Same as `run`, but cancelling `cancel` (or any of its parents)
    /// propagates into the run — workers, node bodies, and backoff sleeps
    /// all observe it.
    pub async fn run_cancelable(
        &self,
        run_id: impl Into<RunId>,
        initial_state: S,
        cancel: CancellationToken,
    ) -> Result<RunOutcome<S>> {
        let replay = Arc::new(ReplayController::empty(self.config.replay_mode));
        self.start_fresh(run_id.into(), initial_state, cancel, replay).await
    }

    /// Re-executes a graph from its start node with `initial_state`, serving
    /// every `RecordedIo` from `run_id`'s entire checkpoint history (not just
    /// the latest one) instead of re-contacting the outside world.
    /// Unlike `resume`, this starts over at the start node rather than at the
    /// last pending frontier — it reproduces a prior run end to end, rather
    /// than continuing an interrupted one. `mode` controls whether a node
    /// attempt with no matching recording is a hard error ([`ReplayMode::Strict`])
    /// or falls through to live execution ([`ReplayMode::Lenient`]).
    pub async fn replay_run(&self, run_id: impl Into<RunId>, initial_state: S, mode: ReplayMode) -> Result<RunOutcome<S>> {
        self.replay_run_cancelable(run_id, initial_state, mode, CancellationToken::new()).await
    }

    pub async fn replay_run_cancelable(
        &self,
        run_id: impl Into<RunId>,
        initial_state: S,
        mode: ReplayMode,
        cancel: CancellationToken,
    ) -> Result<RunOutcome<S>> {
        let run_id = run_id.into();
        let history = self.store.list_checkpoints(&run_id).await?;
        let recorded_ios: Vec<RecordedIo> = history.into_iter().flat_map(|c| c.recorded_ios).collect();
        let replay = Arc::new(ReplayController::new(recorded_ios, mode));
        self.start_fresh(run_id, initial_state, cancel, replay).await
    }

    /// Shared start-from-scratch path for `run`/`replay_run`: seeds the
    /// frontier with one root `WorkItem` for the start node and drives the
    /// step loop. `replay` is empty for a fresh run, populated for a replay.
    async fn start_fresh(&self, run_id: RunId, initial_state: S, cancel: CancellationToken, replay: Arc<ReplayController>) -> Result<RunOutcome<S>> {
        let start = self.graph.start().ok_or(EngineError::NoStart)?.clone();

        let shared = self.new_shared(run_id.clone(), cancel, replay);

        let root_hash = order::root_path_hash(&run_id);
        let (path_hash, order_key) = order::derive(&root_hash, &start, 0);
        let seq = StepId(shared.seq.fetch_add(1, Ordering::SeqCst));
        let first = crate::work_item::WorkItem {
            seq,
            order_key,
            path_hash,
            node_id: start,
            state: initial_state.clone(),
            attempt: 0,
            parent_node_id: None,
            edge_index: 0,
        };
        shared.frontier.enqueue(first).await?;

        self.drive(shared, initial_state, StepId::ZERO).await
    }

    /// Resumes the most recent checkpoint for `run_id`: restores state,
    /// frontier, RNG seed, and recorded IOs, then continues the step loop.
    /// Fails with [`EngineError::Custom`] if no checkpoint exists.
    pub async fn resume(&self, run_id: impl Into<RunId>) -> Result<RunOutcome<S>> {
        self.resume_cancelable(run_id, CancellationToken::new()).await
    }

    pub async fn resume_cancelable(&self, run_id: impl Into<RunId>, cancel: CancellationToken) -> Result<RunOutcome<S>> {
        let run_id = run_id.into();
        let checkpoint = self
            .store
            .load_latest(&run_id)
            .await?
            .ok_or_else(|| EngineError::custom(format!("no checkpoint found for run {run_id}")))?;

        let replay = Arc::new(ReplayController::new(checkpoint.recorded_ios.clone(), self.config.replay_mode));
        let shared = self.new_shared(run_id.clone(), cancel, replay);
        shared.seq.store(checkpoint.frontier.iter().map(|w| w.seq.0 + 1).max().unwrap_or(0), Ordering::SeqCst);

        for snapshot in checkpoint.frontier.clone() {
            shared.frontier.enqueue(crate::work_item::WorkItem::from_snapshot(snapshot)).await?;
        }

        self.drive(shared, checkpoint.state.clone(), checkpoint.step_id).await
    }

    fn new_shared(&self, run_id: RunId, cancel: CancellationToken, replay: Arc<ReplayController>) -> Shared<S> {
        Shared {
            base_seed: rng::base_seed(&run_id),
            run_id,
            graph: self.graph.clone(),
            frontier: Frontier::new(self.config.queue_depth, self.config.backpressure_timeout),
            emitter: self.emitter.clone(),
            cancel,
            inflight: AtomicUsize::new(0),
            completed: AtomicBool::new(false),
            seq: AtomicU64::new(0),
            config: self.config.clone(),
            replay,
        }
    }

    /// Shared tail of `run`/`resume`: spawn workers (or not, for sequential
    /// mode) and run the reduction loop to completion.
    async fn drive(&self, shared: Shared<S>, state: S, start_step: StepId) -> Result<RunOutcome<S>> {
        let shared = Arc::new(shared);
        self.emitter.emit(Event::RunStarted { run_id: shared.run_id.clone() });

        if let Some(budget) = shared.config.run_wall_clock_budget {
            let watchdog = shared.clone();
            tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                watchdog.cancel.cancel();
            });
        }

        let outcome = if shared.config.max_concurrent_nodes == 0 {
            self.run_sequential(shared.clone(), state, start_step).await
        } else {
            self.run_concurrent(shared.clone(), state, start_step).await
        };

        match &outcome {
            Ok(o) if o.error.is_none() => self.emitter.emit(Event::RunCompleted { run_id: shared.run_id.clone() }),
            Ok(o) => match &o.error {
                Some(EngineError::Canceled) => self.emitter.emit(Event::RunCanceled { run_id: shared.run_id.clone() }),
                Some(e) => self.emitter.emit(Event::RunFailed {
                    run_id: shared.run_id.clone(),
                    message: e.to_string(),
                }),
                None => unreachable!(),
            },
            Err(e) => self.emitter.emit(Event::RunFailed {
                run_id: shared.run_id.clone(),
                message: e.to_string(),
            }),
        }

        outcome
    }

    /// `MaxConcurrentNodes > 0`: a bounded worker pool plus a single
    /// reduction loop that owns the run's state.
    async fn run_concurrent(&self, shared: Arc<Shared<S>>, state: S, start_step: StepId) -> Result<RunOutcome<S>> {
        let channel_capacity = 2 * shared.config.max_concurrent_nodes;
        let (tx, rx) = mpsc::channel::<Outcome<S>>(channel_capacity);

        let mut handles = Vec::with_capacity(shared.config.max_concurrent_nodes);
        for worker_id in 0..shared.config.max_concurrent_nodes {
            let shared = shared.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(worker_loop(shared, worker_id as u32, tx)));
        }
        drop(tx);

        let outcome = self.reduction_loop(shared, state, start_step, rx).await;

        for handle in handles {
            let _ = handle.await;
        }

        outcome
    }

    /// `MaxConcurrentNodes == 0`: no worker tasks, no channel — the caller's
    /// own task pops, executes, reduces, and commits in one straight line.
    /// Use this mode for bit-for-bit deterministic replay of runs that
    /// consume randomness.
    async fn run_sequential(&self, shared: Arc<Shared<S>>, mut state: S, start_step: StepId) -> Result<RunOutcome<S>> {
        let mut step_id = start_step;
        let mut worker_rng = rng::rng_for_worker(shared.base_seed, 0);

        loop {
            if shared.frontier.is_empty() {
                return Ok(RunOutcome { state, last_step: step_id, error: None });
            }

            let Some(item) = shared.frontier.dequeue(&shared.cancel).await else {
                return Ok(RunOutcome {
                    state,
                    last_step: step_id,
                    error: Some(EngineError::Canceled),
                });
            };

            match run_to_settlement(&shared, &self.emitter, item, &mut worker_rng).await {
                Settlement::Success { item, result, recorded_io } => {
                    let (new_state, error) = self
                        .reduce_and_commit(&shared, state, step_id, vec![(item, result)], recorded_io.into_iter().collect())
                        .await;
                    state = new_state;
                    step_id = step_id.next();
                    if let Some(error) = error {
                        return Ok(RunOutcome { state, last_step: step_id, error: Some(error) });
                    }
                }
                Settlement::Failure { error, .. } => {
                    return Ok(RunOutcome {
                        state,
                        last_step: step_id,
                        error: Some(error),
                    });
                }
                Settlement::Retry { item } => {
                    shared.frontier.enqueue(item).await?;
                }
                Settlement::Canceled => {
                    return Ok(RunOutcome {
                        state,
                        last_step: step_id,
                        error: Some(EngineError::Canceled),
                    });
                }
            }

            if step_id.0 >= shared.config.max_steps {
                return Ok(RunOutcome {
                    state,
                    last_step: step_id,
                    error: Some(EngineError::MaxStepsExceeded(shared.config.max_steps)),
                });
            }
        }
    }

    /// The single-consumer reduction loop for concurrent mode: drains
    /// whatever batch of results is currently available, reduces it in
    /// ascending `OrderKey` order, expands successors, and commits one
    /// checkpoint per batch. Completion is only ever observed here, right
    /// after a batch's successors have already been enqueued — so the
    /// "frontier empty and nothing inflight" check can never race against
    /// this loop's own pending enqueue.
    async fn reduction_loop(
        &self,
        shared: Arc<Shared<S>>,
        mut state: S,
        start_step: StepId,
        mut rx: mpsc::Receiver<Outcome<S>>,
    ) -> Result<RunOutcome<S>> {
        let mut step_id = start_step;

        loop {
            let first = tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => None,
                received = rx.recv() => received,
            };
            let Some(first) = first else {
                let error = if shared.completed.load(Ordering::SeqCst) {
                    None
                } else {
                    Some(EngineError::Canceled)
                };
                return Ok(RunOutcome { state, last_step: step_id, error });
            };

            let mut batch = vec![first];
            while let Ok(next) = rx.try_recv() {
                batch.push(next);
            }

            let mut successes = Vec::new();
            let mut recorded = Vec::new();
            let mut first_error = None;

            for outcome in batch {
                match outcome {
                    Outcome::Success { item, result, recorded_io } => {
                        if let Some(io) = recorded_io {
                            recorded.push(io);
                        }
                        successes.push((item, result));
                    }
                    Outcome::Failure { error, .. } => {
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                    }
                    Outcome::Canceled => {
                        if first_error.is_none() {
                            first_error = Some(EngineError::Canceled);
                        }
                    }
                }
                shared.inflight.fetch_sub(1, Ordering::SeqCst);
            }

            if let Some(error) = first_error {
                shared.cancel.cancel();
                return Ok(RunOutcome { state, last_step: step_id, error: Some(error) });
            }

            let (new_state, error) = self.reduce_and_commit(&shared, state, step_id, successes, recorded).await;
            state = new_state;
            step_id = step_id.next();

            if let Some(error) = error {
                shared.cancel.cancel();
                return Ok(RunOutcome { state, last_step: step_id, error: Some(error) });
            }

            if shared.frontier.is_empty() && shared.inflight.load(Ordering::SeqCst) == 0 {
                if shared.completed.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
                    shared.cancel.cancel();
                }
                return Ok(RunOutcome { state, last_step: step_id, error: None });
            }

            if step_id.0 >= shared.config.max_steps {
                shared.cancel.cancel();
                return Ok(RunOutcome {
                    state,
                    last_step: step_id,
                    error: Some(EngineError::MaxStepsExceeded(shared.config.max_steps)),
                });
            }
        }
    }

    /// Folds `successes` into `state` in `OrderKey` order, expands each
    /// item's `Route` against the post-reduce state, enqueues the
    /// resulting work items, and commits the step's checkpoint. Returns the
    /// new state and, if anything went wrong while expanding or enqueuing,
    /// the error that should end the run (the step's reduction and
    /// checkpoint commit still happened — only further progress stops).
    async fn reduce_and_commit(
        &self,
        shared: &Shared<S>,
        state: S,
        step_id: StepId,
        successes: Vec<(crate::work_item::WorkItem<S>, NodeResult<S>)>,
        recorded: Vec<RecordedIo>,
    ) -> (S, Option<EngineError>) {
        for (item, result) in &successes {
            self.emitter.emit(Event::NodeSucceeded {
                run_id: shared.run_id.clone(),
                node_id: item.node_id.clone(),
                attempt: item.attempt,
            });
            let _ = result;
        }

        let deltas = successes
            .iter()
            .map(|(item, result)| PendingDelta {
                order_key: item.order_key,
                node_id: item.node_id.clone(),
                attempt: item.attempt,
                delta: result.delta.clone(),
            })
            .collect();
        let (state, mut expand_error) = match apply_batch(self.reducer.as_ref(), state, deltas) {
            Ok(state) => (state, None),
            Err(conflict) => (conflict.prev, Some(EngineError::Conflict { field: conflict.field })),
        };

        let mut new_items = Vec::new();
        if expand_error.is_none() {
            for (item, result) in &successes {
                match expand_route(&shared.graph, item, &result.route, &state) {
                    Ok(children) => new_items.extend(children),
                    Err(e) => {
                        if expand_error.is_none() {
                            expand_error = Some(e);
                        }
                    }
                }
            }
        }

        for item in new_items {
            let seq = StepId(shared.seq.fetch_add(1, Ordering::SeqCst));
            let mut item = item;
            item.seq = seq;
            if let Err(e) = shared.frontier.enqueue(item).await {
                self.emitter.emit(Event::Backpressured {
                    run_id: shared.run_id.clone(),
                    node_id: "<successor enqueue>".to_string(),
                });
                if expand_error.is_none() {
                    expand_error = Some(e);
                }
            }
        }

        let idempotency_key = step_idempotency_key(&shared.run_id, step_id, &successes);
        let checkpoint = Checkpoint {
            run_id: shared.run_id.clone(),
            step_id,
            state: state.clone(),
            frontier: shared.frontier.snapshot().into_iter().map(|w| w.to_snapshot()).collect(),
            rng_seed: shared.base_seed,
            recorded_ios: recorded,
            idempotency_key,
            timestamp: chrono::Utc::now(),
            label: None,
        };
        if let Err(e) = self.store.save_checkpoint(checkpoint).await {
            return (state, Some(EngineError::from(e)));
        }
        self.emitter.emit(Event::CheckpointCommitted {
            run_id: shared.run_id.clone(),
            step_id,
        });

        (state, expand_error)
    }
}

/// Derives the step's idempotency key: `hash(run_id, step_id, ordered list
/// of applied node results)`. `successes` is already in the order the
/// reducer applied them, so the hash is a function of exactly what this
/// step did.
fn step_idempotency_key<S>(run_id: &str, step_id: StepId, successes: &[(crate::work_item::WorkItem<S>, NodeResult<S>)]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update(step_id.0.to_be_bytes());
    for (item, _) in successes {
        hasher.update(item.node_id.as_bytes());
        hasher.update(item.attempt.to_be_bytes());
        hasher.update(item.order_key.0.to_be_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Evaluates one completed item's `Route` into zero or more child
/// `WorkItem`s, deriving each child's `OrderKey` from the parent's path
/// hash, its own node id, and its edge index.
fn expand_route<S: Clone>(
    graph: &Graph<S>,
    item: &crate::work_item::WorkItem<S>,
    route: &Route,
    state: &S,
) -> Result<Vec<crate::work_item::WorkItem<S>>> {
    let targets: Vec<(NodeId, u32)> = match route {
        Route::Stop => Vec::new(),
        Route::Goto(target) => vec![(target.clone(), 0)],
        Route::Next => graph.successors(&item.node_id, state),
        Route::FanOut(targets) => targets.iter().cloned().enumerate().map(|(idx, t)| (t, idx as u32)).collect(),
    };

    let mut children = Vec::with_capacity(targets.len());
    for (target, edge_index) in targets {
        if graph.get_node(&target).is_none() {
            return Err(EngineError::UnknownNode(target));
        }
        let (path_hash, order_key) = order::derive(&item.path_hash, &target, edge_index);
        children.push(crate::work_item::WorkItem {
            seq: item.seq,
            order_key,
            path_hash,
            node_id: target,
            state: state.clone(),
            attempt: 0,
            parent_node_id: Some(item.node_id.clone()),
            edge_index,
        });
    }
    Ok(children)
}

/// What happened to one work item after running it to a terminal outcome
/// (used by the sequential path, which has no results channel to send
/// through).
enum Settlement<S> {
    Success {
        item: crate::work_item::WorkItem<S>,
        result: NodeResult<S>,
        recorded_io: Option<RecordedIo>,
    },
    Failure {
        item: crate::work_item::WorkItem<S>,
        error: EngineError,
    },
    Retry {
        item: crate::work_item::WorkItem<S>,
    },
    Canceled,
}

/// Runs one attempt of `item`; on a retryable failure, sleeps out the
/// backoff and returns `Settlement::Retry` with the next-attempt item
/// rather than looping internally, so both the sequential and concurrent
/// callers share this one implementation.
async fn run_to_settlement<S: Clone + Send + Sync + 'static>(
    shared: &Shared<S>,
    emitter: &Arc<dyn Emitter>,
    item: crate::work_item::WorkItem<S>,
    worker_rng: &mut StdRng,
) -> Settlement<S> {
    if shared.cancel.is_cancelled() {
        return Settlement::Canceled;
    }

    let Some(node) = shared.graph.get_node(&item.node_id).cloned() else {
        return Settlement::Failure {
            error: EngineError::UnknownNode(item.node_id.clone()),
            item,
        };
    };

    let policy = node.policy();
    let timeout_dur = policy.timeout.or(shared.config.default_node_timeout);
    let idempotency_key = policy.idempotency_key.as_ref().map(|f| f(&item.state));

    if policy.side_effects.requires_idempotency && idempotency_key.is_none() {
        return Settlement::Failure {
            error: EngineError::Configuration(format!(
                "node {} declares SideEffectPolicy::requires_idempotency but has no idempotency_key configured",
                item.node_id
            )),
            item,
        };
    }

    let attempt_rng = match shared.config.rng_derivation {
        RngDerivation::Worker => std::mem::replace(worker_rng, StdRng::seed_from_u64(0)),
        RngDerivation::OrderKey => rng::rng_for_order_key(shared.base_seed, item.order_key),
    };

    let ctx = NodeContext::new(
        shared.run_id.clone(),
        item.node_id.clone(),
        item.attempt,
        item.order_key,
        item.seq,
        idempotency_key,
        shared.cancel.clone(),
        attempt_rng,
        shared.replay.clone(),
    );

    emitter.emit(Event::NodeStarted {
        run_id: shared.run_id.clone(),
        node_id: item.node_id.clone(),
        attempt: item.attempt,
        order_key: item.order_key,
    });

    let started = Instant::now();
    let run_fut = node.run(&ctx, item.state.clone());
    let attempt_result = match timeout_dur {
        Some(d) => match tokio::time::timeout(d, run_fut).await {
            Ok(r) => r,
            Err(_) => Err(EngineError::Timeout {
                node: item.node_id.clone(),
                duration_ms: d.as_millis() as u64,
            }),
        },
        None => run_fut.await,
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    if matches!(shared.config.rng_derivation, RngDerivation::Worker) {
        if let Some(reclaimed) = ctx.take_rng() {
            *worker_rng = reclaimed;
        }
    }

    match attempt_result {
        Ok(result) => {
            let recorded_io = match (&result.recorded_request, &result.recorded_response) {
                (Some(req), Some(resp)) => Some(RecordedIo {
                    node_id: item.node_id.clone(),
                    attempt: item.attempt,
                    request_blob: req.clone(),
                    response_blob: resp.clone(),
                    fingerprint: RecordedIo::fingerprint_of(resp),
                    duration_ms,
                }),
                _ => None,
            };
            Settlement::Success { item, result, recorded_io }
        }
        Err(err) => {
            emitter.emit(Event::NodeFailed {
                run_id: shared.run_id.clone(),
                node_id: item.node_id.clone(),
                attempt: item.attempt,
                message: err.to_string(),
            });
            if let EngineError::ReplayMismatch { node, attempt } = &err {
                emitter.emit(Event::ReplayMismatch {
                    run_id: shared.run_id.clone(),
                    node_id: node.clone(),
                    attempt: *attempt,
                });
            }

            let retryable_err = (policy.retry.is_retryable)(&err);
            let attempts_exhausted = item.attempt + 1 >= policy.retry.max_attempts;

            if retryable_err && !attempts_exhausted {
                let delay = backoff::calculate_delay(&policy.retry, item.attempt, worker_rng);
                emitter.emit(Event::NodeRetrying {
                    run_id: shared.run_id.clone(),
                    node_id: item.node_id.clone(),
                    attempt: item.attempt,
                    delay_ms: delay.as_millis() as u64,
                });
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shared.cancel.cancelled() => {}
                }
                if shared.cancel.is_cancelled() {
                    return Settlement::Canceled;
                }
                let next_state = item.state.clone();
                return Settlement::Retry {
                    item: item.next_attempt(next_state),
                };
            }

            let error = if retryable_err && attempts_exhausted {
                EngineError::MaxAttemptsExceeded {
                    node: item.node_id.clone(),
                    max_attempts: policy.retry.max_attempts,
                }
            } else if err.is_self_describing() {
                err
            } else {
                EngineError::node_execution(item.node_id.clone(), item.attempt, err)
            };
            Settlement::Failure { item, error }
        }
    }
}

/// One worker task: dequeues, runs to settlement, and either re-enqueues a
/// retry (settling the attempt without involving the reduction loop) or
/// forwards a terminal `Outcome` over the results channel.
async fn worker_loop<S: Clone + Send + Sync + 'static>(shared: Arc<Shared<S>>, worker_id: u32, tx: mpsc::Sender<Outcome<S>>) {
    let mut worker_rng = rng::rng_for_worker(shared.base_seed, worker_id);

    loop {
        let Some(item) = shared.frontier.dequeue(&shared.cancel).await else {
            return;
        };
        shared.inflight.fetch_add(1, Ordering::SeqCst);

        // `inflight` is decremented by the reduction loop, once it has
        // actually processed whatever message we send below — never here.
        // Doing it here too would double-decrement (the reduction loop
        // decrements once per batch item it receives), and could let the
        // completion check observe `inflight == 0` before this item's
        // successors have been enqueued. The one exception is `Retry`: a
        // re-enqueued attempt never reaches the reduction loop at all, so
        // this worker is the only place that settles its `inflight` count.
        match run_to_settlement(&shared, &shared.emitter, item, &mut worker_rng).await {
            Settlement::Success { item, result, recorded_io } => {
                let _ = tx.send(Outcome::Success { item, result, recorded_io }).await;
            }
            Settlement::Failure { item, error } => {
                let _ = tx.send(Outcome::Failure { item, error }).await;
            }
            Settlement::Canceled => {
                let _ = tx.send(Outcome::Canceled).await;
            }
            Settlement::Retry { item } => {
                shared.inflight.fetch_sub(1, Ordering::SeqCst);
                if shared.frontier.enqueue(item.clone()).await.is_err() {
                    shared.inflight.fetch_add(1, Ordering::SeqCst);
                    let _ = tx
                        .send(Outcome::Failure {
                            item,
                            error: EngineError::Backpressure("<retry re-enqueue>".to_string()),
                        })
                        .await;
                }
            }
        }
    }
}

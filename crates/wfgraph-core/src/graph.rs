//! The graph: registered nodes, their outgoing edges, and the start node.
//!
//! `Graph<S>` is a read-mostly structure built once (via `register`/`connect`/
//! `set_start`) and then shared (`Arc<Graph<S>>`) across every worker in a
//! run. Edge ordering is preserved exactly as registered, since it feeds
//! directly into the deterministic `OrderKey` derivation (edge index is one
//! of the hash inputs).

use crate::context::NodeContext;
use crate::error::{EngineError, Result};
use crate::node_result::NodeResult;
use crate::policy::NodePolicy;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Node identifiers are plain strings — callers choose their own naming
/// convention (the engine only requires uniqueness within one graph).
pub type NodeId = String;

/// A unit of work in the graph. Implementors are typically thin wrappers
/// around a closure or a small struct holding whatever configuration the
/// node needs; `Node` objects are registered once and shared (`Arc<dyn Node<S>>`)
/// across every attempt of every work item routed to them.
///
/// `policy()` and `effects()` have defaults, so a node that needs neither
/// retry nor recording behavior beyond the engine's defaults can implement
/// only `run`.
#[async_trait]
pub trait Node<S>: Send + Sync
where
    S: Send + Sync + 'static,
{
    /// Executes one attempt of this node against `state` (the run's
    /// current reduced state). Returning `Err` triggers the retry policy;
    /// returning `Ok` hands the delta to the reducer.
    async fn run(&self, ctx: &NodeContext, state: S) -> Result<NodeResult<S>>;

    /// Retry/timeout/idempotency/recording policy for this node. Default:
    /// single attempt, no timeout, not recorded.
    fn policy(&self) -> NodePolicy<S> {
        NodePolicy::default()
    }
}

/// A function-backed `Node`, for callers who'd rather pass a closure than
/// define a type. Constructed via [`Graph::register_fn`].
pub struct FnNode<S, F> {
    func: F,
    policy: NodePolicy<S>,
}

#[async_trait]
impl<S, F, Fut> Node<S> for FnNode<S, F>
where
    S: Send + Sync + 'static,
    F: Fn(NodeContext, S) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<NodeResult<S>>> + Send,
{
    async fn run(&self, ctx: &NodeContext, state: S) -> Result<NodeResult<S>> {
        (self.func)(ctx.clone(), state).await
    }

    fn policy(&self) -> NodePolicy<S> {
        self.policy.clone()
    }
}

/// A predicate evaluated against post-reduce state to decide whether a
/// conditional edge fires. First-class trait object rather than a bare
/// closure type so edges can be introspected (e.g. by visualization) and so
/// predicates can be named for diagnostics.
pub trait EdgePredicate<S>: Send + Sync {
    fn evaluate(&self, state: &S) -> bool;

    /// Human-readable label for visualization; defaults to a generic name
    /// since most predicates are anonymous closures.
    fn label(&self) -> &str {
        "condition"
    }
}

impl<S, F> EdgePredicate<S> for F
where
    F: Fn(&S) -> bool + Send + Sync,
{
    fn evaluate(&self, state: &S) -> bool {
        self(state)
    }
}

struct EdgeSpec<S> {
    target: NodeId,
    predicate: Option<Arc<dyn EdgePredicate<S>>>,
}

/// The registered node/edge tables plus the start node. Build with
/// `register`/`connect`/`set_start`, then `validate()` before running.
pub struct Graph<S> {
    nodes: HashMap<NodeId, Arc<dyn Node<S>>>,
    /// Edges keyed by source node, preserving registration order — order
    /// here is the `EdgeIndex` input to deterministic ordering.
    edges: HashMap<NodeId, Vec<EdgeSpec<S>>>,
    start: Option<NodeId>,
}

impl<S> Default for Graph<S> {
    fn default() -> Self {
        Graph {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            start: None,
        }
    }
}

impl<S> Graph<S>
where
    S: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `node` under `id`. Fails with `EngineError::DuplicateNode`
    /// if `id` is already registered — callers that want to redefine a node
    /// (e.g. rebuilding a graph in a test) should build a fresh `Graph`
    /// rather than relying on a silent replace.
    pub fn register(&mut self, id: impl Into<NodeId>, node: impl Node<S> + 'static) -> Result<&mut Self> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(EngineError::DuplicateNode(id));
        }
        self.nodes.insert(id, Arc::new(node));
        Ok(self)
    }

    /// Convenience registration for a bare async closure, using the
    /// default `NodePolicy`. Use `register` with a full `Node` impl when a
    /// non-default policy is needed.
    pub fn register_fn<F, Fut>(&mut self, id: impl Into<NodeId>, func: F) -> Result<&mut Self>
    where
        F: Fn(NodeContext, S) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<NodeResult<S>>> + Send + 'static,
    {
        self.register(
            id,
            FnNode {
                func,
                policy: NodePolicy::default(),
            },
        )
    }

    /// Adds an unconditional edge from `from` to `to`. Edge index is
    /// assigned as the next slot in `from`'s outgoing edge list.
    pub fn connect(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> &mut Self {
        self.edges.entry(from.into()).or_default().push(EdgeSpec {
            target: to.into(),
            predicate: None,
        });
        self
    }

    /// Adds a conditional edge: only taken if `predicate(post_state)` is
    /// true. When more than one conditional edge from the same node fires,
    /// all fire (fan-out) — routing is determined by `Route` on the node
    /// result only when the node explicitly overrides it.
    pub fn connect_if(
        &mut self,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        predicate: impl EdgePredicate<S> + 'static,
    ) -> &mut Self {
        self.edges.entry(from.into()).or_default().push(EdgeSpec {
            target: to.into(),
            predicate: Some(Arc::new(predicate)),
        });
        self
    }

    pub fn set_start(&mut self, id: impl Into<NodeId>) -> &mut Self {
        self.start = Some(id.into());
        self
    }

    pub fn start(&self) -> Option<&NodeId> {
        self.start.as_ref()
    }

    pub fn get_node(&self, id: &str) -> Option<&Arc<dyn Node<S>>> {
        self.nodes.get(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Outgoing edges for visualization: `(target, predicate_label)`.
    pub fn edges_from(&self, id: &str) -> Vec<(&NodeId, Option<&str>)> {
        self.edges
            .get(id)
            .map(|specs| {
                specs
                    .iter()
                    .map(|e| (&e.target, e.predicate.as_ref().map(|p| p.label())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Evaluates `id`'s outgoing edges against `state`, returning
    /// `(target, edge_index)` pairs for every edge that fires, in
    /// registration order. An edge with no predicate always fires.
    pub fn successors(&self, id: &str, state: &S) -> Vec<(NodeId, u32)> {
        self.edges
            .get(id)
            .map(|specs| {
                specs
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.predicate.as_ref().map(|p| p.evaluate(state)).unwrap_or(true))
                    .map(|(idx, e)| (e.target.clone(), idx as u32))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validates structural integrity: a start node is set and exists, and
    /// every edge target references a registered node.
    pub fn validate(&self) -> Result<()> {
        let start = self.start.as_ref().ok_or(EngineError::NoStart)?;
        if !self.nodes.contains_key(start) {
            return Err(EngineError::UnknownNode(start.clone()));
        }
        for (source, specs) in &self.edges {
            if !self.nodes.contains_key(source) {
                return Err(EngineError::UnknownNode(source.clone()));
            }
            for edge in specs {
                if !self.nodes.contains_key(&edge.target) {
                    return Err(EngineError::UnknownNode(edge.target.clone()));
                }
            }
        }
        Ok(())
    }
}

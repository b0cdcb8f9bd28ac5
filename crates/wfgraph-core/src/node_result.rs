//! What a node body hands back to the scheduler on success.

use crate::graph::NodeId;

/// Where execution goes after this node's delta has been reduced into the
/// run's state.
#[derive(Debug, Clone)]
pub enum Route {
    /// Evaluate the graph's registered outgoing edges from this node
    /// against the post-reduce state, as usual.
    Next,
    /// Jump directly to `node`, bypassing edge predicates. Used for
    /// explicit control transfer (e.g. error-handling nodes).
    Goto(NodeId),
    /// Enqueue work items for all of `nodes`, bypassing edge predicates.
    FanOut(Vec<NodeId>),
    /// No further work follows from this node; if the frontier empties
    /// and nothing else is in flight, the run completes.
    Stop,
}

/// The output of one successful node attempt.
///
/// `delta` is fed to the run's [`crate::reducer::Reducer`] to produce the
/// next state; it is never applied directly. `recorded_request`/
/// `recorded_response`, when present, become a [`wfgraph_checkpoint::RecordedIo`]
/// entry in the next checkpoint commit.
#[derive(Debug, Clone)]
pub struct NodeResult<S> {
    pub delta: S,
    pub route: Route,
    pub recorded_request: Option<Vec<u8>>,
    pub recorded_response: Option<Vec<u8>>,
}

impl<S> NodeResult<S> {
    /// The common case: a delta with normal edge-based routing and nothing
    /// recorded for replay.
    pub fn new(delta: S) -> Self {
        NodeResult {
            delta,
            route: Route::Next,
            recorded_request: None,
            recorded_response: None,
        }
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.route = route;
        self
    }

    pub fn with_recording(mut self, request: Vec<u8>, response: Vec<u8>) -> Self {
        self.recorded_request = Some(request);
        self.recorded_response = Some(response);
        self
    }
}

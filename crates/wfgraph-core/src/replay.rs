//! Replay controller: serves recorded responses from a prior run instead of
//! re-executing a node's side effects.
//!
//! On resume, the engine loads every `RecordedIo` from the latest
//! checkpoint and indexes it by `(NodeID, Attempt)`. A node that asks its
//! [`crate::context::NodeContext`] to replay a request gets back the
//! recorded response if one exists (after fingerprint verification);
//! otherwise it proceeds live. In [`ReplayMode::Strict`], a missing
//! recording for an attempt that was previously completed is itself an
//! error rather than a silent fall-through to live execution.

use crate::error::{EngineError, Result};
use std::collections::HashMap;
use wfgraph_checkpoint::RecordedIo;

/// How the replay controller behaves when no recording exists for a
/// `(node, attempt)` that a resumed run is re-executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayMode {
    /// Missing recordings fall through to live execution. Appropriate for
    /// fresh runs (nothing recorded yet) and for resumed runs that are
    /// replaying only a prefix of their history.
    #[default]
    Lenient,
    /// Missing recordings for an attempt below the resume point are a
    /// hard error — used when the caller wants a guarantee that every
    /// previously-executed side effect is replayed exactly, never retried
    /// against the outside world.
    Strict,
}

/// The outcome of asking the controller to resolve a request.
#[derive(Debug, Clone)]
pub enum ReplayOutcome {
    /// A recorded response exists and its fingerprint matched.
    Replayed(Vec<u8>),
    /// No recording exists; the node should execute live.
    Live,
}

/// Holds one run's recorded IOs, indexed for O(1) lookup during replay.
pub struct ReplayController {
    recorded: HashMap<(String, u32), RecordedIo>,
    mode: ReplayMode,
}

impl ReplayController {
    pub fn new(recorded_ios: Vec<RecordedIo>, mode: ReplayMode) -> Self {
        let recorded = recorded_ios
            .into_iter()
            .map(|io| ((io.node_id.clone(), io.attempt), io))
            .collect();
        ReplayController { recorded, mode }
    }

    pub fn empty(mode: ReplayMode) -> Self {
        ReplayController {
            recorded: HashMap::new(),
            mode,
        }
    }

    pub fn mode(&self) -> ReplayMode {
        self.mode
    }

    /// Resolves a live `request` for `node_id`'s `attempt` against whatever
    /// was recorded for that exact attempt.
    ///
    /// Two independent checks guard against two different kinds of drift:
    /// the stored response's own fingerprint (tamper/corruption of the
    /// recording at rest) and, in [`ReplayMode::Strict`], the incoming
    /// `request` against the recorded `request_blob` (the node asking a
    /// different question than it did the first time around). A missing
    /// recording for an attempt number below
    /// `resume_attempt_ceiling` (i.e. an attempt the caller expects to have
    /// already happened) is also a [`EngineError::ReplayMismatch`] in
    /// strict mode.
    pub fn resolve(&self, node_id: &str, attempt: u32, request: &[u8], is_resumed_attempt: bool) -> Result<ReplayOutcome> {
        match self.recorded.get(&(node_id.to_string(), attempt)) {
            Some(io) => {
                let expected = RecordedIo::fingerprint_of(&io.response_blob);
                if expected != io.fingerprint {
                    return Err(EngineError::ReplayMismatch {
                        node: node_id.to_string(),
                        attempt,
                    });
                }
                if self.mode == ReplayMode::Strict && request != io.request_blob.as_slice() {
                    return Err(EngineError::ReplayMismatch {
                        node: node_id.to_string(),
                        attempt,
                    });
                }
                Ok(ReplayOutcome::Replayed(io.response_blob.clone()))
            }
            None if self.mode == ReplayMode::Strict && is_resumed_attempt => Err(EngineError::ReplayMismatch {
                node: node_id.to_string(),
                attempt,
            }),
            None => Ok(ReplayOutcome::Live),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(node: &str, attempt: u32, request: &[u8], response: &[u8]) -> RecordedIo {
        RecordedIo {
            node_id: node.to_string(),
            attempt,
            request_blob: request.to_vec(),
            response_blob: response.to_vec(),
            fingerprint: RecordedIo::fingerprint_of(response),
            duration_ms: 0,
        }
    }

    #[test]
    fn resolves_recorded_response() {
        let ctrl = ReplayController::new(vec![recorded("a", 1, b"req", b"hello")], ReplayMode::Lenient);
        match ctrl.resolve("a", 1, b"req", true).unwrap() {
            ReplayOutcome::Replayed(bytes) => assert_eq!(bytes, b"hello"),
            ReplayOutcome::Live => panic!("expected replay"),
        }
    }

    #[test]
    fn lenient_mode_falls_through_to_live() {
        let ctrl = ReplayController::empty(ReplayMode::Lenient);
        assert!(matches!(ctrl.resolve("a", 1, b"req", true).unwrap(), ReplayOutcome::Live));
    }

    #[test]
    fn strict_mode_errors_on_missing_resumed_recording() {
        let ctrl = ReplayController::empty(ReplayMode::Strict);
        assert!(matches!(
            ctrl.resolve("a", 1, b"req", true),
            Err(EngineError::ReplayMismatch { .. })
        ));
    }

    #[test]
    fn strict_mode_allows_live_execution_of_new_attempts() {
        let ctrl = ReplayController::empty(ReplayMode::Strict);
        assert!(matches!(ctrl.resolve("a", 1, b"req", false).unwrap(), ReplayOutcome::Live));
    }

    #[test]
    fn fingerprint_mismatch_is_detected() {
        let mut io = recorded("a", 1, b"req", b"hello");
        io.fingerprint = "deadbeef".to_string();
        let ctrl = ReplayController::new(vec![io], ReplayMode::Lenient);
        assert!(matches!(ctrl.resolve("a", 1, b"req", true), Err(EngineError::ReplayMismatch { .. })));
    }

    #[test]
    fn strict_mode_detects_request_payload_drift() {
        let ctrl = ReplayController::new(vec![recorded("a", 1, b"original-request", b"hello")], ReplayMode::Strict);
        assert!(matches!(
            ctrl.resolve("a", 1, b"different-request", true),
            Err(EngineError::ReplayMismatch { .. })
        ));
    }

    #[test]
    fn lenient_mode_ignores_request_payload_drift() {
        let ctrl = ReplayController::new(vec![recorded("a", 1, b"original-request", b"hello")], ReplayMode::Lenient);
        assert!(matches!(
            ctrl.resolve("a", 1, b"different-request", true).unwrap(),
            ReplayOutcome::Replayed(bytes) if bytes == b"hello"
        ));
    }
}

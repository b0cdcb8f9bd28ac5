//! The reducer pipeline: folds node deltas into the run's state in
//! deterministic order.
//!
//! `reduce(prev, delta) -> next` is total for the built-in reducers here,
//! but the trait itself is fallible: a reducer that enforces "at most one
//! writer" (see [`LastValueReducer`]) needs a way to signal a conflict
//! instead of picking a winner silently. The scheduler never calls reduce
//! out of order — deltas from results that completed concurrently are
//! sorted by ascending `(OrderKey, NodeID, Attempt)` before being folded one
//! at a time, so the same set of completions always produces the same final
//! state (or the same conflict) regardless of which worker finished first.

use wfgraph_checkpoint::OrderKey;

/// Raised by [`Reducer::reduce`] when `delta` cannot be reconciled with
/// `prev` and the active conflict policy requires surfacing an error rather
/// than picking a winner. Carries `prev` back so the caller still has a
/// valid state to report even though the fold stopped.
pub struct ConflictError<S> {
    pub field: String,
    pub prev: S,
}

/// Combines the previous state with one node's delta.
pub trait Reducer<S>: Send + Sync {
    fn reduce(&self, prev: S, delta: S) -> Result<S, ConflictError<S>>;
}

impl<S, F> Reducer<S> for F
where
    F: Fn(S, S) -> S + Send + Sync,
{
    fn reduce(&self, prev: S, delta: S) -> Result<S, ConflictError<S>> {
        Ok(self(prev, delta))
    }
}

/// The delta replaces the previous value entirely. The common default for
/// simple scalar or struct state.
#[derive(Debug, Default, Clone, Copy)]
pub struct OverwriteReducer;

impl<S> Reducer<S> for OverwriteReducer {
    fn reduce(&self, _prev: S, delta: S) -> Result<S, ConflictError<S>> {
        Ok(delta)
    }
}

/// For `Vec<T>` state: appends the delta's elements to the previous list.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppendReducer;

impl<T: Send + Sync> Reducer<Vec<T>> for AppendReducer {
    fn reduce(&self, mut prev: Vec<T>, delta: Vec<T>) -> Result<Vec<T>, ConflictError<Vec<T>>> {
        prev.extend(delta);
        Ok(prev)
    }
}

/// For numeric state: adds the delta to the previous value.
#[derive(Debug, Default, Clone, Copy)]
pub struct SumReducer;

macro_rules! impl_sum_reducer {
    ($($t:ty),*) => {
        $(
            impl Reducer<$t> for SumReducer {
                fn reduce(&self, prev: $t, delta: $t) -> Result<$t, ConflictError<$t>> {
                    Ok(prev + delta)
                }
            }
        )*
    };
}

impl_sum_reducer!(i32, i64, u32, u64, f32, f64);

/// For `HashMap<K, V>` state: inserts every key from the delta, overwriting
/// any existing key.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeReducer;

impl<K, V> Reducer<std::collections::HashMap<K, V>> for MergeReducer
where
    K: std::hash::Hash + Eq + Send + Sync,
    V: Send + Sync,
{
    fn reduce(
        &self,
        mut prev: std::collections::HashMap<K, V>,
        delta: std::collections::HashMap<K, V>,
    ) -> Result<std::collections::HashMap<K, V>, ConflictError<std::collections::HashMap<K, V>>> {
        prev.extend(delta);
        Ok(prev)
    }
}

/// For state that can legitimately receive at most one write across a run:
/// the first delta is accepted, any further delta is a conflict rather than
/// a silent overwrite. `None` means "nothing written yet".
#[derive(Debug, Default, Clone, Copy)]
pub struct LastValueReducer;

impl<S: Send + Sync> Reducer<Option<S>> for LastValueReducer {
    fn reduce(&self, prev: Option<S>, delta: Option<S>) -> Result<Option<S>, ConflictError<Option<S>>> {
        match (prev, delta) {
            (None, delta) => Ok(delta),
            (prev, None) => Ok(prev),
            (Some(prev), Some(_)) => Err(ConflictError {
                field: "value".to_string(),
                prev: Some(prev),
            }),
        }
    }
}

/// One completed work item's delta, tagged with enough identity to
/// establish a deterministic fold order.
pub struct PendingDelta<S> {
    pub order_key: OrderKey,
    pub node_id: String,
    pub attempt: u32,
    pub delta: S,
}

/// Sorts a batch of concurrently-completed deltas by `(OrderKey, NodeID, Attempt)`
/// ascending, then folds them into `state` one at a time with `reducer`.
/// This is the only place reducer state mutation happens, by design — the
/// pipeline is the single writer. Stops at the first conflict, returning the
/// state as of just before the conflicting delta.
pub fn apply_batch<S>(reducer: &dyn Reducer<S>, mut state: S, mut batch: Vec<PendingDelta<S>>) -> Result<S, ConflictError<S>> {
    batch.sort_by(|a, b| {
        a.order_key
            .cmp(&b.order_key)
            .then_with(|| a.node_id.cmp(&b.node_id))
            .then_with(|| a.attempt.cmp(&b.attempt))
    });
    for pending in batch {
        state = reducer.reduce(state, pending.delta)?;
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_reducer_replaces_state() {
        let r = OverwriteReducer;
        assert_eq!(r.reduce(1, 2).unwrap(), 2);
    }

    #[test]
    fn append_reducer_extends_vec() {
        let r = AppendReducer;
        assert_eq!(r.reduce(vec![1, 2], vec![3, 4]).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn sum_reducer_adds() {
        let r = SumReducer;
        assert_eq!(Reducer::<i64>::reduce(&r, 10, 5).unwrap(), 15);
    }

    #[test]
    fn last_value_reducer_accepts_first_write() {
        let r = LastValueReducer;
        assert_eq!(r.reduce(None, Some(7)).unwrap(), Some(7));
    }

    #[test]
    fn last_value_reducer_rejects_second_write() {
        let r = LastValueReducer;
        let err = r.reduce(Some(7), Some(8)).unwrap_err();
        assert_eq!(err.field, "value");
        assert_eq!(err.prev, Some(7));
    }

    #[test]
    fn apply_batch_folds_in_order_key_order() {
        let reducer = AppendReducer;
        let batch = vec![
            PendingDelta {
                order_key: OrderKey(9),
                node_id: "b".into(),
                attempt: 1,
                delta: vec![2],
            },
            PendingDelta {
                order_key: OrderKey(1),
                node_id: "a".into(),
                attempt: 1,
                delta: vec![1],
            },
        ];
        let result = apply_batch(&reducer, vec![0], batch).unwrap();
        assert_eq!(result, vec![0, 1, 2], "lower OrderKey must fold first regardless of batch arrival order");
    }

    #[test]
    fn apply_batch_breaks_ties_on_node_id_then_attempt() {
        let reducer = AppendReducer;
        let batch = vec![
            PendingDelta {
                order_key: OrderKey(5),
                node_id: "b".into(),
                attempt: 1,
                delta: vec!['b'],
            },
            PendingDelta {
                order_key: OrderKey(5),
                node_id: "a".into(),
                attempt: 2,
                delta: vec!['a'],
            },
        ];
        let result = apply_batch(&reducer, vec![], batch).unwrap();
        assert_eq!(result, vec!['a', 'b']);
    }

    #[test]
    fn apply_batch_stops_at_first_conflict_and_returns_prior_state() {
        let reducer = LastValueReducer;
        let batch = vec![
            PendingDelta {
                order_key: OrderKey(1),
                node_id: "a".into(),
                attempt: 1,
                delta: Some(1),
            },
            PendingDelta {
                order_key: OrderKey(2),
                node_id: "b".into(),
                attempt: 1,
                delta: Some(2),
            },
        ];
        let err = apply_batch(&reducer, None, batch).unwrap_err();
        assert_eq!(err.field, "value");
        assert_eq!(err.prev, Some(1));
    }
}

//! Deterministic ordering: derives each `WorkItem`'s [`OrderKey`] and the
//! path hash its children derive theirs from.
//!
//! `OrderKey(item) = first 64 bits of SHA-256(parentPathHash || NodeID || u32(EdgeIndex))`.
//! The full 32-byte hash (not the truncated key) is threaded forward as the
//! next `parentPathHash`, so a deep graph doesn't lose entropy to repeated
//! truncation — only the final sort key is 64 bits.

use sha2::{Digest, Sha256};
use wfgraph_checkpoint::OrderKey;

/// The root path hash for a run: `SHA-256(RunID)`. The run's start node's
/// first `WorkItem` derives its order key from this.
pub fn root_path_hash(run_id: &str) -> [u8; 32] {
    let digest = Sha256::digest(run_id.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Derives the `(path_hash, order_key)` pair for a work item identified by
/// its parent's path hash, its own node id, and the index of the edge that
/// produced it (0 for the root item).
pub fn derive(parent_path_hash: &[u8; 32], node_id: &str, edge_index: u32) -> ([u8; 32], OrderKey) {
    let mut hasher = Sha256::new();
    hasher.update(parent_path_hash);
    hasher.update(node_id.as_bytes());
    hasher.update(edge_index.to_be_bytes());
    let digest = hasher.finalize();

    let mut path_hash = [0u8; 32];
    path_hash.copy_from_slice(&digest);

    let mut key_bytes = [0u8; 8];
    key_bytes.copy_from_slice(&digest[0..8]);
    let order_key = OrderKey(u64::from_be_bytes(key_bytes));

    (path_hash, order_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let root = root_path_hash("run-1");
        let (h1, k1) = derive(&root, "node-a", 0);
        let (h2, k2) = derive(&root, "node-a", 0);
        assert_eq!(h1, h2);
        assert_eq!(k1, k2);
    }

    #[test]
    fn different_edge_index_yields_different_key() {
        let root = root_path_hash("run-1");
        let (_, k1) = derive(&root, "node-a", 0);
        let (_, k2) = derive(&root, "node-a", 1);
        assert_ne!(k1, k2);
    }

    #[test]
    fn different_runs_yield_different_root_hash() {
        assert_ne!(root_path_hash("run-1"), root_path_hash("run-2"));
    }
}

//! Pluggable wire format for checkpoints, so a `Store` backend can evolve
//! its on-disk representation without the engine caring. Mirrors the
//! teacher's `SerializerProtocol` split between a human-readable JSON
//! format and a compact binary one.

use crate::error::{CheckpointError, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Converts a checkpoint (or any serializable value) to and from bytes.
/// `Store` implementations take one of these rather than hard-coding a
/// format, so the same in-memory or on-disk backend can serve both JSON
/// (debuggable, diffable) and bincode (compact, fast) callers.
pub trait SerializerProtocol: Send + Sync {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;
    fn loads<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// Human-readable, debuggable. Good default for development and for stores
/// that want greppable on-disk files.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl SerializerProtocol for JsonSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(CheckpointError::from)
    }

    fn loads<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(CheckpointError::from)
    }
}

/// Compact binary format for high-throughput stores where checkpoint size
/// and (de)serialization speed matter more than human readability.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeSerializer;

impl SerializerProtocol for BincodeSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(CheckpointError::from)
    }

    fn loads<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(CheckpointError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn json_round_trips() {
        let s = Sample { a: 1, b: "x".into() };
        let ser = JsonSerializer;
        let bytes = ser.dumps(&s).unwrap();
        let back: Sample = ser.loads(&bytes).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn bincode_round_trips() {
        let s = Sample { a: 7, b: "y".into() };
        let ser = BincodeSerializer;
        let bytes = ser.dumps(&s).unwrap();
        let back: Sample = ser.loads(&bytes).unwrap();
        assert_eq!(s, back);
    }
}

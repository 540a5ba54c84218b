//! Engine trait definition.

use crate::error::EngineResult;

/// A single write in an atomic batch.
///
/// Operations borrow their bytes; the caller keeps ownership of the buffers
/// until `write_batch` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp<'a> {
    /// Store `value` under `key`.
    Put {
        /// Key bytes.
        key: &'a [u8],
        /// Value bytes.
        value: &'a [u8],
    },
    /// Remove `key`.
    Delete {
        /// Key bytes.
        key: &'a [u8],
    },
}

impl<'a> BatchOp<'a> {
    /// Returns the key this operation targets.
    pub fn key(&self) -> &'a [u8] {
        match *self {
            BatchOp::Put { key, .. } | BatchOp::Delete { key } => key,
        }
    }
}

/// A native key-value engine.
///
/// Engines are **opaque byte stores**. They make no assumption about key
/// ordering, comparison or encoding beyond raw bytes.
///
/// # Invariants
///
/// - `get` returns exactly the bytes last written by `put` for that key
/// - `delete` of a missing key is not an error
/// - `write_batch` applies all operations or none
/// - Engines must be `Send + Sync`: calls arrive from worker threads
pub trait KvEngine: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key is absent.
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> EngineResult<()>;

    /// Removes `key`.
    fn delete(&self, key: &[u8]) -> EngineResult<()>;

    /// Applies `ops` atomically, in order.
    fn write_batch(&self, ops: &[BatchOp<'_>]) -> EngineResult<()>;

    /// Flushes pending writes to durable storage.
    fn sync(&self) -> EngineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_op_key() {
        let put = BatchOp::Put {
            key: b"a",
            value: b"1",
        };
        let del = BatchOp::Delete { key: b"b" };
        assert_eq!(put.key(), b"a");
        assert_eq!(del.key(), b"b");
    }
}

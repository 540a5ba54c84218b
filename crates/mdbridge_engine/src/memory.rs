//! In-memory engine for testing.

use crate::engine::{BatchOp, KvEngine};
use crate::error::{EngineError, EngineResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

/// Default maximum key size, matching LMDB's compiled-in limit.
pub const DEFAULT_MAX_KEY_SIZE: usize = 511;

/// An ordered in-memory key-value engine.
///
/// Like LMDB it rejects zero-length keys and values, which is why the
/// binding substitutes a one-byte sentinel for empty inputs.
///
/// # Thread Safety
///
/// This engine is thread-safe and can be shared across worker threads.
///
/// # Example
///
/// ```rust
/// use mdbridge_engine::{InMemoryEngine, KvEngine};
///
/// let engine = InMemoryEngine::new();
/// engine.put(b"k", b"v").unwrap();
/// assert_eq!(engine.len(), 1);
/// ```
#[derive(Debug)]
pub struct InMemoryEngine {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    max_key_size: usize,
    closed: AtomicBool,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            closed: AtomicBool::new(false),
        }
    }
}

impl InMemoryEngine {
    /// Creates a new empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with a custom maximum key size.
    #[must_use]
    pub fn with_max_key_size(max_key_size: usize) -> Self {
        Self {
            max_key_size,
            ..Self::default()
        }
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns a copy of all stored pairs in key order.
    ///
    /// Useful for testing and debugging.
    pub fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Closes the engine; all later calls fail with [`EngineError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn check_open(&self) -> EngineResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    fn check_key(&self, key: &[u8]) -> EngineResult<()> {
        if key.is_empty() {
            return Err(EngineError::EmptyKey);
        }
        if key.len() > self.max_key_size {
            return Err(EngineError::KeyTooLarge {
                len: key.len(),
                max: self.max_key_size,
            });
        }
        Ok(())
    }

    fn check_value(value: &[u8]) -> EngineResult<()> {
        if value.is_empty() {
            return Err(EngineError::EmptyValue);
        }
        Ok(())
    }
}

impl KvEngine for InMemoryEngine {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        self.check_open()?;
        self.check_key(key)?;
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        self.check_open()?;
        self.check_key(key)?;
        Self::check_value(value)?;
        trace!(key_len = key.len(), value_len = value.len(), "engine put");
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> EngineResult<()> {
        self.check_open()?;
        self.check_key(key)?;
        self.data.write().remove(key);
        Ok(())
    }

    fn write_batch(&self, ops: &[BatchOp<'_>]) -> EngineResult<()> {
        self.check_open()?;

        // Validate everything before touching the map so the batch is atomic
        for op in ops {
            self.check_key(op.key())?;
            if let BatchOp::Put { value, .. } = op {
                Self::check_value(value)?;
            }
        }

        let mut data = self.data.write();
        for op in ops {
            match *op {
                BatchOp::Put { key, value } => {
                    data.insert(key.to_vec(), value.to_vec());
                }
                BatchOp::Delete { key } => {
                    data.remove(key);
                }
            }
        }
        trace!(ops = ops.len(), "engine batch applied");
        Ok(())
    }
}

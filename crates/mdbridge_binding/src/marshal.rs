//! The marshaller and the allocations it hands out.

use crate::stats::MarshalStats;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Byte value of the empty sentinel.
pub const EMPTY_SENTINEL: u8 = 0;

/// A byte region allocated by the binding.
///
/// The region is freed exactly once, when the `Allocation` is dropped, and
/// the free is recorded in the ledger it was allocated against.
pub struct Allocation {
    bytes: Box<[u8]>,
    ledger: Arc<MarshalStats>,
}

impl Allocation {
    fn new(bytes: Box<[u8]>, ledger: &Arc<MarshalStats>) -> Self {
        ledger.record_allocation(bytes.len());
        trace!(len = bytes.len(), ptr = ?bytes.as_ptr(), "allocated");
        Self {
            bytes,
            ledger: Arc::clone(ledger),
        }
    }

    /// Returns the allocated bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the allocated bytes mutably.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Returns the length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the region is zero-length.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns a pointer to the region.
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        trace!(len = self.bytes.len(), ptr = ?self.bytes.as_ptr(), "freed");
        self.ledger.record_free(self.bytes.len());
    }
}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocation")
            .field("len", &self.bytes.len())
            .field("ptr", &self.bytes.as_ptr())
            .finish()
    }
}

/// Converts host values into native byte slices and owned copies.
///
/// The conversions live in [`crate::slice`] and [`crate::copy`]; the
/// marshaller carries the ledger every allocation is recorded against.
#[derive(Debug, Clone, Default)]
pub struct Marshaller {
    stats: Arc<MarshalStats>,
}

impl Marshaller {
    /// Creates a marshaller with a fresh ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ledger.
    pub fn stats(&self) -> &Arc<MarshalStats> {
        &self.stats
    }

    /// Allocates exactly `data.len()` bytes holding a copy of `data`.
    pub(crate) fn allocate(&self, data: &[u8]) -> Allocation {
        Allocation::new(data.into(), &self.stats)
    }

    /// Allocates the one-byte empty sentinel.
    pub(crate) fn allocate_sentinel(&self) -> Allocation {
        self.stats.record_sentinel();
        Allocation::new(Box::new([EMPTY_SENTINEL]), &self.stats)
    }
}

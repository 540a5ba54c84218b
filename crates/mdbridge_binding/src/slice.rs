//! Ownership-aware slice view and its disposal protocol.
//!
//! [`Marshaller::to_slice`] turns a host value into a [`BinarySlice`]:
//!
//! | host value                  | slice                         | backing     |
//! |-----------------------------|-------------------------------|-------------|
//! | `null` / `undefined`        | `[0]`                         | allocated   |
//! | zero-length buffer          | `[0]`                         | allocated   |
//! | non-empty buffer            | the buffer's own storage      | host buffer |
//! | anything else (as text)     | UTF-8 bytes, no terminator    | allocated   |
//! | zero-length text            | `[0]`                         | allocated   |
//!
//! The backing is an explicit tag, so [`BinarySlice::dispose`] frees exactly
//! the regions the binding allocated and never touches host memory.

use crate::host::{HostBuffer, HostValue};
use crate::marshal::{Allocation, Marshaller, EMPTY_SENTINEL};

/// Who owns the bytes behind a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The binding allocated the bytes and frees them on disposal.
    Allocated,
    /// The bytes belong to a live host buffer borrowed for the call.
    HostBuffer,
    /// The bytes belong to a host buffer kept alive by a retained handle.
    RetainedHandle,
}

/// What disposal did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Disposal {
    /// The binding's allocation was freed.
    Freed,
    /// Nothing was freed; the host owns the bytes.
    LeftToHost,
    /// The retained handle was released; the host owns the bytes.
    HandleReleased,
}

#[derive(Debug)]
enum Backing<'a> {
    Allocated(Allocation),
    Borrowed(&'a HostBuffer),
    Retained(HostBuffer),
}

/// A `{pointer, length}` view handed to the engine.
///
/// A slice borrowing a host buffer cannot outlive the call it was made in.
/// Use [`Marshaller::duplicate`] or [`Marshaller::to_owned_copy`] for bytes
/// that must cross to a worker thread.
#[derive(Debug)]
pub struct BinarySlice<'a> {
    backing: Backing<'a>,
}

impl<'a> BinarySlice<'a> {
    /// Returns the slice bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Allocated(alloc) => alloc.as_bytes(),
            Backing::Borrowed(buf) => buf.as_bytes(),
            Backing::Retained(buf) => buf.as_bytes(),
        }
    }

    /// Returns a pointer to the first byte.
    pub fn as_ptr(&self) -> *const u8 {
        self.as_bytes().as_ptr()
    }

    /// Returns the length in bytes. Never zero.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Always false: empty inputs become the one-byte sentinel.
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Returns who owns the bytes.
    pub fn ownership(&self) -> Ownership {
        match self.backing {
            Backing::Allocated(_) => Ownership::Allocated,
            Backing::Borrowed(_) => Ownership::HostBuffer,
            Backing::Retained(_) => Ownership::RetainedHandle,
        }
    }

    /// Returns true if this slice is the one-byte empty sentinel.
    pub fn is_sentinel(&self) -> bool {
        is_sentinel(self.as_bytes())
    }

    /// Returns the C-compatible view of this slice.
    pub fn raw(&self) -> RawSlice {
        RawSlice::from_bytes(self.as_bytes())
    }

    /// Releases the slice.
    ///
    /// Frees the region if the binding allocated it; leaves host memory
    /// alone. Consuming `self` makes a second disposal impossible.
    pub fn dispose(self) -> Disposal {
        match self.backing {
            Backing::Allocated(alloc) => {
                drop(alloc);
                Disposal::Freed
            }
            Backing::Borrowed(_) => Disposal::LeftToHost,
            Backing::Retained(handle) => {
                drop(handle);
                Disposal::HandleReleased
            }
        }
    }
}

/// Returns true if `bytes` is the one-byte empty sentinel.
pub fn is_sentinel(bytes: &[u8]) -> bool {
    bytes == [EMPTY_SENTINEL]
}

impl Marshaller {
    /// Builds a slice view of `value` for use within the current call.
    ///
    /// Non-empty buffers are referenced without copying. Every other value
    /// is allocated, so the returned slice is never zero-length.
    pub fn to_slice<'a>(&self, value: &'a HostValue) -> BinarySlice<'a> {
        match value {
            HostValue::Buffer(buf) if !buf.is_empty() => {
                self.stats().record_zero_copy();
                BinarySlice {
                    backing: Backing::Borrowed(buf),
                }
            }
            other => self.allocated_slice(other),
        }
    }

    /// Builds a slice view that keeps its host buffer alive by handle.
    ///
    /// Same mapping as [`Marshaller::to_slice`], but the zero-copy branch
    /// retains the buffer so the slice is not tied to the caller's borrow.
    /// The slice is still `!Send`: retained host buffers stay on the host
    /// thread.
    pub fn retain_slice(&self, value: &HostValue) -> BinarySlice<'static> {
        match value {
            HostValue::Buffer(buf) if !buf.is_empty() => {
                self.stats().record_retained();
                BinarySlice {
                    backing: Backing::Retained(buf.clone()),
                }
            }
            other => self.allocated_slice(other),
        }
    }

    fn allocated_slice<'a>(&self, value: &HostValue) -> BinarySlice<'a> {
        let alloc = match value {
            HostValue::Undefined | HostValue::Null => self.allocate_sentinel(),
            HostValue::Buffer(_) => self.allocate_sentinel(),
            other => {
                let text = other.to_host_string();
                if text.is_empty() {
                    self.allocate_sentinel()
                } else {
                    self.allocate(text.as_bytes())
                }
            }
        };
        BinarySlice {
            backing: Backing::Allocated(alloc),
        }
    }
}

/// A C-compatible `{data, len}` pair, laid out like LMDB's `MDB_val`.
///
/// The view does not own its bytes; it is valid only while the slice or
/// copy it came from is alive.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawSlice {
    /// Pointer to the first byte.
    pub data: *const u8,
    /// Length in bytes.
    pub len: usize,
}

impl RawSlice {
    /// Creates a view of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.as_ptr(),
            len: bytes.len(),
        }
    }

    /// Creates a null view.
    pub const fn null() -> Self {
        Self {
            data: std::ptr::null(),
            len: 0,
        }
    }

    /// Returns true if the view is null.
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// Reads the viewed bytes.
    ///
    /// # Safety
    ///
    /// The slice or copy this view was taken from must still be alive, and
    /// `'a` must not outlive it.
    #[allow(unsafe_code)]
    pub unsafe fn as_bytes<'a>(&self) -> &'a [u8] {
        if self.data.is_null() {
            return &[];
        }
        std::slice::from_raw_parts(self.data, self.len)
    }
}

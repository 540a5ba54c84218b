//! Owned copy allocator.
//!
//! Owned copies are independent of the host: they are `Send + 'static` and
//! are the only form in which key and value bytes may travel to a worker
//! thread.
//!
//! Unlike the slice view, the copy path treats empty input as absent: a
//! `null`, `undefined` or zero-length value produces `None`, meaning "this
//! field is not part of the operation".

use crate::host::HostValue;
use crate::marshal::{Allocation, Marshaller};
use crate::slice::{BinarySlice, RawSlice};
use tracing::trace;

/// An independently owned byte buffer.
#[derive(Debug)]
pub struct OwnedCopy {
    bytes: Allocation,
}

impl OwnedCopy {
    /// Returns the copied bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_bytes()
    }

    /// Returns the copied bytes mutably.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        self.bytes.as_mut_bytes()
    }

    /// Returns a pointer to the first byte.
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    /// Returns the length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the copy holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the C-compatible view of this copy.
    pub fn raw(&self) -> RawSlice {
        RawSlice::from_bytes(self.as_bytes())
    }
}

impl Marshaller {
    /// Copies `value` into an independently owned buffer.
    ///
    /// Returns `None` for `null`, `undefined` and zero-length values.
    pub fn to_owned_copy(&self, value: &HostValue) -> Option<OwnedCopy> {
        let bytes = match value {
            HostValue::Undefined | HostValue::Null => return None,
            HostValue::Buffer(buf) if buf.is_empty() => return None,
            HostValue::Buffer(buf) => self.allocate(buf.as_bytes()),
            other => {
                let text = other.to_host_string();
                if text.is_empty() {
                    return None;
                }
                self.allocate(text.as_bytes())
            }
        };
        self.stats().record_owned_copy();
        Some(OwnedCopy { bytes })
    }

    /// Deep-copies the bytes of an existing slice.
    ///
    /// Used when a slice-view result must outlive the current call, e.g.
    /// when it is handed to a worker after the slice itself is disposed.
    /// The sentinel is copied like any other byte string.
    pub fn duplicate(&self, slice: &BinarySlice<'_>) -> OwnedCopy {
        self.stats().record_owned_copy();
        OwnedCopy {
            bytes: self.allocate(slice.as_bytes()),
        }
    }

    /// Frees an owned copy and resets the reference to `None`.
    ///
    /// Returns `false` without doing anything if the copy was already
    /// absent, so repeated calls never double-free.
    pub fn free_owned_copy(&self, copy: &mut Option<OwnedCopy>) -> bool {
        match copy.take() {
            Some(owned) => {
                trace!(len = owned.len(), "owned copy released");
                drop(owned);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostBuffer;

    fn assert_send<T: Send + 'static>(_: &T) {}

    #[test]
    fn nullish_and_empty_are_absent() {
        let marshaller = Marshaller::new();
        assert!(marshaller.to_owned_copy(&HostValue::Null).is_none());
        assert!(marshaller.to_owned_copy(&HostValue::Undefined).is_none());
        assert!(marshaller.to_owned_copy(&HostValue::from("")).is_none());
        assert!(marshaller
            .to_owned_copy(&HostValue::from(HostBuffer::empty()))
            .is_none());
        assert_eq!(marshaller.stats().allocations(), 0);
    }

    #[test]
    fn buffer_is_copied() {
        let marshaller = Marshaller::new();
        let value = HostValue::from(HostBuffer::from_vec(b"bytes".to_vec()));
        let copy = marshaller.to_owned_copy(&value).unwrap();

        assert_eq!(copy.as_bytes(), b"bytes");
        assert_ne!(copy.as_ptr(), value.as_buffer().unwrap().as_ptr());
        assert_send(&copy);
    }

    #[test]
    fn text_is_encoded() {
        let marshaller = Marshaller::new();
        let copy = marshaller.to_owned_copy(&HostValue::from("añb")).unwrap();
        assert_eq!(copy.as_bytes(), "añb".as_bytes());
        assert_eq!(copy.len(), 4);
    }

    #[test]
    fn free_is_idempotent() {
        let marshaller = Marshaller::new();
        let mut copy = marshaller.to_owned_copy(&HostValue::from("x"));

        assert!(marshaller.free_owned_copy(&mut copy));
        assert!(copy.is_none());
        assert!(!marshaller.free_owned_copy(&mut copy));

        let stats = marshaller.stats().snapshot();
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.frees, 1);
    }

    #[test]
    fn free_of_absent_copy_is_noop() {
        let marshaller = Marshaller::new();
        let mut copy = marshaller.to_owned_copy(&HostValue::Null);
        assert!(!marshaller.free_owned_copy(&mut copy));
        assert_eq!(marshaller.stats().frees(), 0);
    }

    #[test]
    fn duplicate_is_independent() {
        let marshaller = Marshaller::new();
        let value = HostValue::from(HostBuffer::from_vec(b"abc".to_vec()));
        let slice = marshaller.to_slice(&value);

        let mut copy = marshaller.duplicate(&slice);
        assert_eq!(copy.as_bytes(), slice.as_bytes());
        assert_ne!(copy.as_ptr(), slice.as_ptr());

        copy.as_mut_bytes()[0] = b'z';
        assert_eq!(copy.as_bytes(), b"zbc");
        assert_eq!(slice.as_bytes(), b"abc");

        let _ = slice.dispose();
        assert_eq!(copy.as_bytes(), b"zbc");
    }

    #[test]
    fn duplicate_of_sentinel_is_sentinel() {
        let marshaller = Marshaller::new();
        let slice = marshaller.to_slice(&HostValue::Null);
        let copy = marshaller.duplicate(&slice);
        let _ = slice.dispose();
        assert_eq!(copy.as_bytes(), &[0]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn duplicate_survives_mutation(
                bytes in prop::collection::vec(any::<u8>(), 1..256),
                index in any::<prop::sample::Index>(),
            ) {
                let marshaller = Marshaller::new();
                let value = HostValue::from(HostBuffer::from_vec(bytes.clone()));
                let slice = marshaller.to_slice(&value);
                let mut copy = marshaller.duplicate(&slice);

                let i = index.index(copy.len());
                let bumped = copy.as_bytes()[i].wrapping_add(1);
                copy.as_mut_bytes()[i] = bumped;

                prop_assert_eq!(slice.as_bytes(), bytes.as_slice());
                prop_assert_ne!(copy.as_bytes(), bytes.as_slice());
            }
        }
    }
}

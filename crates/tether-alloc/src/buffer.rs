//! Owned byte blocks that free themselves through their allocator.
//!
//! [`AllocBuffer`] is the scoped-acquisition replacement for
//! allocate-then-`goto Cleanup`: whatever path leaves the scope, the block
//! goes back to the allocator that produced it, even if a different
//! allocator is current by then.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::NonNull;

use tether_core::{ensure_alloc, Fault};

use crate::allocator::AllocatorRef;
use crate::registry;

/// A zero-initialised byte block owned together with its allocator.
pub struct AllocBuffer {
    ptr: NonNull<u8>,
    len: usize,
    allocator: AllocatorRef,
}

// SAFETY: the block is uniquely owned and `Allocator` is `Send + Sync`.
unsafe impl Send for AllocBuffer {}
// SAFETY: shared access only hands out `&[u8]`.
unsafe impl Sync for AllocBuffer {}

impl AllocBuffer {
    /// Allocate `len` zeroed bytes from the calling thread's current
    /// allocator.
    ///
    /// Fails with `OutOfMemory` if the allocator returns null.
    pub fn new(len: usize) -> Result<Self, Fault> {
        Self::new_in(registry::current(), len)
    }

    /// Allocate `len` zeroed bytes from an explicit allocator.
    pub fn new_in(allocator: AllocatorRef, len: usize) -> Result<Self, Fault> {
        let ptr = ensure_alloc!(allocator.allocate(len));
        // SAFETY: the allocator returned `len` writable bytes at `ptr`.
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, len) };
        Ok(Self {
            ptr,
            len,
            allocator,
        })
    }

    /// Copy `bytes` into a block from the current allocator.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Fault> {
        let mut buf = Self::new(bytes.len())?;
        buf.as_mut_slice().copy_from_slice(bytes);
        Ok(buf)
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the block is zero bytes long.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The block's contents.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len initialised bytes for our lifetime.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// The block's contents, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid and uniquely owned through &mut self.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// The allocator that owns the block.
    pub fn allocator(&self) -> &AllocatorRef {
        &self.allocator
    }
}

impl AsRef<[u8]> for AllocBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Drop for AllocBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr came from this allocator and is freed exactly once.
        unsafe { self.allocator.free(self.ptr) };
    }
}

impl fmt::Debug for AllocBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocBuffer")
            .field("len", &self.len)
            .field("allocator", &self.allocator.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Allocator;
    use crate::scope::ThreadAllocatorScope;
    use crate::system::SystemAllocator;
    use std::sync::Arc;
    use tether_core::StatusCode;

    struct Exhausted;

    impl Allocator for Exhausted {
        fn allocate(&self, _size: usize) -> Option<NonNull<u8>> {
            None
        }

        unsafe fn free(&self, _ptr: NonNull<u8>) {
            unreachable!("nothing was ever allocated");
        }
    }

    #[test]
    fn new_is_zeroed() {
        let buf = AllocBuffer::new(48).unwrap();
        assert_eq!(buf.len(), 48);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn from_slice_copies() {
        let buf = AllocBuffer::from_slice(b"tether").unwrap();
        assert_eq!(buf.as_ref(), b"tether");
    }

    #[test]
    fn empty_buffer_is_valid() {
        let buf = AllocBuffer::new(0).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.as_slice(), &[] as &[u8]);
    }

    #[test]
    fn exhausted_allocator_reports_out_of_memory() {
        let exhausted: AllocatorRef = Arc::new(Exhausted);
        let err = AllocBuffer::new_in(exhausted, 8).unwrap_err();
        assert_eq!(err.status(), StatusCode::OutOfMemory);
    }

    #[test]
    fn frees_through_owning_allocator_after_scope_ends() {
        let system = Arc::new(SystemAllocator::new());
        let lent: AllocatorRef = system.clone();
        let buf = {
            let _scope = ThreadAllocatorScope::new(Some(&lent));
            AllocBuffer::new(16).unwrap()
        };
        assert_eq!(system.live_allocations(), 1);
        assert!(Arc::ptr_eq(buf.allocator(), &lent));
        drop(buf);
        assert_eq!(system.live_allocations(), 0);
    }

    #[test]
    fn debug_shows_allocator_name() {
        let buf = AllocBuffer::new_in(Arc::new(SystemAllocator::new()), 3).unwrap();
        assert_eq!(format!("{buf:?}"), "AllocBuffer { len: 3, allocator: \"system\" }");
    }
}

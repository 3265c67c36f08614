//! The allocator capability.

#![allow(unsafe_code)]

use std::ptr::NonNull;
use std::sync::Arc;

/// A source of untyped memory blocks.
///
/// Implementations must be shareable across threads: one allocator may be
/// installed as the override on several threads at once, and a block
/// allocated on one thread may be freed on another.
pub trait Allocator: Send + Sync {
    /// Allocate `size` bytes.
    ///
    /// Returns `None` when the request cannot be satisfied. Never panics on
    /// exhaustion. A zero-sized request returns a unique, freeable block.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Return a block to this allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate`](Allocator::allocate)
    /// on this same allocator and must not have been freed since.
    unsafe fn free(&self, ptr: NonNull<u8>);

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Shared handle to an allocator.
///
/// `Arc` supplies the retain/release lifetime contract.
pub type AllocatorRef = Arc<dyn Allocator>;

/// Whether two handles refer to the same allocator instance.
pub fn same_allocator(a: &AllocatorRef, b: &AllocatorRef) -> bool {
    Arc::ptr_eq(a, b)
}

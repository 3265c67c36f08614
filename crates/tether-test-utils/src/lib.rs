//! Test utilities and mock allocators for Tether development.
//!
//! Provides instrumented [`Allocator`] implementations for exercising the
//! registry and the call boundary:
//!
//! - [`CountingAllocator`] tracks allocations, frees, and outstanding blocks.
//! - [`FailingAllocator`] succeeds a fixed number of times, then returns null.
//! - [`PanickingAllocator`] panics on every request.
//!
//! Use [`share`] to get both the concrete handle (for inspecting counters)
//! and the type-erased [`AllocatorRef`] (for installing).

#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(unsafe_code)]

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tether_alloc::{Allocator, AllocatorRef, SystemAllocator};

/// Wrap `allocator` in an `Arc`, returning the concrete and erased handles.
pub fn share<A: Allocator + 'static>(allocator: A) -> (Arc<A>, AllocatorRef) {
    let concrete = Arc::new(allocator);
    let erased: AllocatorRef = concrete.clone();
    (concrete, erased)
}

/// Allocator that counts every request it serves.
///
/// Backed by a private [`SystemAllocator`], so blocks are real.
pub struct CountingAllocator {
    name: String,
    inner: SystemAllocator,
    allocations: AtomicUsize,
    frees: AtomicUsize,
    live: AtomicUsize,
}

impl CountingAllocator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: SystemAllocator::new(),
            allocations: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
        }
    }

    /// Successful allocations so far.
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    /// Frees so far.
    pub fn frees(&self) -> usize {
        self.frees.load(Ordering::SeqCst)
    }

    /// Allocations not yet freed.
    pub fn outstanding(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl Allocator for CountingAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let ptr = self.inner.allocate(size)?;
        self.allocations.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Some(ptr)
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.frees.fetch_add(1, Ordering::SeqCst);
        // SAFETY: every block we hand out came from `inner`.
        unsafe { self.inner.free(ptr) }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Allocator that serves `budget` requests, then returns null forever.
pub struct FailingAllocator {
    inner: CountingAllocator,
    budget: usize,
    attempts: AtomicUsize,
}

impl FailingAllocator {
    /// Succeed `budget` times before failing.
    pub fn after(budget: usize) -> Self {
        Self {
            inner: CountingAllocator::new("failing"),
            budget,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Fail every request.
    pub fn always() -> Self {
        Self::after(0)
    }

    /// Requests seen so far, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Blocks handed out and not yet freed.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding()
    }
}

impl Allocator for FailingAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.budget {
            return None;
        }
        self.inner.allocate(size)
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarded; blocks only come from `inner`.
        unsafe { self.inner.free(ptr) }
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Allocator whose every request panics with a fixed message.
pub struct PanickingAllocator {
    message: &'static str,
}

impl PanickingAllocator {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

impl Allocator for PanickingAllocator {
    fn allocate(&self, _size: usize) -> Option<NonNull<u8>> {
        panic!("{}", self.message);
    }

    unsafe fn free(&self, _ptr: NonNull<u8>) {
        panic!("{}", self.message);
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

//! Scoped allocator override.

use std::marker::PhantomData;

use crate::allocator::AllocatorRef;
use crate::registry::{self, Override};

/// Lends an allocator to the calling thread for the guard's lifetime.
///
/// Creation installs the allocator (or the default, when given `None`) and
/// records what was installed before. Dropping the guard restores that
/// previous value unconditionally, including during unwinding.
///
/// Guards on one thread must be dropped in reverse creation order; Rust
/// scoping does this naturally. The guard is `!Send`, so it cannot be
/// dropped on another thread.
///
/// ```
/// use std::sync::Arc;
/// use tether_alloc::{registry, AllocatorRef, SystemAllocator, ThreadAllocatorScope};
///
/// let mine: AllocatorRef = Arc::new(SystemAllocator::new());
/// {
///     let _scope = ThreadAllocatorScope::new(Some(&mine));
///     assert!(Arc::ptr_eq(&registry::current(), &mine));
/// }
/// assert!(!registry::has_override());
/// ```
#[must_use = "the override is removed as soon as the guard is dropped"]
pub struct ThreadAllocatorScope<'a> {
    effective: &'a AllocatorRef,
    prior: Override,
    _thread: PhantomData<*const ()>,
}

impl<'a> ThreadAllocatorScope<'a> {
    /// Install `allocator`, or the default allocator if `None`.
    pub fn new(allocator: Option<&'a AllocatorRef>) -> Self {
        let effective = allocator.unwrap_or_else(|| registry::default_allocator());
        let prior = registry::swap_current_or_default(Override::lend(effective));
        Self {
            effective,
            prior,
            _thread: PhantomData,
        }
    }

    /// The allocator this guard installed.
    pub fn allocator(&self) -> &'a AllocatorRef {
        self.effective
    }

    /// The slot value that will be restored on drop.
    pub fn prior(&self) -> &Override {
        &self.prior
    }
}

impl Drop for ThreadAllocatorScope<'_> {
    fn drop(&mut self) {
        registry::swap_current(std::mem::take(&mut self.prior));
    }
}

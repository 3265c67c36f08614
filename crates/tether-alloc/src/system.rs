//! The default allocator, backed by the global Rust allocator.
//!
//! [`Allocator::free`] receives only a pointer, so each block carries a
//! header holding its requested size. The header occupies the alignment
//! padding in front of the returned pointer:
//!
//! ```text
//! base                     base + alignment
//! │ size: usize │ padding  │ user bytes ... │
//! ```

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::allocator::Allocator;
use crate::config::{ConfigError, SystemAllocatorConfig};

/// Size-tracking wrapper over [`std::alloc`].
#[derive(Debug)]
pub struct SystemAllocator {
    config: SystemAllocatorConfig,
    live: AtomicUsize,
}

impl SystemAllocator {
    /// Create an allocator with the default configuration.
    pub fn new() -> Self {
        Self {
            config: SystemAllocatorConfig::default(),
            live: AtomicUsize::new(0),
        }
    }

    /// Create an allocator with a validated configuration.
    pub fn with_config(config: SystemAllocatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            live: AtomicUsize::new(0),
        })
    }

    /// The configuration this allocator was built with.
    pub fn config(&self) -> &SystemAllocatorConfig {
        &self.config
    }

    /// Number of blocks allocated and not yet freed.
    pub fn live_allocations(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    fn layout_for(&self, size: usize) -> Option<Layout> {
        let total = size.checked_add(self.config.alignment)?;
        Layout::from_size_align(total, self.config.alignment).ok()
    }
}

impl Default for SystemAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for SystemAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        if size > self.config.max_allocation {
            return None;
        }
        let layout = self.layout_for(size)?;
        // SAFETY: layout has non-zero size (it includes the header).
        let base = unsafe {
            if self.config.zero_fill {
                alloc::alloc_zeroed(layout)
            } else {
                alloc::alloc(layout)
            }
        };
        let base = NonNull::new(base)?;
        // SAFETY: base is aligned to `alignment >= align_of::<usize>()` and the
        // block is at least `alignment` bytes long.
        unsafe {
            base.cast::<usize>().write(size);
            self.live.fetch_add(1, Ordering::Relaxed);
            Some(base.add(self.config.alignment))
        }
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        // SAFETY: per the trait contract ptr came from `allocate` above, so the
        // header sits `alignment` bytes before it and the layout is rebuilt
        // exactly as allocated.
        unsafe {
            let base = ptr.sub(self.config.alignment);
            let size = base.cast::<usize>().read();
            let layout = Layout::from_size_align_unchecked(
                size + self.config.alignment,
                self.config.alignment,
            );
            alloc::dealloc(base.as_ptr(), layout);
        }
        self.live.fetch_sub(1, Ordering::Relaxed);
    }

    fn name(&self) -> &str {
        "system"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_free_round_trip() {
        let a = SystemAllocator::new();
        let p = a.allocate(64).unwrap();
        assert_eq!(a.live_allocations(), 1);
        // SAFETY: p holds 64 writable bytes.
        unsafe {
            std::ptr::write_bytes(p.as_ptr(), 0xAB, 64);
            assert_eq!(*p.as_ptr().add(63), 0xAB);
            a.free(p);
        }
        assert_eq!(a.live_allocations(), 0);
    }

    #[test]
    fn blocks_respect_configured_alignment() {
        let a = SystemAllocator::with_config(SystemAllocatorConfig {
            alignment: 64,
            ..Default::default()
        })
        .unwrap();
        let blocks: Vec<_> = (1..8).map(|n| a.allocate(n * 3).unwrap()).collect();
        for p in &blocks {
            assert_eq!(p.as_ptr() as usize % 64, 0);
        }
        for p in blocks {
            // SAFETY: each block came from `a`.
            unsafe { a.free(p) };
        }
    }

    #[test]
    fn zero_sized_requests_are_distinct() {
        let a = SystemAllocator::new();
        let p = a.allocate(0).unwrap();
        let q = a.allocate(0).unwrap();
        assert_ne!(p, q);
        // SAFETY: both came from `a`.
        unsafe {
            a.free(p);
            a.free(q);
        }
    }

    #[test]
    fn zero_fill_returns_zeroed_blocks() {
        let a = SystemAllocator::with_config(SystemAllocatorConfig {
            zero_fill: true,
            ..Default::default()
        })
        .unwrap();
        let p = a.allocate(128).unwrap();
        // SAFETY: p holds 128 initialized (zeroed) bytes.
        let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), 128) };
        assert!(bytes.iter().all(|&b| b == 0));
        unsafe { a.free(p) };
    }

    #[test]
    fn oversized_request_returns_none() {
        let a = SystemAllocator::with_config(SystemAllocatorConfig {
            max_allocation: 1024,
            ..Default::default()
        })
        .unwrap();
        assert!(a.allocate(1025).is_none());
        assert!(a.allocate(usize::MAX).is_none());
        assert_eq!(a.live_allocations(), 0);
    }

    #[test]
    fn layout_overflow_returns_none() {
        let a = SystemAllocator::with_config(SystemAllocatorConfig {
            max_allocation: usize::MAX,
            ..Default::default()
        })
        .unwrap();
        assert!(a.allocate(usize::MAX - 4).is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = SystemAllocator::with_config(SystemAllocatorConfig {
            alignment: 3,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, ConfigError::AlignmentNotPowerOfTwo { alignment: 3 });
    }
}

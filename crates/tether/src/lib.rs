//! Tether: thread-scoped allocator overrides and fault-to-status call
//! boundaries.
//!
//! This is the top-level facade crate that re-exports the Rust API of the
//! Tether sub-crates. The C surface lives in `tether-ffi`.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use tether::prelude::*;
//!
//! fn entry_point() -> StatusCode {
//!     guarded(|| {
//!         let buf = AllocBuffer::from_slice(b"payload")?;
//!         ensure!(buf.len() == 7, StatusCode::InternalFailure);
//!         Ok(())
//!     })
//! }
//!
//! let mine: AllocatorRef = Arc::new(SystemAllocator::new());
//! {
//!     let _scope = ThreadAllocatorScope::new(Some(&mine));
//!     assert_eq!(entry_point(), StatusCode::Success);
//! }
//! assert!(!tether::alloc::registry::has_override());
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`fault`] | `tether-core` | Status codes, faults, check macros, the call boundary |
//! | [`alloc`] | `tether-alloc` | Allocator trait, system allocator, registry, scope guard, buffers |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Status codes, faults, and the call boundary (`tether-core`).
///
/// The check macros (`ensure!`, `raise_unless!`, ...) are exported at the
/// root of `tether_core` and are also reachable through the [`prelude`].
pub use tether_core as fault;

/// Allocators and the per-thread registry (`tether-alloc`).
///
/// [`alloc::registry`] holds the free functions that read and write the
/// calling thread's override slot.
pub use tether_alloc as alloc;

/// Common imports for writing entry points.
///
/// ```rust
/// use tether::prelude::*;
/// ```
pub mod prelude {
    // Status and faults
    pub use tether_core::{guarded, verify_alloc, AllocFailure, Fault, NullCheck, StatusCode};

    // Check macros
    pub use tether_core::{
        check, ensure, ensure_alloc, ensure_ptr, raise_if_failed, raise_if_null, raise_if_oom,
        raise_unless, raise_unless_arg,
    };

    // Allocators
    pub use tether_alloc::{
        AllocBuffer, Allocator, AllocatorRef, SystemAllocator, SystemAllocatorConfig,
        ThreadAllocatorScope,
    };
}

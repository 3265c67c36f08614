//! Thread-scoped allocator overrides for Tether.
//!
//! Every allocation made inside the component resolves the calling
//! thread's *current* allocator through the [`registry`]. A caller can lend
//! its own allocator for one call or one nested scope with a
//! [`ThreadAllocatorScope`]; without an override, the process-wide default
//! ([`SystemAllocator`] unless configured otherwise) is used.
//!
//! # Architecture
//!
//! ```text
//! registry (thread_local slot: Override = Weak<dyn Allocator>)
//! ├── DEFAULT: OnceLock<AllocatorRef> (lazy, created at most once)
//! ├── ThreadAllocatorScope (swap in on new, swap back on drop)
//! └── AllocBuffer (owned allocation, freed through its allocator on drop)
//! ```
//!
//! The override slot is non-owning: installing an allocator never changes
//! its strong count. [`ThreadAllocatorScope`] borrows the allocator it
//! lends, so the borrow checker keeps the allocator alive for as long as it
//! is installed.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod allocator;
pub mod buffer;
pub mod config;
pub mod registry;
pub mod scope;
pub mod system;

pub use allocator::{Allocator, AllocatorRef};
pub use buffer::AllocBuffer;
pub use config::{ConfigError, SystemAllocatorConfig};
pub use registry::Override;
pub use scope::ThreadAllocatorScope;
pub use system::SystemAllocator;
